//! Startup backend selection.
//!
//! The directory backend is decided exactly once per process: a single
//! bounded probe against the hosted directory picks remote or local, and
//! every service sees the same answer for the rest of the run. Call sites
//! never re-probe or branch on availability themselves.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};

use crate::domain::ports::Directory;

/// Which backend the startup probe selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// The hosted directory answered the probe.
    Remote,
    /// The local fallback store is in use.
    Local,
}

/// The probe's decision: one directory for the whole process lifetime.
pub struct DirectorySelection {
    /// The selected backend implementation.
    pub directory: Arc<dyn Directory>,
    /// Which side was selected, for logging and diagnostics.
    pub backend: Backend,
}

/// Probe the hosted directory once and pick a backend.
///
/// `remote` is `None` when no hosted endpoint is configured; the fallback is
/// then selected without any network traffic. A probe that errors or runs
/// past `probe_timeout` also selects the fallback.
pub async fn select_directory(
    remote: Option<Arc<dyn Directory>>,
    fallback: Arc<dyn Directory>,
    probe_timeout: Duration,
) -> DirectorySelection {
    let Some(remote) = remote else {
        info!("no hosted directory configured, using the local fallback");
        return DirectorySelection {
            directory: fallback,
            backend: Backend::Local,
        };
    };

    match timeout(probe_timeout, remote.probe()).await {
        Ok(Ok(())) => {
            info!("hosted directory answered the probe");
            DirectorySelection {
                directory: remote,
                backend: Backend::Remote,
            }
        }
        Ok(Err(err)) => {
            warn!(%err, "hosted directory probe failed, using the local fallback");
            DirectorySelection {
                directory: fallback,
                backend: Backend::Local,
            }
        }
        Err(_) => {
            warn!(
                timeout_ms = probe_timeout.as_millis() as u64,
                "hosted directory probe timed out, using the local fallback"
            );
            DirectorySelection {
                directory: fallback,
                backend: Backend::Local,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ports::{DirectoryError, MockDirectory};
    use crate::outbound::local::{LocalDirectory, MemoryStore};
    use rstest::rstest;

    fn fallback() -> Arc<dyn Directory> {
        Arc::new(LocalDirectory::new(Arc::new(MemoryStore::new())))
    }

    #[rstest]
    #[tokio::test]
    async fn a_healthy_remote_wins_the_probe() {
        let mut remote = MockDirectory::new();
        remote.expect_probe().times(1).returning(|| Ok(()));

        let selection =
            select_directory(Some(Arc::new(remote)), fallback(), Duration::from_secs(1)).await;
        assert_eq!(selection.backend, Backend::Remote);
    }

    #[rstest]
    #[tokio::test]
    async fn a_failing_remote_falls_back_to_local() {
        let mut remote = MockDirectory::new();
        remote
            .expect_probe()
            .times(1)
            .returning(|| Err(DirectoryError::unavailable("dns")));

        let selection =
            select_directory(Some(Arc::new(remote)), fallback(), Duration::from_secs(1)).await;
        assert_eq!(selection.backend, Backend::Local);
    }

    #[rstest]
    #[tokio::test]
    async fn an_unconfigured_remote_skips_the_probe_entirely() {
        let selection = select_directory(None, fallback(), Duration::from_secs(1)).await;
        assert_eq!(selection.backend, Backend::Local);
    }
}
