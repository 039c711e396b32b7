//! Port for the external credential store.
//!
//! In hexagonal terms this is a *driven* port: the session resolver consumes
//! it to authenticate credentials and to observe session-change events
//! without knowing the backing infrastructure, which keeps resolver tests
//! deterministic.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{LoginCredentials, SessionToken};

/// Errors raised by credential store adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialStoreError {
    /// The store could not be reached.
    #[error("credential store unreachable: {message}")]
    Unavailable {
        /// Transport-level diagnostic.
        message: String,
    },
    /// The credentials were rejected.
    #[error("credentials rejected: {message}")]
    Rejected {
        /// Store-provided diagnostic.
        message: String,
    },
}

impl CredentialStoreError {
    /// Build an [`CredentialStoreError::Unavailable`] value.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Build a [`CredentialStoreError::Rejected`] value.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Session lifecycle notification emitted by a credential store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session was established.
    SignedIn(SessionToken),
    /// The session ended.
    SignedOut,
}

/// Port for authenticating credentials and holding the session token.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Validate credentials and establish a session.
    async fn sign_in(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<SessionToken, CredentialStoreError>;

    /// End the current session, if any.
    async fn sign_out(&self) -> Result<(), CredentialStoreError>;

    /// Return the currently held session token, when one exists.
    async fn current_session(&self) -> Result<Option<SessionToken>, CredentialStoreError>;

    /// Subscribe to session lifecycle notifications.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

/// Fixture store for code paths that never authenticate: every call reports
/// the store as unreachable and no events are ever emitted.
#[derive(Debug)]
pub struct UnreachableCredentialStore {
    events: broadcast::Sender<SessionEvent>,
}

impl Default for UnreachableCredentialStore {
    fn default() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }
}

#[async_trait]
impl CredentialStore for UnreachableCredentialStore {
    async fn sign_in(
        &self,
        _credentials: &LoginCredentials,
    ) -> Result<SessionToken, CredentialStoreError> {
        Err(CredentialStoreError::unavailable("fixture store is offline"))
    }

    async fn sign_out(&self) -> Result<(), CredentialStoreError> {
        Err(CredentialStoreError::unavailable("fixture store is offline"))
    }

    async fn current_session(&self) -> Result<Option<SessionToken>, CredentialStoreError> {
        Err(CredentialStoreError::unavailable("fixture store is offline"))
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
