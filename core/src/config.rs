//! Runtime configuration loaded via OrthoConfig.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::domain::{Email, LoginCredentials, UserValidationError};

const DEFAULT_OWNER_EMAIL: &str = "diretor@atas.app";
const DEFAULT_OWNER_PASSWORD: &str = "diretor2020";

fn default_data_dir() -> PathBuf {
    PathBuf::from(".atas")
}

/// Configuration values controlling backend selection, the reserved owner
/// identity, and the resilience tasks.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "ATAS")]
pub struct AtasSettings {
    /// Base URL of the hosted directory service. When absent, the startup
    /// probe is skipped and the local fallback backend is selected directly.
    pub directory_url: Option<String>,
    /// API key sent with every hosted directory request.
    pub directory_api_key: Option<String>,
    /// Startup availability probe timeout in milliseconds.
    #[ortho_config(default = 4_000)]
    pub probe_timeout_ms: u64,
    /// Directory holding the local fallback store and the session mirror.
    pub data_dir: Option<PathBuf>,
    /// Reserved owner email override.
    pub owner_email: Option<String>,
    /// Reserved owner password override.
    pub owner_password: Option<String>,
    /// Period of the session-mirror refresh task in seconds.
    #[ortho_config(default = 300)]
    pub mirror_period_secs: u64,
}

impl AtasSettings {
    /// Startup probe timeout as a [`Duration`].
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Session-mirror refresh period as a [`Duration`].
    pub fn mirror_period(&self) -> Duration {
        Duration::from_secs(self.mirror_period_secs)
    }

    /// Return the configured data directory, falling back to the default.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Build the reserved owner identity from overrides or the defaults.
    pub fn owner_credentials(&self) -> Result<OwnerCredentials, UserValidationError> {
        let email = Email::new(self.owner_email.as_deref().unwrap_or(DEFAULT_OWNER_EMAIL))?;
        let password = self
            .owner_password
            .as_deref()
            .unwrap_or(DEFAULT_OWNER_PASSWORD);
        Ok(OwnerCredentials::new(email, password))
    }
}

/// The reserved owner identity.
///
/// Lives only in configuration; there is never a directory row behind it,
/// so an attacker who can write the directory cannot mint an owner.
#[derive(Clone)]
pub struct OwnerCredentials {
    email: Email,
    password: Zeroizing<String>,
}

impl OwnerCredentials {
    /// Build the owner identity from a validated email and raw password.
    pub fn new(email: Email, password: impl Into<String>) -> Self {
        Self {
            email,
            password: Zeroizing::new(password.into()),
        }
    }

    /// The owner's email address.
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Whether the given login credentials are exactly the owner pair.
    ///
    /// Both the (normalized) email and the password must match.
    pub fn matches(&self, credentials: &LoginCredentials) -> bool {
        credentials.email() == &self.email && credentials.password() == self.password.as_str()
    }
}

impl fmt::Debug for OwnerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for configuration parsing and the owner identity.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    fn load_from_empty_args() -> AtasSettings {
        AtasSettings::load_from_iter([OsString::from("atas-core")]).expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env([
            ("ATAS_DIRECTORY_URL", None::<String>),
            ("ATAS_DIRECTORY_API_KEY", None::<String>),
            ("ATAS_PROBE_TIMEOUT_MS", None::<String>),
            ("ATAS_DATA_DIR", None::<String>),
            ("ATAS_OWNER_EMAIL", None::<String>),
            ("ATAS_OWNER_PASSWORD", None::<String>),
            ("ATAS_MIRROR_PERIOD_SECS", None::<String>),
        ]);

        let settings = load_from_empty_args();
        assert!(settings.directory_url.is_none());
        assert_eq!(settings.probe_timeout(), Duration::from_millis(4_000));
        assert_eq!(settings.mirror_period(), Duration::from_secs(300));
        assert_eq!(settings.data_dir(), default_data_dir());

        let owner = settings.owner_credentials().expect("owner should build");
        assert_eq!(owner.email().as_ref(), DEFAULT_OWNER_EMAIL);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            (
                "ATAS_DIRECTORY_URL",
                Some("https://directory.example.org".to_owned()),
            ),
            ("ATAS_PROBE_TIMEOUT_MS", Some("1500".to_owned())),
            ("ATAS_DATA_DIR", Some("/var/lib/atas".to_owned())),
            ("ATAS_OWNER_EMAIL", Some("Chefe@Atas.app".to_owned())),
            ("ATAS_OWNER_PASSWORD", Some("outra-senha".to_owned())),
            ("ATAS_MIRROR_PERIOD_SECS", Some("60".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.directory_url.as_deref(),
            Some("https://directory.example.org")
        );
        assert_eq!(settings.probe_timeout(), Duration::from_millis(1_500));
        assert_eq!(settings.mirror_period(), Duration::from_secs(60));
        assert_eq!(settings.data_dir(), PathBuf::from("/var/lib/atas"));

        let owner = settings.owner_credentials().expect("owner should build");
        assert_eq!(owner.email().as_ref(), "chefe@atas.app");
        let creds = LoginCredentials::try_from_parts("CHEFE@atas.app", "outra-senha")
            .expect("credential shape");
        assert!(owner.matches(&creds));
    }

    #[rstest]
    #[case("diretor@atas.app", "diretor2020", true)]
    #[case("diretor@atas.app", "wrong", false)]
    #[case("someone@else.org", "diretor2020", false)]
    fn owner_matching_requires_both_fields(
        #[case] email: &str,
        #[case] password: &str,
        #[case] expected: bool,
    ) {
        let owner = OwnerCredentials::new(
            Email::new(DEFAULT_OWNER_EMAIL).expect("valid email"),
            DEFAULT_OWNER_PASSWORD,
        );
        let creds =
            LoginCredentials::try_from_parts(email, password).expect("credential shape");
        assert_eq!(owner.matches(&creds), expected);
    }

    #[rstest]
    fn debug_output_never_leaks_the_password() {
        let owner = OwnerCredentials::new(
            Email::new(DEFAULT_OWNER_EMAIL).expect("valid email"),
            DEFAULT_OWNER_PASSWORD,
        );
        let rendered = format!("{owner:?}");
        assert!(!rendered.contains(DEFAULT_OWNER_PASSWORD));
    }
}
