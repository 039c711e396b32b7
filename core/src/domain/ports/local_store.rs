//! Port for local key/value persistence.
//!
//! Models the browser-local storage the original system fell back to:
//! synchronous string get/set/remove with no structure beyond the key. The
//! fallback directory and the session mirror are both built on top of it.

/// Errors raised by local store adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocalStoreError {
    /// Reading or writing the backing medium failed.
    #[error("local store I/O failed: {message}")]
    Io {
        /// Medium-level diagnostic.
        message: String,
    },
}

impl LocalStoreError {
    /// Build a [`LocalStoreError::Io`] value.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

/// Key/value persistence with browser-storage semantics.
#[cfg_attr(test, mockall::automock)]
pub trait LocalStore: Send + Sync {
    /// Read the value stored under `key`, when present.
    fn get_item(&self, key: &str) -> Result<Option<String>, LocalStoreError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;

    /// Remove the value stored under `key`; removing an absent key succeeds.
    fn remove_item(&self, key: &str) -> Result<(), LocalStoreError>;
}
