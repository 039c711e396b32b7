//! Hosted-service adapters over HTTP.

mod credential_store;
mod directory;

pub use credential_store::RestCredentialStore;
pub use directory::RestDirectory;
