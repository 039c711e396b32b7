//! Local fallback adapters: key/value stores, the store-backed directory,
//! and the in-memory credential store.

mod credential_store;
mod directory;
mod store;

pub use credential_store::MemoryCredentialStore;
pub use directory::LocalDirectory;
pub use store::{FileStore, MemoryStore};
