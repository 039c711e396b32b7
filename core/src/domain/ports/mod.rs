//! Domain ports and supporting types for the hexagonal boundary.

mod credential_store;
mod directory;
mod local_store;

#[cfg(test)]
pub use credential_store::MockCredentialStore;
pub use credential_store::{
    CredentialStore, CredentialStoreError, SessionEvent, UnreachableCredentialStore,
};
#[cfg(test)]
pub use directory::MockDirectory;
pub use directory::{Directory, DirectoryError};
#[cfg(test)]
pub use local_store::MockLocalStore;
pub use local_store::{LocalStore, LocalStoreError};
