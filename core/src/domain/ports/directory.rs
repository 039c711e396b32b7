//! Port for the persistent directory holding users, units, memberships,
//! minutes, and custom hymns.
//!
//! This is the dual-backend capability interface: one implementation talks to
//! the hosted directory, the other to the local fallback store. The session
//! resolver, membership registry, and cascade engine depend only on this
//! trait; which implementation they get is decided once by the startup
//! availability probe, never per call site.
//!
//! The fallback implementation enforces no foreign keys and no uniqueness,
//! so the core re-checks those invariants itself on every mutation.

use async_trait::async_trait;

use crate::domain::{CustomHymn, Email, Membership, Minutes, Unit, UnitId, User, UserId};

/// Errors raised by directory adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// The backing store could not be reached.
    #[error("directory unreachable: {message}")]
    Unavailable {
        /// Transport-level diagnostic.
        message: String,
    },
    /// A query or mutation failed during execution.
    #[error("directory query failed: {message}")]
    Query {
        /// Store-provided diagnostic.
        message: String,
    },
    /// A stored record could not be decoded into its domain type.
    #[error("directory record corrupt: {message}")]
    Decode {
        /// Decoding diagnostic.
        message: String,
    },
}

impl DirectoryError {
    /// Build a [`DirectoryError::Unavailable`] value.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Build a [`DirectoryError::Query`] value.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Build a [`DirectoryError::Decode`] value.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// Capability interface over the directory's five record kinds.
///
/// Deletion methods are filter-based and idempotent: deleting records that
/// are already absent succeeds and reports zero rows, which is what lets the
/// cascade engine resume after a partial failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Directory: Send + Sync {
    /// Cheap availability check used by the startup backend selection.
    async fn probe(&self) -> Result<(), DirectoryError>;

    // --- users ---

    /// Insert a user record.
    async fn insert_user(&self, user: &User) -> Result<(), DirectoryError>;

    /// Fetch a user by identifier.
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, DirectoryError>;

    /// Fetch a user by normalized email.
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, DirectoryError>;

    /// Replace a user record.
    async fn update_user(&self, user: &User) -> Result<(), DirectoryError>;

    /// Delete a user row; absent rows count as deleted.
    async fn delete_user(&self, id: &UserId) -> Result<u64, DirectoryError>;

    // --- units ---

    /// Insert a unit record.
    async fn insert_unit(&self, unit: &Unit) -> Result<(), DirectoryError>;

    /// Fetch a unit by identifier.
    async fn find_unit(&self, id: &UnitId) -> Result<Option<Unit>, DirectoryError>;

    /// Replace a unit record.
    async fn update_unit(&self, unit: &Unit) -> Result<(), DirectoryError>;

    /// Delete a unit row; absent rows count as deleted.
    async fn delete_unit(&self, id: &UnitId) -> Result<u64, DirectoryError>;

    // --- memberships ---

    /// Insert a membership record. Uniqueness of `(user, unit)` is NOT
    /// guaranteed by every adapter; the registry checks before inserting.
    async fn insert_membership(&self, membership: &Membership) -> Result<(), DirectoryError>;

    /// Fetch the membership for one `(user, unit)` pair.
    async fn find_membership(
        &self,
        user_id: &UserId,
        unit_id: &UnitId,
    ) -> Result<Option<Membership>, DirectoryError>;

    /// List memberships held by a user, in insertion order.
    async fn list_memberships_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Membership>, DirectoryError>;

    /// List memberships within a unit, in insertion order.
    async fn list_memberships_by_unit(
        &self,
        unit_id: &UnitId,
    ) -> Result<Vec<Membership>, DirectoryError>;

    /// Replace the membership for the record's `(user, unit)` pair.
    async fn update_membership(&self, membership: &Membership) -> Result<(), DirectoryError>;

    /// Delete one membership; absent rows count as deleted.
    async fn delete_membership(
        &self,
        user_id: &UserId,
        unit_id: &UnitId,
    ) -> Result<u64, DirectoryError>;

    /// Delete every membership referencing the unit.
    async fn delete_memberships_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError>;

    /// Delete every membership referencing the user.
    async fn delete_memberships_by_user(&self, user_id: &UserId) -> Result<u64, DirectoryError>;

    // --- minutes ---

    /// Insert a minutes record.
    async fn insert_minutes(&self, minutes: &Minutes) -> Result<(), DirectoryError>;

    /// List minutes belonging to a unit.
    async fn list_minutes_by_unit(&self, unit_id: &UnitId) -> Result<Vec<Minutes>, DirectoryError>;

    /// Count minutes belonging to a unit.
    async fn count_minutes_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError>;

    /// Delete every minutes record belonging to the unit.
    async fn delete_minutes_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError>;

    // --- custom hymns ---

    /// Insert a custom hymn entry.
    async fn insert_custom_hymn(&self, hymn: &CustomHymn) -> Result<(), DirectoryError>;

    /// Count custom hymn entries scoped to a unit.
    async fn count_custom_hymns_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError>;

    /// Delete every custom hymn entry scoped to the unit.
    async fn delete_custom_hymns_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError>;
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn error_constructors_format_messages() {
        assert_eq!(
            DirectoryError::unavailable("dns").to_string(),
            "directory unreachable: dns"
        );
        assert_eq!(
            DirectoryError::query("missing table").to_string(),
            "directory query failed: missing table"
        );
        assert_eq!(
            DirectoryError::decode("bad json").to_string(),
            "directory record corrupt: bad json"
        );
    }
}
