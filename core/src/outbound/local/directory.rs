//! Directory adapter over the local key/value store.
//!
//! Each record kind is one JSON array under a fixed key. There are no
//! foreign keys and no uniqueness constraints here; the domain services
//! re-check those invariants on every mutation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::ports::{Directory, DirectoryError, LocalStore, LocalStoreError};
use crate::domain::{CustomHymn, Email, Membership, Minutes, Unit, UnitId, User, UserId};

const USERS_KEY: &str = "atas.users";
const UNITS_KEY: &str = "atas.units";
const MEMBERSHIPS_KEY: &str = "atas.memberships";
const MINUTES_KEY: &str = "atas.minutes";
const HYMNS_KEY: &str = "atas.hymns";

/// Directory backend over a [`LocalStore`].
pub struct LocalDirectory<S> {
    store: Arc<S>,
}

impl<S> LocalDirectory<S>
where
    S: LocalStore,
{
    /// Create a directory over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn read_table<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, DirectoryError> {
        let raw = self.store.get_item(key).map_err(map_store_error)?;
        match raw {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|err| DirectoryError::decode(format!("table {key}: {err}"))),
        }
    }

    fn write_table<T: Serialize>(&self, key: &str, rows: &[T]) -> Result<(), DirectoryError> {
        let encoded = serde_json::to_string(rows)
            .map_err(|err| DirectoryError::query(format!("table {key}: {err}")))?;
        self.store.set_item(key, &encoded).map_err(map_store_error)
    }

    fn push_row<T: Serialize + DeserializeOwned>(
        &self,
        key: &str,
        row: &T,
    ) -> Result<(), DirectoryError>
    where
        T: Clone,
    {
        let mut rows: Vec<T> = self.read_table(key)?;
        rows.push(row.clone());
        self.write_table(key, &rows)
    }

    fn replace_row<T, F>(&self, key: &str, matcher: F, row: &T) -> Result<(), DirectoryError>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: Fn(&T) -> bool,
    {
        let mut rows: Vec<T> = self.read_table(key)?;
        let Some(slot) = rows.iter_mut().find(|candidate| matcher(candidate)) else {
            return Err(DirectoryError::query(format!(
                "table {key}: no row matched the update"
            )));
        };
        *slot = row.clone();
        self.write_table(key, &rows)
    }

    fn delete_rows<T, F>(&self, key: &str, matcher: F) -> Result<u64, DirectoryError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let mut rows: Vec<T> = self.read_table(key)?;
        let before = rows.len();
        rows.retain(|row| !matcher(row));
        let removed = (before - rows.len()) as u64;
        if removed > 0 {
            self.write_table(key, &rows)?;
        }
        Ok(removed)
    }
}

fn map_store_error(error: LocalStoreError) -> DirectoryError {
    match error {
        LocalStoreError::Io { message } => DirectoryError::unavailable(message),
    }
}

#[async_trait]
impl<S> Directory for LocalDirectory<S>
where
    S: LocalStore,
{
    async fn probe(&self) -> Result<(), DirectoryError> {
        self.store.get_item(USERS_KEY).map_err(map_store_error)?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), DirectoryError> {
        self.push_row(USERS_KEY, user)
    }

    async fn find_user(&self, id: &UserId) -> Result<Option<User>, DirectoryError> {
        let users: Vec<User> = self.read_table(USERS_KEY)?;
        Ok(users.into_iter().find(|user| user.id() == id))
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, DirectoryError> {
        let users: Vec<User> = self.read_table(USERS_KEY)?;
        Ok(users.into_iter().find(|user| user.email() == email))
    }

    async fn update_user(&self, user: &User) -> Result<(), DirectoryError> {
        self.replace_row(USERS_KEY, |row: &User| row.id() == user.id(), user)
    }

    async fn delete_user(&self, id: &UserId) -> Result<u64, DirectoryError> {
        self.delete_rows(USERS_KEY, |row: &User| row.id() == id)
    }

    async fn insert_unit(&self, unit: &Unit) -> Result<(), DirectoryError> {
        self.push_row(UNITS_KEY, unit)
    }

    async fn find_unit(&self, id: &UnitId) -> Result<Option<Unit>, DirectoryError> {
        let units: Vec<Unit> = self.read_table(UNITS_KEY)?;
        Ok(units.into_iter().find(|unit| unit.id() == id))
    }

    async fn update_unit(&self, unit: &Unit) -> Result<(), DirectoryError> {
        self.replace_row(UNITS_KEY, |row: &Unit| row.id() == unit.id(), unit)
    }

    async fn delete_unit(&self, id: &UnitId) -> Result<u64, DirectoryError> {
        self.delete_rows(UNITS_KEY, |row: &Unit| row.id() == id)
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<(), DirectoryError> {
        self.push_row(MEMBERSHIPS_KEY, membership)
    }

    async fn find_membership(
        &self,
        user_id: &UserId,
        unit_id: &UnitId,
    ) -> Result<Option<Membership>, DirectoryError> {
        let memberships: Vec<Membership> = self.read_table(MEMBERSHIPS_KEY)?;
        Ok(memberships
            .into_iter()
            .find(|row| row.user_id() == user_id && row.unit_id() == unit_id))
    }

    async fn list_memberships_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Membership>, DirectoryError> {
        let mut memberships: Vec<Membership> = self.read_table(MEMBERSHIPS_KEY)?;
        memberships.retain(|row| row.user_id() == user_id);
        Ok(memberships)
    }

    async fn list_memberships_by_unit(
        &self,
        unit_id: &UnitId,
    ) -> Result<Vec<Membership>, DirectoryError> {
        let mut memberships: Vec<Membership> = self.read_table(MEMBERSHIPS_KEY)?;
        memberships.retain(|row| row.unit_id() == unit_id);
        Ok(memberships)
    }

    async fn update_membership(&self, membership: &Membership) -> Result<(), DirectoryError> {
        self.replace_row(
            MEMBERSHIPS_KEY,
            |row: &Membership| {
                row.user_id() == membership.user_id() && row.unit_id() == membership.unit_id()
            },
            membership,
        )
    }

    async fn delete_membership(
        &self,
        user_id: &UserId,
        unit_id: &UnitId,
    ) -> Result<u64, DirectoryError> {
        self.delete_rows(MEMBERSHIPS_KEY, |row: &Membership| {
            row.user_id() == user_id && row.unit_id() == unit_id
        })
    }

    async fn delete_memberships_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError> {
        self.delete_rows(MEMBERSHIPS_KEY, |row: &Membership| row.unit_id() == unit_id)
    }

    async fn delete_memberships_by_user(&self, user_id: &UserId) -> Result<u64, DirectoryError> {
        self.delete_rows(MEMBERSHIPS_KEY, |row: &Membership| row.user_id() == user_id)
    }

    async fn insert_minutes(&self, minutes: &Minutes) -> Result<(), DirectoryError> {
        self.push_row(MINUTES_KEY, minutes)
    }

    async fn list_minutes_by_unit(&self, unit_id: &UnitId) -> Result<Vec<Minutes>, DirectoryError> {
        let mut minutes: Vec<Minutes> = self.read_table(MINUTES_KEY)?;
        minutes.retain(|row| row.unit_id() == unit_id);
        Ok(minutes)
    }

    async fn count_minutes_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError> {
        let minutes: Vec<Minutes> = self.read_table(MINUTES_KEY)?;
        Ok(minutes.iter().filter(|row| row.unit_id() == unit_id).count() as u64)
    }

    async fn delete_minutes_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError> {
        self.delete_rows(MINUTES_KEY, |row: &Minutes| row.unit_id() == unit_id)
    }

    async fn insert_custom_hymn(&self, hymn: &CustomHymn) -> Result<(), DirectoryError> {
        self.push_row(HYMNS_KEY, hymn)
    }

    async fn count_custom_hymns_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError> {
        let hymns: Vec<CustomHymn> = self.read_table(HYMNS_KEY)?;
        Ok(hymns.iter().filter(|row| row.unit_id() == unit_id).count() as u64)
    }

    async fn delete_custom_hymns_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError> {
        self.delete_rows(HYMNS_KEY, |row: &CustomHymn| row.unit_id() == unit_id)
    }
}
