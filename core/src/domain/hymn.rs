//! Unit-scoped custom hymn entries.
//!
//! The shipped hymn catalog is static presentation data and lives outside the
//! core. Custom entries are directory records scoped to one unit and exist
//! here only as cascade targets.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::UnitId;

/// Stable identifier for a custom hymn entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HymnId(Uuid);

impl HymnId {
    /// Generate a new random [`HymnId`].
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for HymnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Custom hymn entry added by one unit to supplement the shipped catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct CustomHymn {
    id: HymnId,
    unit_id: UnitId,
    number: u32,
    title: String,
}

impl CustomHymn {
    /// Build a new [`CustomHymn`].
    pub fn new(unit_id: UnitId, number: u32, title: impl Into<String>) -> Self {
        Self {
            id: HymnId::random(),
            unit_id,
            number,
            title: title.into(),
        }
    }

    /// Stable identifier.
    pub fn id(&self) -> HymnId {
        self.id
    }

    /// Unit the entry is scoped to.
    pub fn unit_id(&self) -> &UnitId {
        &self.unit_id
    }

    /// Catalog number within the unit.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Hymn title.
    pub fn title(&self) -> &str {
        self.title.as_str()
    }
}
