//! Minutes data model.
//!
//! Minutes bodies are presentation concerns; the core carries them opaquely
//! and cares only about ownership (`unit_id`), authorship (`created_by`), and
//! the scope tag matched by the permission gate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{FocusArea, UnitId, UserId};

/// Stable minutes identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinutesId(Uuid);

impl MinutesId {
    /// Generate a new random [`MinutesId`].
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for MinutesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Enumerated meeting type of a minutes document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinutesKind {
    /// Sacrament meeting.
    Sacrament,
    /// Unit council meeting.
    Council,
    /// Presidency meeting of a sub-organization.
    Presidency,
    /// Baptism service.
    Baptism,
    /// Anything else.
    Other,
}

/// A minutes document belonging to exactly one unit.
///
/// `created_by` is a historical record, not a live reference: after the
/// author is deleted through the cascade engine it dangles by design, and
/// consumers must render it defensively ("unknown author").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct Minutes {
    id: MinutesId,
    unit_id: UnitId,
    created_by: UserId,
    kind: MinutesKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<FocusArea>,
    body: Value,
    created_at: DateTime<Utc>,
}

impl Minutes {
    /// Build a new [`Minutes`] record.
    pub fn new(
        unit_id: UnitId,
        created_by: UserId,
        kind: MinutesKind,
        scope: Option<FocusArea>,
        body: Value,
    ) -> Self {
        Self {
            id: MinutesId::random(),
            unit_id,
            created_by,
            kind,
            scope,
            body,
            created_at: Utc::now(),
        }
    }

    /// Stable identifier.
    pub fn id(&self) -> MinutesId {
        self.id
    }

    /// Owning unit.
    pub fn unit_id(&self) -> &UnitId {
        &self.unit_id
    }

    /// Recording author; may dangle after user deletion.
    pub fn created_by(&self) -> &UserId {
        &self.created_by
    }

    /// Meeting type.
    pub fn kind(&self) -> MinutesKind {
        self.kind
    }

    /// Scope tag matched against a membership's focus area.
    pub fn scope(&self) -> Option<FocusArea> {
        self.scope
    }

    /// Kind-dependent structured content, opaque to the core.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Moment the record was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
