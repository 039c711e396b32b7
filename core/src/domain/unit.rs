//! Organizational unit data model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::UserId;

/// Validation errors returned by the unit constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitValidationError {
    /// The identifier was empty.
    EmptyId,
    /// The identifier was not a valid UUID.
    InvalidId,
    /// The unit name was empty once trimmed.
    EmptyName,
}

impl fmt::Display for UnitValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "unit id must not be empty"),
            Self::InvalidId => write!(f, "unit id must be a valid UUID"),
            Self::EmptyName => write!(f, "unit name must not be empty"),
        }
    }
}

impl std::error::Error for UnitValidationError {}

/// Stable unit identifier stored as a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitId(Uuid, String);

impl UnitId {
    /// Validate and construct a [`UnitId`] from borrowed input.
    pub fn new(id: impl AsRef<str>) -> Result<Self, UnitValidationError> {
        Self::from_owned(id.as_ref().to_owned())
    }

    /// Generate a new random [`UnitId`].
    pub fn random() -> Self {
        let uuid = Uuid::new_v4();
        Self(uuid, uuid.to_string())
    }

    fn from_owned(id: String) -> Result<Self, UnitValidationError> {
        if id.is_empty() {
            return Err(UnitValidationError::EmptyId);
        }
        if id.trim() != id {
            return Err(UnitValidationError::InvalidId);
        }

        let parsed = Uuid::parse_str(&id).map_err(|_| UnitValidationError::InvalidId)?;
        Ok(Self(parsed, id))
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl AsRef<str> for UnitId {
    fn as_ref(&self) -> &str {
        self.1.as_str()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<UnitId> for String {
    fn from(value: UnitId) -> Self {
        let UnitId(_, raw) = value;
        raw
    }
}

impl TryFrom<String> for UnitId {
    type Error = UnitValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Enumerated organizational type of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// A full congregation.
    Ward,
    /// A smaller congregation.
    Branch,
    /// A grouping of wards.
    Stake,
    /// A grouping of branches.
    District,
}

/// Organizational unit owning its own minutes and membership roster.
///
/// ## Invariants
/// - An inactive unit is excluded from unit-selection candidates, but its
///   historical minutes remain queryable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
#[serde(try_from = "UnitDto", into = "UnitDto")]
pub struct Unit {
    id: UnitId,
    name: String,
    kind: UnitKind,
    logo: Option<String>,
    active: bool,
    owner_id: UserId,
    created_at: DateTime<Utc>,
}

impl Unit {
    /// Build a new active [`Unit`].
    pub fn new(
        id: UnitId,
        name: impl Into<String>,
        kind: UnitKind,
        owner_id: UserId,
    ) -> Result<Self, UnitValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(UnitValidationError::EmptyName);
        }
        Ok(Self {
            id,
            name,
            kind,
            logo: None,
            active: true,
            owner_id,
            created_at: Utc::now(),
        })
    }

    /// Attach an optional logo reference.
    pub fn with_logo(mut self, logo: impl Into<String>) -> Self {
        self.logo = Some(logo.into());
        self
    }

    /// Override the creation timestamp (used when rehydrating records).
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Return a copy with the given activation state.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Stable unit identifier.
    pub fn id(&self) -> &UnitId {
        &self.id
    }

    /// Unit name shown in selection lists.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Organizational type.
    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Optional logo reference.
    pub fn logo(&self) -> Option<&str> {
        self.logo.as_deref()
    }

    /// Whether the unit is selectable as an active context.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// User who created the unit.
    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    /// Moment the record was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitDto {
    id: String,
    name: String,
    kind: UnitKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    logo: Option<String>,
    active: bool,
    owner_id: String,
    created_at: DateTime<Utc>,
}

impl From<Unit> for UnitDto {
    fn from(value: Unit) -> Self {
        let Unit {
            id,
            name,
            kind,
            logo,
            active,
            owner_id,
            created_at,
        } = value;
        Self {
            id: id.to_string(),
            name,
            kind,
            logo,
            active,
            owner_id: owner_id.to_string(),
            created_at,
        }
    }
}

/// Conversion failures when rehydrating a [`Unit`] from its DTO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitDtoError {
    /// A unit field failed validation.
    Unit(UnitValidationError),
    /// The owner reference failed validation.
    Owner(crate::domain::UserValidationError),
}

impl fmt::Display for UnitDtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(err) => write!(f, "{err}"),
            Self::Owner(err) => write!(f, "owner id invalid: {err}"),
        }
    }
}

impl std::error::Error for UnitDtoError {}

impl TryFrom<UnitDto> for Unit {
    type Error = UnitDtoError;

    fn try_from(value: UnitDto) -> Result<Self, Self::Error> {
        let id = UnitId::new(value.id).map_err(UnitDtoError::Unit)?;
        let owner_id = UserId::new(value.owner_id).map_err(UnitDtoError::Owner)?;
        let mut unit = Unit::new(id, value.name, value.kind, owner_id)
            .map_err(UnitDtoError::Unit)?
            .with_created_at(value.created_at)
            .with_active(value.active);
        unit.logo = value.logo;
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn blank_names_are_rejected() {
        let err = Unit::new(UnitId::random(), "  ", UnitKind::Ward, UserId::random())
            .expect_err("blank names must fail");
        assert_eq!(err, UnitValidationError::EmptyName);
    }

    #[rstest]
    fn units_round_trip_through_serde() {
        let unit = Unit::new(
            UnitId::random(),
            "Ala Jardim",
            UnitKind::Ward,
            UserId::random(),
        )
        .expect("valid unit")
        .with_logo("logo.png")
        .with_active(false);

        let encoded = serde_json::to_string(&unit).expect("unit serializes");
        let decoded: Unit = serde_json::from_str(&encoded).expect("unit deserializes");
        assert_eq!(decoded, unit);
        assert!(!decoded.is_active());
    }
}
