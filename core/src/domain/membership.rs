//! Membership data model: the user↔unit link with role and permissions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{UnitId, UnitValidationError, UserId, UserValidationError};

/// Role a member holds within one specific unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Created the unit; widest standing short of the system owner.
    Owner,
    /// Runs the unit day to day.
    Administrator,
    /// Regular member.
    Member,
}

/// Optional sub-scope restricting which minutes a membership may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusArea {
    /// Children's organization.
    Primary,
    /// Women's organization.
    ReliefSociety,
    /// Men's quorum.
    EldersQuorum,
    /// Young women's organization.
    YoungWomen,
    /// Young men's organization.
    YoungMen,
    /// Sunday school.
    SundaySchool,
}

/// Individually addressable permission flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// May record new minutes.
    CreateMinutes,
    /// May edit existing minutes.
    EditMinutes,
    /// May delete minutes.
    DeleteMinutes,
    /// May manage the unit's roster.
    ManageUsers,
    /// May change unit-wide settings and perform wide destructive actions.
    ManageSystem,
    /// May read minutes regardless of focus area.
    ViewAllMinutes,
    /// May read minutes matching the membership's focus area.
    ViewByFocusArea,
}

/// Fixed record of permission booleans carried by one membership.
///
/// There is no inheritance: an administrator role does not implicitly grant
/// any flag here. Role/flag composition rules live in [`crate::domain::gate`]
/// and nowhere else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct PermissionSet {
    /// May record new minutes.
    pub create_minutes: bool,
    /// May edit existing minutes.
    pub edit_minutes: bool,
    /// May delete minutes.
    pub delete_minutes: bool,
    /// May manage the unit's roster.
    pub manage_users: bool,
    /// May change unit-wide settings and perform wide destructive actions.
    pub manage_system: bool,
    /// May read minutes regardless of focus area.
    pub view_all_minutes: bool,
    /// May read minutes matching the membership's focus area.
    pub view_by_focus_area: bool,
}

impl PermissionSet {
    /// Every flag granted; used for signup administrators and the system
    /// owner's synthetic principal.
    pub fn full() -> Self {
        Self {
            create_minutes: true,
            edit_minutes: true,
            delete_minutes: true,
            manage_users: true,
            manage_system: true,
            view_all_minutes: true,
            view_by_focus_area: true,
        }
    }

    /// No flag granted.
    pub fn none() -> Self {
        Self::default()
    }

    /// Read one flag by its [`Permission`] name.
    pub fn contains(&self, permission: Permission) -> bool {
        match permission {
            Permission::CreateMinutes => self.create_minutes,
            Permission::EditMinutes => self.edit_minutes,
            Permission::DeleteMinutes => self.delete_minutes,
            Permission::ManageUsers => self.manage_users,
            Permission::ManageSystem => self.manage_system,
            Permission::ViewAllMinutes => self.view_all_minutes,
            Permission::ViewByFocusArea => self.view_by_focus_area,
        }
    }
}

/// Link record granting a user a role and permission set within one unit.
///
/// ## Invariants
/// - Exactly one membership may exist per `(user_id, unit_id)` pair; the
///   registry enforces this on every mutation because the local fallback
///   store has no uniqueness constraints of its own.
/// - Permissions are per-membership: the same user's memberships in other
///   units carry independent permission sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
#[serde(try_from = "MembershipDto", into = "MembershipDto")]
pub struct Membership {
    user_id: UserId,
    unit_id: UnitId,
    role: Role,
    title: String,
    focus_area: Option<FocusArea>,
    permissions: PermissionSet,
    created_at: DateTime<Utc>,
}

impl Membership {
    /// Build a new [`Membership`].
    pub fn new(
        user_id: UserId,
        unit_id: UnitId,
        role: Role,
        title: impl Into<String>,
        permissions: PermissionSet,
        focus_area: Option<FocusArea>,
    ) -> Self {
        Self {
            user_id,
            unit_id,
            role,
            title: title.into(),
            focus_area,
            permissions,
            created_at: Utc::now(),
        }
    }

    /// Override the creation timestamp (used when rehydrating records).
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Member side of the composite identity.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Unit side of the composite identity.
    pub fn unit_id(&self) -> &UnitId {
        &self.unit_id
    }

    /// Role held within this unit.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Free-text position name, e.g. "Secretary".
    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    /// Optional focus area restricting visible minutes.
    pub fn focus_area(&self) -> Option<FocusArea> {
        self.focus_area
    }

    /// Permission flags granted by this membership.
    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// Moment the record was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Full replacement of the mutable authorization fields.
    ///
    /// Callers wanting a merge must read-modify-write.
    pub fn with_permissions(
        mut self,
        permissions: PermissionSet,
        focus_area: Option<FocusArea>,
    ) -> Self {
        self.permissions = permissions;
        self.focus_area = focus_area;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MembershipDto {
    user_id: String,
    unit_id: String,
    role: Role,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    focus_area: Option<FocusArea>,
    permissions: PermissionSet,
    created_at: DateTime<Utc>,
}

impl From<Membership> for MembershipDto {
    fn from(value: Membership) -> Self {
        let Membership {
            user_id,
            unit_id,
            role,
            title,
            focus_area,
            permissions,
            created_at,
        } = value;
        Self {
            user_id: user_id.to_string(),
            unit_id: unit_id.to_string(),
            role,
            title,
            focus_area,
            permissions,
            created_at,
        }
    }
}

/// Conversion failures when rehydrating a [`Membership`] from its DTO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipDtoError {
    /// The user reference failed validation.
    User(UserValidationError),
    /// The unit reference failed validation.
    Unit(UnitValidationError),
}

impl fmt::Display for MembershipDtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(err) => write!(f, "user id invalid: {err}"),
            Self::Unit(err) => write!(f, "unit id invalid: {err}"),
        }
    }
}

impl std::error::Error for MembershipDtoError {}

impl TryFrom<MembershipDto> for Membership {
    type Error = MembershipDtoError;

    fn try_from(value: MembershipDto) -> Result<Self, Self::Error> {
        let user_id = UserId::new(value.user_id).map_err(MembershipDtoError::User)?;
        let unit_id = UnitId::new(value.unit_id).map_err(MembershipDtoError::Unit)?;
        Ok(Membership::new(
            user_id,
            unit_id,
            value.role,
            value.title,
            value.permissions,
            value.focus_area,
        )
        .with_created_at(value.created_at))
    }
}
