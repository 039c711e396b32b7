//! The resolved session principal.

use serde::{Deserialize, Serialize};

use crate::domain::{Email, FocusArea, Membership, PermissionSet, Role, Unit, User, UserId};

/// Fixed identifier backing the reserved system owner's synthetic principal.
///
/// The owner identity is configuration, never a directory row, so its id is a
/// constant rather than something minted per sign-in.
pub const SYSTEM_OWNER_USER_ID: &str = "00000000-0000-4000-8000-000000000001";

/// Fully populated identity + active-unit + permission context for the
/// current session.
///
/// Ephemeral: created at login/resume, mirrored to the local fallback store
/// for outage resilience, and destroyed on teardown. Never persisted to the
/// directory.
///
/// ## Invariants
/// - `unit` is `None` only for the reserved system owner, whose resolution
///   bypasses membership lookup entirely.
/// - `role`, `permissions`, and `focus_area` always describe the single
///   membership for `(user, unit)`; permissions the same user holds in other
///   units never leak in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct SessionPrincipal {
    user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<Unit>,
    role: Role,
    permissions: PermissionSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    focus_area: Option<FocusArea>,
    is_system_owner: bool,
}

impl SessionPrincipal {
    /// Deterministic merge of user, unit, and membership fields.
    pub fn from_membership(user: User, unit: Unit, membership: &Membership) -> Self {
        Self {
            user,
            unit: Some(unit),
            role: membership.role(),
            permissions: *membership.permissions(),
            focus_area: membership.focus_area(),
            is_system_owner: false,
        }
    }

    /// Synthetic principal for the reserved owner identity: every permission
    /// flag set, no unit context, no membership involved.
    ///
    /// # Panics
    ///
    /// Panics if the synthetic user fields fail validation. The id and
    /// display name are compile-time constants and the email arrives already
    /// validated, so this is unreachable in practice.
    pub fn system_owner(email: Email) -> Self {
        let user = User::try_from_strings(SYSTEM_OWNER_USER_ID, email.as_ref(), "System Owner")
            .unwrap_or_else(|err| panic!("owner principal fields must be valid: {err}"));
        Self {
            user,
            unit: None,
            role: Role::Owner,
            permissions: PermissionSet::full(),
            focus_area: None,
            is_system_owner: true,
        }
    }

    /// Authenticated user.
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Shorthand for the authenticated user's id.
    pub fn user_id(&self) -> &UserId {
        self.user.id()
    }

    /// Currently active unit, absent only for the system owner.
    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    /// Role held in the active unit.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Permission flags for the active membership.
    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// Focus area restriction of the active membership, if any.
    pub fn focus_area(&self) -> Option<FocusArea> {
        self.focus_area
    }

    /// Whether this is the reserved system owner identity.
    pub fn is_system_owner(&self) -> bool {
        self.is_system_owner
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::{UnitId, UnitKind};
    use rstest::rstest;

    fn sample_user() -> User {
        User::try_from_strings(UserId::random().as_ref(), "sec@ala.org", "Irma Silva")
            .expect("valid user")
    }

    #[rstest]
    fn merge_copies_exactly_the_given_membership() {
        let user = sample_user();
        let unit = Unit::new(
            UnitId::random(),
            "Ala Jardim",
            UnitKind::Ward,
            user.id().clone(),
        )
        .expect("valid unit");
        let membership = Membership::new(
            user.id().clone(),
            unit.id().clone(),
            Role::Administrator,
            "Secretary",
            PermissionSet {
                create_minutes: true,
                view_by_focus_area: true,
                ..PermissionSet::none()
            },
            Some(FocusArea::Primary),
        );

        let principal = SessionPrincipal::from_membership(user.clone(), unit, &membership);
        assert_eq!(principal.user_id(), user.id());
        assert_eq!(principal.role(), Role::Administrator);
        assert_eq!(principal.focus_area(), Some(FocusArea::Primary));
        assert!(principal.permissions().create_minutes);
        assert!(!principal.permissions().manage_system);
        assert!(!principal.is_system_owner());
    }

    #[rstest]
    fn owner_principal_has_full_permissions_and_no_unit() {
        let principal =
            SessionPrincipal::system_owner(Email::new("diretor@atas.app").expect("valid email"));
        assert!(principal.is_system_owner());
        assert!(principal.unit().is_none());
        assert_eq!(principal.role(), Role::Owner);
        assert_eq!(principal.permissions(), &PermissionSet::full());
    }

    #[rstest]
    fn principal_round_trips_through_serde_for_the_mirror() {
        let principal =
            SessionPrincipal::system_owner(Email::new("diretor@atas.app").expect("valid email"));
        let encoded = serde_json::to_string(&principal).expect("principal serializes");
        let decoded: SessionPrincipal =
            serde_json::from_str(&encoded).expect("principal deserializes");
        assert_eq!(decoded, principal);
    }
}
