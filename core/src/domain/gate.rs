//! Permission gate: pure authorization predicates.
//!
//! Every predicate takes `Option<&SessionPrincipal>`, returns `false` for
//! `None`, and never consults storage. All required data is already on the
//! principal, so checks run on every render or request.
//!
//! The administrator-or-flag-or-owner composition is defined here once.
//! Callers must not re-derive it per call site.

use crate::domain::{FocusArea, Permission, Role, SessionPrincipal};

/// Whether a principal is present at all.
pub fn is_authenticated(principal: Option<&SessionPrincipal>) -> bool {
    principal.is_some()
}

/// Whether the principal is the reserved system owner.
pub fn is_system_owner(principal: Option<&SessionPrincipal>) -> bool {
    principal.is_some_and(SessionPrincipal::is_system_owner)
}

/// Whether the active membership carries the given flag.
///
/// This is the raw flag read with no role composition; prefer the `can_*`
/// predicates for authorization decisions.
pub fn has_permission(principal: Option<&SessionPrincipal>, permission: Permission) -> bool {
    principal.is_some_and(|p| p.permissions().contains(permission))
}

fn is_unit_leader(principal: &SessionPrincipal) -> bool {
    matches!(principal.role(), Role::Owner | Role::Administrator)
}

fn leader_or_flag(principal: Option<&SessionPrincipal>, permission: Permission) -> bool {
    principal.is_some_and(|p| {
        p.is_system_owner() || is_unit_leader(p) || p.permissions().contains(permission)
    })
}

/// May record new minutes in the active unit.
pub fn can_create_minutes(principal: Option<&SessionPrincipal>) -> bool {
    principal.is_some_and(|p| p.is_system_owner() || p.permissions().create_minutes)
}

/// May edit existing minutes in the active unit.
pub fn can_edit_minutes(principal: Option<&SessionPrincipal>) -> bool {
    principal.is_some_and(|p| p.is_system_owner() || p.permissions().edit_minutes)
}

/// May delete minutes in the active unit.
pub fn can_delete_minutes(principal: Option<&SessionPrincipal>) -> bool {
    principal.is_some_and(|p| p.is_system_owner() || p.permissions().delete_minutes)
}

/// May manage the active unit's roster: administrator-or-owner role, the
/// explicit `manage_users` flag, or the system owner.
pub fn can_manage_users(principal: Option<&SessionPrincipal>) -> bool {
    leader_or_flag(principal, Permission::ManageUsers)
}

/// May change unit-wide settings and run wide destructive operations.
pub fn can_manage_system(principal: Option<&SessionPrincipal>) -> bool {
    principal.is_some_and(|p| p.is_system_owner() || p.permissions().manage_system)
}

/// May read minutes regardless of focus area (same composition rule as
/// [`can_manage_users`]).
pub fn can_view_all_minutes(principal: Option<&SessionPrincipal>) -> bool {
    leader_or_flag(principal, Permission::ViewAllMinutes)
}

/// Whether the principal may read minutes carrying the given scope tag.
///
/// Reads the raw `view_all_minutes` flag, not the role-composed
/// [`can_view_all_minutes`]: a leader whose membership carries
/// `view_all_minutes=false` and a focus area is deliberately scoped down.
/// When the flag is clear, a membership without a focus area sees everything;
/// one with a focus area requires an exact match against the minutes' scope.
pub fn can_access_unit_scoped(
    principal: Option<&SessionPrincipal>,
    scope: Option<FocusArea>,
) -> bool {
    let Some(p) = principal else {
        return false;
    };
    if p.is_system_owner() || p.permissions().view_all_minutes {
        return true;
    }
    match p.focus_area() {
        None => true,
        Some(area) => scope == Some(area),
    }
}
