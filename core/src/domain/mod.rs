//! Core domain: data model, ports, permission gate, and the services that
//! resolve sessions, manage memberships, and cascade deletions.

mod auth;
mod cascade;
mod error;
pub mod gate;
mod hymn;
mod membership;
mod membership_registry;
mod minutes;
pub mod ports;
mod principal;
mod session_resolver;
mod unit;
mod user;

pub use auth::{LoginCredentials, LoginValidationError, SessionToken};
pub use cascade::{CascadeDeletionEngine, CascadeImpact, CascadeOutcome};
pub use error::{DomainError, ErrorCode};
pub use hymn::{CustomHymn, HymnId};
pub use membership::{FocusArea, Membership, MembershipDtoError, Permission, PermissionSet, Role};
pub use membership_registry::{MembershipDraft, MembershipRegistry, SignupRequest};
pub use minutes::{Minutes, MinutesId, MinutesKind};
pub use principal::{SYSTEM_OWNER_USER_ID, SessionPrincipal};
pub use session_resolver::{Resolution, SESSION_MIRROR_KEY, SessionResolver, is_signed_in};
pub use unit::{Unit, UnitDtoError, UnitId, UnitKind, UnitValidationError};
pub use user::{
    DISPLAY_NAME_MAX, DISPLAY_NAME_MIN, DisplayName, Email, User, UserId, UserValidationError,
};
