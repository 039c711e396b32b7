//! Membership registry: CRUD over the user↔unit link records.
//!
//! Uniqueness and referential integrity are enforced here, in the core,
//! because the local fallback directory enforces neither.

use std::sync::Arc;

use tracing::debug;

use crate::domain::ports::{Directory, DirectoryError};
use crate::domain::{
    DomainError, Email, FocusArea, Membership, PermissionSet, Role, SessionPrincipal, Unit,
    UnitId, UnitKind, User, UserId, gate,
};

pub(crate) fn map_directory_error(error: DirectoryError) -> DomainError {
    match error {
        DirectoryError::Unavailable { message } => DomainError::directory_unavailable(format!(
            "directory unreachable, changes not saved remotely: {message}"
        )),
        DirectoryError::Query { message } => {
            DomainError::internal(format!("directory query failed: {message}"))
        }
        DirectoryError::Decode { message } => {
            DomainError::internal(format!("directory record corrupt: {message}"))
        }
    }
}

/// Role, title, and permission fields for a membership being created.
#[derive(Debug, Clone)]
pub struct MembershipDraft {
    /// Role the member will hold within the unit.
    pub role: Role,
    /// Free-text position name.
    pub title: String,
    /// Explicit permission set; never inherited from the role.
    pub permissions: PermissionSet,
    /// Optional focus area restriction.
    pub focus_area: Option<FocusArea>,
}

/// Everything needed to provision a brand-new user with their first unit.
#[derive(Debug, Clone)]
pub struct SignupRequest {
    /// The user to create.
    pub user: User,
    /// Name of the unit to create alongside the user.
    pub unit_name: String,
    /// Organizational type of the new unit.
    pub unit_kind: UnitKind,
}

/// Registry managing membership records against the selected directory.
pub struct MembershipRegistry<D: ?Sized> {
    directory: Arc<D>,
}

impl<D> MembershipRegistry<D>
where
    D: Directory + ?Sized,
{
    /// Create a registry over the given directory backend.
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    /// Self-service signup: creates the user, their unit, and an
    /// administrator membership with every permission granted.
    ///
    /// Ungated: this is the entry point that mints the first administrator.
    pub async fn signup(
        &self,
        request: SignupRequest,
    ) -> Result<(User, Unit, Membership), DomainError> {
        let SignupRequest {
            user,
            unit_name,
            unit_kind,
        } = request;

        if self
            .directory
            .find_user_by_email(user.email())
            .await
            .map_err(map_directory_error)?
            .is_some()
        {
            return Err(DomainError::invalid_request(format!(
                "email {} is already registered",
                user.email()
            )));
        }

        let unit = Unit::new(UnitId::random(), unit_name, unit_kind, user.id().clone())
            .map_err(|err| DomainError::invalid_request(err.to_string()))?;
        let membership = Membership::new(
            user.id().clone(),
            unit.id().clone(),
            Role::Administrator,
            "Administrator",
            PermissionSet::full(),
            None,
        );

        self.directory
            .insert_user(&user)
            .await
            .map_err(map_directory_error)?;
        self.directory
            .insert_unit(&unit)
            .await
            .map_err(map_directory_error)?;
        self.directory
            .insert_membership(&membership)
            .await
            .map_err(map_directory_error)?;

        debug!(user = %user.id(), unit = %unit.id(), "signup provisioned");
        Ok((user, unit, membership))
    }

    /// Create a membership for an existing user in an existing unit.
    ///
    /// Fails with `DuplicateMembership` when the `(user, unit)` pair already
    /// exists. Never creates the user implicitly: an absent user is the
    /// caller's error, not an invitation to insert one.
    pub async fn create(
        &self,
        acting: &SessionPrincipal,
        user_id: &UserId,
        unit_id: &UnitId,
        draft: MembershipDraft,
    ) -> Result<Membership, DomainError> {
        self.require_roster_access(acting)?;

        if self
            .directory
            .find_user(user_id)
            .await
            .map_err(map_directory_error)?
            .is_none()
        {
            return Err(DomainError::not_found(format!(
                "user {user_id} does not exist; create the user before the membership"
            )));
        }
        if self
            .directory
            .find_unit(unit_id)
            .await
            .map_err(map_directory_error)?
            .is_none()
        {
            return Err(DomainError::not_found(format!("unit {unit_id} does not exist")));
        }
        self.ensure_unique(user_id, unit_id).await?;

        let membership = Membership::new(
            user_id.clone(),
            unit_id.clone(),
            draft.role,
            draft.title,
            draft.permissions,
            draft.focus_area,
        );
        self.directory
            .insert_membership(&membership)
            .await
            .map_err(map_directory_error)?;
        Ok(membership)
    }

    /// Attach an existing user, looked up by email, to another unit.
    ///
    /// The new membership's permissions are independent of any membership the
    /// same user holds elsewhere.
    pub async fn add_to_unit(
        &self,
        acting: &SessionPrincipal,
        email: &Email,
        unit_id: &UnitId,
        draft: MembershipDraft,
    ) -> Result<Membership, DomainError> {
        let user = self
            .directory
            .find_user_by_email(email)
            .await
            .map_err(map_directory_error)?
            .ok_or_else(|| DomainError::not_found(format!("no user registered as {email}")))?;
        self.create(acting, user.id(), unit_id, draft).await
    }

    /// Replace the permissions and focus area of one membership.
    ///
    /// A full replace, not a merge: callers wanting to flip a single flag
    /// must read-modify-write.
    pub async fn update_permissions(
        &self,
        acting: &SessionPrincipal,
        user_id: &UserId,
        unit_id: &UnitId,
        permissions: PermissionSet,
        focus_area: Option<FocusArea>,
    ) -> Result<Membership, DomainError> {
        self.require_roster_access(acting)?;

        let membership = self
            .directory
            .find_membership(user_id, unit_id)
            .await
            .map_err(map_directory_error)?
            .ok_or_else(|| Self::missing(user_id, unit_id))?;

        let updated = membership.with_permissions(permissions, focus_area);
        self.directory
            .update_membership(&updated)
            .await
            .map_err(map_directory_error)?;
        Ok(updated)
    }

    /// Delete exactly one membership. Never cascades to the user or unit.
    pub async fn remove(
        &self,
        acting: &SessionPrincipal,
        user_id: &UserId,
        unit_id: &UnitId,
    ) -> Result<(), DomainError> {
        self.require_roster_access(acting)?;

        let removed = self
            .directory
            .delete_membership(user_id, unit_id)
            .await
            .map_err(map_directory_error)?;
        if removed == 0 {
            return Err(Self::missing(user_id, unit_id));
        }
        Ok(())
    }

    /// List the memberships within one unit, in insertion order.
    pub async fn list_by_unit(&self, unit_id: &UnitId) -> Result<Vec<Membership>, DomainError> {
        self.directory
            .list_memberships_by_unit(unit_id)
            .await
            .map_err(map_directory_error)
    }

    /// List the memberships one user holds, in insertion order.
    pub async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Membership>, DomainError> {
        self.directory
            .list_memberships_by_user(user_id)
            .await
            .map_err(map_directory_error)
    }

    fn require_roster_access(&self, acting: &SessionPrincipal) -> Result<(), DomainError> {
        if gate::can_manage_users(Some(acting)) {
            Ok(())
        } else {
            Err(DomainError::forbidden(
                "managing unit memberships requires the manage-users permission",
            ))
        }
    }

    async fn ensure_unique(&self, user_id: &UserId, unit_id: &UnitId) -> Result<(), DomainError> {
        if self
            .directory
            .find_membership(user_id, unit_id)
            .await
            .map_err(map_directory_error)?
            .is_some()
        {
            return Err(DomainError::duplicate_membership(format!(
                "membership for user {user_id} in unit {unit_id} already exists"
            )));
        }
        Ok(())
    }

    fn missing(user_id: &UserId, unit_id: &UnitId) -> DomainError {
        DomainError::membership_not_found(format!(
            "no membership for user {user_id} in unit {unit_id}"
        ))
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorCode;
    use crate::outbound::local::{LocalDirectory, MemoryStore};
    use rstest::{fixture, rstest};

    fn admin_principal(user: &User, unit: &Unit) -> SessionPrincipal {
        let membership = Membership::new(
            user.id().clone(),
            unit.id().clone(),
            Role::Administrator,
            "Administrator",
            PermissionSet::full(),
            None,
        );
        SessionPrincipal::from_membership(user.clone(), unit.clone(), &membership)
    }

    fn draft() -> MembershipDraft {
        MembershipDraft {
            role: Role::Member,
            title: "Pianist".to_owned(),
            permissions: PermissionSet::none(),
            focus_area: None,
        }
    }

    #[fixture]
    fn registry() -> MembershipRegistry<LocalDirectory<MemoryStore>> {
        MembershipRegistry::new(Arc::new(LocalDirectory::new(Arc::new(MemoryStore::new()))))
    }

    async fn provision(
        registry: &MembershipRegistry<LocalDirectory<MemoryStore>>,
        email: &str,
    ) -> (User, Unit, SessionPrincipal) {
        let user = User::try_from_strings(UserId::random().as_ref(), email, "Admin User")
            .expect("valid user");
        let (user, unit, _) = registry
            .signup(SignupRequest {
                user,
                unit_name: "Ala Jardim".to_owned(),
                unit_kind: UnitKind::Ward,
            })
            .await
            .expect("signup succeeds");
        let principal = admin_principal(&user, &unit);
        (user, unit, principal)
    }

    #[rstest]
    #[tokio::test]
    async fn signup_provisions_an_administrator_with_full_permissions(
        registry: MembershipRegistry<LocalDirectory<MemoryStore>>,
    ) {
        let (user, unit, _) = provision(&registry, "admin@ala.org").await;
        let memberships = registry.list_by_unit(unit.id()).await.expect("list works");
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].user_id(), user.id());
        assert_eq!(memberships[0].role(), Role::Administrator);
        assert_eq!(memberships[0].permissions(), &PermissionSet::full());
    }

    #[rstest]
    #[tokio::test]
    async fn duplicate_emails_cannot_sign_up_twice(
        registry: MembershipRegistry<LocalDirectory<MemoryStore>>,
    ) {
        let (_, _, _) = provision(&registry, "admin@ala.org").await;
        let duplicate =
            User::try_from_strings(UserId::random().as_ref(), "admin@ala.org", "Imposter")
                .expect("valid user");
        let err = registry
            .signup(SignupRequest {
                user: duplicate,
                unit_name: "Ala Centro".to_owned(),
                unit_kind: UnitKind::Ward,
            })
            .await
            .expect_err("duplicate email must fail");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    #[tokio::test]
    async fn second_membership_for_the_same_pair_is_rejected(
        registry: MembershipRegistry<LocalDirectory<MemoryStore>>,
    ) {
        let (_, unit, principal) = provision(&registry, "admin@ala.org").await;
        let member = User::try_from_strings(UserId::random().as_ref(), "m@ala.org", "Member One")
            .expect("valid user");
        registry
            .directory
            .insert_user(&member)
            .await
            .expect("user insert");

        registry
            .create(&principal, member.id(), unit.id(), draft())
            .await
            .expect("first membership succeeds");
        let err = registry
            .create(&principal, member.id(), unit.id(), draft())
            .await
            .expect_err("second membership must fail");
        assert_eq!(err.code(), ErrorCode::DuplicateMembership);

        // The table still contains exactly one row for the pair plus the
        // signup administrator.
        let memberships = registry.list_by_unit(unit.id()).await.expect("list works");
        assert_eq!(memberships.len(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn membership_is_never_created_for_an_absent_user(
        registry: MembershipRegistry<LocalDirectory<MemoryStore>>,
    ) {
        let (_, unit, principal) = provision(&registry, "admin@ala.org").await;
        let err = registry
            .create(&principal, &UserId::random(), unit.id(), draft())
            .await
            .expect_err("absent user must fail");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn update_permissions_is_a_full_replace(
        registry: MembershipRegistry<LocalDirectory<MemoryStore>>,
    ) {
        let (user, unit, principal) = provision(&registry, "admin@ala.org").await;
        let updated = registry
            .update_permissions(
                &principal,
                user.id(),
                unit.id(),
                PermissionSet {
                    view_by_focus_area: true,
                    ..PermissionSet::none()
                },
                Some(FocusArea::Primary),
            )
            .await
            .expect("update succeeds");
        assert!(!updated.permissions().manage_users);
        assert_eq!(updated.focus_area(), Some(FocusArea::Primary));

        let stored = registry
            .list_by_user(user.id())
            .await
            .expect("list works")
            .into_iter()
            .next()
            .expect("membership exists");
        assert_eq!(stored.permissions(), updated.permissions());
    }

    #[rstest]
    #[tokio::test]
    async fn updating_an_absent_membership_fails(
        registry: MembershipRegistry<LocalDirectory<MemoryStore>>,
    ) {
        let (_, unit, principal) = provision(&registry, "admin@ala.org").await;
        let err = registry
            .update_permissions(
                &principal,
                &UserId::random(),
                unit.id(),
                PermissionSet::none(),
                None,
            )
            .await
            .expect_err("absent membership must fail");
        assert_eq!(err.code(), ErrorCode::MembershipNotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn remove_deletes_exactly_one_membership_and_nothing_else(
        registry: MembershipRegistry<LocalDirectory<MemoryStore>>,
    ) {
        let (user, unit, principal) = provision(&registry, "admin@ala.org").await;
        registry
            .remove(&principal, user.id(), unit.id())
            .await
            .expect("remove succeeds");

        assert!(registry
            .list_by_unit(unit.id())
            .await
            .expect("list works")
            .is_empty());
        // The user and unit rows survive a membership removal.
        assert!(registry
            .directory
            .find_user(user.id())
            .await
            .expect("lookup works")
            .is_some());
        assert!(registry
            .directory
            .find_unit(unit.id())
            .await
            .expect("lookup works")
            .is_some());

        let err = registry
            .remove(&principal, user.id(), unit.id())
            .await
            .expect_err("second removal reports the absence");
        assert_eq!(err.code(), ErrorCode::MembershipNotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn mutations_require_the_manage_users_gate(
        registry: MembershipRegistry<LocalDirectory<MemoryStore>>,
    ) {
        let (user, unit, _) = provision(&registry, "admin@ala.org").await;
        let powerless = Membership::new(
            user.id().clone(),
            unit.id().clone(),
            Role::Member,
            "Member",
            PermissionSet::none(),
            None,
        );
        let principal = SessionPrincipal::from_membership(user.clone(), unit.clone(), &powerless);

        let err = registry
            .remove(&principal, user.id(), unit.id())
            .await
            .expect_err("members without manage_users are rejected");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }
}
