//! Cascade deletion engine.
//!
//! Removes a unit or a user together with everything that would otherwise be
//! orphaned, as one logical operation from the caller's perspective. The
//! directory offers no multi-table transactions, so steps run children before
//! parent, each awaited before the next: a crash mid-sequence leaves only
//! orphaned children, never a surviving child pointing at a deleted parent.
//! Re-invoking with the same id resumes and completes (absent rows count as
//! deleted).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::membership_registry::map_directory_error;
use crate::domain::ports::{Directory, DirectoryError};
use crate::domain::{DomainError, SessionPrincipal, UnitId, UserId, gate};

/// Row counts affected by a cascade, shown to a human before committing and
/// reported back after execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeImpact {
    /// Memberships referencing the target.
    pub memberships: u64,
    /// Minutes owned by the target unit.
    pub minutes: u64,
    /// Custom hymn entries scoped to the target unit.
    pub custom_hymns: u64,
}

/// Result of a completed cascade: the rows actually removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// Rows removed by this run. A re-run after success is all zeros.
    pub removed: CascadeImpact,
}

/// Engine executing ordered, resumable cascade deletions.
pub struct CascadeDeletionEngine<D: ?Sized> {
    directory: Arc<D>,
}

impl<D> CascadeDeletionEngine<D>
where
    D: Directory + ?Sized,
{
    /// Create an engine over the given directory backend.
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    /// Pre-flight impact summary for deleting a unit.
    ///
    /// Computed from the same unit-scoped filters the deletion uses, so what
    /// a confirmation dialog shows is what the deletion removes.
    pub async fn unit_impact(&self, unit_id: &UnitId) -> Result<CascadeImpact, DomainError> {
        let memberships = self
            .directory
            .list_memberships_by_unit(unit_id)
            .await
            .map_err(map_directory_error)?
            .len() as u64;
        let minutes = self
            .directory
            .count_minutes_by_unit(unit_id)
            .await
            .map_err(map_directory_error)?;
        let custom_hymns = self
            .directory
            .count_custom_hymns_by_unit(unit_id)
            .await
            .map_err(map_directory_error)?;
        Ok(CascadeImpact {
            memberships,
            minutes,
            custom_hymns,
        })
    }

    /// Pre-flight impact summary for deleting a user.
    pub async fn user_impact(&self, user_id: &UserId) -> Result<CascadeImpact, DomainError> {
        let memberships = self
            .directory
            .list_memberships_by_user(user_id)
            .await
            .map_err(map_directory_error)?
            .len() as u64;
        Ok(CascadeImpact {
            memberships,
            ..CascadeImpact::default()
        })
    }

    /// Delete a unit and everything scoped to it.
    ///
    /// Requires the system owner. Step order: minutes, custom hymns,
    /// memberships, then the unit row itself. Idempotent: a re-run after a
    /// successful pass returns success with all-zero counts, and a re-run
    /// after a partial failure completes the remaining steps.
    pub async fn delete_unit(
        &self,
        acting: &SessionPrincipal,
        unit_id: &UnitId,
    ) -> Result<CascadeOutcome, DomainError> {
        if !gate::is_system_owner(Some(acting)) {
            return Err(DomainError::forbidden(
                "deleting a unit requires the system owner",
            ));
        }

        let mut steps_done: u8 = 0;
        let minutes = self
            .directory
            .delete_minutes_by_unit(unit_id)
            .await
            .map_err(|err| Self::step_failure("minutes", steps_done, err))?;
        steps_done += 1;
        let custom_hymns = self
            .directory
            .delete_custom_hymns_by_unit(unit_id)
            .await
            .map_err(|err| Self::step_failure("custom hymns", steps_done, err))?;
        steps_done += 1;
        let memberships = self
            .directory
            .delete_memberships_by_unit(unit_id)
            .await
            .map_err(|err| Self::step_failure("memberships", steps_done, err))?;
        steps_done += 1;
        self.directory
            .delete_unit(unit_id)
            .await
            .map_err(|err| Self::step_failure("unit row", steps_done, err))?;

        info!(
            unit = %unit_id,
            minutes,
            custom_hymns,
            memberships,
            "unit cascade completed"
        );
        Ok(CascadeOutcome {
            removed: CascadeImpact {
                memberships,
                minutes,
                custom_hymns,
            },
        })
    }

    /// Delete a user and every membership referencing them.
    ///
    /// Requires the system owner or the `manage_system` flag. Minutes the
    /// user authored are untouched: authorship is a historical record, and
    /// the dangling `created_by` is rendered defensively by consumers.
    pub async fn delete_user(
        &self,
        acting: &SessionPrincipal,
        user_id: &UserId,
    ) -> Result<CascadeOutcome, DomainError> {
        if !gate::can_manage_system(Some(acting)) {
            return Err(DomainError::forbidden(
                "deleting a user requires the manage-system permission",
            ));
        }

        let memberships = self
            .directory
            .delete_memberships_by_user(user_id)
            .await
            .map_err(|err| Self::step_failure("memberships", 0, err))?;
        self.directory
            .delete_user(user_id)
            .await
            .map_err(|err| Self::step_failure("user row", 1, err))?;

        info!(user = %user_id, memberships, "user cascade completed");
        Ok(CascadeOutcome {
            removed: CascadeImpact {
                memberships,
                ..CascadeImpact::default()
            },
        })
    }

    /// A failed first step is plain unavailability; a failure after earlier
    /// steps succeeded is a partial cascade that must be retried with the
    /// same id.
    fn step_failure(step: &str, steps_done: u8, error: DirectoryError) -> DomainError {
        warn!(step, steps_done, %error, "cascade step failed");
        if steps_done == 0 {
            map_directory_error(error)
        } else {
            DomainError::cascade_partial_failure(format!(
                "cascade stopped at the {step} step after {steps_done} completed steps: {error}"
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ports::MockDirectory;
    use crate::domain::{
        Email, ErrorCode, Membership, PermissionSet, Role, SessionPrincipal, Unit, UnitKind,
        User,
    };
    use mockall::predicate::always;
    use mockall::Sequence;
    use rstest::rstest;

    fn owner() -> SessionPrincipal {
        SessionPrincipal::system_owner(Email::new("diretor@atas.app").expect("valid email"))
    }

    fn member_principal(permissions: PermissionSet) -> SessionPrincipal {
        let user = User::try_from_strings(UserId::random().as_ref(), "m@ala.org", "Member One")
            .expect("valid user");
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
            "Administrator",
            permissions,
            None,
        );
        SessionPrincipal::from_membership(user, unit, &membership)
    }

    #[rstest]
    #[tokio::test]
    async fn unit_deletion_awaits_children_before_the_parent_row() {
        let mut directory = MockDirectory::new();
        let mut seq = Sequence::new();
        directory
            .expect_delete_minutes_by_unit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(3));
        directory
            .expect_delete_custom_hymns_by_unit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(1));
        directory
            .expect_delete_memberships_by_unit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(2));
        directory
            .expect_delete_unit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(1));

        let engine = CascadeDeletionEngine::new(Arc::new(directory));
        let outcome = engine
            .delete_unit(&owner(), &UnitId::random())
            .await
            .expect("cascade succeeds");
        assert_eq!(
            outcome.removed,
            CascadeImpact {
                memberships: 2,
                minutes: 3,
                custom_hymns: 1
            }
        );
    }

    #[rstest]
    #[tokio::test]
    async fn a_mid_sequence_failure_is_reported_as_partial() {
        let mut directory = MockDirectory::new();
        directory
            .expect_delete_minutes_by_unit()
            .returning(|_| Ok(3));
        directory
            .expect_delete_custom_hymns_by_unit()
            .with(always())
            .returning(|_| Err(DirectoryError::query("network blip")));
        // Later steps must not run after a failure.
        directory.expect_delete_memberships_by_unit().times(0);
        directory.expect_delete_unit().times(0);

        let engine = CascadeDeletionEngine::new(Arc::new(directory));
        let err = engine
            .delete_unit(&owner(), &UnitId::random())
            .await
            .expect_err("partial failure surfaces");
        assert_eq!(err.code(), ErrorCode::CascadePartialFailure);
    }

    #[rstest]
    #[tokio::test]
    async fn a_first_step_failure_is_plain_unavailability() {
        let mut directory = MockDirectory::new();
        directory
            .expect_delete_minutes_by_unit()
            .returning(|_| Err(DirectoryError::unavailable("offline")));

        let engine = CascadeDeletionEngine::new(Arc::new(directory));
        let err = engine
            .delete_unit(&owner(), &UnitId::random())
            .await
            .expect_err("failure surfaces");
        assert_eq!(err.code(), ErrorCode::DirectoryUnavailable);
    }

    #[rstest]
    #[tokio::test]
    async fn unit_deletion_is_owner_only() {
        let engine = CascadeDeletionEngine::new(Arc::new(MockDirectory::new()));
        let full_admin = member_principal(PermissionSet::full());
        let err = engine
            .delete_unit(&full_admin, &UnitId::random())
            .await
            .expect_err("non-owner is rejected");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn user_deletion_accepts_manage_system_and_never_touches_minutes() {
        let mut directory = MockDirectory::new();
        directory
            .expect_delete_memberships_by_user()
            .times(1)
            .returning(|_| Ok(2));
        directory.expect_delete_user().times(1).returning(|_| Ok(1));
        directory.expect_delete_minutes_by_unit().times(0);

        let engine = CascadeDeletionEngine::new(Arc::new(directory));
        let principal = member_principal(PermissionSet {
            manage_system: true,
            ..PermissionSet::none()
        });
        let outcome = engine
            .delete_user(&principal, &UserId::random())
            .await
            .expect("cascade succeeds");
        assert_eq!(outcome.removed.memberships, 2);
        assert_eq!(outcome.removed.minutes, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn user_deletion_rejects_plain_members() {
        let engine = CascadeDeletionEngine::new(Arc::new(MockDirectory::new()));
        let principal = member_principal(PermissionSet {
            manage_users: true,
            ..PermissionSet::none()
        });
        let err = engine
            .delete_user(&principal, &UserId::random())
            .await
            .expect_err("manage_users alone is not enough");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn impact_counts_come_from_the_deletion_filters() {
        let mut directory = MockDirectory::new();
        directory
            .expect_list_memberships_by_unit()
            .returning(|_| Ok(Vec::new()));
        directory
            .expect_count_minutes_by_unit()
            .returning(|_| Ok(4));
        directory
            .expect_count_custom_hymns_by_unit()
            .returning(|_| Ok(1));

        let engine = CascadeDeletionEngine::new(Arc::new(directory));
        let impact = engine
            .unit_impact(&UnitId::random())
            .await
            .expect("impact computes");
        assert_eq!(
            impact,
            CascadeImpact {
                memberships: 0,
                minutes: 4,
                custom_hymns: 1
            }
        );
    }
}
