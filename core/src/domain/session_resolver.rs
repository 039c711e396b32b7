//! Session resolver: turns available identity sources into exactly one
//! session principal (or none) and keeps it live across identity-source
//! change events.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::OwnerCredentials;
use crate::domain::membership_registry::map_directory_error;
use crate::domain::ports::{
    CredentialStore, CredentialStoreError, Directory, LocalStore, SessionEvent,
};
use crate::domain::{
    DomainError, LoginCredentials, Membership, SessionPrincipal, SessionToken, Unit, UnitId,
    User, gate,
};

/// Local-store key under which the session principal mirror is kept.
pub const SESSION_MIRROR_KEY: &str = "atas.session";

/// Outcome of a resolution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A concrete principal was produced; no user interaction required.
    Ready(SessionPrincipal),
    /// The user belongs to several units; the caller must pick one and call
    /// [`SessionResolver::finalize`].
    PendingSelection {
        /// The resolved user awaiting a unit choice.
        user: User,
        /// Selectable units, one per membership, inactive units excluded.
        candidates: Vec<Unit>,
    },
}

/// Resolves and owns the current session principal.
///
/// The resolver holds the only mutable session state in the core. Everything
/// downstream receives the principal explicitly; nothing reads a global.
pub struct SessionResolver<C, D: ?Sized, S> {
    credentials: Arc<C>,
    directory: Arc<D>,
    mirror: Arc<S>,
    owner: OwnerCredentials,
    current: Mutex<Option<SessionPrincipal>>,
}

impl<C, D, S> SessionResolver<C, D, S>
where
    C: CredentialStore,
    D: Directory + ?Sized,
    S: LocalStore,
{
    /// Create a resolver over the given identity sources.
    pub fn new(
        credentials: Arc<C>,
        directory: Arc<D>,
        mirror: Arc<S>,
        owner: OwnerCredentials,
    ) -> Self {
        Self {
            credentials,
            directory,
            mirror,
            owner,
            current: Mutex::new(None),
        }
    }

    /// Snapshot of the currently held principal, if any.
    pub fn current(&self) -> Option<SessionPrincipal> {
        self.lock_current().clone()
    }

    /// Authenticate credentials and resolve the resulting identity.
    ///
    /// The reserved owner pair is checked **before** the credential store so
    /// that a colliding membership record can never shadow it. A credential
    /// store outage during sign-in is surfaced as `CredentialUnavailable`
    /// (new logins cannot be verified locally); rejected credentials map to
    /// `Unauthorized`.
    pub async fn sign_in(&self, credentials: &LoginCredentials) -> Result<Resolution, DomainError> {
        if self.owner.matches(credentials) {
            let principal = SessionPrincipal::system_owner(self.owner.email().clone());
            self.install(principal.clone());
            return Ok(Resolution::Ready(principal));
        }

        let token = self
            .credentials
            .sign_in(credentials)
            .await
            .map_err(map_credential_error)?;
        self.resolve_token(&token).await
    }

    /// Resolve the current identity without fresh credentials.
    ///
    /// Tries the credential store's held session first; when the store is
    /// unreachable or holds nothing, falls back to the principal mirror in
    /// the local store. Yields `CredentialUnavailable` when neither source
    /// produces an identity.
    pub async fn resolve(&self) -> Result<Resolution, DomainError> {
        match self.credentials.current_session().await {
            Ok(Some(token)) => self.resolve_token(&token).await,
            Ok(None) => self.resolve_from_mirror("credential store holds no session"),
            Err(err) => {
                debug!(%err, "credential store unreachable, trying the local mirror");
                self.resolve_from_mirror("credential store unreachable")
            }
        }
    }

    /// Deterministic merge of user + unit + membership into a principal.
    ///
    /// Also writes the mirror copy so a later credential store outage
    /// degrades gracefully instead of logging the user out.
    pub async fn finalize(
        &self,
        user: &User,
        unit_id: &UnitId,
    ) -> Result<SessionPrincipal, DomainError> {
        let membership = self
            .directory
            .find_membership(user.id(), unit_id)
            .await
            .map_err(map_directory_error)?
            .ok_or_else(|| {
                DomainError::membership_not_found(format!(
                    "no membership for user {} in unit {unit_id}",
                    user.id()
                ))
            })?;
        let unit = self
            .directory
            .find_unit(unit_id)
            .await
            .map_err(map_directory_error)?
            .ok_or_else(|| DomainError::not_found(format!("unit {unit_id} does not exist")))?;

        let principal = SessionPrincipal::from_membership(user.clone(), unit, &membership);
        self.install(principal.clone());
        Ok(principal)
    }

    /// End the session: sign out of the credential store, drop the held
    /// principal, and clear the mirror. One place tears everything down;
    /// no scattered storage-key clearing.
    pub async fn teardown(&self) {
        if let Err(err) = self.credentials.sign_out().await {
            debug!(%err, "credential store sign-out failed during teardown");
        }
        self.clear();
    }

    /// React to one session lifecycle event from the credential store.
    ///
    /// Sign-out clears the principal and its mirror; sign-in re-runs
    /// resolution for the new token.
    pub async fn apply_event(
        &self,
        event: SessionEvent,
    ) -> Result<Option<Resolution>, DomainError> {
        match event {
            SessionEvent::SignedOut => {
                self.clear();
                Ok(None)
            }
            SessionEvent::SignedIn(token) => self.resolve_token(&token).await.map(Some),
        }
    }

    /// Consume session events until the credential store drops its sender.
    ///
    /// Resolution failures are logged and skipped; a lagged receiver resumes
    /// with the next event.
    pub async fn watch(&self, mut events: broadcast::Receiver<SessionEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(err) = self.apply_event(event).await {
                        warn!(%err, "session event could not be applied");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "session events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Low-frequency resilience task: periodically re-write the mirror from
    /// the held principal. Not correctness-critical; failures are swallowed.
    /// Runs until the caller drops or aborts it.
    pub async fn run_mirror(&self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.mirror_tick();
        }
    }

    /// One pass of the resilience mirror. Public for schedulers that manage
    /// their own cadence.
    pub fn mirror_tick(&self) {
        let snapshot = self.current();
        match snapshot {
            Some(principal) => self.write_mirror(&principal),
            None => {}
        }
    }

    async fn resolve_token(&self, token: &SessionToken) -> Result<Resolution, DomainError> {
        let user = self
            .directory
            .find_user(token.user_id())
            .await
            .map_err(map_directory_error)?
            .ok_or_else(|| {
                DomainError::no_membership(format!(
                    "authenticated user {} has no directory record",
                    token.user_id()
                ))
            })?;

        let memberships = self
            .directory
            .list_memberships_by_user(user.id())
            .await
            .map_err(map_directory_error)?;

        match memberships.as_slice() {
            [] => Err(DomainError::no_membership(format!(
                "user {} belongs to no unit",
                user.id()
            ))),
            [only] => {
                let principal = self.finalize(&user, only.unit_id()).await?;
                Ok(Resolution::Ready(principal))
            }
            many => {
                let candidates = self.selection_candidates(many).await?;
                Ok(Resolution::PendingSelection { user, candidates })
            }
        }
    }

    /// Units selectable for a multi-membership user. Inactive units are
    /// excluded; when every unit is inactive the full list is offered so
    /// historical minutes stay reachable.
    async fn selection_candidates(
        &self,
        memberships: &[Membership],
    ) -> Result<Vec<Unit>, DomainError> {
        let mut units = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let unit = self
                .directory
                .find_unit(membership.unit_id())
                .await
                .map_err(map_directory_error)?
                .ok_or_else(|| {
                    DomainError::internal(format!(
                        "membership references missing unit {}",
                        membership.unit_id()
                    ))
                })?;
            units.push(unit);
        }

        let active: Vec<Unit> = units.iter().filter(|u| u.is_active()).cloned().collect();
        if active.is_empty() { Ok(units) } else { Ok(active) }
    }

    fn resolve_from_mirror(&self, reason: &str) -> Result<Resolution, DomainError> {
        let raw = self.mirror.get_item(SESSION_MIRROR_KEY).map_err(|err| {
            DomainError::credential_unavailable(format!("{reason}; mirror unreadable: {err}"))
        })?;
        let Some(raw) = raw else {
            return Err(DomainError::credential_unavailable(format!(
                "{reason} and no local mirror exists"
            )));
        };

        match serde_json::from_str::<SessionPrincipal>(&raw) {
            Ok(principal) => {
                *self.lock_current() = Some(principal.clone());
                Ok(Resolution::Ready(principal))
            }
            Err(err) => {
                // A corrupt mirror is worse than none; drop it.
                if let Err(remove_err) = self.mirror.remove_item(SESSION_MIRROR_KEY) {
                    debug!(%remove_err, "corrupt session mirror could not be removed");
                }
                Err(DomainError::credential_unavailable(format!(
                    "{reason} and the local mirror is corrupt: {err}"
                )))
            }
        }
    }

    fn install(&self, principal: SessionPrincipal) {
        self.write_mirror(&principal);
        *self.lock_current() = Some(principal);
    }

    fn clear(&self) {
        *self.lock_current() = None;
        if let Err(err) = self.mirror.remove_item(SESSION_MIRROR_KEY) {
            debug!(%err, "session mirror could not be cleared");
        }
    }

    fn write_mirror(&self, principal: &SessionPrincipal) {
        let encoded = match serde_json::to_string(principal) {
            Ok(encoded) => encoded,
            Err(err) => {
                debug!(%err, "session principal could not be encoded for the mirror");
                return;
            }
        };
        if let Err(err) = self.mirror.set_item(SESSION_MIRROR_KEY, &encoded) {
            debug!(%err, "session mirror write failed");
        }
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<SessionPrincipal>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whether the held principal may act at all; convenience over the gate.
pub fn is_signed_in(principal: Option<&SessionPrincipal>) -> bool {
    gate::is_authenticated(principal)
}

fn map_credential_error(error: CredentialStoreError) -> DomainError {
    match error {
        CredentialStoreError::Unavailable { message } => DomainError::credential_unavailable(
            format!("credential store unreachable: {message}"),
        ),
        CredentialStoreError::Rejected { message } => DomainError::unauthorized(message),
    }
}
