//! In-memory credential store.
//!
//! Serves the fallback backend: accounts registered at signup are verified
//! locally, so authentication keeps working while the hosted store is down.
//! Also doubles as the deterministic store behind resolver tests; it can be
//! flipped offline to exercise outage paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::domain::ports::{CredentialStore, CredentialStoreError, SessionEvent};
use crate::domain::{LoginCredentials, SessionToken, UserId};

const EVENT_CAPACITY: usize = 16;

struct Account {
    user_id: UserId,
    password: Zeroizing<String>,
}

/// Credential store holding accounts and the session token in memory.
pub struct MemoryCredentialStore {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<SessionToken>>,
    events: broadcast::Sender<SessionEvent>,
    offline: AtomicBool,
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            events,
            offline: AtomicBool::new(false),
        }
    }
}

impl MemoryCredentialStore {
    /// Create an empty, online store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account; the email is normalized the same way login
    /// credentials are, so lookups stay case-insensitive.
    pub fn register(&self, user_id: UserId, email: &str, password: &str) {
        let key = email.trim().to_lowercase();
        self.lock_accounts().insert(
            key,
            Account {
                user_id,
                password: Zeroizing::new(password.to_owned()),
            },
        );
    }

    /// Make every call fail as unreachable until [`Self::go_online`].
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    /// Restore normal operation after [`Self::go_offline`].
    pub fn go_online(&self) {
        self.offline.store(false, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), CredentialStoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(CredentialStoreError::unavailable("store is offline"))
        } else {
            Ok(())
        }
    }

    fn lock_accounts(&self) -> std::sync::MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<SessionToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn sign_in(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<SessionToken, CredentialStoreError> {
        self.ensure_online()?;
        let token = {
            let accounts = self.lock_accounts();
            let account = accounts
                .get(credentials.email().as_ref())
                .filter(|account| account.password.as_str() == credentials.password())
                .ok_or_else(|| CredentialStoreError::rejected("unknown email or bad password"))?;
            SessionToken::new(account.user_id.clone(), Uuid::new_v4().to_string())
        };
        *self.lock_current() = Some(token.clone());
        self.emit(SessionEvent::SignedIn(token.clone()));
        Ok(token)
    }

    async fn sign_out(&self) -> Result<(), CredentialStoreError> {
        self.ensure_online()?;
        *self.lock_current() = None;
        self.emit(SessionEvent::SignedOut);
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<SessionToken>, CredentialStoreError> {
        self.ensure_online()?;
        Ok(self.lock_current().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
