//! Reqwest-backed hosted credential store adapter.
//!
//! Speaks a GoTrue-style token API: password grants mint a bearer token
//! tied to one user id, and logout revokes it. The held token lives in
//! memory only; durable session state is the resolver's mirror.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use url::Url;

use crate::domain::ports::{CredentialStore, CredentialStoreError, SessionEvent};
use crate::domain::{LoginCredentials, SessionToken, UserId};

const EVENT_CAPACITY: usize = 16;

#[derive(Serialize)]
struct PasswordGrantDto<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponseDto {
    access_token: String,
    user: TokenUserDto,
}

#[derive(Deserialize)]
struct TokenUserDto {
    id: String,
}

/// Hosted credential store adapter.
pub struct RestCredentialStore {
    client: Client,
    base: Url,
    api_key: Option<String>,
    current: Mutex<Option<SessionToken>>,
    events: broadcast::Sender<SessionEvent>,
}

impl RestCredentialStore {
    /// Build an adapter using a reqwest client with an explicit request
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base: Url,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            client,
            base,
            api_key,
            current: Mutex::new(None),
            events,
        })
    }

    fn endpoint(&self, segment: &str) -> Result<Url, CredentialStoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                CredentialStoreError::unavailable("credential store URL cannot carry paths")
            })?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<SessionToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

fn map_transport_error(error: reqwest::Error) -> CredentialStoreError {
    CredentialStoreError::unavailable(error.to_string())
}

fn map_status_error(status: StatusCode) -> CredentialStoreError {
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        CredentialStoreError::rejected(format!("status {}", status.as_u16()))
    } else {
        CredentialStoreError::unavailable(format!("status {}", status.as_u16()))
    }
}

fn parse_token(body: &[u8]) -> Result<SessionToken, CredentialStoreError> {
    let decoded: TokenResponseDto = serde_json::from_slice(body).map_err(|err| {
        CredentialStoreError::unavailable(format!("malformed token response: {err}"))
    })?;
    let user_id = UserId::new(&decoded.user.id).map_err(|err| {
        CredentialStoreError::unavailable(format!("token response user id invalid: {err}"))
    })?;
    Ok(SessionToken::new(user_id, decoded.access_token))
}

#[async_trait]
impl CredentialStore for RestCredentialStore {
    async fn sign_in(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<SessionToken, CredentialStoreError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "password");
        let mut request = self
            .client
            .post(url)
            .header(header::ACCEPT, "application/json")
            .json(&PasswordGrantDto {
                email: credentials.email().as_ref(),
                password: credentials.password(),
            });
        if let Some(key) = self.api_key.as_deref() {
            request = request.header("apikey", key);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status));
        }

        let token = parse_token(body.as_ref())?;
        *self.lock_current() = Some(token.clone());
        self.emit(SessionEvent::SignedIn(token.clone()));
        Ok(token)
    }

    async fn sign_out(&self) -> Result<(), CredentialStoreError> {
        let held = self.lock_current().take();
        self.emit(SessionEvent::SignedOut);
        let Some(token) = held else {
            return Ok(());
        };

        let url = self.endpoint("logout")?;
        let mut request = self.client.post(url).bearer_auth(token.access_token());
        if let Some(key) = self.api_key.as_deref() {
            request = request.header("apikey", key);
        }
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(map_status_error(status));
        }
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<SessionToken>, CredentialStoreError> {
        Ok(self.lock_current().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
