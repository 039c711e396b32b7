//! Reqwest-backed hosted directory adapter.
//!
//! This adapter owns transport details only: URL and filter construction,
//! timeout and HTTP error mapping, and JSON decoding into domain records.
//! The hosted service speaks a PostgREST-style row API: one resource per
//! table, `column=eq.value` filters, and `Prefer: return=representation`
//! to learn how many rows a mutation touched.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::domain::ports::{Directory, DirectoryError};
use crate::domain::{CustomHymn, Email, Membership, Minutes, Unit, UnitId, User, UserId};

const USERS_TABLE: &str = "users";
const UNITS_TABLE: &str = "units";
const MEMBERSHIPS_TABLE: &str = "memberships";
const MINUTES_TABLE: &str = "minutes";
const HYMNS_TABLE: &str = "custom_hymns";

type Filters<'a> = &'a [(&'a str, String)];

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// Hosted directory adapter performing HTTP requests against one endpoint.
pub struct RestDirectory {
    client: Client,
    base: Url,
    api_key: Option<String>,
}

impl RestDirectory {
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
        Ok(Self {
            client,
            base,
            api_key,
        })
    }

    fn table_url(&self, table: &str, filters: Filters<'_>) -> Result<Url, DirectoryError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| DirectoryError::query("directory URL cannot carry table paths"))?
            .pop_if_empty()
            .push(table);
        // Entering query_pairs_mut finalizes an empty query and leaves a
        // trailing `?`, so skip it entirely for filterless URLs.
        if !filters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (column, filter) in filters {
                pairs.append_pair(column, filter);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(header::ACCEPT, "application/json");
        match self.api_key.as_deref() {
            Some(key) => request
                .header("apikey", key)
                .bearer_auth(key),
            None => request,
        }
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: Filters<'_>,
    ) -> Result<Vec<T>, DirectoryError> {
        let url = self.table_url(table, filters)?;
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        serde_json::from_slice(body.as_ref())
            .map_err(|err| DirectoryError::decode(format!("table {table}: {err}")))
    }

    async fn fetch_first<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: Filters<'_>,
    ) -> Result<Option<T>, DirectoryError> {
        let rows = self.fetch_rows(table, filters).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_row<T: Serialize + Sync>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<(), DirectoryError> {
        let url = self.table_url(table, &[])?;
        let response = self
            .authorized(self.client.post(url))
            .json(row)
            .send()
            .await
            .map_err(map_transport_error)?;
        check_mutation_status(table, response).await
    }

    async fn patch_rows<T: Serialize + Sync>(
        &self,
        table: &str,
        filters: Filters<'_>,
        row: &T,
    ) -> Result<(), DirectoryError> {
        let touched = self
            .mutation_with_count(self.client.patch(self.table_url(table, filters)?).json(row))
            .await
            .map_err(|err| annotate(table, err))?;
        if touched == 0 {
            return Err(DirectoryError::query(format!(
                "table {table}: no row matched the update"
            )));
        }
        Ok(())
    }

    async fn delete_rows(
        &self,
        table: &str,
        filters: Filters<'_>,
    ) -> Result<u64, DirectoryError> {
        self.mutation_with_count(self.client.delete(self.table_url(table, filters)?))
            .await
            .map_err(|err| annotate(table, err))
    }

    async fn count_rows(&self, table: &str, filters: Filters<'_>) -> Result<u64, DirectoryError> {
        let mut narrowed: Vec<(&str, String)> = filters.to_vec();
        narrowed.push(("select", "id".to_owned()));
        let rows: Vec<serde_json::Value> = self.fetch_rows(table, &narrowed).await?;
        Ok(rows.len() as u64)
    }

    /// Run a mutation asking the service to return the affected rows, and
    /// report how many there were.
    async fn mutation_with_count(&self, request: RequestBuilder) -> Result<u64, DirectoryError> {
        let response = self
            .authorized(request)
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        let rows: Vec<serde_json::Value> = serde_json::from_slice(body.as_ref())
            .map_err(|err| DirectoryError::decode(err.to_string()))?;
        Ok(rows.len() as u64)
    }
}

async fn check_mutation_status(
    table: &str,
    response: reqwest::Response,
) -> Result<(), DirectoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.bytes().await.map_err(map_transport_error)?;
    Err(annotate(table, map_status_error(status, body.as_ref())))
}

fn annotate(table: &str, error: DirectoryError) -> DirectoryError {
    match error {
        DirectoryError::Query { message } => {
            DirectoryError::query(format!("table {table}: {message}"))
        }
        DirectoryError::Decode { message } => {
            DirectoryError::decode(format!("table {table}: {message}"))
        }
        unavailable @ DirectoryError::Unavailable { .. } => unavailable,
    }
}

fn map_transport_error(error: reqwest::Error) -> DirectoryError {
    if error.is_timeout() || error.is_connect() {
        DirectoryError::unavailable(error.to_string())
    } else {
        DirectoryError::query(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> DirectoryError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT
        | StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS => DirectoryError::unavailable(message),
        _ => DirectoryError::query(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[async_trait]
impl Directory for RestDirectory {
    async fn probe(&self) -> Result<(), DirectoryError> {
        self.count_rows(USERS_TABLE, &[("limit", "1".to_owned())])
            .await
            .map(|_| ())
    }

    async fn insert_user(&self, user: &User) -> Result<(), DirectoryError> {
        self.insert_row(USERS_TABLE, user).await
    }

    async fn find_user(&self, id: &UserId) -> Result<Option<User>, DirectoryError> {
        self.fetch_first(USERS_TABLE, &[("id", eq(id))]).await
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, DirectoryError> {
        self.fetch_first(USERS_TABLE, &[("email", eq(email))]).await
    }

    async fn update_user(&self, user: &User) -> Result<(), DirectoryError> {
        self.patch_rows(USERS_TABLE, &[("id", eq(user.id()))], user)
            .await
    }

    async fn delete_user(&self, id: &UserId) -> Result<u64, DirectoryError> {
        self.delete_rows(USERS_TABLE, &[("id", eq(id))]).await
    }

    async fn insert_unit(&self, unit: &Unit) -> Result<(), DirectoryError> {
        self.insert_row(UNITS_TABLE, unit).await
    }

    async fn find_unit(&self, id: &UnitId) -> Result<Option<Unit>, DirectoryError> {
        self.fetch_first(UNITS_TABLE, &[("id", eq(id))]).await
    }

    async fn update_unit(&self, unit: &Unit) -> Result<(), DirectoryError> {
        self.patch_rows(UNITS_TABLE, &[("id", eq(unit.id()))], unit)
            .await
    }

    async fn delete_unit(&self, id: &UnitId) -> Result<u64, DirectoryError> {
        self.delete_rows(UNITS_TABLE, &[("id", eq(id))]).await
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<(), DirectoryError> {
        self.insert_row(MEMBERSHIPS_TABLE, membership).await
    }

    async fn find_membership(
        &self,
        user_id: &UserId,
        unit_id: &UnitId,
    ) -> Result<Option<Membership>, DirectoryError> {
        self.fetch_first(
            MEMBERSHIPS_TABLE,
            &[("userId", eq(user_id)), ("unitId", eq(unit_id))],
        )
        .await
    }

    async fn list_memberships_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Membership>, DirectoryError> {
        self.fetch_rows(MEMBERSHIPS_TABLE, &[("userId", eq(user_id))])
            .await
    }

    async fn list_memberships_by_unit(
        &self,
        unit_id: &UnitId,
    ) -> Result<Vec<Membership>, DirectoryError> {
        self.fetch_rows(MEMBERSHIPS_TABLE, &[("unitId", eq(unit_id))])
            .await
    }

    async fn update_membership(&self, membership: &Membership) -> Result<(), DirectoryError> {
        self.patch_rows(
            MEMBERSHIPS_TABLE,
            &[
                ("userId", eq(membership.user_id())),
                ("unitId", eq(membership.unit_id())),
            ],
            membership,
        )
        .await
    }

    async fn delete_membership(
        &self,
        user_id: &UserId,
        unit_id: &UnitId,
    ) -> Result<u64, DirectoryError> {
        self.delete_rows(
            MEMBERSHIPS_TABLE,
            &[("userId", eq(user_id)), ("unitId", eq(unit_id))],
        )
        .await
    }

    async fn delete_memberships_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError> {
        self.delete_rows(MEMBERSHIPS_TABLE, &[("unitId", eq(unit_id))])
            .await
    }

    async fn delete_memberships_by_user(&self, user_id: &UserId) -> Result<u64, DirectoryError> {
        self.delete_rows(MEMBERSHIPS_TABLE, &[("userId", eq(user_id))])
            .await
    }

    async fn insert_minutes(&self, minutes: &Minutes) -> Result<(), DirectoryError> {
        self.insert_row(MINUTES_TABLE, minutes).await
    }

    async fn list_minutes_by_unit(&self, unit_id: &UnitId) -> Result<Vec<Minutes>, DirectoryError> {
        self.fetch_rows(MINUTES_TABLE, &[("unitId", eq(unit_id))])
            .await
    }

    async fn count_minutes_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError> {
        self.count_rows(MINUTES_TABLE, &[("unitId", eq(unit_id))])
            .await
    }

    async fn delete_minutes_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError> {
        self.delete_rows(MINUTES_TABLE, &[("unitId", eq(unit_id))])
            .await
    }

    async fn insert_custom_hymn(&self, hymn: &CustomHymn) -> Result<(), DirectoryError> {
        self.insert_row(HYMNS_TABLE, hymn).await
    }

    async fn count_custom_hymns_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError> {
        self.count_rows(HYMNS_TABLE, &[("unitId", eq(unit_id))])
            .await
    }

    async fn delete_custom_hymns_by_unit(&self, unit_id: &UnitId) -> Result<u64, DirectoryError> {
        self.delete_rows(HYMNS_TABLE, &[("unitId", eq(unit_id))])
            .await
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for non-network mapping helpers.

    use super::*;
    use rstest::rstest;

    fn adapter() -> RestDirectory {
        let base = Url::parse("https://directory.example.org/rest/v1").expect("valid URL");
        RestDirectory::new(base, Some("key".to_owned()), Duration::from_secs(5))
            .expect("adapter builds")
    }

    #[rstest]
    fn filters_become_query_pairs() {
        let adapter = adapter();
        let url = adapter
            .table_url(
                MEMBERSHIPS_TABLE,
                &[("userId", eq("u-1")), ("unitId", eq("n-1"))],
            )
            .expect("URL builds");
        assert_eq!(
            url.as_str(),
            "https://directory.example.org/rest/v1/memberships?userId=eq.u-1&unitId=eq.n-1"
        );
    }

    #[rstest]
    fn trailing_slashes_do_not_double_up() {
        let base = Url::parse("https://directory.example.org/rest/v1/").expect("valid URL");
        let adapter = RestDirectory::new(base, None, Duration::from_secs(5))
            .expect("adapter builds");
        let url = adapter.table_url(USERS_TABLE, &[]).expect("URL builds");
        assert_eq!(url.as_str(), "https://directory.example.org/rest/v1/users");
    }

    #[rstest]
    fn filterless_urls_carry_no_query_marker() {
        let adapter = adapter();
        let url = adapter.table_url(UNITS_TABLE, &[]).expect("URL builds");
        assert_eq!(url.query(), None);
        assert!(!url.as_str().ends_with('?'));
    }

    #[rstest]
    #[case::bad_gateway(StatusCode::BAD_GATEWAY, true)]
    #[case::service_unavailable(StatusCode::SERVICE_UNAVAILABLE, true)]
    #[case::gateway_timeout(StatusCode::GATEWAY_TIMEOUT, true)]
    #[case::rate_limited(StatusCode::TOO_MANY_REQUESTS, true)]
    #[case::bad_request(StatusCode::BAD_REQUEST, false)]
    #[case::conflict(StatusCode::CONFLICT, false)]
    fn statuses_map_to_the_expected_error_kind(
        #[case] status: StatusCode,
        #[case] unavailable: bool,
    ) {
        let error = map_status_error(status, b"{\"message\":\"backend says no\"}");
        assert_eq!(
            matches!(error, DirectoryError::Unavailable { .. }),
            unavailable,
            "unexpected mapping for {status}: {error}"
        );
    }

    #[rstest]
    fn long_bodies_are_previewed_not_dumped() {
        let body = "x".repeat(4_096);
        let error = map_status_error(StatusCode::BAD_REQUEST, body.as_bytes());
        let rendered = error.to_string();
        assert!(rendered.len() < 250, "preview should be bounded: {rendered}");
        assert!(rendered.ends_with("..."));
    }
}
