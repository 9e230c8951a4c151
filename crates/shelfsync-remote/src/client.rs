//! Row API client
//!
//! Typed HTTP client for a PostgREST-style row API. Each registered table
//! maps to one endpoint; incremental pages are requested as
//!
//! ```text
//! GET {base}/{endpoint}?{cursor}=gt.{since}&order={cursor}.asc&limit=N&offset=M
//! ```
//!
//! Responses are JSON arrays of row objects. HTTP failures are mapped to
//! the structured [`RemoteError`] kinds the engine keys its retry policy on.

use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;

use shelfsync_core::config::RemoteConfig;
use shelfsync_core::domain::TableDescriptor;
use shelfsync_core::ports::{RemoteError, RemoteRow, RemoteSource};

/// Longest error body excerpt carried into a [`RemoteError`] message.
const MAX_ERROR_BODY: usize = 200;

/// HTTP implementation of the [`RemoteSource`] port.
///
/// The bearer token is swappable at runtime so a host auth layer can rotate
/// credentials without rebuilding the client.
pub struct HttpRemoteSource {
    client: Client,
    base_url: String,
    access_token: RwLock<Option<String>>,
}

impl HttpRemoteSource {
    /// Creates a client from the remote section of the configuration.
    pub fn new(config: &RemoteConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: RwLock::new(config.access_token.clone()),
        })
    }

    /// Creates a client against a custom base URL (useful for testing).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            access_token: RwLock::new(None),
        }
    }

    /// Replaces the bearer token, e.g. after a session refresh.
    pub fn set_access_token(&self, token: impl Into<String>) {
        let token = token.into();
        match self.access_token.write() {
            Ok(mut guard) => *guard = Some(token),
            Err(poisoned) => *poisoned.into_inner() = Some(token),
        }
        debug!("Remote access token updated");
    }

    fn token(&self) -> Option<String> {
        match self.access_token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Builds an incremental-page request for `table`.
    fn page_request(
        &self,
        table: &TableDescriptor,
        since: DateTime<Utc>,
        limit: u32,
        offset: u32,
    ) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, table.remote_endpoint);
        let mut request = self.client.get(&url).query(&[
            (table.cursor_key.as_str(), format!("gt.{}", since.to_rfc3339())),
            ("order", format!("{}.asc", table.cursor_key)),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        if let Some(token) = self.token() {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Sends a page request and decodes the JSON row array.
    async fn fetch_rows(
        &self,
        table: &TableDescriptor,
        since: DateTime<Utc>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<RemoteRow>, RemoteError> {
        let response = self
            .page_request(table, since, limit, offset)
            .send()
            .await
            .map_err(|err| RemoteError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_for_status(status, response).await);
        }

        let values: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|err| RemoteError::Decode(err.to_string()))?;

        values
            .into_iter()
            .map(|value| decode_row(table, value))
            .collect()
    }
}

#[async_trait::async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn fetch_page(
        &self,
        table: &TableDescriptor,
        since: DateTime<Utc>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<RemoteRow>, RemoteError> {
        debug!(
            table = %table.name,
            since = %since.to_rfc3339(),
            limit,
            offset,
            "Fetching remote page"
        );
        let rows = self.fetch_rows(table, since, limit, offset).await?;
        debug!(table = %table.name, rows = rows.len(), "Remote page received");
        Ok(rows)
    }

    async fn has_changes(
        &self,
        table: &TableDescriptor,
        since: DateTime<Utc>,
    ) -> Result<bool, RemoteError> {
        // A limit-1 page answers "anything newer?" without paying for data
        let rows = self.fetch_rows(table, since, 1, 0).await?;
        Ok(!rows.is_empty())
    }
}

/// Maps an HTTP error status to the engine's error taxonomy.
async fn error_for_status(status: StatusCode, response: Response) -> RemoteError {
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        body.truncate(MAX_ERROR_BODY);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Auth(body),
        StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited(body),
        _ => RemoteError::Server {
            status: status.as_u16(),
            message: body,
        },
    }
}

/// Decodes one JSON row object into a [`RemoteRow`].
///
/// The primary key may arrive as a JSON string or number; the cursor field
/// must parse as a timestamp.
fn decode_row(table: &TableDescriptor, value: serde_json::Value) -> Result<RemoteRow, RemoteError> {
    let pk = table.primary_key();
    let id = match value.get(pk) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        other => {
            return Err(RemoteError::Decode(format!(
                "row in '{}' has no usable '{}' field: {:?}",
                table.name, pk, other
            )))
        }
    };

    let raw_ts = value
        .get(&table.cursor_key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            RemoteError::Decode(format!(
                "row '{}' in '{}' is missing '{}'",
                id, table.name, table.cursor_key
            ))
        })?;
    let updated_at = parse_timestamp(raw_ts).ok_or_else(|| {
        RemoteError::Decode(format!(
            "row '{}' in '{}' has unparseable timestamp '{}'",
            id, table.name, raw_ts
        ))
    })?;

    Ok(RemoteRow {
        id,
        updated_at,
        fields: value,
    })
}

/// Parses the timestamp formats the row API is known to emit.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Timezone-less variants are treated as UTC
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}
