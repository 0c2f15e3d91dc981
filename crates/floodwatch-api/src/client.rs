// Snapshot HTTP client
//
// Wraps `reqwest::Client` with bearer auth, URL construction, and the
// list-envelope unwrapping used by the backend's read endpoints. Every
// call is a single idempotent GET, so callers may retry freely.

use std::time::Duration;

use secrecy::SecretString;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::models::{ApiAlert, ApiDevice, ListEnvelope};
use crate::transport::TransportConfig;

/// Request/response client for the backend's snapshot endpoints.
///
/// Rows that fail to deserialize are skipped with a warning rather than
/// failing the whole list: one malformed device must not hide the fleet.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    /// Request timeout the client was built with, for error reporting.
    timeout: Duration,
}

impl ApiClient {
    /// Create a client that authenticates every request with `credential`.
    ///
    /// `base_url` is the API root, e.g. `https://backend.example/api`.
    pub fn new(
        base_url: Url,
        credential: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client(credential)?;
        Ok(Self {
            http,
            base_url,
            timeout: transport.timeout,
        })
    }

    /// Create a client around a pre-built `reqwest::Client` whose request
    /// timeout is `timeout`.
    pub fn with_client(http: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            http,
            base_url,
            timeout,
        }
    }

    /// The API root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET {base}/devices`: every registered device.
    pub async fn list_devices(&self) -> Result<Vec<ApiDevice>, Error> {
        let url = self.endpoint("devices")?;
        self.get_list(url).await
    }

    /// `GET {base}/alerts`, optionally filtered server-side to active ones.
    pub async fn list_alerts(&self, active_only: bool) -> Result<Vec<ApiAlert>, Error> {
        let mut url = self.endpoint("alerts")?;
        if active_only {
            url.query_pairs_mut().append_pair("is_active", "true");
        }
        self.get_list(url).await
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/{path}`, tolerating a trailing slash on the base.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request, unwrap the list envelope, and decode each row.
    async fn get_list<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(|e| self.map_send_error(e))?;
        let status = resp.status();

        if matches!(
            status,
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN
        ) {
            return Err(Error::Authentication {
                message: "credential rejected or expired".into(),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let envelope: ListEnvelope = serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })?;

        let rows = envelope.into_rows();
        let total = rows.len();
        let items: Vec<T> = rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| match serde_json::from_value(row) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed row");
                    None
                }
            })
            .collect();

        debug!(total, decoded = items.len(), "list decoded");
        Ok(items)
    }

    fn map_send_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::with_client(
            reqwest::Client::new(),
            Url::parse(base).unwrap(),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let c = client("https://backend.example/api/");
        assert_eq!(
            c.endpoint("devices").unwrap().as_str(),
            "https://backend.example/api/devices"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let c = client("https://backend.example/v2/api");
        assert_eq!(
            c.endpoint("alerts").unwrap().as_str(),
            "https://backend.example/v2/api/alerts"
        );
    }
}
