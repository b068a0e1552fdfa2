//! HTTP entitlement store.
//!
//! Records live at `{base_url}/v1/apps/{app_id}/users/{user_id}`:
//! `GET` returns the record or 404, `PUT` replaces it.

use async_trait::async_trait;
use conclave_license::{EntitlementRecord, EntitlementStore, LicenseError, LicenseResult, UserId};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// HTTP store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpStoreConfig {
    /// Base URL of the authority (e.g. `https://licenses.example.com`).
    pub base_url: String,
    /// Bearer token sent with every request, if the authority wants one.
    pub api_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4020".to_string(),
            api_token: None,
            timeout_secs: 15,
        }
    }
}

/// Entitlement store talking to a remote authority over HTTP.
pub struct HttpEntitlementStore {
    config: HttpStoreConfig,
    client: Client,
}

impl HttpEntitlementStore {
    /// Creates a new store client.
    pub fn new(config: HttpStoreConfig) -> LicenseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                LicenseError::RemoteUnavailable(format!("failed to create HTTP client: {e}"))
            })?;
        Ok(Self { config, client })
    }

    /// URL of the record for `(app_id, user)`.
    #[must_use]
    pub fn record_url(&self, app_id: &str, user: &UserId) -> String {
        format!(
            "{}/v1/apps/{}/users/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(app_id),
            urlencoding::encode(user.as_str())
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl EntitlementStore for HttpEntitlementStore {
    fn store_name(&self) -> &'static str {
        "HTTP"
    }

    async fn get(&self, app_id: &str, user: &UserId) -> LicenseResult<Option<EntitlementRecord>> {
        let url = self.record_url(app_id, user);
        debug!("Fetching entitlement record {}", url);

        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| LicenseError::RemoteUnavailable(format!("record lookup failed: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response.text().await.map_err(|e| {
                    LicenseError::RemoteUnavailable(format!("failed to read record: {e}"))
                })?;
                // A 2xx body that is not a record is malformed, not transient.
                let record = serde_json::from_str(&body).map_err(|e| {
                    LicenseError::MalformedRemoteStatus(format!("unreadable record: {e}"))
                })?;
                Ok(Some(record))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(LicenseError::RemoteUnavailable(format!(
                    "record lookup failed: {status} {body}"
                )))
            }
        }
    }

    async fn put(
        &self,
        app_id: &str,
        user: &UserId,
        record: &EntitlementRecord,
    ) -> LicenseResult<()> {
        let url = self.record_url(app_id, user);
        debug!("Writing entitlement record {}", url);

        let response = self
            .request(Method::PUT, &url)
            .json(record)
            .send()
            .await
            .map_err(|e| LicenseError::RemoteUnavailable(format!("record write failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LicenseError::RemoteUnavailable(format!(
                "record write failed: {status} {body}"
            )));
        }
        Ok(())
    }
}
