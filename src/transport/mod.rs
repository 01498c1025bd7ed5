// src/transport/mod.rs
// Authenticated client for the org's REST and Tooling APIs. Stateless,
// safe to share across concurrent fetchers, and deliberately free of
// retry logic: retries and fallbacks belong to the query cascade.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Jitter, Quota, RateLimiter as GovRateLimiter};
use reqwest::{header, Client as ReqwestClient, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::CONFIG;
use crate::error::TransportError;

/// Session material supplied by the external auth component.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub instance_url: String,
    pub access_token: String,
    pub api_version: String,
}

struct RateLimiter {
    limiter: Arc<GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    jitter: Jitter,
}

impl RateLimiter {
    fn new(requests_per_minute: u32) -> Self {
        let per_minute =
            NonZeroU32::new(requests_per_minute.max(1)).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(GovRateLimiter::direct(Quota::per_minute(per_minute))),
            jitter: Jitter::new(Duration::from_millis(10), Duration::from_millis(100)),
        }
    }

    async fn acquire(&self) {
        self.limiter.until_ready_with_jitter(self.jitter).await;
    }
}

/// One page of a SOQL query result, in the upstream wire shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage<T> {
    pub total_size: u32,
    pub done: bool,
    #[serde(default)]
    pub next_records_url: Option<String>,
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
}

pub struct OrgClient {
    http: ReqwestClient,
    base_url: String,
    access_token: String,
    api_version: String,
    rate_limiter: RateLimiter,
}

impl OrgClient {
    pub fn new(credentials: &Credentials) -> Result<Self, TransportError> {
        let parsed = Url::parse(&credentials.instance_url)
            .map_err(|e| TransportError::InvalidCredentials(format!("instance URL: {e}")))?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(TransportError::InvalidCredentials(format!(
                "instance URL scheme '{}' is not http(s)",
                parsed.scheme()
            )));
        }
        if credentials.access_token.trim().is_empty() {
            return Err(TransportError::InvalidCredentials(
                "access token is empty".into(),
            ));
        }

        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(CONFIG.http_timeout))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            base_url: credentials.instance_url.trim_end_matches('/').to_string(),
            access_token: credentials.access_token.clone(),
            api_version: credentials.api_version.clone(),
            rate_limiter: RateLimiter::new(CONFIG.rate_limit_per_minute),
        })
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    fn data_path(&self, suffix: &str) -> String {
        format!("/services/data/v{}/{}", self.api_version, suffix)
    }

    async fn get_checked(&self, path: &str) -> Result<reqwest::Response, TransportError> {
        self.rate_limiter.acquire().await;

        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.access_token),
            )
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::AuthExpired {
                status: 401,
                message,
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// GET a path relative to the instance URL, parsed as JSON.
    pub async fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        let response = self.get_checked(path).await?;
        Ok(response.json::<Value>().await?)
    }

    /// One page of a SOQL query against the REST or Tooling surface.
    pub async fn query<T: DeserializeOwned>(
        &self,
        soql: &str,
        tooling: bool,
    ) -> Result<QueryPage<T>, TransportError> {
        let surface = if tooling { "tooling/query" } else { "query" };
        let path = self.data_path(&format!("{}?q={}", surface, urlencoding::encode(soql)));
        let response = self.get_checked(&path).await?;
        Ok(response.json::<QueryPage<T>>().await?)
    }

    /// All pages of a SOQL query, following `nextRecordsUrl` cursors up to
    /// the configured page cap. Hitting the cap logs and returns what was
    /// accumulated; it is never an error.
    pub async fn query_all<T: DeserializeOwned>(
        &self,
        soql: &str,
        tooling: bool,
    ) -> Result<Vec<T>, TransportError> {
        let mut page = self.query::<T>(soql, tooling).await?;
        let mut records = std::mem::take(&mut page.records);
        let mut pages_fetched: u32 = 1;

        while let Some(cursor) = page.next_records_url.take() {
            if pages_fetched >= CONFIG.max_query_pages {
                warn!(
                    "query page cap ({}) hit after {} records; truncating",
                    CONFIG.max_query_pages,
                    records.len()
                );
                break;
            }
            let response = self.get_checked(&cursor).await?;
            page = response.json::<QueryPage<T>>().await?;
            records.extend(std::mem::take(&mut page.records));
            pages_fetched += 1;
        }

        Ok(records)
    }

    /// `totalSize` of a `SELECT COUNT()` query.
    pub async fn count(&self, soql: &str, tooling: bool) -> Result<u32, TransportError> {
        let page = self.query::<Value>(soql, tooling).await?;
        Ok(page.total_size)
    }

    /// Current org limit usage (`/limits`).
    pub async fn limits(&self) -> Result<Value, TransportError> {
        self.get_json(&self.data_path("limits")).await
    }

    /// Global metadata listing (`/sobjects`).
    pub async fn describe_global(&self) -> Result<Value, TransportError> {
        self.get_json(&self.data_path("sobjects")).await
    }

    /// Full describe for one object.
    pub async fn describe_object(&self, api_name: &str) -> Result<Value, TransportError> {
        self.get_json(&self.data_path(&format!("sobjects/{}/describe", api_name)))
            .await
    }

    /// Approximate per-object record counts (`/limits/recordCount`).
    pub async fn record_counts(&self) -> Result<Value, TransportError> {
        self.get_json(&self.data_path("limits/recordCount")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(url: &str, token: &str) -> Credentials {
        Credentials {
            instance_url: url.to_string(),
            access_token: token.to_string(),
            api_version: "59.0".to_string(),
        }
    }

    fn expect_err(result: Result<OrgClient, TransportError>) -> TransportError {
        match result {
            Ok(_) => panic!("expected client construction to fail"),
            Err(e) => e,
        }
    }

    #[test]
    fn rejects_malformed_instance_url() {
        let err = expect_err(OrgClient::new(&credentials("not a url", "token")));
        assert!(matches!(err, TransportError::InvalidCredentials(_)));
    }

    #[test]
    fn rejects_empty_token() {
        let err = expect_err(OrgClient::new(&credentials(
            "https://example.my.salesforce.com",
            "  ",
        )));
        assert!(matches!(err, TransportError::InvalidCredentials(_)));
    }

    #[test]
    fn data_path_embeds_api_version() {
        let client =
            OrgClient::new(&credentials("https://example.my.salesforce.com/", "token")).unwrap();
        assert_eq!(client.data_path("limits"), "/services/data/v59.0/limits");
        // Trailing slash on the instance URL must not double up.
        assert_eq!(client.base_url, "https://example.my.salesforce.com");
    }
}
