//! Transport Module
//!
//! The network seam of the sync layer: JSON in, JSON out, failures as `FetchError`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{FetchError, Result, SyncError};

// == Transport Trait ==
/// Performs JSON requests against the dashboard API.
///
/// Paths are absolute (`/api/...`) and may carry a query string. Any network
/// failure or non-2xx status is a `FetchError`; an empty success body reads
/// as `Value::Null`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, path: &str) -> std::result::Result<Value, FetchError>;

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> std::result::Result<Value, FetchError>;
}

/// Decodes a JSON payload into `T`, mapping failures to `FetchError::Parse`.
pub fn decode<T: DeserializeOwned>(value: Value) -> std::result::Result<T, FetchError> {
    serde_json::from_value(value).map_err(FetchError::from)
}

// == HTTP Transport ==
/// `Transport` over reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport rooted at `base_url`.
    ///
    /// # Errors
    /// `InvalidRequest` for a malformed or non-http(s) base URL, `Transport`
    /// if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| SyncError::InvalidRequest(format!("Invalid base URL `{base_url}`: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SyncError::InvalidRequest(format!(
                "Base URL `{base_url}` must use http or https"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> std::result::Result<Url, FetchError> {
        let joined = format!("{}{}", self.base_url, path);
        Url::parse(&joined).map_err(|e| FetchError::Network(format!("Invalid URL `{joined}`: {e}")))
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> std::result::Result<Value, FetchError> {
        let url = self.url(path)?;
        debug!(method = %method, url = %url, "Sending request");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16(), &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(FetchError::from)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, path: &str) -> std::result::Result<Value, FetchError> {
        self.execute(Method::GET, path, None).await
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> std::result::Result<Value, FetchError> {
        self.execute(method, path, body).await
    }
}
