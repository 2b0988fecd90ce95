use crate::error::{Result, TupleError};
use crate::identity::TypeIdentity;
use crate::source::{DefinitionDocument, DefinitionSource};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Configuration for fetching definitions over HTTP
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL that `<local-name>.xml` is appended to, for non-http identities
    pub base_url: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds (for exponential backoff cap)
    pub max_retry_delay_ms: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
            user_agent: format!("xml-tuples/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Definition source backed by HTTP(S) downloads
pub struct HttpDefinitionSource {
    client: Client,
    config: HttpClientConfig,
}

impl HttpDefinitionSource {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(TupleError::from)?;

        Ok(Self { client, config })
    }

    /// URL for an identity: the identity itself when it is an http(s) URL,
    /// otherwise `<base_url>/<local-name>.xml`.
    pub fn url_for(&self, identity: &TypeIdentity) -> Option<String> {
        if identity.is_http() {
            return Some(identity.as_str().to_string());
        }
        self.config.base_url.as_ref().map(|base| {
            format!(
                "{}/{}.xml",
                base.trim_end_matches('/'),
                identity.local_name()
            )
        })
    }

    /// Download a document with retries; `Ok(None)` on 404.
    pub async fn fetch(&self, url: &str) -> Result<Option<String>> {
        match self.get_response_with_retry(url).await {
            Ok(response) => Ok(Some(response.text().await.map_err(TupleError::from)?)),
            Err(TupleError::HttpStatus { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_response_with_retry(&self, url: &str) -> Result<Response> {
        let mut attempt = 0;

        loop {
            let error = match self.make_request(url).await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    TupleError::HttpStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                        message: format!(
                            "HTTP {}: {}",
                            status.as_u16(),
                            status.canonical_reason().unwrap_or("Unknown")
                        ),
                    }
                }
                Err(error) => error,
            };

            if attempt < self.config.retry_attempts && self.is_retryable_error(&error) {
                warn!("Retrying {} after attempt {}: {}", url, attempt + 1, error);
                sleep(self.retry_delay(attempt)).await;
                attempt += 1;
                continue;
            }
            return Err(error);
        }
    }

    /// Make a single HTTP request with timeout
    async fn make_request(&self, url: &str) -> Result<Response> {
        let request_future = self.client.get(url).send();

        timeout(
            Duration::from_secs(self.config.timeout_seconds),
            request_future,
        )
        .await
        .map_err(|_| TupleError::Timeout {
            url: url.to_string(),
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(TupleError::from)
    }

    /// Exponential backoff, capped
    fn retry_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .config
            .retry_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.config.max_retry_delay_ms))
    }

    /// Server errors and transport failures are worth retrying; client errors are not.
    fn is_retryable_error(&self, error: &TupleError) -> bool {
        match error {
            TupleError::Http(reqwest_error) => {
                reqwest_error.is_timeout()
                    || reqwest_error.is_connect()
                    || reqwest_error.is_request()
            }
            TupleError::HttpStatus { status, .. } => *status >= 500,
            TupleError::Timeout { .. } => true,
            _ => false,
        }
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

#[async_trait]
impl DefinitionSource for HttpDefinitionSource {
    async fn load(&self, identity: &TypeIdentity) -> Result<DefinitionDocument> {
        let not_found = || TupleError::DefinitionNotFound {
            identity: identity.clone(),
        };

        let url = self.url_for(identity).ok_or_else(not_found)?;
        debug!("Fetching definition of {} from {}", identity, url);

        let text = self.fetch(&url).await?.ok_or_else(not_found)?;
        Ok(DefinitionDocument {
            identity: identity.clone(),
            text,
            origin: url,
        })
    }
}
