//! HTTP client for the SteemWatch server API.
//!
//! Handles the CSRF header and session cookie, timeouts, exponential
//! backoff retry, and mapping of failed responses onto `SwError`.

use std::time::Duration;

use reqwest::header::COOKIE;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use sw_core::config::{AppConfig, ServerConfig};
use sw_core::constants::CSRF_HEADER;
use sw_core::error::{SwError, SwResult};

/// Retry configuration for HTTP requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// HTTP status codes that trigger a retry.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            retryable_statuses: vec![502, 503, 504],
        }
    }
}

/// HTTP client for communicating with the SteemWatch server.
#[derive(Clone)]
pub struct ApiClient {
    inner: Client,
    /// Server origin (scheme + host, no path).
    origin: String,
    csrf_token: String,
    session_cookie: String,
    timeout: Duration,
    retry_config: RetryConfig,
}

impl ApiClient {
    /// Create a new ApiClient from server configuration.
    pub fn new(config: &ServerConfig) -> SwResult<Self> {
        let sanitized = AppConfig::sanitize_canonical_url(&config.canonical_url);
        if sanitized.is_empty() {
            return Err(SwError::MissingConfig("server.canonical_url".into()));
        }

        let timeout = Duration::from_millis(config.api_timeout_ms);
        let inner = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| SwError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            origin: derive_origin(&sanitized),
            csrf_token: config.csrf_token.clone(),
            session_cookie: config.session_cookie.clone(),
            timeout,
            retry_config: RetryConfig::default(),
        })
    }

    /// Set custom retry configuration.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Get the server origin.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.origin)
    }

    /// Attach the CSRF token and the session cookie when configured.
    fn apply_headers(&self, mut builder: RequestBuilder) -> RequestBuilder {
        if !self.csrf_token.is_empty() {
            builder = builder.header(CSRF_HEADER, self.csrf_token.as_str());
        }
        if !self.session_cookie.is_empty() {
            builder = builder.header(COOKIE, self.session_cookie.as_str());
        }
        builder
    }

    fn build_request(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> RequestBuilder {
        let mut builder = self.inner.request(method, url).timeout(self.timeout);
        if let Some(b) = body {
            builder = builder.json(b);
        }
        self.apply_headers(builder)
    }

    /// Execute a request with exponential backoff retry.
    async fn request_with_retry(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> SwResult<Response> {
        let url = self.url(path);
        debug!("{} {}", method, path);

        let mut last_error: Option<SwError> = None;

        for attempt in 0..=self.retry_config.max_retries {
            if attempt > 0 {
                let delay = self.calculate_retry_delay(attempt - 1);
                warn!(
                    "retrying {} {} (attempt {}/{}) after {:.1}s",
                    method,
                    path,
                    attempt + 1,
                    self.retry_config.max_retries + 1,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }

            let builder = self.build_request(method.clone(), &url, body);

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if self
                        .retry_config
                        .retryable_statuses
                        .contains(&status.as_u16())
                        && attempt < self.retry_config.max_retries
                    {
                        warn!("retryable status {} from {}", status.as_u16(), path);
                        last_error = Some(SwError::ServerError {
                            status: status.as_u16(),
                            message: format!("retryable status {status}"),
                        });
                        continue;
                    }

                    return Self::check_status(response).await;
                }
                Err(e) => {
                    let is_retryable = e.is_timeout() || e.is_connect();
                    let err = Self::classify_error(e);

                    if is_retryable && attempt < self.retry_config.max_retries {
                        warn!("retryable error on {}: {}", path, err);
                        last_error = Some(err);
                        continue;
                    }

                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SwError::Http("max retries exceeded".into())))
    }

    /// Calculate retry delay with exponential backoff.
    fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_config
            .base_delay
            .saturating_mul(factor)
            .min(self.retry_config.max_delay)
    }

    // --- Public HTTP methods ---

    pub async fn put(&self, path: &str, body: &serde_json::Value) -> SwResult<Response> {
        self.request_with_retry(Method::PUT, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &serde_json::Value) -> SwResult<Response> {
        self.request_with_retry(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> SwResult<Response> {
        self.request_with_retry(Method::DELETE, path, None).await
    }

    /// GET a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> SwResult<T> {
        self.request_with_retry(Method::GET, path, None)
            .await?
            .json::<T>()
            .await
            .map_err(|e| SwError::Serialization(format!("invalid JSON from {path}: {e}")))
    }

    /// Check the HTTP status code and convert to SwError if needed.
    async fn check_status(response: Response) -> SwResult<Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SwError::AuthFailed(format!("server returned {status}")));
        }

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(SwError::ServerError {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(response)
    }

    /// Classify a reqwest error into a SwError variant.
    fn classify_error(e: reqwest::Error) -> SwError {
        if e.is_timeout() {
            SwError::Timeout(e.to_string())
        } else if e.is_connect() {
            SwError::Http(format!("connection failed: {e}"))
        } else {
            SwError::Http(e.to_string())
        }
    }
}

/// Derive the origin (scheme + host + optional port) from a server address.
fn derive_origin(address: &str) -> String {
    if let Ok(url) = reqwest::Url::parse(address) {
        let host = url.host_str().unwrap_or("localhost");
        match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        }
    } else {
        address.to_string()
    }
}
