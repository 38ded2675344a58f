//! Order service HTTP client.
//!
//! # Architecture
//!
//! - JSON over HTTP via `reqwest`; every endpoint lives under the configured
//!   base URL
//! - Bearer tokens come from an injected [`TokenProvider`], read once per
//!   request; catalog reads skip auth
//! - Non-2xx responses are normalized into [`ApiError::Status`] carrying the
//!   status code, a human-readable message, and the raw body
//! - Catalog responses are cached in-memory via `moka` (5 minute TTL)
//!
//! # Endpoints
//!
//! - [`CatalogApi`] - `GET /cakes`, `GET /cakes/{id}`
//! - [`CartApi`] - `POST /cart`, `GET /cart/{reference}`, `DELETE /cart/{id}`
//! - [`OrderApi`] - `POST /orders`, `GET /orders/{id}`, `POST /orders/{id}/cancel`
//! - [`AccountApi`] - `POST /auth/confirm`

mod account;
mod cache;
mod cart;
mod catalog;
mod orders;
pub mod wire;

pub use account::AccountApi;
pub use cart::CartApi;
pub use catalog::CatalogApi;
pub use orders::OrderApi;

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::token::TokenProvider;

use cache::{CacheKey, CacheValue};

const USER_AGENT: &str = concat!("bakehouse-storefront/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur when calling the order service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request never completed (connect, timeout, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Human-readable message extracted from the body.
        message: String,
        /// Stable application error code, when the service sent one.
        code: Option<String>,
        /// Parsed response body, kept for diagnostics.
        data: Option<serde_json::Value>,
    },

    /// Success response whose body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by the service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Well-formed response that did not match the call.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// HTTP status, if the service answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimited(_) => Some(429),
            _ => None,
        }
    }

    /// Parsed error body, if any.
    #[must_use]
    pub const fn data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Status { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    /// Application error code (e.g. `cart_price_mismatch`), if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether the service reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }

    /// Single human-readable message for the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            Self::RateLimited(secs) => {
                format!("Too many requests, please try again in {secs} seconds")
            }
            Self::Http(e) if e.is_timeout() => "The request timed out, please try again".to_string(),
            Self::Http(_) => "Could not reach the bakery, check your connection".to_string(),
            Self::Parse(_) | Self::UnexpectedResponse(_) | Self::Url(_) => {
                "Unexpected response from the bakery".to_string()
            }
        }
    }
}

/// Per-call request options.
#[derive(Debug, Default)]
pub(crate) struct RequestOptions {
    /// Do not attach the bearer token.
    pub skip_auth: bool,
    /// Extra headers (e.g. `Idempotency-Key`).
    pub headers: Vec<(&'static str, String)>,
    /// Query string parameters.
    pub query: Vec<(&'static str, String)>,
}

impl RequestOptions {
    pub(crate) fn public() -> Self {
        Self {
            skip_auth: true,
            ..Self::default()
        }
    }

    pub(crate) fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub(crate) fn query(mut self, name: &'static str, value: impl ToString) -> Self {
        self.query.push((name, value.to_string()));
        self
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Bakehouse order service.
///
/// Cheaply cloneable; clones share the connection pool, token provider and
/// catalog cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &ApiConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                tokens,
                cache,
            }),
        })
    }

    /// Base URL every path is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Drop all cached catalog responses.
    pub fn invalidate_catalog_cache(&self) {
        self.inner.cache.invalidate_all();
    }

    /// Resolve an endpoint path against the base URL, keeping any base path.
    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))?)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.execute(Method::GET, path, None::<&()>, options).await
    }

    pub(crate) async fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, path, Some(body), options).await
    }

    pub(crate) async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.execute(Method::DELETE, path, None::<&()>, options).await
    }

    /// Execute a JSON request and decode the response.
    async fn execute<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let started = Instant::now();

        let mut request = self
            .inner
            .client
            .request(method.clone(), url)
            .header("Accept", "application/json");

        if !options.query.is_empty() {
            request = request.query(&options.query);
        }

        // Read the token at call time so sign-in/out takes effect immediately
        if !options.skip_auth
            && let Some(token) = self.inner.tokens.access_token()
        {
            request = request.bearer_auth(token.expose_secret());
        }

        for (name, value) in &options.headers {
            request = request.header(*name, value);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        debug!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Order service responded"
        );

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                path = %path,
                body = %response_text.chars().take(500).collect::<String>(),
                "Order service returned non-success status"
            );
            return Err(normalize_error(status, &response_text));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                path = %path,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse order service response"
            );
            ApiError::Parse(e)
        })
    }
}

/// Turn a non-success response into [`ApiError::Status`].
///
/// Understands `{message}`, `FastAPI`'s `{detail: {code, message}}` envelope
/// and `{detail: "..."}`; anything else falls back to the status reason.
fn normalize_error(status: StatusCode, body: &str) -> ApiError {
    let data = serde_json::from_str::<serde_json::Value>(body).ok();

    let field = |value: &serde_json::Value, key: &str| {
        value
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(String::from)
    };

    let (message, code) = data.as_ref().map_or((None, None), |value| {
        let detail = value.get("detail");
        let message = field(value, "message")
            .or_else(|| detail.and_then(|d| field(d, "message")))
            .or_else(|| detail.and_then(serde_json::Value::as_str).map(String::from));
        let code = field(value, "code").or_else(|| detail.and_then(|d| field(d, "code")));
        (message, code)
    });

    let message = message.unwrap_or_else(|| {
        status
            .canonical_reason()
            .map_or_else(|| format!("Request failed with status {status}"), String::from)
    });

    ApiError::Status {
        status: status.as_u16(),
        message,
        code,
        data,
    }
}
