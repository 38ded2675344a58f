//! Storefront client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BAKEHOUSE_API_BASE_URL` - Base URL of the order service (e.g., `https://api.example.com/v1`)
//!
//! ## Optional
//! - `BAKEHOUSE_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `BAKEHOUSE_DATA_DIR` - Where the cart and session are persisted (default: `.bakehouse`)
//! - `BAKEHOUSE_CURRENCY` - Display currency for local estimates (default: INR)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//!
//! ## Sign-in (enabled when `BAKEHOUSE_OIDC_AUTHORITY` is set)
//! - `BAKEHOUSE_OIDC_AUTHORITY` - `OpenID` Connect issuer URL
//! - `BAKEHOUSE_OIDC_CLIENT_ID` - OAuth client ID
//! - `BAKEHOUSE_OIDC_CLIENT_SECRET` - OAuth client secret (confidential clients only)
//! - `BAKEHOUSE_OIDC_REDIRECT_URI` - Callback URL (default: `http://127.0.0.1:8765/callback`)
//! - `BAKEHOUSE_OIDC_POST_LOGOUT_URI` - Where the provider sends the user after logout
//! - `BAKEHOUSE_OIDC_SCOPES` - Space-separated scopes (default: `openid email phone profile`)
//!
//! ## Payments (enabled when `RAZORPAY_KEY_ID` is set)
//! - `RAZORPAY_KEY_ID` - Publishable gateway key passed to the checkout widget
//! - `BAKEHOUSE_PAYMENTS_TEST_MODE` - Create sandbox orders (default: false)
//! - `BAKEHOUSE_MERCHANT_NAME` - Name shown in the checkout widget (default: Bakehouse)

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Order service connection settings
    pub api: ApiConfig,
    /// Directory holding `cart.json` and `session.json`
    pub data_dir: PathBuf,
    /// Currency used for local, display-only estimates
    pub display_currency: String,
    /// Identity provider settings, if sign-in is enabled
    pub oidc: Option<OidcConfig>,
    /// Payment gateway settings, if checkout is enabled
    pub payments: Option<PaymentConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Order service connection settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
}

/// `OpenID` Connect client settings.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct OidcConfig {
    /// Issuer URL; discovery lives at `{authority}/.well-known/openid-configuration`
    pub authority: Url,
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret, only for confidential clients
    pub client_secret: Option<SecretString>,
    /// Where the provider redirects after sign-in
    pub redirect_uri: Url,
    /// Where the provider redirects after sign-out
    pub post_logout_redirect_uri: Option<Url>,
    /// Requested scopes
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("authority", &self.authority.as_str())
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field(
                "post_logout_redirect_uri",
                &self.post_logout_redirect_uri.as_ref().map(Url::as_str),
            )
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Payment gateway settings.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Publishable key handed to the checkout widget (safe to expose)
    pub key_id: String,
    /// Whether orders are created in the gateway's sandbox
    pub test_mode: bool,
    /// Merchant name shown in the widget
    pub merchant_name: String,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api = ApiConfig::from_env()?;
        let data_dir = PathBuf::from(get_env_or_default("BAKEHOUSE_DATA_DIR", ".bakehouse"));
        let display_currency = get_env_or_default("BAKEHOUSE_CURRENCY", "INR").to_uppercase();

        let oidc = if get_optional_env("BAKEHOUSE_OIDC_AUTHORITY").is_some() {
            Some(OidcConfig::from_env()?)
        } else {
            None
        };

        let payments = if get_optional_env("RAZORPAY_KEY_ID").is_some() {
            Some(PaymentConfig::from_env()?)
        } else {
            None
        };

        Ok(Self {
            api,
            data_dir,
            display_currency,
            oidc,
            payments,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Path of the persisted cart.
    #[must_use]
    pub fn cart_path(&self) -> PathBuf {
        self.data_dir.join("cart.json")
    }

    /// Path of the persisted sign-in session.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = get_required_url("BAKEHOUSE_API_BASE_URL")?;
        let timeout_secs = get_env_or_default("BAKEHOUSE_HTTP_TIMEOUT_SECS", "15")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BAKEHOUSE_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl OidcConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let client_secret = get_optional_env("BAKEHOUSE_OIDC_CLIENT_SECRET")
            .map(|value| {
                validate_secret_strength(&value, "BAKEHOUSE_OIDC_CLIENT_SECRET")?;
                Ok::<_, ConfigError>(SecretString::from(value))
            })
            .transpose()?;

        let redirect_uri = parse_url(
            "BAKEHOUSE_OIDC_REDIRECT_URI",
            &get_env_or_default("BAKEHOUSE_OIDC_REDIRECT_URI", "http://127.0.0.1:8765/callback"),
        )?;

        let post_logout_redirect_uri = get_optional_env("BAKEHOUSE_OIDC_POST_LOGOUT_URI")
            .map(|value| parse_url("BAKEHOUSE_OIDC_POST_LOGOUT_URI", &value))
            .transpose()?;

        let scopes = get_env_or_default("BAKEHOUSE_OIDC_SCOPES", "openid email phone profile")
            .split_whitespace()
            .map(String::from)
            .collect::<Vec<_>>();

        if !scopes.iter().any(|s| s == "openid") {
            return Err(ConfigError::InvalidEnvVar(
                "BAKEHOUSE_OIDC_SCOPES".to_string(),
                "must include the openid scope".to_string(),
            ));
        }

        Ok(Self {
            authority: get_required_url("BAKEHOUSE_OIDC_AUTHORITY")?,
            client_id: get_required_env("BAKEHOUSE_OIDC_CLIENT_ID")?,
            client_secret,
            redirect_uri,
            post_logout_redirect_uri,
            scopes,
        })
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let test_mode = parse_bool(
            "BAKEHOUSE_PAYMENTS_TEST_MODE",
            &get_env_or_default("BAKEHOUSE_PAYMENTS_TEST_MODE", "false"),
        )?;

        Ok(Self {
            key_id: get_required_env("RAZORPAY_KEY_ID")?,
            test_mode,
            merchant_name: get_env_or_default("BAKEHOUSE_MERCHANT_NAME", "Bakehouse"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a URL.
fn get_required_url(key: &str) -> Result<Url, ConfigError> {
    parse_url(key, &get_required_env(key)?)
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}
