//! `OpenID` Connect client.
//!
//! Authorization-code flow with PKCE against any provider that publishes
//! `/.well-known/openid-configuration`. The discovery document is fetched
//! once per client.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};
use url::Url;

use super::SessionError;
use super::provider::{AuthorizeParams, IdentityProvider, TokenSet};
use crate::config::OidcConfig;

/// Subset of the discovery document the client needs.
#[derive(Debug, Clone, Deserialize)]
struct Discovery {
    authorization_endpoint: Url,
    token_endpoint: Url,
    #[serde(default)]
    end_session_endpoint: Option<Url>,
}

/// Raw token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Error body of the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// `OpenID` Connect provider client.
#[derive(Clone)]
pub struct OidcClient {
    inner: Arc<OidcClientInner>,
}

struct OidcClientInner {
    client: reqwest::Client,
    config: OidcConfig,
    discovery: OnceCell<Discovery>,
}

impl std::fmt::Debug for OidcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl OidcClient {
    /// Create a new client.
    #[must_use]
    pub fn new(config: OidcConfig, client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(OidcClientInner {
                client,
                config,
                discovery: OnceCell::new(),
            }),
        }
    }

    /// The OAuth client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.inner.config.client_id
    }

    async fn discovery(&self) -> Result<&Discovery, SessionError> {
        self.inner
            .discovery
            .get_or_try_init(|| async {
                let base = self.inner.config.authority.as_str().trim_end_matches('/');
                let url = format!("{base}/.well-known/openid-configuration");
                debug!(url = %url, "Fetching OpenID configuration");

                let response = self.inner.client.get(&url).send().await?;
                if !response.status().is_success() {
                    return Err(SessionError::Provider(format!(
                        "discovery failed with status {}",
                        response.status()
                    )));
                }
                Ok(response.json::<Discovery>().await?)
            })
            .await
    }

    async fn token_request<'a>(
        &'a self,
        params: Vec<(&'a str, &'a str)>,
    ) -> Result<TokenSet, SessionError> {
        let endpoint = self.discovery().await?.token_endpoint.clone();

        let mut form = params;
        form.push(("client_id", &self.inner.config.client_id));
        let secret = self
            .inner
            .config
            .client_secret
            .as_ref()
            .map(ExposeSecret::expose_secret);
        if let Some(secret) = secret {
            form.push(("client_secret", secret));
        }

        let response = self.inner.client.post(endpoint).form(&form).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TokenError>(&text).map_or_else(
                |_| format!("token endpoint returned {status}"),
                |e| match e.error_description {
                    Some(description) => format!("{}: {description}", e.error),
                    None => e.error,
                },
            );
            return Err(SessionError::Provider(message));
        }

        let token: TokenResponse = response.json().await?;
        if token.access_token.is_empty() {
            return Err(SessionError::Provider(
                "token endpoint returned an empty access token".to_string(),
            ));
        }

        Ok(TokenSet {
            access_token: SecretString::from(token.access_token),
            id_token: token.id_token.map(SecretString::from),
            refresh_token: token.refresh_token.map(SecretString::from),
            expires_in: token.expires_in,
        })
    }
}

#[async_trait]
impl IdentityProvider for OidcClient {
    async fn authorization_url(&self, params: &AuthorizeParams) -> Result<Url, SessionError> {
        let mut url = self.discovery().await?.authorization_endpoint.clone();
        let config = &self.inner.config;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &config.client_id)
                .append_pair("response_type", "code")
                .append_pair("redirect_uri", config.redirect_uri.as_str())
                .append_pair("scope", &config.scopes.join(" "))
                .append_pair("state", &params.state)
                .append_pair("nonce", &params.nonce)
                .append_pair("code_challenge", &params.code_challenge)
                .append_pair("code_challenge_method", "S256");
            if params.sign_up {
                query.append_pair("prompt", "create");
            }
        }

        Ok(url)
    }

    #[instrument(skip_all)]
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, SessionError> {
        let redirect_uri = self.inner.config.redirect_uri.as_str();
        self.token_request(vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, SessionError> {
        self.token_request(vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn logout_url(
        &self,
        id_token: Option<&str>,
        post_logout_redirect: Option<&Url>,
    ) -> Result<Option<Url>, SessionError> {
        let Some(mut url) = self.discovery().await?.end_session_endpoint.clone() else {
            return Ok(None);
        };

        let redirect = post_logout_redirect.or(self.inner.config.post_logout_redirect_uri.as_ref());
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.inner.config.client_id);
            if let Some(id_token) = id_token {
                query.append_pair("id_token_hint", id_token);
            }
            if let Some(redirect) = redirect {
                query.append_pair("post_logout_redirect_uri", redirect.as_str());
            }
        }

        Ok(Some(url))
    }
}
