//! Session/auth bridge.
//!
//! Owns the signed-in session and keeps three things in step with it: the
//! bearer token the HTTP client attaches ([`SharedToken`]), the persisted
//! session, and the Sentry user scope.
//!
//! # Flow
//!
//! 1. [`SessionBridge::sign_in`] returns the provider's authorization URL.
//!    The return path travels inside the `state` parameter together with a
//!    CSRF token; the PKCE verifier and nonce stay in memory.
//! 2. The provider redirects back; [`SessionBridge::complete_sign_in`] checks
//!    the CSRF token, exchanges the code, and returns the decoded return path.
//! 3. [`SessionBridge::refresh_session`] renews an expiring session. Any
//!    failure there signs the user out quietly.

mod oidc;
mod provider;
mod state_param;

pub use oidc::OidcClient;
pub use provider::{AuthorizeParams, IdTokenClaims, IdentityProvider, TokenSet};
pub use state_param::{SignInState, generate_random_string, pkce_challenge, sanitize_return_path};

use std::sync::Arc;

use bakehouse_core::CustomerId;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::storage::{Storage, StorageError};
use crate::token::SharedToken;

/// Errors from the sign-in flow.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Provider could not be reached.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider rejected the request.
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// The redirect back from the provider was unusable.
    #[error("Invalid sign-in callback: {0}")]
    InvalidCallback(String),

    /// The callback's CSRF token did not match the pending sign-in.
    #[error("Sign-in state mismatch")]
    StateMismatch,

    /// A callback arrived with no sign-in in progress.
    #[error("No sign-in in progress")]
    NoPendingSignIn,

    /// A token could not be read.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Provider URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Persisting the session failed.
    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),
}

// =============================================================================
// Session types
// =============================================================================

/// Tokens of a signed-in session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    #[serde(with = "secret")]
    pub access_token: SecretString,
    #[serde(default, with = "secret_option")]
    pub id_token: Option<SecretString>,
    #[serde(default, with = "secret_option")]
    pub refresh_token: Option<SecretString>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthTokens {
    fn from_token_set(tokens: TokenSet, now: DateTime<Utc>) -> Self {
        Self {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens
                .expires_in
                .map(|secs| now + Duration::seconds(secs)),
        }
    }

    /// Check if the access token is expired (with 60s buffer).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Utc::now() >= expires_at - Duration::seconds(60))
    }
}

/// Profile of the signed-in user, read from the ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Provider subject; doubles as the service's customer id
    pub id: CustomerId,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub email_verified: Option<bool>,
}

impl From<IdTokenClaims> for AuthUser {
    fn from(claims: IdTokenClaims) -> Self {
        let email_verified = claims.email_verified();
        Self {
            id: claims.sub.into(),
            email: claims.email,
            name: claims.name,
            phone_number: claims.phone_number,
            email_verified,
        }
    }
}

/// A signed-in session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub tokens: AuthTokens,
    pub user: AuthUser,
}

impl AuthSession {
    /// A session only counts when it carries an access token.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.tokens.access_token.expose_secret().is_empty()
    }
}

/// What the rest of the client sees of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionStatus {
    #[default]
    Initializing,
    /// Sign-in, sign-out or refresh in progress
    Loading,
    Authenticated(AuthUser),
    Unauthenticated,
}

/// Query parameters of the provider's redirect back to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Read the parameters from a full redirect URL.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }
        params
    }
}

/// Secrets of an authorization redirect that has not come back yet.
struct PendingSignIn {
    csrf: String,
    nonce: String,
    code_verifier: String,
}

// =============================================================================
// SessionBridge
// =============================================================================

/// Keeps the signed-in session, the bearer token and the Sentry scope in step.
pub struct SessionBridge {
    provider: Arc<dyn IdentityProvider>,
    storage: Arc<dyn Storage<AuthSession>>,
    token: SharedToken,
    session: Mutex<Option<AuthSession>>,
    pending: Mutex<Option<PendingSignIn>>,
    status: watch::Sender<SessionStatus>,
}

impl std::fmt::Debug for SessionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBridge")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionBridge {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        storage: Arc<dyn Storage<AuthSession>>,
        token: SharedToken,
    ) -> Self {
        Self {
            provider,
            storage,
            token,
            session: Mutex::new(None),
            pending: Mutex::new(None),
            status: watch::channel(SessionStatus::Initializing).0,
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Whether a usable session is active.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(*self.status.borrow(), SessionStatus::Authenticated(_))
    }

    /// The active session, if any.
    pub async fn current(&self) -> Option<AuthSession> {
        self.session.lock().await.clone()
    }

    /// Customer id of the signed-in user.
    pub async fn customer_id(&self) -> Option<CustomerId> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.user.id.clone())
    }

    /// Restore the persisted session, renewing it if it has expired.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> SessionStatus {
        self.status.send_replace(SessionStatus::Initializing);

        let restored = match self.storage.load().await {
            Ok(session) => session.filter(AuthSession::is_usable),
            Err(e) => {
                warn!(error = %e, "Failed to restore session");
                None
            }
        };

        match restored {
            Some(session) if session.tokens.is_expired() => {
                debug!("Persisted session expired, renewing");
                *self.session.lock().await = Some(session);
                self.refresh_session().await;
            }
            Some(session) => {
                self.activate(session, false).await;
            }
            None => {
                self.status.send_replace(SessionStatus::Unauthenticated);
            }
        }

        self.status()
    }

    /// Start a sign-in. Returns the URL to send the user to.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's configuration cannot be fetched.
    pub async fn sign_in(&self, return_path: &str) -> Result<Url, SessionError> {
        self.begin(return_path, false).await
    }

    /// Start a sign-up on the provider's registration screen.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's configuration cannot be fetched.
    pub async fn sign_up(&self, return_path: &str) -> Result<Url, SessionError> {
        self.begin(return_path, true).await
    }

    #[instrument(skip(self))]
    async fn begin(&self, return_path: &str, sign_up: bool) -> Result<Url, SessionError> {
        let state = SignInState::new(return_path);
        let nonce = generate_random_string(32);
        let code_verifier = generate_random_string(64);

        let url = self
            .provider
            .authorization_url(&AuthorizeParams {
                state: state.encode(),
                nonce: nonce.clone(),
                code_challenge: pkce_challenge(&code_verifier),
                sign_up,
            })
            .await?;

        *self.pending.lock().await = Some(PendingSignIn {
            csrf: state.csrf,
            nonce,
            code_verifier,
        });

        Ok(url)
    }

    /// Finish a sign-in from the provider's redirect. Returns the path the
    /// user started from.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider reported an error, the state does not
    /// match the pending sign-in, or the code exchange fails. The previous
    /// session (if any) is kept.
    #[instrument(skip_all)]
    pub async fn complete_sign_in(&self, callback: &CallbackParams) -> Result<String, SessionError> {
        self.status.send_replace(SessionStatus::Loading);

        match self.finish_sign_in(callback).await {
            Ok((session, return_to)) => {
                info!(user_id = %session.user.id, "Signed in");
                self.activate(session, true).await;
                Ok(return_to)
            }
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                self.restore_status().await;
                Err(e)
            }
        }
    }

    async fn finish_sign_in(
        &self,
        callback: &CallbackParams,
    ) -> Result<(AuthSession, String), SessionError> {
        if let Some(error) = &callback.error {
            let description = callback.error_description.as_deref().unwrap_or_default();
            return Err(SessionError::Provider(format!("{error}: {description}")));
        }

        let state = callback
            .state
            .as_deref()
            .ok_or_else(|| SessionError::InvalidCallback("missing state".to_string()))
            .and_then(SignInState::decode)?;

        // A callback with the wrong state leaves the pending sign-in in place
        let pending = {
            let mut slot = self.pending.lock().await;
            let csrf_matches = slot
                .as_ref()
                .ok_or(SessionError::NoPendingSignIn)?
                .csrf
                == state.csrf;
            if !csrf_matches {
                return Err(SessionError::StateMismatch);
            }
            slot.take().ok_or(SessionError::NoPendingSignIn)?
        };

        let code = callback
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| SessionError::InvalidCallback("missing code".to_string()))?;

        let tokens = self
            .provider
            .exchange_code(code, &pending.code_verifier)
            .await?;
        let id_token = tokens
            .id_token
            .as_ref()
            .ok_or_else(|| SessionError::InvalidToken("no ID token returned".to_string()))?;
        let claims = IdTokenClaims::decode(id_token.expose_secret())?;
        if claims.nonce.as_deref() != Some(pending.nonce.as_str()) {
            return Err(SessionError::InvalidToken("nonce mismatch".to_string()));
        }

        let session = AuthSession {
            tokens: AuthTokens::from_token_set(tokens, Utc::now()),
            user: AuthUser::from(claims),
        };
        Ok((session, state.return_to))
    }

    /// Sign out locally. Returns the provider's logout URL when it has one.
    #[instrument(skip(self))]
    pub async fn sign_out(&self, post_logout_redirect: Option<&Url>) -> Option<Url> {
        self.status.send_replace(SessionStatus::Loading);

        let previous = self.session.lock().await.take();
        self.deactivate().await;

        let id_token = previous
            .as_ref()
            .and_then(|session| session.tokens.id_token.as_ref())
            .map(|token| token.expose_secret().to_string());

        match self
            .provider
            .logout_url(id_token.as_deref(), post_logout_redirect)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Could not build provider logout URL");
                None
            }
        }
    }

    /// Renew the session with its refresh token.
    ///
    /// Never fails: without a refresh token, or if the provider refuses it,
    /// the session is cleared and the status becomes `Unauthenticated`.
    /// Returns whether the user is still signed in.
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> bool {
        self.status.send_replace(SessionStatus::Loading);

        let current = self.session.lock().await.clone();
        let Some(current) = current else {
            self.deactivate().await;
            return false;
        };
        let Some(refresh_token) = current
            .tokens
            .refresh_token
            .as_ref()
            .map(|token| token.expose_secret().to_string())
        else {
            debug!("No refresh token, signing out");
            self.deactivate().await;
            return false;
        };

        match self.provider.refresh(&refresh_token).await {
            Ok(tokens) => {
                let mut renewed = AuthTokens::from_token_set(tokens, Utc::now());
                // Providers may omit tokens that did not change
                if renewed.refresh_token.is_none() {
                    renewed.refresh_token = current.tokens.refresh_token.clone();
                }
                if renewed.id_token.is_none() {
                    renewed.id_token = current.tokens.id_token.clone();
                }
                let session = AuthSession {
                    tokens: renewed,
                    user: current.user,
                };
                self.activate(session, true).await;
                true
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed, signing out");
                self.deactivate().await;
                false
            }
        }
    }

    async fn activate(&self, session: AuthSession, persist: bool) {
        if persist && let Err(e) = self.storage.save(&session).await {
            warn!(error = %e, "Failed to persist session");
        }

        self.token.set(session.tokens.access_token.clone());
        set_sentry_user(&session.user.id, session.user.email.as_deref());
        let user = session.user.clone();
        *self.session.lock().await = Some(session);
        self.status.send_replace(SessionStatus::Authenticated(user));
    }

    async fn deactivate(&self) {
        self.token.clear();
        clear_sentry_user();
        *self.session.lock().await = None;
        if let Err(e) = self.storage.clear().await {
            warn!(error = %e, "Failed to clear persisted session");
        }
        self.status.send_replace(SessionStatus::Unauthenticated);
    }

    async fn restore_status(&self) {
        let status = self
            .session
            .lock()
            .await
            .as_ref()
            .map_or(SessionStatus::Unauthenticated, |session| {
                SessionStatus::Authenticated(session.user.clone())
            });
        self.status.send_replace(status);
    }
}

// =============================================================================
// Serde helpers for secrets
// =============================================================================

mod secret {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
        String::deserialize(deserializer).map(SecretString::from)
    }
}

mod secret_option {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<SecretString>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(secret) => serializer.serialize_some(secret.expose_secret()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SecretString>, D::Error> {
        Option::<String>::deserialize(deserializer).map(|value| value.map(SecretString::from))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::provider::tests::jwt;
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::token::TokenProvider;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// Provider that records the authorization params and answers from a script.
    #[derive(Default)]
    struct StubProvider {
        authorize: StdMutex<Option<AuthorizeParams>>,
        refresh_fails: bool,
        with_logout: bool,
        omit_nonce: bool,
    }

    impl StubProvider {
        fn last_params(&self) -> AuthorizeParams {
            self.authorize.lock().unwrap().clone().unwrap()
        }

        fn id_token(&self) -> String {
            let nonce = self
                .authorize
                .lock()
                .unwrap()
                .as_ref()
                .map(|p| p.nonce.clone());
            let mut claims = serde_json::json!({
                "sub": "user-1",
                "email": "asha@example.com",
                "email_verified": true,
            });
            if !self.omit_nonce {
                claims["nonce"] = serde_json::json!(nonce);
            }
            jwt(&claims)
        }
    }

    #[async_trait]
    impl IdentityProvider for StubProvider {
        async fn authorization_url(&self, params: &AuthorizeParams) -> Result<Url, SessionError> {
            *self.authorize.lock().unwrap() = Some(params.clone());
            let mut url = Url::parse("https://auth.example.com/oauth2/authorize")?;
            url.query_pairs_mut().append_pair("state", &params.state);
            if params.sign_up {
                url.query_pairs_mut().append_pair("prompt", "create");
            }
            Ok(url)
        }

        async fn exchange_code(
            &self,
            code: &str,
            code_verifier: &str,
        ) -> Result<TokenSet, SessionError> {
            if code != "good-code" {
                return Err(SessionError::Provider("invalid_grant".to_string()));
            }
            assert_eq!(
                pkce_challenge(code_verifier),
                self.last_params().code_challenge
            );
            Ok(TokenSet {
                access_token: SecretString::from("access-1"),
                id_token: Some(SecretString::from(self.id_token())),
                refresh_token: Some(SecretString::from("refresh-1")),
                expires_in: Some(3600),
            })
        }

        async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, SessionError> {
            if self.refresh_fails {
                return Err(SessionError::Provider("invalid_grant".to_string()));
            }
            assert_eq!(refresh_token, "refresh-1");
            Ok(TokenSet {
                access_token: SecretString::from("access-2"),
                id_token: None,
                refresh_token: None,
                expires_in: Some(3600),
            })
        }

        async fn logout_url(
            &self,
            id_token: Option<&str>,
            _post_logout_redirect: Option<&Url>,
        ) -> Result<Option<Url>, SessionError> {
            if !self.with_logout {
                return Ok(None);
            }
            let mut url = Url::parse("https://auth.example.com/logout")?;
            if let Some(id_token) = id_token {
                url.query_pairs_mut().append_pair("id_token_hint", id_token);
            }
            Ok(Some(url))
        }
    }

    fn bridge(
        provider: StubProvider,
        storage: Arc<MemoryStorage<AuthSession>>,
    ) -> (SessionBridge, SharedToken) {
        let token = SharedToken::new();
        (
            SessionBridge::new(Arc::new(provider), storage, token.clone()),
            token,
        )
    }

    fn state_of(url: &Url) -> String {
        CallbackParams::from_url(url).state.unwrap()
    }

    fn stored_session(expires_at: DateTime<Utc>) -> AuthSession {
        AuthSession {
            tokens: AuthTokens {
                access_token: SecretString::from("access-0"),
                id_token: None,
                refresh_token: Some(SecretString::from("refresh-1")),
                expires_at: Some(expires_at),
            },
            user: AuthUser {
                id: "user-1".into(),
                email: None,
                name: None,
                phone_number: None,
                email_verified: None,
            },
        }
    }

    #[tokio::test]
    async fn test_sign_in_round_trip_returns_path_and_sets_token() {
        let storage = Arc::new(MemoryStorage::new());
        let (bridge, token) = bridge(StubProvider::default(), storage.clone());
        assert_eq!(bridge.initialize().await, SessionStatus::Unauthenticated);

        let url = bridge.sign_in("/checkout").await.unwrap();
        let return_to = bridge
            .complete_sign_in(&CallbackParams {
                code: Some("good-code".to_string()),
                state: Some(state_of(&url)),
                ..CallbackParams::default()
            })
            .await
            .unwrap();

        assert_eq!(return_to, "/checkout");
        assert!(bridge.is_authenticated());
        assert_eq!(
            token.access_token().unwrap().expose_secret(),
            "access-1"
        );
        let session = storage.value().unwrap();
        assert_eq!(session.user.id.as_str(), "user-1");
        assert_eq!(session.user.email_verified, Some(true));
        assert_eq!(bridge.customer_id().await.unwrap().as_str(), "user-1");
    }

    #[tokio::test]
    async fn test_sign_up_asks_for_registration() {
        let (bridge, _) = bridge(StubProvider::default(), Arc::new(MemoryStorage::new()));
        let url = bridge.sign_up("/").await.unwrap();
        assert!(url.query_pairs().any(|(k, v)| k == "prompt" && v == "create"));
    }

    #[tokio::test]
    async fn test_csrf_mismatch_fails_callback() {
        let (bridge, token) = bridge(StubProvider::default(), Arc::new(MemoryStorage::new()));
        bridge.initialize().await;
        bridge.sign_in("/orders").await.unwrap();

        let forged = SignInState::new("/orders").encode();
        let err = bridge
            .complete_sign_in(&CallbackParams {
                code: Some("good-code".to_string()),
                state: Some(forged),
                ..CallbackParams::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::StateMismatch));
        assert!(!token.is_set());
        assert_eq!(bridge.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_forged_callback_keeps_pending_sign_in() {
        let (bridge, token) = bridge(StubProvider::default(), Arc::new(MemoryStorage::new()));
        bridge.initialize().await;
        let url = bridge.sign_in("/cart").await.unwrap();

        let err = bridge
            .complete_sign_in(&CallbackParams {
                code: Some("good-code".to_string()),
                state: Some(SignInState::new("/cart").encode()),
                ..CallbackParams::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::StateMismatch));

        // The genuine redirect still completes
        let return_to = bridge
            .complete_sign_in(&CallbackParams {
                code: Some("good-code".to_string()),
                state: Some(state_of(&url)),
                ..CallbackParams::default()
            })
            .await
            .unwrap();
        assert_eq!(return_to, "/cart");
        assert!(token.is_set());
    }

    #[tokio::test]
    async fn test_id_token_without_nonce_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let provider = StubProvider {
            omit_nonce: true,
            ..StubProvider::default()
        };
        let (bridge, token) = bridge(provider, storage.clone());
        bridge.initialize().await;

        let url = bridge.sign_in("/").await.unwrap();
        let err = bridge
            .complete_sign_in(&CallbackParams {
                code: Some("good-code".to_string()),
                state: Some(state_of(&url)),
                ..CallbackParams::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::InvalidToken(ref m) if m == "nonce mismatch"));
        assert!(!token.is_set());
        assert!(storage.value().is_none());
        assert_eq!(bridge.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_callback_without_pending_sign_in() {
        let (bridge, _) = bridge(StubProvider::default(), Arc::new(MemoryStorage::new()));
        let err = bridge
            .complete_sign_in(&CallbackParams {
                code: Some("good-code".to_string()),
                state: Some(SignInState::new("/").encode()),
                ..CallbackParams::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NoPendingSignIn));
    }

    #[tokio::test]
    async fn test_provider_error_is_reported() {
        let (bridge, _) = bridge(StubProvider::default(), Arc::new(MemoryStorage::new()));
        bridge.sign_in("/").await.unwrap();
        let err = bridge
            .complete_sign_in(&CallbackParams {
                error: Some("access_denied".to_string()),
                error_description: Some("User cancelled".to_string()),
                ..CallbackParams::default()
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Identity provider error: access_denied: User cancelled"
        );
    }

    #[tokio::test]
    async fn test_initialize_restores_valid_session() {
        let storage = Arc::new(MemoryStorage::with_value(stored_session(
            Utc::now() + Duration::hours(1),
        )));
        let (bridge, token) = bridge(StubProvider::default(), storage);

        assert!(matches!(
            bridge.initialize().await,
            SessionStatus::Authenticated(_)
        ));
        assert_eq!(token.access_token().unwrap().expose_secret(), "access-0");
    }

    #[tokio::test]
    async fn test_initialize_renews_expired_session() {
        let storage = Arc::new(MemoryStorage::with_value(stored_session(
            Utc::now() - Duration::minutes(5),
        )));
        let (bridge, token) = bridge(StubProvider::default(), storage.clone());

        assert!(matches!(
            bridge.initialize().await,
            SessionStatus::Authenticated(_)
        ));
        assert_eq!(token.access_token().unwrap().expose_secret(), "access-2");
        // Refresh token kept when the provider does not rotate it
        let saved = storage.value().unwrap();
        assert_eq!(
            saved.tokens.refresh_token.unwrap().expose_secret(),
            "refresh-1"
        );
    }

    #[tokio::test]
    async fn test_failed_refresh_signs_out_silently() {
        let storage = Arc::new(MemoryStorage::with_value(stored_session(
            Utc::now() - Duration::minutes(5),
        )));
        let provider = StubProvider {
            refresh_fails: true,
            ..StubProvider::default()
        };
        let (bridge, token) = bridge(provider, storage.clone());

        assert_eq!(bridge.initialize().await, SessionStatus::Unauthenticated);
        assert!(!token.is_set());
        assert!(storage.value().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_clears_everything() {
        let storage = Arc::new(MemoryStorage::new());
        let provider = StubProvider {
            with_logout: true,
            ..StubProvider::default()
        };
        let (bridge, token) = bridge(provider, storage.clone());

        let url = bridge.sign_in("/").await.unwrap();
        bridge
            .complete_sign_in(&CallbackParams {
                code: Some("good-code".to_string()),
                state: Some(state_of(&url)),
                ..CallbackParams::default()
            })
            .await
            .unwrap();

        let logout = bridge.sign_out(None).await.unwrap();

        assert!(logout.query_pairs().any(|(k, _)| k == "id_token_hint"));
        assert!(!token.is_set());
        assert!(storage.value().is_none());
        assert!(bridge.current().await.is_none());
        assert_eq!(bridge.status(), SessionStatus::Unauthenticated);
    }

    #[test]
    fn test_tokens_expiry_buffer() {
        let mut tokens = stored_session(Utc::now() + Duration::seconds(30)).tokens;
        assert!(tokens.is_expired());
        tokens.expires_at = Some(Utc::now() + Duration::minutes(10));
        assert!(!tokens.is_expired());
        tokens.expires_at = None;
        assert!(!tokens.is_expired());
    }

    #[test]
    fn test_session_serializes_tokens() {
        let session = stored_session(Utc::now());
        let json = serde_json::to_string(&session).unwrap();
        let restored: AuthSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.tokens.access_token.expose_secret(), "access-0");
        assert!(restored.tokens.id_token.is_none());
        assert_eq!(restored.user, session.user);
    }
}
