//! Identity provider seam.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use super::SessionError;

/// Parameters of one authorization redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeParams {
    /// Encoded [`super::SignInState`]
    pub state: String,
    pub nonce: String,
    /// PKCE `S256` challenge
    pub code_challenge: String,
    /// Ask the provider for its registration screen
    pub sign_up: bool,
}

/// Tokens returned by the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: SecretString,
    pub id_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    /// Lifetime in seconds
    pub expires_in: Option<i64>,
}

/// An `OpenID` Connect provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the user to sign in.
    async fn authorization_url(&self, params: &AuthorizeParams) -> Result<Url, SessionError>;

    /// Exchange an authorization code.
    async fn exchange_code(&self, code: &str, code_verifier: &str)
    -> Result<TokenSet, SessionError>;

    /// Use a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, SessionError>;

    /// Where to send the user to end the provider session, if the provider
    /// has such an endpoint.
    async fn logout_url(
        &self,
        id_token: Option<&str>,
        post_logout_redirect: Option<&Url>,
    ) -> Result<Option<Url>, SessionError>;
}

/// Claims read from an ID token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Some providers send this as the string `"true"`
    #[serde(default)]
    pub email_verified: Option<serde_json::Value>,
    #[serde(default)]
    pub nonce: Option<String>,
}

impl IdTokenClaims {
    /// Decode the payload segment of a JWT.
    ///
    /// The signature is not checked: the token comes straight from the
    /// provider's token endpoint over TLS and is only read for profile
    /// claims, never trusted for authorization.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a three-part JWT with a JSON
    /// payload.
    pub fn decode(id_token: &str) -> Result<Self, SessionError> {
        let mut parts = id_token.split('.');
        let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(SessionError::InvalidToken("not a JWT".to_string())),
        };
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| SessionError::InvalidToken(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| SessionError::InvalidToken(e.to_string()))
    }

    /// `email_verified` as a boolean.
    #[must_use]
    pub fn email_verified(&self) -> Option<bool> {
        match self.email_verified.as_ref()? {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Unsigned JWT carrying `claims`.
    pub(crate) fn jwt(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn test_decode_claims() {
        let token = jwt(&serde_json::json!({
            "sub": "user-1",
            "email": "asha@example.com",
            "email_verified": "true",
            "phone_number": "+919800000000",
            "nonce": "n1"
        }));
        let claims = IdTokenClaims::decode(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email_verified(), Some(true));
        assert_eq!(claims.nonce.as_deref(), Some("n1"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(IdTokenClaims::decode("abc").is_err());
        assert!(IdTokenClaims::decode("a.!!!.c").is_err());
    }
}
