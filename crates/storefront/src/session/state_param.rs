//! Values carried through the authorization redirect.
//!
//! The return path rides in the OAuth `state` parameter as base64url JSON
//! next to the CSRF token, so it survives the round trip without any
//! client-side storage.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::SessionError;

/// Decoded `state` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInState {
    pub csrf: String,
    pub return_to: String,
}

impl SignInState {
    /// New state with a random CSRF token and a sanitized return path.
    #[must_use]
    pub fn new(return_to: &str) -> Self {
        Self {
            csrf: generate_random_string(32),
            return_to: sanitize_return_path(return_to),
        }
    }

    /// Encode as the value of the `state` query parameter.
    #[must_use]
    pub fn encode(&self) -> String {
        // Serializing two strings cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a `state` query parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not base64url JSON of the expected
    /// shape.
    pub fn decode(value: &str) -> Result<Self, SessionError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(value.trim_end_matches('='))
            .map_err(|e| SessionError::InvalidCallback(format!("malformed state: {e}")))?;
        let mut state: Self = serde_json::from_slice(&bytes)
            .map_err(|e| SessionError::InvalidCallback(format!("malformed state: {e}")))?;
        state.return_to = sanitize_return_path(&state.return_to);
        Ok(state)
    }
}

/// Generate a cryptographically secure random alphanumeric string.
#[must_use]
pub fn generate_random_string(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// PKCE `S256` challenge for a verifier.
#[must_use]
pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Only same-origin absolute paths are allowed; anything else becomes `/`.
#[must_use]
pub fn sanitize_return_path(path: &str) -> String {
    let path = path.trim();
    let same_origin = path.starts_with('/') && !path.starts_with("//") && !path.contains('\\');
    if same_origin {
        path.to_string()
    } else {
        "/".to_string()
    }
}
