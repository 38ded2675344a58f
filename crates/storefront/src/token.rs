//! Bearer token plumbing between the session bridge and the HTTP client.
//!
//! The HTTP client never owns a token. It asks a [`TokenProvider`] at call
//! time, so whoever manages sign-in decides what gets attached. The usual
//! provider is [`SharedToken`]: one writer (the session bridge), many readers
//! (every outgoing request).

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};

/// Source of the bearer token attached to authenticated requests.
pub trait TokenProvider: Send + Sync {
    /// The current access token, or `None` when signed out.
    fn access_token(&self) -> Option<SecretString>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<SecretString> + Send + Sync,
{
    fn access_token(&self) -> Option<SecretString> {
        self()
    }
}

/// Shared, cheaply cloneable token cell.
#[derive(Clone, Default)]
pub struct SharedToken {
    inner: Arc<RwLock<Option<SecretString>>>,
}

impl SharedToken {
    /// Create an empty token cell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current token. Empty tokens clear the cell.
    pub fn set(&self, token: SecretString) {
        let value = (!token.expose_secret().is_empty()).then_some(token);
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = value;
    }

    /// Drop the current token.
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Whether a token is currently set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl TokenProvider for SharedToken {
    fn access_token(&self) -> Option<SecretString> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for SharedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedToken")
            .field("token", &if self.is_set() { "[REDACTED]" } else { "None" })
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_token_set_and_clear() {
        let token = SharedToken::new();
        assert!(token.access_token().is_none());

        token.set(SecretString::from("abc"));
        let reader = token.clone();
        assert_eq!(
            reader.access_token().map(|t| t.expose_secret().to_string()),
            Some("abc".to_string())
        );

        token.clear();
        assert!(!reader.is_set());
    }

    #[test]
    fn test_empty_token_is_not_stored() {
        let token = SharedToken::new();
        token.set(SecretString::from(""));
        assert!(!token.is_set());
    }

    #[test]
    fn test_closure_provider() {
        let provider = || Some(SecretString::from("from-closure"));
        assert!(provider.access_token().is_some());
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = SharedToken::new();
        token.set(SecretString::from("very-private"));
        let debug = format!("{token:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("very-private"));
    }
}
