//! Unified error handling with Sentry integration.
//!
//! Each layer has its own `thiserror` enum (`ApiError`, `CheckoutError`,
//! `SessionError`, ...). [`StorefrontError`] wraps them for callers that drive
//! the whole client, and the helpers below keep Sentry's scope in step with
//! the signed-in user and record breadcrumbs along the checkout path.

use thiserror::Error;

use crate::api::ApiError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::session::SessionError;
use crate::storage::StorageError;

/// Top-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Order service call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Sign-in flow failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Local persistence failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A feature was used without its configuration section.
    #[error("Not configured: {0}")]
    NotConfigured(&'static str),
}

impl StorefrontError {
    /// Message suitable for showing to the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message(),
            Self::Checkout(err) => err.user_message(),
            Self::Session(_) => "Sign-in failed, please try again".to_string(),
            Self::Config(_) | Self::NotConfigured(_) | Self::Storage(_) => self.to_string(),
        }
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Report an error to Sentry and log it with the event id.
pub fn capture(error: &(dyn std::error::Error + 'static), context: &str) {
    let event_id = sentry::capture_error(error);
    tracing::error!(
        error = %error,
        sentry_event_id = %event_id,
        "{context}"
    );
}

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "creating_order", Some(&[("cart_id", "c_123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storefront_error_display() {
        let err = StorefrontError::NotConfigured("payments");
        assert_eq!(err.to_string(), "Not configured: payments");
    }

    #[test]
    fn test_user_message_delegates_to_checkout() {
        let err = StorefrontError::Checkout(CheckoutError::AlreadyInProgress);
        assert_eq!(
            err.user_message(),
            CheckoutError::AlreadyInProgress.user_message()
        );
    }

    #[test]
    fn test_sentry_helpers_without_client_are_noops() {
        set_sentry_user(&"user-1", Some("a@example.com"));
        add_breadcrumb("checkout", "validating", Some(&[("cart_id", "c1")]));
        clear_sentry_user();
    }
}
