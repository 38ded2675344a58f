//! CLI error type.

use bakehouse_storefront::api::ApiError;
use bakehouse_storefront::checkout::CheckoutError;
use bakehouse_storefront::error::StorefrontError;
use bakehouse_storefront::session::SessionError;
use thiserror::Error;

/// Errors that can end a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Storefront client failure.
    #[error(transparent)]
    Storefront(#[from] StorefrontError),

    /// Terminal or socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sign-in redirect never arrived or could not be served.
    #[error("Sign-in callback failed: {0}")]
    Callback(String),

    /// Bad command-line input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CliError {
    /// Message printed to the terminal.
    pub fn user_message(&self) -> String {
        match self {
            Self::Storefront(err) => err.user_message(),
            Self::Io(_) | Self::Callback(_) | Self::InvalidInput(_) => self.to_string(),
        }
    }
}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        Self::Storefront(err.into())
    }
}

impl From<CheckoutError> for CliError {
    fn from(err: CheckoutError) -> Self {
        Self::Storefront(err.into())
    }
}

impl From<SessionError> for CliError {
    fn from(err: SessionError) -> Self {
        Self::Storefront(err.into())
    }
}
