//! Account endpoints exposed by the order service.

use async_trait::async_trait;
use tracing::instrument;

use super::wire::{ConfirmSignupRequest, ConfirmSignupResponse};
use super::{ApiClient, ApiError, RequestOptions};

/// Account management calls that go through the order service rather than
/// the identity provider.
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Confirm a hosted sign-up with the emailed code. Returns the service's
    /// confirmation message.
    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<String, ApiError>;
}

#[async_trait]
impl AccountApi for ApiClient {
    #[instrument(skip(self, code))]
    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<String, ApiError> {
        let body = ConfirmSignupRequest {
            username: username.trim().to_string(),
            code: code.trim().to_string(),
        };
        let response: ConfirmSignupResponse = self
            .post("/auth/confirm", &body, RequestOptions::public())
            .await?;
        Ok(response.message)
    }
}
