//! Client state shared across the application.

use std::sync::Arc;

use bakehouse_core::CustomerId;
use tracing::{info, instrument};

use crate::api::{AccountApi, ApiClient};
use crate::cart::{CartState, CartStore};
use crate::checkout::{Checkout, PaymentGateway};
use crate::config::StorefrontConfig;
use crate::error::{Result, StorefrontError};
use crate::session::{AuthSession, OidcClient, SessionBridge};
use crate::storage::JsonFileStorage;
use crate::token::SharedToken;

/// Everything a front end needs, wired together.
///
/// This struct is cheaply cloneable via `Arc`. The HTTP client, the cart and
/// the session bridge share one bearer token cell.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    api: ApiClient,
    token: SharedToken,
    cart: Arc<CartStore>,
    session: Option<Arc<SessionBridge>>,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("api", &self.inner.api)
            .field("token", &self.inner.token)
            .field("sign_in", &self.inner.session.is_some())
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Build the client, restore the persisted cart and session.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    #[instrument(skip_all, fields(base_url = %config.api.base_url))]
    pub async fn connect(config: StorefrontConfig) -> Result<Self> {
        let token = SharedToken::new();
        let api = ApiClient::new(&config.api, Arc::new(token.clone()))?;

        let cart = Arc::new(CartStore::new(
            Arc::new(api.clone()),
            Arc::new(JsonFileStorage::<CartState>::new(config.cart_path())),
        ));

        let session = match &config.oidc {
            Some(oidc) => {
                let http = reqwest::Client::builder()
                    .timeout(config.api.timeout)
                    .build()
                    .map_err(crate::api::ApiError::from)?;
                Some(Arc::new(SessionBridge::new(
                    Arc::new(OidcClient::new(oidc.clone(), http)),
                    Arc::new(JsonFileStorage::<AuthSession>::new(config.session_path())),
                    token.clone(),
                )))
            }
            None => None,
        };

        let storefront = Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                token,
                cart,
                session,
            }),
        };

        let cart = storefront.inner.cart.restore().await;
        let status = match &storefront.inner.session {
            Some(session) => Some(session.initialize().await),
            None => None,
        };
        info!(
            cart_items = cart.item_count(),
            session = ?status,
            "Storefront ready"
        );

        Ok(storefront)
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the order service client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the shared bearer token cell.
    #[must_use]
    pub fn token(&self) -> &SharedToken {
        &self.inner.token
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &Arc<CartStore> {
        &self.inner.cart
    }

    /// Get the session bridge.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::NotConfigured`] without an OIDC section.
    pub fn session(&self) -> Result<&Arc<SessionBridge>> {
        self.inner
            .session
            .as_ref()
            .ok_or(StorefrontError::NotConfigured("sign-in (BAKEHOUSE_OIDC_AUTHORITY)"))
    }

    /// Customer id of the signed-in user, if any.
    pub async fn customer_id(&self) -> Option<CustomerId> {
        match &self.inner.session {
            Some(session) => session.customer_id().await,
            None => None,
        }
    }

    /// Build a checkout orchestrator around a payment widget.
    ///
    /// # Errors
    ///
    /// Returns [`StorefrontError::NotConfigured`] without a payments section.
    pub fn checkout(&self, gateway: Arc<dyn PaymentGateway>) -> Result<Checkout> {
        let settings = self
            .inner
            .config
            .payments
            .clone()
            .ok_or(StorefrontError::NotConfigured("payments (RAZORPAY_KEY_ID)"))?;

        Ok(Checkout::new(
            self.inner.cart.clone(),
            Arc::new(self.inner.api.clone()),
            gateway,
            settings,
        ))
    }

    /// Confirm a hosted sign-up with the emailed code.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the code.
    pub async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<String> {
        Ok(self.inner.api.confirm_sign_up(username, code).await?)
    }
}
