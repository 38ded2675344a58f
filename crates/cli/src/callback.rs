//! Loopback listener for the identity provider's redirect.
//!
//! Binds the host and port of the configured redirect URI, serves its path
//! once and hands the query parameters back to the waiting command.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use bakehouse_storefront::session::CallbackParams;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use url::Url;

use crate::error::CliError;

/// How long to wait for the browser to come back.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const DONE_PAGE: &str = "<!doctype html>\
<html><head><meta charset=\"utf-8\"><title>Bakehouse</title></head>\
<body><p>Sign-in received. You can close this window and return to the terminal.</p></body></html>";

type Slot = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// A bound, not yet answered, redirect listener.
pub struct CallbackListener {
    params: oneshot::Receiver<CallbackParams>,
    shutdown: oneshot::Sender<()>,
    server: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl CallbackListener {
    /// Start listening on the redirect URI's address.
    pub async fn bind(redirect_uri: &Url) -> Result<Self, CliError> {
        let host = redirect_uri
            .host_str()
            .ok_or_else(|| CliError::InvalidInput(format!("redirect URI has no host: {redirect_uri}")))?;
        let port = redirect_uri
            .port_or_known_default()
            .ok_or_else(|| CliError::InvalidInput(format!("redirect URI has no port: {redirect_uri}")))?;
        let path = match redirect_uri.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };

        let listener = TcpListener::bind((host.trim_matches(['[', ']']), port)).await?;
        info!(address = %listener.local_addr()?, path = %path, "Waiting for sign-in redirect");

        let (params_tx, params) = oneshot::channel();
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let slot: Slot = Arc::new(Mutex::new(Some(params_tx)));

        let app = Router::new()
            .route(&path, get(receive))
            .layer(TraceLayer::new_for_http())
            .with_state(slot);

        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(Self {
            params,
            shutdown,
            server,
        })
    }

    /// Wait for the redirect, then stop the listener.
    pub async fn wait(self) -> Result<CallbackParams, CliError> {
        let result = tokio::time::timeout(CALLBACK_TIMEOUT, self.params).await;

        let _ = self.shutdown.send(());
        if let Ok(Err(e)) = self.server.await {
            debug!(error = %e, "Callback listener stopped with an error");
        }

        match result {
            Ok(Ok(params)) => Ok(params),
            Ok(Err(_)) => Err(CliError::Callback("listener closed".to_string())),
            Err(_) => Err(CliError::Callback(format!(
                "no redirect within {} seconds",
                CALLBACK_TIMEOUT.as_secs()
            ))),
        }
    }
}

async fn receive(State(slot): State<Slot>, Query(params): Query<CallbackParams>) -> Html<&'static str> {
    let sender = slot.lock().ok().and_then(|mut guard| guard.take());
    match sender {
        Some(sender) => {
            let _ = sender.send(params);
        }
        None => debug!("Ignoring repeated sign-in redirect"),
    }
    Html(DONE_PAGE)
}
