//! Integration tests for the Bakehouse storefront client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bakehouse-integration-tests
//! ```
//!
//! The tests drive the real HTTP client against [`StubService`], an
//! in-process order service bound to an ephemeral loopback port. It speaks
//! the service's JSON shapes, keeps carts and orders in memory, honors the
//! `Idempotency-Key` header and records the `Authorization` header of every
//! request.
//!
//! # Test Categories
//!
//! - `checkout_flow` - Sync, order creation, payment and confirmation
//! - `cart_sync` - Remote cart reconciliation
//! - `api_client` - Error normalization, bearer tokens, catalog caching
//! - `session_flow` - `OpenID` Connect sign-in, refresh and sign-out
//!
//! The same server doubles as the identity provider: it publishes a
//! discovery document and a token endpoint at its root, and
//! [`StubService::authorize`] plays the user approving the sign-in.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::Form;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bakehouse_storefront::checkout::{
    PaymentConfirmation, PaymentGateway, PaymentOutcome, PaymentRequest,
};
use bakehouse_storefront::config::{ApiConfig, OidcConfig, PaymentConfig};
use bakehouse_storefront::session::pkce_challenge;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

/// Tax rate applied by the stub to every cart.
pub const TAX_RATE: f64 = 0.05;
/// Flat shipping fee added by the stub to every non-empty cart.
pub const SHIPPING: f64 = 50.0;
/// Only verification code `POST /auth/confirm` accepts.
pub const CONFIRMATION_CODE: &str = "123456";

/// OAuth client id the stub identity provider expects.
pub const CLIENT_ID: &str = "bakehouse-cli";
/// Subject of the user the stub identity provider signs in.
pub const SUBJECT: &str = "customer-7";

const TIMESTAMP: &str = "2025-11-03T10:00:00Z";

// =============================================================================
// Stub order service
// =============================================================================

#[derive(Debug, Clone)]
struct StubCake {
    id: &'static str,
    name: &'static str,
    price: f64,
    category: &'static str,
    stock: i64,
}

const CATALOG: &[StubCake] = &[
    StubCake {
        id: "cake-1",
        name: "Black Forest",
        price: 1000.0,
        category: "chocolate",
        stock: 12,
    },
    StubCake {
        id: "cake-2",
        name: "Mango Cheesecake",
        price: 850.0,
        category: "cheesecake",
        stock: 0,
    },
];

#[derive(Debug, Clone)]
struct StubLine {
    cake_id: String,
    quantity: u32,
    price_each: f64,
}

#[derive(Debug, Clone)]
struct StubCart {
    cart_id: String,
    cart_token: String,
    customer_id: Option<String>,
    items: Vec<StubLine>,
}

#[derive(Debug, Clone)]
struct StubOrder {
    order_id: String,
    provider_order_id: String,
    idempotency_key: String,
    customer_id: Option<String>,
    items: Vec<StubLine>,
    status: &'static str,
    payment_status: &'static str,
    is_test: bool,
}

/// Everything a test may want to inspect or toggle.
#[derive(Debug, Default)]
struct StubState {
    carts: HashMap<String, StubCart>,
    orders: Vec<StubOrder>,
    authorizations: Vec<(String, Option<String>)>,
    catalog_requests: usize,
    create_requests: usize,
    fail_order_fetch: bool,
    omit_provider_order: bool,
    idp: StubIdentity,
}

/// An authorization code waiting to be exchanged.
#[derive(Debug, Clone)]
struct IssuedCode {
    nonce: String,
    code_challenge: String,
    redirect_uri: String,
}

#[derive(Debug, Default)]
struct StubIdentity {
    issuer: String,
    codes: HashMap<String, IssuedCode>,
    refresh_tokens: Vec<String>,
    issued: usize,
    discovery_requests: usize,
    token_requests: Vec<HashMap<String, String>>,
    omit_end_session: bool,
    empty_access_token: bool,
}

/// In-process order service.
#[derive(Debug, Clone)]
pub struct StubService {
    base_url: Url,
    state: Arc<Mutex<StubState>>,
}

impl StubService {
    /// Bind to an ephemeral loopback port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be bound.
    pub async fn spawn() -> std::io::Result<Self> {
        let state = Arc::new(Mutex::new(StubState::default()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let base_url = Url::parse(&format!("http://{addr}/")).map_err(std::io::Error::other)?;
        state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .idp
            .issuer = base_url.to_string();

        let app = Router::new()
            .route("/cakes", get(list_cakes))
            .route("/cakes/{id}", get(get_cake))
            .route("/cart", post(upsert_cart))
            .route("/cart/{reference}", get(get_cart).delete(delete_cart))
            .route("/orders", post(create_order))
            .route("/orders/{identifier}", get(lookup_orders))
            .route("/orders/{id}/cancel", post(cancel_order))
            .route("/auth/confirm", post(confirm_sign_up))
            .route("/.well-known/openid-configuration", get(discovery))
            .route("/token", post(token))
            .with_state(state.clone());

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Stub order service stopped");
            }
        });

        Ok(Self { base_url, state })
    }

    /// Base URL of the service.
    #[must_use]
    pub fn base_url(&self) -> Url {
        self.base_url.clone()
    }

    /// Client settings pointing at this service.
    #[must_use]
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.base_url(),
            timeout: Duration::from_secs(5),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `GET /orders/{id}` answer 503.
    pub fn fail_order_fetch(&self, fail: bool) {
        self.lock().fail_order_fetch = fail;
    }

    /// Create subsequent orders without a gateway order reference.
    pub fn omit_provider_order(&self, omit: bool) {
        self.lock().omit_provider_order = omit;
    }

    /// Mark an order paid, as the payment webhook would.
    pub fn settle(&self, order_id: &str) {
        if let Some(order) = self.lock().orders.iter_mut().find(|o| o.order_id == order_id) {
            order.status = "confirmed";
            order.payment_status = "paid";
        }
    }

    /// Number of distinct orders created.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }

    /// Number of `POST /orders` requests received.
    #[must_use]
    pub fn create_requests(&self) -> usize {
        self.lock().create_requests
    }

    /// Number of catalog requests received.
    #[must_use]
    pub fn catalog_requests(&self) -> usize {
        self.lock().catalog_requests
    }

    /// Number of remote carts currently stored.
    #[must_use]
    pub fn cart_count(&self) -> usize {
        self.lock().carts.len()
    }

    /// `Authorization` header of every request, keyed by path.
    #[must_use]
    pub fn authorizations(&self) -> Vec<(String, Option<String>)> {
        self.lock().authorizations.clone()
    }

    /// Sign-in settings pointing at the stub identity provider.
    #[must_use]
    pub fn oidc_config(&self) -> OidcConfig {
        OidcConfig {
            authority: self.base_url(),
            client_id: CLIENT_ID.to_string(),
            client_secret: None,
            redirect_uri: Url::parse("http://127.0.0.1:8765/callback")
                .unwrap_or_else(|_| self.base_url()),
            post_logout_redirect_uri: None,
            scopes: vec!["openid".to_string(), "email".to_string(), "profile".to_string()],
        }
    }

    /// Approve the sign-in started at `authorization_url` and return the
    /// redirect the browser would follow back to the client.
    ///
    /// Returns `None` when the URL lacks a parameter a provider requires or
    /// asks for anything but an S256 code challenge.
    #[must_use]
    pub fn authorize(&self, authorization_url: &Url) -> Option<Url> {
        let params: HashMap<String, String> = authorization_url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if params.get("client_id").map(String::as_str) != Some(CLIENT_ID)
            || params.get("response_type").map(String::as_str) != Some("code")
            || params.get("code_challenge_method").map(String::as_str) != Some("S256")
        {
            return None;
        }
        let redirect_uri = params.get("redirect_uri")?.clone();
        let mut redirect = Url::parse(&redirect_uri).ok()?;

        let mut state = self.lock();
        state.idp.issued += 1;
        let code = format!("code-{}", state.idp.issued);
        state.idp.codes.insert(
            code.clone(),
            IssuedCode {
                nonce: params.get("nonce")?.clone(),
                code_challenge: params.get("code_challenge")?.clone(),
                redirect_uri,
            },
        );

        redirect
            .query_pairs_mut()
            .append_pair("code", &code)
            .append_pair("state", params.get("state")?);
        Some(redirect)
    }

    /// Leave `end_session_endpoint` out of the discovery document.
    pub fn omit_end_session(&self, omit: bool) {
        self.lock().idp.omit_end_session = omit;
    }

    /// Answer token requests with an empty access token.
    pub fn issue_empty_access_token(&self, empty: bool) {
        self.lock().idp.empty_access_token = empty;
    }

    /// Invalidate every refresh token issued so far.
    pub fn revoke_refresh_tokens(&self) {
        self.lock().idp.refresh_tokens.clear();
    }

    /// Number of discovery document requests received.
    #[must_use]
    pub fn discovery_requests(&self) -> usize {
        self.lock().idp.discovery_requests
    }

    /// Form bodies of every token endpoint request.
    #[must_use]
    pub fn token_requests(&self) -> Vec<HashMap<String, String>> {
        self.lock().idp.token_requests.clone()
    }
}

type Shared = State<Arc<Mutex<StubState>>>;

fn state(shared: &Arc<Mutex<StubState>>) -> MutexGuard<'_, StubState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record(state: &mut StubState, path: &str, headers: &HeaderMap) {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.authorizations.push((path.to_string(), auth));
}

fn error(status: StatusCode, detail: Value) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn request_meta() -> Value {
    json!({ "request_id": uuid::Uuid::new_v4().to_string() })
}

fn cake_summary(cake: &StubCake) -> Value {
    json!({
        "cake_id": cake.id,
        "name": cake.name,
        "slug": cake.name.to_lowercase().replace(' ', "-"),
        "price": cake.price,
        "currency": "INR",
        "category": cake.category,
        "is_available": cake.stock > 0,
    })
}

fn line_json(cart_id: &str, line: &StubLine) -> Value {
    let name = CATALOG
        .iter()
        .find(|c| c.id == line.cake_id)
        .map(|c| c.name);
    json!({
        "cart_item_id": format!("{cart_id}-{}", line.cake_id),
        "cake_id": line.cake_id,
        "name": name,
        "quantity": line.quantity,
        "price_each": line.price_each,
        "line_total": line.price_each * f64::from(line.quantity),
    })
}

fn totals_json(items: &[StubLine]) -> (f64, Value) {
    let subtotal: f64 = items
        .iter()
        .map(|l| l.price_each * f64::from(l.quantity))
        .sum();
    let taxes = (subtotal * TAX_RATE * 100.0).round() / 100.0;
    let shipping = if items.is_empty() { 0.0 } else { SHIPPING };
    let total = subtotal + taxes + shipping;
    (
        total,
        json!({ "subtotal": subtotal, "taxes": taxes, "shipping": shipping, "total": total }),
    )
}

fn cart_json(cart: &StubCart) -> Value {
    let (_, totals) = totals_json(&cart.items);
    json!({
        "cart_id": cart.cart_id,
        "customer_id": cart.customer_id,
        "cart_token": cart.cart_token,
        "items": cart.items.iter().map(|l| line_json(&cart.cart_id, l)).collect::<Vec<_>>(),
        "totals": totals,
        "updated_at": TIMESTAMP,
        "request": request_meta(),
    })
}

fn order_summary_json(order: &StubOrder) -> Value {
    let (total, _) = totals_json(&order.items);
    json!({
        "order_id": order.order_id,
        "status": order.status,
        "order_total": total,
        "currency": "INR",
        "created_at": TIMESTAMP,
        "payment_status": order.payment_status,
        "items": order.items.iter().map(|l| line_json(&order.order_id, l)).collect::<Vec<_>>(),
        "reservation_expires_at": null,
        "inventory_released": order.status == "cancelled",
    })
}

fn order_detail_json(order: &StubOrder) -> Value {
    let (_, totals) = totals_json(&order.items);
    let mut detail = order_summary_json(order);
    if let Value::Object(map) = &mut detail {
        let paid = order.payment_status == "paid";
        map.insert("customer_id".into(), json!(order.customer_id));
        map.insert("totals".into(), totals);
        map.insert(
            "payment_id".into(),
            json!(paid.then(|| format!("payment-{}", order.order_id))),
        );
        map.insert("provider_order_id".into(), json!(order.provider_order_id));
        map.insert(
            "provider_payment_id".into(),
            json!(paid.then(|| format!("pay_{}", order.order_id))),
        );
        map.insert("idempotency_key".into(), json!(order.idempotency_key));
        map.insert("updated_at".into(), json!(TIMESTAMP));
        map.insert("is_test".into(), json!(order.is_test));
        map.insert("payment_is_test".into(), json!(order.is_test));
    }
    detail
}

async fn list_cakes(State(shared): Shared, headers: HeaderMap) -> Response {
    let mut state = state(&shared);
    record(&mut state, "/cakes", &headers);
    state.catalog_requests += 1;

    let cakes: Vec<Value> = CATALOG.iter().map(cake_summary).collect();
    Json(json!({
        "cakes": cakes,
        "total_count": CATALOG.len(),
        "request": request_meta(),
    }))
    .into_response()
}

async fn get_cake(State(shared): Shared, Path(id): Path<String>, headers: HeaderMap) -> Response {
    let mut state = state(&shared);
    record(&mut state, &format!("/cakes/{id}"), &headers);
    state.catalog_requests += 1;

    let Some(cake) = CATALOG.iter().find(|c| c.id == id) else {
        return error(StatusCode::NOT_FOUND, json!("Cake not found"));
    };

    let mut detail = cake_summary(cake);
    if let Value::Object(map) = &mut detail {
        map.insert("description".into(), json!(format!("A {} cake", cake.category)));
        map.insert("image_url".into(), json!(format!("https://cdn.example.com/{}.jpg", cake.id)));
        map.insert("stock_quantity".into(), json!(cake.stock));
        map.insert("created_at".into(), json!(TIMESTAMP));
        map.insert("updated_at".into(), json!(TIMESTAMP));
    }
    Json(json!({ "cake": detail, "request": request_meta() })).into_response()
}

#[derive(Debug, Deserialize)]
struct CartBody {
    #[serde(default)]
    customer_id: Option<String>,
    #[serde(default)]
    cart_token: Option<String>,
    items: Vec<CartLineBody>,
}

#[derive(Debug, Deserialize)]
struct CartLineBody {
    cake_id: String,
    quantity: u32,
    price_each: f64,
}

async fn upsert_cart(State(shared): Shared, headers: HeaderMap, Json(body): Json<CartBody>) -> Response {
    let mut state = state(&shared);
    record(&mut state, "/cart", &headers);

    let mut items = Vec::with_capacity(body.items.len());
    for line in body.items {
        if line.quantity == 0 {
            continue;
        }
        // The service reprices from its own catalog.
        let Some(cake) = CATALOG.iter().find(|c| c.id == line.cake_id) else {
            return error(
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "message": format!("Unknown cake {}", line.cake_id), "code": "unknown_cake" }),
            );
        };
        if line.price_each < 0.0 {
            return error(
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "message": "Price must not be negative", "code": "invalid_price" }),
            );
        }
        items.push(StubLine {
            cake_id: line.cake_id,
            quantity: line.quantity,
            price_each: cake.price,
        });
    }

    let existing = body
        .cart_token
        .as_deref()
        .and_then(|token| state.carts.values().find(|c| c.cart_token == token))
        .map(|c| c.cart_id.clone());

    let cart_id = existing.unwrap_or_else(|| format!("cart-{}", state.carts.len() + 1));
    let cart = StubCart {
        cart_token: body
            .cart_token
            .unwrap_or_else(|| format!("token-{cart_id}")),
        cart_id: cart_id.clone(),
        customer_id: body.customer_id,
        items,
    };
    let response = cart_json(&cart);
    state.carts.insert(cart_id, cart);
    Json(response).into_response()
}

async fn get_cart(
    State(shared): Shared,
    Path(reference): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = state(&shared);
    record(&mut state, &format!("/cart/{reference}"), &headers);

    let found = state.carts.values().find(|c| {
        c.cart_id == reference
            || c.cart_token == reference
            || c.customer_id.as_deref() == Some(reference.as_str())
    });
    match found {
        Some(cart) => Json(cart_json(cart)).into_response(),
        None => error(StatusCode::NOT_FOUND, json!("Cart not found")),
    }
}

async fn delete_cart(
    State(shared): Shared,
    Path(cart_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = state(&shared);
    record(&mut state, &format!("/cart/{cart_id}"), &headers);

    match state.carts.remove(&cart_id) {
        Some(_) => Json(json!({ "cart_id": cart_id, "deleted": true, "request": request_meta() }))
            .into_response(),
        None => error(StatusCode::NOT_FOUND, json!("Cart not found")),
    }
}

#[derive(Debug, Deserialize)]
struct OrderBody {
    idempotency_key: String,
    #[serde(default)]
    cart_id: Option<String>,
    #[serde(default)]
    customer_id: Option<String>,
    #[serde(default)]
    is_test: Option<bool>,
}

async fn create_order(
    State(shared): Shared,
    headers: HeaderMap,
    Json(body): Json<OrderBody>,
) -> Response {
    let mut state = state(&shared);
    record(&mut state, "/orders", &headers);
    state.create_requests += 1;

    let key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| body.idempotency_key.clone(), String::from);

    if let Some(order) = state.orders.iter().find(|o| o.idempotency_key == key) {
        return Json(json!({
            "order": order_detail_json(order),
            "provider_order_id": order.provider_order_id,
            "request": request_meta(),
        }))
        .into_response();
    }

    let Some(cart) = body.cart_id.as_deref().and_then(|id| state.carts.get(id)) else {
        return error(
            StatusCode::BAD_REQUEST,
            json!({ "message": "Cart not found", "code": "cart_not_found" }),
        );
    };
    if cart.items.is_empty() {
        return error(
            StatusCode::BAD_REQUEST,
            json!({ "message": "Cart is empty", "code": "empty_cart" }),
        );
    }

    let number = state.orders.len() + 1;
    let order = StubOrder {
        order_id: format!("order-{number}"),
        // Empty while gateway order creation is switched off
        provider_order_id: if state.omit_provider_order {
            String::new()
        } else {
            format!("order_rzp_{number}")
        },
        idempotency_key: key,
        customer_id: body.customer_id.or_else(|| cart.customer_id.clone()),
        items: cart.items.clone(),
        status: "created",
        payment_status: "pending",
        is_test: body.is_test.unwrap_or(false),
    };
    let response = json!({
        "order": order_detail_json(&order),
        "provider_order_id": order.provider_order_id,
        "request": request_meta(),
    });
    state.orders.push(order);
    Json(response).into_response()
}

async fn lookup_orders(
    State(shared): Shared,
    Path(identifier): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = state(&shared);
    record(&mut state, &format!("/orders/{identifier}"), &headers);

    if state.fail_order_fetch {
        return error(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "message": "Order service unavailable", "code": "unavailable" }),
        );
    }

    if let Some(order) = state.orders.iter().find(|o| o.order_id == identifier) {
        return Json(json!({ "order": order_detail_json(order), "request": request_meta() }))
            .into_response();
    }

    let orders: Vec<Value> = state
        .orders
        .iter()
        .rev()
        .filter(|o| o.customer_id.as_deref() == Some(identifier.as_str()))
        .map(order_summary_json)
        .collect();
    if orders.is_empty() {
        return error(StatusCode::NOT_FOUND, json!("Order not found"));
    }
    Json(json!({ "orders": orders, "request": request_meta() })).into_response()
}

async fn cancel_order(State(shared): Shared, Path(id): Path<String>, headers: HeaderMap) -> Response {
    let mut state = state(&shared);
    record(&mut state, &format!("/orders/{id}/cancel"), &headers);

    let Some(order) = state.orders.iter_mut().find(|o| o.order_id == id) else {
        return error(StatusCode::NOT_FOUND, json!("Order not found"));
    };
    if order.payment_status == "paid" {
        return error(
            StatusCode::CONFLICT,
            json!({ "message": "Paid orders cannot be cancelled", "code": "order_paid" }),
        );
    }
    order.status = "cancelled";
    order.payment_status = "cancelled";
    Json(json!({ "order": order_detail_json(order), "request": request_meta() })).into_response()
}

#[derive(Debug, Deserialize)]
struct ConfirmBody {
    username: String,
    code: String,
}

async fn confirm_sign_up(
    State(shared): Shared,
    headers: HeaderMap,
    Json(body): Json<ConfirmBody>,
) -> Response {
    let mut state = state(&shared);
    record(&mut state, "/auth/confirm", &headers);

    if body.username.is_empty() || body.code != CONFIRMATION_CODE {
        return error(StatusCode::BAD_REQUEST, json!("Invalid verification code"));
    }
    Json(json!({ "message": "Account confirmed successfully" })).into_response()
}

// =============================================================================
// Stub identity provider
// =============================================================================

async fn discovery(State(shared): Shared) -> Response {
    let mut state = state(&shared);
    state.idp.discovery_requests += 1;
    let issuer = state.idp.issuer.clone();

    let mut document = json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{issuer}authorize"),
        "token_endpoint": format!("{issuer}token"),
    });
    if !state.idp.omit_end_session
        && let Value::Object(map) = &mut document
    {
        map.insert("end_session_endpoint".into(), json!(format!("{issuer}logout")));
    }
    Json(document).into_response()
}

fn token_error(error: &str, description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": error, "error_description": description })),
    )
        .into_response()
}

fn form_field<'a>(form: &'a HashMap<String, String>, name: &str) -> &'a str {
    form.get(name).map_or("", String::as_str)
}

/// Unsigned JWT carrying `claims`.
fn unsigned_jwt(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.")
}

async fn token(State(shared): Shared, Form(form): Form<HashMap<String, String>>) -> Response {
    let mut state = state(&shared);
    state.idp.token_requests.push(form.clone());

    if form.get("client_id").map(String::as_str) != Some(CLIENT_ID) {
        return token_error("invalid_client", "Unknown client");
    }

    let nonce = match form_field(&form, "grant_type") {
        "authorization_code" => {
            let Some(issued) = state.idp.codes.remove(form_field(&form, "code")) else {
                return token_error("invalid_grant", "Authorization code is invalid or expired");
            };
            if issued.redirect_uri != form_field(&form, "redirect_uri") {
                return token_error("invalid_grant", "Redirect URI does not match");
            }
            if pkce_challenge(form_field(&form, "code_verifier")) != issued.code_challenge {
                return token_error("invalid_grant", "PKCE verification failed");
            }
            Some(issued.nonce)
        }
        "refresh_token" => {
            if !state.idp.refresh_tokens.iter().any(|t| t == form_field(&form, "refresh_token")) {
                return token_error("invalid_grant", "Refresh token is invalid");
            }
            None
        }
        other => {
            return token_error(
                "unsupported_grant_type",
                &format!("Grant type {other:?} is not supported"),
            );
        }
    };

    state.idp.issued += 1;
    let number = state.idp.issued;
    let access_token = if state.idp.empty_access_token {
        String::new()
    } else {
        format!("idp-access-{number}")
    };

    let mut body = json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
    });
    if let (Some(nonce), Value::Object(map)) = (nonce, &mut body) {
        let refresh_token = format!("idp-refresh-{number}");
        state.idp.refresh_tokens.push(refresh_token.clone());
        map.insert("refresh_token".into(), json!(refresh_token));
        map.insert(
            "id_token".into(),
            json!(unsigned_jwt(&json!({
                "sub": SUBJECT,
                "email": "asha@example.com",
                "email_verified": "true",
                "name": "Asha",
                "nonce": nonce,
            }))),
        );
    }
    Json(body).into_response()
}

// =============================================================================
// Payment widget stand-in
// =============================================================================

/// Completes every payment with a fixed id, optionally marking the order
/// paid on the stub service first.
pub struct AutoPayGateway {
    service: Option<StubService>,
    requests: Mutex<Vec<PaymentRequest>>,
    outcome: Option<PaymentOutcome>,
}

impl AutoPayGateway {
    /// Pay and settle the order on `service`.
    #[must_use]
    pub const fn settling(service: StubService) -> Self {
        Self {
            service: Some(service),
            requests: Mutex::new(Vec::new()),
            outcome: None,
        }
    }

    /// Always answer with `outcome`.
    #[must_use]
    pub const fn answering(outcome: PaymentOutcome) -> Self {
        Self {
            service: None,
            requests: Mutex::new(Vec::new()),
            outcome: Some(outcome),
        }
    }

    /// Requests the widget was opened with.
    #[must_use]
    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PaymentGateway for AutoPayGateway {
    async fn open(&self, request: PaymentRequest) -> PaymentOutcome {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }

        let order_id = request
            .notes
            .get("order_id")
            .cloned()
            .unwrap_or_default();
        if let Some(service) = &self.service {
            service.settle(&order_id);
        }
        PaymentOutcome::Completed(PaymentConfirmation {
            payment_id: format!("pay_{order_id}"),
            provider_order_id: Some(request.order_id),
            signature: Some("signature".to_string()),
        })
    }
}

/// Payment settings used by the tests.
#[must_use]
pub fn payment_config() -> PaymentConfig {
    PaymentConfig {
        key_id: "rzp_test_key".to_string(),
        test_mode: true,
        merchant_name: "Bakehouse".to_string(),
    }
}
