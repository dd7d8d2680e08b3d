//! Integration tests for the RedSeam storefront client.
//!
//! [`FakeApi`] is an in-process stand-in for the commerce API, served by
//! axum on an ephemeral localhost port. It keeps a real cart, records every
//! request it receives, and can be told to slow down or fail specific calls.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p redseam-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_sync` - Cart store behavior against the remote cart
//! - `catalog` - Product listing and detail
//! - `accounts` - Sign-in, sign-up and sign-out
//! - `checkout` - Order placement

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{AUTHORIZATION, LOCATION};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use redseam_storefront::config::StorefrontConfig;
use redseam_storefront::{ApiClient, CartStore, SessionCookies};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

/// Bearer token the fake accepts.
pub const TEST_TOKEN: &str = "test-token";

/// Credentials the fake accepts at `/login`.
pub const TEST_EMAIL: &str = "shopper@example.com";
pub const TEST_PASSWORD: &str = "secret";

/// Username `/register` reports as taken (422).
pub const TAKEN_USERNAME: &str = "taken";

/// Email `/register` reports as a conflict (409).
pub const CONFLICT_EMAIL: &str = "dup@example.com";

/// Products in the listing; product `n` costs `n × 10`.
pub const LISTING_SIZE: i64 = 25;

/// A request as the fake saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
struct FakeLine {
    id: i64,
    color: Option<String>,
    size: Option<String>,
    quantity: u32,
}

impl FakeLine {
    fn matches(&self, id: i64, color: Option<&str>, size: Option<&str>) -> bool {
        self.id == id && self.color.as_deref() == color && self.size.as_deref() == size
    }
}

#[derive(Debug)]
struct FakeState {
    lines: Vec<FakeLine>,
    requests: Vec<RecordedRequest>,
    patch_delays: HashMap<u32, Duration>,
    cart_get_delays: Vec<Duration>,
    cart_status: Option<StatusCode>,
    checkout_status: StatusCode,
    wrap_cart: bool,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            requests: Vec::new(),
            patch_delays: HashMap::new(),
            cart_get_delays: Vec::new(),
            cart_status: None,
            checkout_status: StatusCode::OK,
            wrap_cart: false,
        }
    }
}

type Shared = Arc<Mutex<FakeState>>;

fn lock(state: &Shared) -> std::sync::MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process fake of the commerce API.
pub struct FakeApi {
    addr: SocketAddr,
    state: Shared,
    server: JoinHandle<()>,
}

impl FakeApi {
    /// Bind to `127.0.0.1:0` and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = Shared::default();
        let app = router(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            state,
            server,
        })
    }

    /// API base URL, e.g. `http://127.0.0.1:41234/api`.
    ///
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/api", self.addr)).unwrap()
    }

    /// Storefront configuration pointed at this fake.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        StorefrontConfig::with_base_url(self.base_url())
    }

    /// API client for this fake.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.config().api).unwrap()
    }

    /// Cart store for this fake using `session`.
    #[must_use]
    pub fn cart(&self, session: &SessionCookies) -> CartStore {
        CartStore::new(self.client(), session.clone(), self.config().delivery_fee)
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        lock(&self.state).requests.len()
    }

    /// Delay `PATCH` responses that set `quantity`.
    pub fn delay_patch(&self, quantity: u32, delay: Duration) {
        lock(&self.state).patch_delays.insert(quantity, delay);
    }

    /// Delay upcoming `GET /cart` responses, one entry per request in order.
    pub fn delay_cart_reads(&self, delays: &[Duration]) {
        lock(&self.state).cart_get_delays = delays.to_vec();
    }

    /// Make `GET /cart` answer with `status` (or normally with `None`).
    pub fn fail_cart_reads(&self, status: Option<StatusCode>) {
        lock(&self.state).cart_status = status;
    }

    /// Status `POST /cart/checkout` answers with.
    pub fn set_checkout_status(&self, status: StatusCode) {
        lock(&self.state).checkout_status = status;
    }

    /// Answer `GET /cart` with `{ "items": [...] }` instead of a bare array.
    pub fn wrap_cart_response(&self, wrap: bool) {
        lock(&self.state).wrap_cart = wrap;
    }

    /// Put a line straight into the server cart.
    pub fn seed_line(&self, id: i64, color: Option<&str>, size: Option<&str>, quantity: u32) {
        lock(&self.state).lines.push(FakeLine {
            id,
            color: color.map(str::to_string),
            size: size.map(str::to_string),
            quantity,
        });
    }

    /// Server-side quantity of a line, if present.
    #[must_use]
    pub fn server_quantity(&self, id: i64, color: Option<&str>, size: Option<&str>) -> Option<u32> {
        lock(&self.state)
            .lines
            .iter()
            .find(|line| line.matches(id, color, size))
            .map(|line| line.quantity)
    }

    #[must_use]
    pub fn server_line_count(&self) -> usize {
        lock(&self.state).lines.len()
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Session holding the token the fake accepts.
#[must_use]
pub fn signed_in_session() -> SessionCookies {
    let session = SessionCookies::new();
    session.set_token(TEST_TOKEN);
    session
}

// =============================================================================
// Routes
// =============================================================================

fn router(state: Shared) -> Router {
    let api = Router::new()
        .route("/cart", get(get_cart))
        .route("/cart/checkout", post(checkout))
        .route(
            "/cart/products/{id}",
            post(add_line).patch(update_line).delete(remove_line),
        )
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/login", post(login))
        .route("/register", post(register));

    Router::new().nest("/api", api).with_state(state)
}

fn record(state: &Shared, method: Method, path: String, headers: &HeaderMap, body: Option<Value>) {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    lock(state).requests.push(RecordedRequest {
        method,
        path,
        body,
        authorization,
    });
}

fn is_authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TEST_TOKEN}"))
}

fn unauthenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Unauthenticated." })),
    )
        .into_response()
}

fn json_body(bytes: &Bytes) -> Option<Value> {
    if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(bytes).ok()
    }
}

fn variant(body: Option<&Value>, field: &str) -> Option<String> {
    body.and_then(|b| b.get(field))
        .and_then(Value::as_str)
        .map(str::to_string)
}

// -----------------------------------------------------------------------------
// Catalog data
// -----------------------------------------------------------------------------

fn product_detail(id: i64) -> Option<Value> {
    match id {
        1 => Some(json!({
            "id": 1,
            "name": "Linen Shirt",
            "description": "Breathable summer shirt.",
            "release_year": "2024",
            "cover_image": "https://cdn.example.com/1/cover.png",
            "images": ["https://cdn.example.com/1/red.png", "https://cdn.example.com/1/blue.png"],
            "price": 40,
            "available_colors": ["Red", "Blue"],
            "available_sizes": ["S", "M", "L"],
            "brand": { "id": 3, "name": "Seam Co", "image": "https://cdn.example.com/brand.png" }
        })),
        2 => Some(json!({ "id": 2, "name": "", "price": 0 })),
        7 => Some(json!({
            "id": 7,
            "name": "Cap",
            "price": 15,
            "available_sizes": ["M"],
            "images": null
        })),
        42 => Some(json!({
            "id": 42,
            "name": "Tee",
            "price": 20,
            "cover_image": "https://cdn.example.com/42/cover.png",
            "images": ["https://cdn.example.com/42/red.png", "https://cdn.example.com/42/blue.png"],
            "available_colors": ["Red", "Blue"],
            "available_sizes": ["M", "L"]
        })),
        _ => None,
    }
}

fn line_json(line: &FakeLine) -> Value {
    let detail = product_detail(line.id).unwrap_or(Value::Null);
    let price = detail.get("price").and_then(Value::as_i64).unwrap_or(0);
    json!({
        "id": line.id,
        "name": detail.get("name").cloned().unwrap_or(Value::Null),
        "price": price,
        "cover_image": detail.get("cover_image").cloned().unwrap_or(json!("")),
        "color": line.color,
        "size": line.size,
        "quantity": line.quantity,
        "total_price": price * i64::from(line.quantity),
    })
}

// -----------------------------------------------------------------------------
// Cart handlers
// -----------------------------------------------------------------------------

async fn get_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, Method::GET, "/cart".to_string(), &headers, None);
    if !is_authorized(&headers) {
        return unauthenticated();
    }

    let delay = {
        let mut s = lock(&state);
        if s.cart_get_delays.is_empty() {
            None
        } else {
            Some(s.cart_get_delays.remove(0))
        }
    };
    // Snapshot before sleeping so a delayed read returns what was current
    // when it arrived.
    let (status, lines, wrap) = {
        let s = lock(&state);
        (
            s.cart_status,
            s.lines.iter().map(line_json).collect::<Vec<_>>(),
            s.wrap_cart,
        )
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    if let Some(status) = status {
        return (status, "upstream failure").into_response();
    }
    if wrap {
        Json(json!({ "items": lines })).into_response()
    } else {
        Json(Value::Array(lines)).into_response()
    }
}

async fn add_line(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = json_body(&body);
    record(&state, Method::POST, format!("/cart/products/{id}"), &headers, body.clone());
    if !is_authorized(&headers) {
        return unauthenticated();
    }
    if product_detail(id).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Product not found" })),
        )
            .into_response();
    }
    let quantity = body
        .as_ref()
        .and_then(|b| b.get("quantity"))
        .and_then(Value::as_u64)
        .and_then(|q| u32::try_from(q).ok())
        .unwrap_or(0);
    if quantity == 0 {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": "The quantity field must be at least 1." })),
        )
            .into_response();
    }
    let color = variant(body.as_ref(), "color");
    let size = variant(body.as_ref(), "size");

    let mut s = lock(&state);
    if let Some(line) = s
        .lines
        .iter_mut()
        .find(|line| line.matches(id, color.as_deref(), size.as_deref()))
    {
        line.quantity += quantity;
    } else {
        s.lines.push(FakeLine {
            id,
            color,
            size,
            quantity,
        });
    }
    (StatusCode::CREATED, Json(json!({ "message": "Added" }))).into_response()
}

async fn update_line(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = json_body(&body);
    record(&state, Method::PATCH, format!("/cart/products/{id}"), &headers, body.clone());
    if !is_authorized(&headers) {
        return unauthenticated();
    }
    let quantity = body
        .as_ref()
        .and_then(|b| b.get("quantity"))
        .and_then(Value::as_u64)
        .and_then(|q| u32::try_from(q).ok())
        .unwrap_or(0);
    let color = variant(body.as_ref(), "color");
    let size = variant(body.as_ref(), "size");

    let delay = lock(&state).patch_delays.get(&quantity).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut s = lock(&state);
    match s
        .lines
        .iter_mut()
        .find(|line| line.matches(id, color.as_deref(), size.as_deref()))
    {
        Some(line) => {
            line.quantity = quantity;
            Json(json!({ "message": "Updated" })).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Cart item not found" })),
        )
            .into_response(),
    }
}

async fn remove_line(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = json_body(&body);
    record(&state, Method::DELETE, format!("/cart/products/{id}"), &headers, body.clone());
    if !is_authorized(&headers) {
        return unauthenticated();
    }
    let color = variant(body.as_ref(), "color");
    let size = variant(body.as_ref(), "size");

    let mut s = lock(&state);
    let before = s.lines.len();
    s.lines
        .retain(|line| !line.matches(id, color.as_deref(), size.as_deref()));
    if s.lines.len() == before {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Cart item not found" })),
        )
            .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn checkout(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Response {
    let body = json_body(&body);
    record(&state, Method::POST, "/cart/checkout".to_string(), &headers, body.clone());
    if !is_authorized(&headers) {
        return unauthenticated();
    }

    let status = lock(&state).checkout_status;
    if status.is_redirection() {
        return (status, [(LOCATION, "/api/v2/cart/checkout")]).into_response();
    }
    if status != StatusCode::OK {
        return (
            status,
            Json(json!({ "message": "Payment provider unavailable" })),
        )
            .into_response();
    }

    let missing: Vec<&str> = ["name", "surname", "email", "address", "zip_code"]
        .into_iter()
        .filter(|field| variant(body.as_ref(), field).is_none_or(|v| v.is_empty()))
        .collect();
    if !missing.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": format!("Missing fields: {}", missing.join(", ")) })),
        )
            .into_response();
    }

    lock(&state).lines.clear();
    Json(json!({ "message": "Order placed" })).into_response()
}

// -----------------------------------------------------------------------------
// Catalog handlers
// -----------------------------------------------------------------------------

async fn list_products(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    record(&state, Method::GET, "/products".to_string(), &headers, None);
    if headers.contains_key(AUTHORIZATION) && !is_authorized(&headers) {
        return unauthenticated();
    }

    let number = |key: &str| params.get(key).and_then(|v| v.parse::<i64>().ok());
    let page = number("page").unwrap_or(1).max(1);
    let per_page = number("per_page").unwrap_or(10).max(1);
    let price_from = number("filter[price_from]");
    let price_to = number("filter[price_to]");

    let mut products: Vec<(i64, i64)> = (1..=LISTING_SIZE)
        .map(|id| (id, id * 10))
        .filter(|(_, price)| price_from.is_none_or(|from| *price >= from))
        .filter(|(_, price)| price_to.is_none_or(|to| *price <= to))
        .collect();
    match params.get("sort").map(String::as_str) {
        Some("price") => products.sort_by_key(|(_, price)| *price),
        Some("-price") => products.sort_by_key(|(_, price)| -*price),
        Some("-created_at") => products.sort_by_key(|(id, _)| -*id),
        _ => {}
    }

    let total = i64::try_from(products.len()).unwrap_or(0);
    let last_page = ((total + per_page - 1) / per_page).max(1);
    let data: Vec<Value> = products
        .into_iter()
        .skip(usize::try_from((page - 1) * per_page).unwrap_or(0))
        .take(usize::try_from(per_page).unwrap_or(0))
        .map(|(id, price)| {
            json!({
                "id": id,
                "name": format!("Product {id}"),
                "price": price,
                "cover_image": format!("https://cdn.example.com/{id}/cover.png"),
            })
        })
        .collect();

    Json(json!({
        "data": data,
        "meta": { "current_page": page, "last_page": last_page, "total": total },
    }))
    .into_response()
}

async fn get_product(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    record(&state, Method::GET, format!("/products/{id}"), &headers, None);
    product_detail(id).map_or_else(
        || {
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": "No query results for model [Product]." })),
            )
                .into_response()
        },
        |detail| Json(detail).into_response(),
    )
}

// -----------------------------------------------------------------------------
// Account handlers
// -----------------------------------------------------------------------------

async fn login(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Response {
    let body = json_body(&body);
    let logged = body.as_ref().map(|b| json!({ "email": b.get("email") }));
    record(&state, Method::POST, "/login".to_string(), &headers, logged);

    let email = variant(body.as_ref(), "email").unwrap_or_default();
    let password = variant(body.as_ref(), "password").unwrap_or_default();

    if email == "unverified@example.com" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "Validation failed",
                "errors": { "email": ["Your email address is not verified."] }
            })),
        )
            .into_response();
    }
    if email != TEST_EMAIL || password != TEST_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        )
            .into_response();
    }

    Json(json!({
        "token": TEST_TOKEN,
        "user": {
            "id": 11,
            "username": "shopper",
            "email": TEST_EMAIL,
            "avatar": "https://cdn.example.com/avatars/11.png"
        }
    }))
    .into_response()
}

async fn register(
    State(state): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut fields = serde_json::Map::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if name == "avatar" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let len = field.bytes().await.map_or(0, |b| b.len());
            fields.insert(
                name,
                json!({ "file_name": file_name, "content_type": content_type, "len": len }),
            );
        } else if name.starts_with("password") {
            fields.insert(name, json!("<redacted>"));
        } else {
            let text = field.text().await.unwrap_or_default();
            fields.insert(name, Value::String(text));
        }
    }
    let username = fields
        .get("username")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let email = fields
        .get("email")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    record(
        &state,
        Method::POST,
        "/register".to_string(),
        &headers,
        Some(Value::Object(fields)),
    );

    if username == TAKEN_USERNAME {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "The given data was invalid.",
                "data": {
                    "username": ["The username has already been taken."],
                    "password_confirmation": ["The password confirmation does not match."]
                }
            })),
        )
            .into_response();
    }
    if email == CONFLICT_EMAIL {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "message": "Duplicate account" })),
        )
            .into_response();
    }
    if username == "boom" {
        return (StatusCode::BAD_GATEWAY, "<html>Bad gateway</html>").into_response();
    }

    (
        StatusCode::CREATED,
        Json(json!({ "message": "Registered", "user": { "username": username } })),
    )
        .into_response()
}
