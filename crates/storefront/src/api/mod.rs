//! HTTP client for the RedSeam commerce API.
//!
//! Wraps `reqwest` with the API's conventions: bearer-token auth, JSON
//! bodies, and error bodies that may or may not be JSON. Product details are
//! cached using `moka`.

pub mod types;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use redseam_core::{CartLineKey, ProductId};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use crate::catalog::{ProductPage, ProductQuery};
use crate::config::ApiConfig;
use crate::error::{
    ACCESS_DENIED_MESSAGE, AUTH_REQUIRED_MESSAGE, ApiError, Result, SERVER_ERROR_MESSAGE,
};
use crate::forms::{CheckoutForm, FormErrors, SignInForm, SignUpForm, fields};

use types::{
    CartLine, CartLineRequest, CartResponse, LoginRequest, LoginResponse, Product,
    ProductListResponse, VariantSelector,
};

/// Shown when checkout is answered with a redirect.
pub const CHECKOUT_REDIRECT_MESSAGE: &str =
    "API endpoint configuration issue. Please contact support.";

const PRODUCT_CACHE_CAPACITY: u64 = 1000;

/// Fields a product detail payload must carry.
const REQUIRED_PRODUCT_FIELDS: [&str; 3] = ["id", "name", "price"];

/// Server keys mapped onto sign-in form fields for 422 responses.
const SIGN_IN_SERVER_FIELDS: &[(&str, &str)] =
    &[("email", fields::EMAIL), ("password", fields::PASSWORD)];

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the commerce API.
///
/// Cheap to clone; clones share the connection pool and product cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    cart_timeout: Option<Duration>,
    products: Cache<ProductId, Arc<Product>>,
}

impl ApiClient {
    /// Create a client for the configured API.
    ///
    /// Redirects are not followed so that a redirected checkout can be
    /// reported as a configuration problem.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let products = Cache::builder()
            .max_capacity(PRODUCT_CACHE_CAPACITY)
            .time_to_live(config.product_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
                request_timeout: config.request_timeout,
                cart_timeout: config.cart_timeout,
                products,
            }),
        })
    }

    /// Absolute URL for an API path such as `/cart`.
    fn url(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{path}", self.inner.base_url))?)
    }

    /// Request with the cart timeout (if any) and bearer auth.
    fn cart_request(&self, builder: RequestBuilder, token: &SecretString) -> RequestBuilder {
        let builder = builder
            .bearer_auth(token.expose_secret())
            .header(ACCEPT, "application/json");
        match self.inner.cart_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    // =========================================================================
    // Cart Methods
    // =========================================================================

    /// Fetch every line of the remote cart.
    ///
    /// # Errors
    ///
    /// Returns an error on any non-2xx status or an unreadable body.
    #[instrument(skip_all)]
    pub async fn get_cart(&self, token: &SecretString) -> Result<Vec<CartLine>> {
        let request = self.inner.client.get(self.url("/cart")?);
        let response = self.cart_request(request, token).send().await?;
        let response = ensure_success(response).await?;

        let body = response.text().await?;
        match serde_json::from_str::<CartResponse>(&body) {
            Ok(cart) => Ok(cart.into_lines()),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %truncate(&body, 500),
                    "Failed to parse cart response"
                );
                Err(ApiError::Validation(format!("Invalid cart response: {e}")))
            }
        }
    }

    /// Add `quantity` units of a product variant to the remote cart.
    ///
    /// # Errors
    ///
    /// Returns an error on any non-2xx status.
    #[instrument(skip(self, token), fields(key = %key))]
    pub async fn add_cart_product(
        &self,
        token: &SecretString,
        key: &CartLineKey,
        quantity: u32,
    ) -> Result<()> {
        let url = self.url(&format!("/cart/products/{}", key.product_id))?;
        let request = self
            .inner
            .client
            .post(url)
            .json(&CartLineRequest::for_key(key, quantity));
        let response = self.cart_request(request, token).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Set the quantity of an existing cart line.
    ///
    /// # Errors
    ///
    /// Returns an error on any non-2xx status.
    #[instrument(skip(self, token), fields(key = %key))]
    pub async fn update_cart_product(
        &self,
        token: &SecretString,
        key: &CartLineKey,
        quantity: u32,
    ) -> Result<()> {
        let url = self.url(&format!("/cart/products/{}", key.product_id))?;
        let request = self
            .inner
            .client
            .patch(url)
            .json(&CartLineRequest::for_key(key, quantity));
        let response = self.cart_request(request, token).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Remove one variant line from the remote cart.
    ///
    /// The variant travels in the JSON body; the path only names the product.
    ///
    /// # Errors
    ///
    /// Returns an error on any non-2xx status.
    #[instrument(skip(self, token), fields(key = %key))]
    pub async fn remove_cart_product(&self, token: &SecretString, key: &CartLineKey) -> Result<()> {
        let url = self.url(&format!("/cart/products/{}", key.product_id))?;
        let request = self
            .inner
            .client
            .delete(url)
            .json(&VariantSelector::from(key));
        let response = self.cart_request(request, token).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Place the order for the current remote cart.
    ///
    /// Only `200 OK` counts as success.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] carrying the server's message, or a
    /// configuration message for redirects.
    #[instrument(skip_all)]
    pub async fn checkout(&self, token: &SecretString, form: &CheckoutForm) -> Result<()> {
        let request = self
            .inner
            .client
            .post(self.url("/cart/checkout")?)
            .json(&form.to_request());
        let response = self.cart_request(request, token).send().await?;
        let status = response.status();

        match status {
            StatusCode::OK => Ok(()),
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::TEMPORARY_REDIRECT => {
                tracing::error!(status = %status, "Checkout endpoint answered with a redirect");
                Err(ApiError::Network {
                    status: status.as_u16(),
                    message: CHECKOUT_REDIRECT_MESSAGE.to_string(),
                })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                let message = server_message(&body).unwrap_or_else(|| {
                    format!("Checkout failed ({}). Please try again.", status.as_u16())
                });
                Err(ApiError::Network {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    /// Fetch one page of the product listing.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] on 401, or another error on any other
    /// non-2xx status or an unreadable body.
    #[instrument(skip(self, token))]
    pub async fn list_products(
        &self,
        token: Option<&SecretString>,
        query: &ProductQuery,
    ) -> Result<ProductPage> {
        let mut url = self.url("/products")?;
        url.query_pairs_mut()
            .extend_pairs(query.api_query_pairs().iter().map(|(k, v)| (*k, v.as_str())));

        let mut request = self
            .inner
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .timeout(self.inner.request_timeout);
        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = ensure_success(request.send().await?).await?;
        let body = response.text().await?;
        let listing: ProductListResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&body, 500),
                "Failed to parse product listing"
            );
            ApiError::Validation(format!("Invalid product listing: {e}"))
        })?;

        let last_page = listing.meta.last_page.unwrap_or(1).max(1);
        Ok(ProductPage {
            products: listing.data,
            current_page: listing
                .meta
                .current_page
                .unwrap_or(query.page)
                .clamp(1, last_page),
            last_page,
            total: listing.meta.total.unwrap_or(0),
        })
    }

    /// Fetch a product's full details. `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] when the payload lacks required
    /// fields, or another error on a non-2xx status other than 404.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        if let Some(product) = self.inner.products.get(&id).await {
            debug!("Cache hit for product");
            return Ok(Some(Product::clone(&product)));
        }

        let request = self
            .inner
            .client
            .get(self.url(&format!("/products/{id}"))?)
            .header(ACCEPT, "application/json")
            .timeout(self.inner.request_timeout);
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;

        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| ApiError::Validation(format!("Invalid product response: {e}")))?;
        let product = parse_product(value)?;

        self.inner
            .products
            .insert(id, Arc::new(product.clone()))
            .await;

        Ok(Some(product))
    }

    /// Drop every cached product detail.
    pub fn invalidate_product_cache(&self) {
        self.inner.products.invalidate_all();
    }

    // =========================================================================
    // Account Methods
    // =========================================================================

    /// Exchange credentials for a bearer token and profile.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Form`] for a 422 carrying field errors and
    /// [`ApiError::InvalidCredentials`] for every other rejection.
    #[instrument(skip_all, fields(email = %form.email))]
    pub async fn login(&self, form: &SignInForm) -> Result<LoginResponse> {
        let response = self
            .inner
            .client
            .post(self.url("/login")?)
            .header(ACCEPT, "application/json")
            .timeout(self.inner.request_timeout)
            .json(&LoginRequest {
                email: &form.email,
                password: form.password.expose_secret(),
            })
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            return serde_json::from_str(&body)
                .map_err(|_| ApiError::Validation("Invalid server response".to_string()));
        }

        if status == StatusCode::UNPROCESSABLE_ENTITY
            && let Some(errors) = json_field(&body, "errors")
        {
            let form_errors = FormErrors::from_server(&errors, SIGN_IN_SERVER_FIELDS);
            if !form_errors.is_empty() {
                return Err(ApiError::Form(form_errors));
            }
        }

        tracing::warn!(status = %status, "Sign-in rejected");
        Err(ApiError::InvalidCredentials)
    }

    /// Create an account with a multipart form (avatar optional).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Form`] for 422 field errors, [`ApiError::Conflict`]
    /// for 409, and [`ApiError::Network`] carrying a user-facing message for
    /// other rejections.
    #[instrument(skip_all, fields(username = %form.username))]
    pub async fn register(&self, form: &SignUpForm) -> Result<()> {
        let mut multipart = Form::new()
            .text("username", form.username.trim().to_string())
            .text("email", form.email.trim().to_string())
            .text("password", form.password.expose_secret().to_string())
            .text(
                "password_confirmation",
                form.confirm_password.expose_secret().to_string(),
            );
        if let Some(avatar) = &form.avatar {
            let part = Part::bytes(avatar.bytes.clone())
                .file_name(avatar.file_name.clone())
                .mime_str(&avatar.mime_type)?;
            multipart = multipart.part("avatar", part);
        }

        let response = self
            .inner
            .client
            .post(self.url("/register")?)
            .header(ACCEPT, "application/json")
            .timeout(self.inner.request_timeout)
            .multipart(multipart)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        let text = response.text().await.unwrap_or_default();
        let body: Value = if is_json {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        } else {
            serde_json::json!({ "message": text })
        };
        let message = message_of(&body);

        tracing::warn!(status = %status, "Sign-up rejected");
        let code = status.as_u16();
        match code {
            422 => {
                let form_errors = body
                    .get("data")
                    .map(|data| FormErrors::from_server(data, SignUpForm::SERVER_FIELDS))
                    .unwrap_or_default();
                if form_errors.is_empty() {
                    Err(ApiError::Validation(message.unwrap_or_else(|| {
                        "Validation failed. Please check your inputs.".to_string()
                    })))
                } else {
                    Err(ApiError::Form(form_errors))
                }
            }
            409 => Err(ApiError::Conflict),
            400 => Err(ApiError::Network {
                status: code,
                message: message.unwrap_or_else(|| {
                    "Invalid registration data. Please check your inputs.".to_string()
                }),
            }),
            401 => Err(ApiError::Auth {
                status: code,
                message: "Unauthorized. Please try again.".to_string(),
            }),
            c if c >= 500 => Err(ApiError::Network {
                status: code,
                message: SERVER_ERROR_MESSAGE.to_string(),
            }),
            _ => Err(ApiError::Network {
                status: code,
                message: message
                    .unwrap_or_else(|| "Registration failed. Please try again.".to_string()),
            }),
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Response helpers
// =============================================================================

/// Pass 2xx responses through; turn anything else into an [`ApiError`].
///
/// 401/403 become [`ApiError::Auth`], 5xx a generic server error, and other
/// statuses carry the body's `message`/`error` or `HTTP {code}: {reason}`.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(
        status = %status,
        body = %truncate(&body, 500),
        "Commerce API returned non-success status"
    );

    let code = status.as_u16();
    Err(match status {
        StatusCode::UNAUTHORIZED => ApiError::Auth {
            status: code,
            message: AUTH_REQUIRED_MESSAGE.to_string(),
        },
        StatusCode::FORBIDDEN => ApiError::Auth {
            status: code,
            message: ACCESS_DENIED_MESSAGE.to_string(),
        },
        s if s.is_server_error() => ApiError::Network {
            status: code,
            message: SERVER_ERROR_MESSAGE.to_string(),
        },
        _ => ApiError::Network {
            status: code,
            message: server_message(&body).unwrap_or_else(|| {
                format!("HTTP {code}: {}", status.canonical_reason().unwrap_or_default())
            }),
        },
    })
}

/// `message` or `error` from a JSON error body.
fn server_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| message_of(&value))
}

fn message_of(value: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|key| value.get(key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn json_field(body: &str, field: &str) -> Option<Value> {
    let mut value: Value = serde_json::from_str(body).ok()?;
    value.get_mut(field).map(Value::take)
}

/// Validate and normalize a product detail payload.
///
/// Required fields must be present and truthy; list fields that are missing
/// or not arrays become empty, and a missing cover falls back to the first
/// image.
fn parse_product(mut value: Value) -> Result<Product> {
    let missing: Vec<&str> = REQUIRED_PRODUCT_FIELDS
        .into_iter()
        .filter(|field| !value.get(field).is_some_and(is_truthy))
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::Validation(format!(
            "Product data is incomplete: missing {}",
            missing.join(", ")
        )));
    }

    let Some(object) = value.as_object_mut() else {
        return Err(ApiError::Validation("Invalid product response".to_string()));
    };
    for field in ["images", "available_colors", "available_sizes"] {
        if !object.get(field).is_some_and(Value::is_array) {
            object.insert(field.to_string(), Value::Array(Vec::new()));
        }
    }
    if !object.get("brand").is_some_and(Value::is_object) {
        object.remove("brand");
    }
    for field in ["description", "release_year", "cover_image"] {
        if !object.get(field).is_some_and(Value::is_string) {
            object.remove(field);
        }
    }

    let mut product: Product = serde_json::from_value(value)
        .map_err(|e| ApiError::Validation(format!("Invalid product response: {e}")))?;
    if product.cover_image.is_empty()
        && let Some(first) = product.images.first()
    {
        product.cover_image = first.clone();
    }
    Ok(product)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
