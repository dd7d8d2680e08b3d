//! Request and response payloads for the commerce API.

use redseam_core::{BrandId, CartLineKey, Price, ProductId, UserId};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Cart
// =============================================================================

/// One line of the remote cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Catalog product id (`id` on the wire).
    #[serde(rename = "id")]
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub size: Option<String>,
    pub quantity: u32,
}

impl CartLine {
    /// Composite identity of this line.
    #[must_use]
    pub fn key(&self) -> CartLineKey {
        CartLineKey::new(self.product_id, self.color.as_deref(), self.size.as_deref())
    }

    /// `price × quantity`, or `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Price> {
        self.price.times(self.quantity)
    }
}

/// `GET /cart` answers with either a bare array or `{ "items": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CartResponse {
    Lines(Vec<CartLine>),
    Wrapped {
        #[serde(default)]
        items: Vec<CartLine>,
    },
}

impl CartResponse {
    pub(crate) fn into_lines(self) -> Vec<CartLine> {
        match self {
            Self::Lines(lines) | Self::Wrapped { items: lines } => lines,
        }
    }
}

/// Body for add and update. Variant fields are omitted when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLineRequest {
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl CartLineRequest {
    #[must_use]
    pub fn for_key(key: &CartLineKey, quantity: u32) -> Self {
        Self {
            quantity,
            color: key.color.clone(),
            size: key.size.clone(),
        }
    }
}

/// Body for `DELETE /cart/products/{id}` naming the variant to remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantSelector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl From<&CartLineKey> for VariantSelector {
    fn from(key: &CartLineKey) -> Self {
        Self {
            color: key.color.clone(),
            size: key.size.clone(),
        }
    }
}

/// Body for `POST /cart/checkout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub address: String,
    pub zip_code: String,
}

// =============================================================================
// Catalog
// =============================================================================

/// Product as it appears in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub cover_image: String,
}

/// Listing pagination metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingMeta {
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub last_page: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// `GET /products` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductListResponse {
    #[serde(default)]
    pub data: Vec<ProductSummary>,
    #[serde(default)]
    pub meta: ListingMeta,
}

/// Product brand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
    #[serde(default)]
    pub image: String,
}

/// Full product detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub release_year: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub price: Price,
    #[serde(default)]
    pub available_colors: Vec<String>,
    #[serde(default)]
    pub available_sizes: Vec<String>,
    #[serde(default)]
    pub brand: Option<Brand>,
}

// =============================================================================
// Accounts
// =============================================================================

/// Signed-in user profile, as returned by `POST /login`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.id.map(UserId::new)
    }
}

/// `POST /login` success body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// `POST /login` request body.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
