//! Identity of a cart line.
//!
//! A cart can hold several lines for the same product as long as they differ
//! by color or size, so lines are keyed by `(product, color, size)` rather
//! than by product id alone.
//!
//! [`CartLineKey`] is the typed key. Its legacy text form
//! `"{product}-{color}-{size}"`, with `no-color` / `no-size` standing in for
//! an absent variant, is kept for display and for keys that arrive as text
//! (CLI arguments, older clients). The sentinels only live in the text form;
//! a decoded key never carries them as a color or size value.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// Text stand-in for a missing color.
pub const NO_COLOR: &str = "no-color";

/// Text stand-in for a missing size.
pub const NO_SIZE: &str = "no-size";

/// Errors that can occur when decoding a key from its text form.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartKeyError {
    /// The text has no `-` separated product id.
    #[error("malformed cart line key: {0}")]
    Malformed(String),
    /// The leading segment is not an integer product id.
    #[error("invalid product id in cart line key: {0}")]
    InvalidProductId(String),
}

/// Composite identity of a cart line: product plus optional color and size.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CartLineKey {
    /// Catalog product.
    pub product_id: ProductId,
    /// Selected color, if the product has one.
    pub color: Option<String>,
    /// Selected size, if the product has one.
    pub size: Option<String>,
}

impl CartLineKey {
    /// Build a key. Empty variant strings are treated as absent.
    #[must_use]
    pub fn new(product_id: ProductId, color: Option<&str>, size: Option<&str>) -> Self {
        Self {
            product_id,
            color: normalize_variant(color),
            size: normalize_variant(size),
        }
    }

    /// Key text as produced by [`fmt::Display`].
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode the legacy text form.
    ///
    /// The product id runs up to the first `-`. A trailing `-no-size` marks an
    /// absent size; otherwise the size is the text after the last `-`. Whatever
    /// remains is the color (`no-color` marks an absent color), so colors may
    /// themselves contain dashes (`Off-White`) while sizes may not.
    ///
    /// # Errors
    ///
    /// Returns [`CartKeyError`] if the text has fewer than three segments or the
    /// product id is not an integer.
    pub fn decode(s: &str) -> Result<Self, CartKeyError> {
        let malformed = || CartKeyError::Malformed(s.to_owned());

        let (id, rest) = s.split_once('-').ok_or_else(malformed)?;
        let product_id = id
            .parse::<ProductId>()
            .map_err(|_| CartKeyError::InvalidProductId(id.to_owned()))?;

        let (color, size) = match rest.strip_suffix(NO_SIZE) {
            Some(prefix) if prefix.ends_with('-') || prefix.is_empty() => {
                (prefix.strip_suffix('-').ok_or_else(malformed)?, None)
            }
            _ => {
                let (color, size) = rest.rsplit_once('-').ok_or_else(malformed)?;
                (color, Some(size))
            }
        };

        let color = (color != NO_COLOR).then_some(color);
        Ok(Self::new(product_id, color, size))
    }

    /// Whether this key names a line for the given product and variant.
    #[must_use]
    pub fn matches(&self, product_id: ProductId, color: Option<&str>, size: Option<&str>) -> bool {
        self.product_id == product_id
            && self.color.as_deref() == normalize_variant(color).as_deref()
            && self.size.as_deref() == normalize_variant(size).as_deref()
    }
}

fn normalize_variant(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_owned)
}

impl fmt::Display for CartLineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.product_id,
            self.color.as_deref().unwrap_or(NO_COLOR),
            self.size.as_deref().unwrap_or(NO_SIZE)
        )
    }
}

impl FromStr for CartLineKey {
    type Err = CartKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_uses_sentinels_for_missing_variants() {
        let key = CartLineKey::new(ProductId::new(7), None, Some("M"));
        assert_eq!(key.encode(), "7-no-color-M");

        let key = CartLineKey::new(ProductId::new(7), Some("Red"), None);
        assert_eq!(key.encode(), "7-Red-no-size");

        let key = CartLineKey::new(ProductId::new(7), None, None);
        assert_eq!(key.encode(), "7-no-color-no-size");
    }

    #[test]
    fn test_decode_never_leaks_sentinels() {
        let key: CartLineKey = "7-no-color-M".parse().unwrap();
        assert_eq!(key.product_id, ProductId::new(7));
        assert_eq!(key.color, None);
        assert_eq!(key.size.as_deref(), Some("M"));

        let key: CartLineKey = "7-Red-no-size".parse().unwrap();
        assert_eq!(key.color.as_deref(), Some("Red"));
        assert_eq!(key.size, None);

        let key: CartLineKey = "7-no-color-no-size".parse().unwrap();
        assert_eq!(key.color, None);
        assert_eq!(key.size, None);
    }

    #[test]
    fn test_round_trip_through_text() {
        for key in [
            CartLineKey::new(ProductId::new(42), Some("Red"), Some("M")),
            CartLineKey::new(ProductId::new(42), Some("Off-White"), Some("XL")),
            CartLineKey::new(ProductId::new(1), None, Some("S")),
            CartLineKey::new(ProductId::new(1), Some("Blue"), None),
        ] {
            assert_eq!(CartLineKey::decode(&key.encode()).unwrap(), key);
        }
    }

    #[test]
    fn test_empty_variants_are_absent() {
        let key = CartLineKey::new(ProductId::new(3), Some(""), Some(""));
        assert_eq!(key, CartLineKey::new(ProductId::new(3), None, None));
        assert!(key.matches(ProductId::new(3), None, Some("")));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            CartLineKey::decode("42"),
            Err(CartKeyError::Malformed(_))
        ));
        assert!(matches!(
            CartLineKey::decode("42-Red"),
            Err(CartKeyError::Malformed(_))
        ));
        assert!(matches!(
            CartLineKey::decode("abc-Red-M"),
            Err(CartKeyError::InvalidProductId(_))
        ));
    }

    #[test]
    fn test_same_product_different_variant_is_distinct() {
        let red = CartLineKey::new(ProductId::new(42), Some("Red"), Some("M"));
        let blue = CartLineKey::new(ProductId::new(42), Some("Blue"), Some("M"));
        assert_ne!(red, blue);
    }
}
