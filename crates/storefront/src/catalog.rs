//! Product listing queries, pagination and product option selection.
//!
//! A [`ProductQuery`] is what the listing page is showing: page, price range
//! and sort order. It serializes two ways: to the API query string
//! (`filter[price_from]=…`) and to the shorter location query the storefront
//! keeps in its own URL so a listing can be bookmarked and restored.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use redseam_core::{Price, PriceError};
use thiserror::Error;
use url::form_urlencoded;

use crate::api::types::{Product, ProductSummary};

/// Listing page size when none is configured.
pub const DEFAULT_PER_PAGE: u32 = 10;

/// Largest quantity offered by the product page picker.
pub const MAX_SELECTABLE_QUANTITY: u32 = 10;

/// Quantities offered by the product page picker.
pub const QUANTITY_OPTIONS: RangeInclusive<u32> = 1..=MAX_SELECTABLE_QUANTITY;

/// Listing sort orders understood by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    NewestFirst,
    PriceAscending,
    PriceDescending,
}

impl SortOrder {
    pub const ALL: [Self; 3] = [Self::NewestFirst, Self::PriceAscending, Self::PriceDescending];

    /// Value of the API `sort` parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewestFirst => "-created_at",
            Self::PriceAscending => "price",
            Self::PriceDescending => "-price",
        }
    }

    /// Label shown in the sort menu.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NewestFirst => "New products first",
            Self::PriceAscending => "Price, low to high",
            Self::PriceDescending => "Price, high to low",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|order| order.as_str() == s.trim())
            .ok_or_else(|| FilterError::UnknownSort(s.to_string()))
    }
}

/// Invalid listing filter input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("{field}: {source}")]
    Price {
        field: &'static str,
        #[source]
        source: PriceError,
    },
    #[error("Minimum price cannot be greater than maximum price")]
    InvertedRange,
    #[error("Unknown sort order: {0}")]
    UnknownSort(String),
}

/// What a listing page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub page: u32,
    pub per_page: u32,
    pub price_from: Option<Price>,
    pub price_to: Option<Price>,
    pub sort: Option<SortOrder>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            price_from: None,
            price_to: None,
            sort: None,
        }
    }
}

impl ProductQuery {
    /// First page with the given page size.
    #[must_use]
    pub fn new(per_page: u32) -> Self {
        Self {
            per_page: per_page.max(1),
            ..Self::default()
        }
    }

    /// Apply a price filter from raw text inputs; blank inputs clear that
    /// bound. Resets to the first page.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] for negative or non-numeric prices, or when
    /// the lower bound exceeds the upper one.
    pub fn with_price_range(mut self, from: &str, to: &str) -> Result<Self, FilterError> {
        let price_from = parse_bound("price_from", from)?;
        let price_to = parse_bound("price_to", to)?;
        if let (Some(low), Some(high)) = (price_from, price_to)
            && low > high
        {
            return Err(FilterError::InvertedRange);
        }
        self.price_from = price_from;
        self.price_to = price_to;
        self.page = 1;
        Ok(self)
    }

    /// Drop both price bounds. Resets to the first page.
    #[must_use]
    pub const fn without_price_range(mut self) -> Self {
        self.price_from = None;
        self.price_to = None;
        self.page = 1;
        self
    }

    /// Change sort order. Resets to the first page.
    #[must_use]
    pub const fn with_sort(mut self, sort: Option<SortOrder>) -> Self {
        self.sort = sort;
        self.page = 1;
        self
    }

    /// Move to `page` (at least 1).
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    #[must_use]
    pub const fn has_price_filter(&self) -> bool {
        self.price_from.is_some() || self.price_to.is_some()
    }

    /// Parameters for `GET /products`.
    #[must_use]
    pub fn api_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
        ];
        if let Some(from) = self.price_from {
            pairs.push(("filter[price_from]", price_param(from)));
        }
        if let Some(to) = self.price_to {
            pairs.push(("filter[price_to]", price_param(to)));
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.as_str().to_string()));
        }
        pairs
    }

    /// Storefront location query, e.g. `page=2&price_from=10&sort=price`.
    ///
    /// `page` is written only past the first page; empty when nothing is set.
    #[must_use]
    pub fn to_location_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        if self.page > 1 {
            serializer.append_pair("page", &self.page.to_string());
        }
        if let Some(from) = self.price_from {
            serializer.append_pair("price_from", &price_param(from));
        }
        if let Some(to) = self.price_to {
            serializer.append_pair("price_to", &price_param(to));
        }
        if let Some(sort) = self.sort {
            serializer.append_pair("sort", sort.as_str());
        }
        serializer.finish()
    }

    /// Restore from a location query. Missing or unreadable values fall back
    /// to their defaults.
    #[must_use]
    pub fn from_location_query(query: &str, per_page: u32) -> Self {
        let mut out = Self::new(per_page);
        for (name, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match name.as_ref() {
                "page" => out.page = value.parse::<u32>().map_or(1, |p| p.max(1)),
                "price_from" => out.price_from = Price::parse_non_negative(value).ok(),
                "price_to" => out.price_to = Price::parse_non_negative(value).ok(),
                "sort" => out.sort = value.parse().ok(),
                _ => {}
            }
        }
        out
    }
}

fn parse_bound(field: &'static str, raw: &str) -> Result<Option<Price>, FilterError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    Price::parse_non_negative(raw)
        .map(Some)
        .map_err(|source| FilterError::Price { field, source })
}

fn price_param(price: Price) -> String {
    price.amount().normalize().to_string()
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of listing results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPage {
    pub products: Vec<ProductSummary>,
    pub current_page: u32,
    pub last_page: u32,
    pub total: u64,
}

impl ProductPage {
    /// Pagination controls for this page.
    #[must_use]
    pub fn page_numbers(&self) -> Vec<PageItem> {
        page_numbers(self.current_page, self.last_page)
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.current_page < self.last_page
    }
}

/// A pagination control: a page link or a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

impl fmt::Display for PageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(n) => write!(f, "{n}"),
            Self::Ellipsis => f.write_str("..."),
        }
    }
}

/// Pagination window for `current` of `total` pages.
///
/// Up to four pages are all listed. Past that the first and last pages are
/// always shown and the current page sits next to its successor, with gaps
/// marked by [`PageItem::Ellipsis`]. `current` is clamped into `1..=total`.
#[must_use]
pub fn page_numbers(current: u32, total: u32) -> Vec<PageItem> {
    use PageItem::{Ellipsis, Page};

    if total <= 4 {
        return (1..=total).map(Page).collect();
    }
    match current.clamp(1, total) {
        1 => vec![Page(1), Page(2), Ellipsis, Page(total - 1), Page(total)],
        2 => vec![Page(1), Page(2), Page(3), Ellipsis, Page(total)],
        c if c == total => vec![Page(1), Ellipsis, Page(total - 1), Page(total)],
        c if c == total - 1 => vec![
            Page(1),
            Ellipsis,
            Page(total - 2),
            Page(total - 1),
            Page(total),
        ],
        c => vec![Page(1), Ellipsis, Page(c), Page(c + 1), Ellipsis, Page(total)],
    }
}

// =============================================================================
// Product options
// =============================================================================

impl Product {
    /// Image shown before any selection: the cover, else the first image.
    #[must_use]
    pub fn display_image(&self) -> Option<&str> {
        Some(self.cover_image.as_str())
            .filter(|s| !s.is_empty())
            .or_else(|| self.images.first().map(String::as_str))
    }

    /// Image paired with `color` (same index), if any.
    #[must_use]
    pub fn image_for_color(&self, color: &str) -> Option<&str> {
        let index = self.available_colors.iter().position(|c| c == color)?;
        self.images.get(index).map(String::as_str)
    }

    /// Color paired with the image at `index`, if any.
    #[must_use]
    pub fn color_for_image(&self, index: usize) -> Option<&str> {
        self.available_colors.get(index).map(String::as_str)
    }
}

/// Invalid product option selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Color {0} is not available")]
    UnknownColor(String),
    #[error("Size {0} is not available")]
    UnknownSize(String),
    #[error("Quantity must be between 1 and {MAX_SELECTABLE_QUANTITY}")]
    Quantity(u32),
}

/// Color, size, quantity and image chosen on a product page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSelection {
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: u32,
    pub image: Option<String>,
}

impl ProductSelection {
    /// First color, first size, quantity 1.
    #[must_use]
    pub fn defaults(product: &Product) -> Self {
        let color = product.available_colors.first().cloned();
        Self {
            image: product.display_image().map(str::to_string),
            color,
            size: product.available_sizes.first().cloned(),
            quantity: 1,
        }
    }

    /// Choose a color; its paired image becomes the shown image.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::UnknownColor`] if the product lacks `color`.
    pub fn select_color(&mut self, product: &Product, color: &str) -> Result<(), SelectionError> {
        if !product.available_colors.iter().any(|c| c == color) {
            return Err(SelectionError::UnknownColor(color.to_string()));
        }
        if let Some(image) = product.image_for_color(color) {
            self.image = Some(image.to_string());
        }
        self.color = Some(color.to_string());
        Ok(())
    }

    /// Show the image at `index`; its paired color becomes selected.
    pub fn select_image(&mut self, product: &Product, index: usize) {
        if let Some(image) = product.images.get(index) {
            self.image = Some(image.clone());
        }
        if let Some(color) = product.color_for_image(index) {
            self.color = Some(color.to_string());
        }
    }

    /// Choose a size.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::UnknownSize`] if the product lacks `size`.
    pub fn select_size(&mut self, product: &Product, size: &str) -> Result<(), SelectionError> {
        if !product.available_sizes.iter().any(|s| s == size) {
            return Err(SelectionError::UnknownSize(size.to_string()));
        }
        self.size = Some(size.to_string());
        Ok(())
    }

    /// Choose a quantity from [`QUANTITY_OPTIONS`].
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::Quantity`] outside `1..=10`.
    pub fn set_quantity(&mut self, quantity: u32) -> Result<(), SelectionError> {
        if !QUANTITY_OPTIONS.contains(&quantity) {
            return Err(SelectionError::Quantity(quantity));
        }
        self.quantity = quantity;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use redseam_core::ProductId;

    use super::PageItem::{Ellipsis, Page};
    use super::*;

    fn product() -> Product {
        Product {
            id: ProductId::new(42),
            name: "Tee".to_string(),
            description: String::new(),
            release_year: "2024".to_string(),
            cover_image: String::new(),
            images: vec!["red.png".to_string(), "blue.png".to_string()],
            price: Price::from_units(20),
            available_colors: vec!["Red".to_string(), "Blue".to_string(), "Green".to_string()],
            available_sizes: vec!["S".to_string(), "M".to_string()],
            brand: None,
        }
    }

    #[test]
    fn test_page_numbers_small_totals() {
        assert_eq!(page_numbers(1, 0), Vec::<PageItem>::new());
        assert_eq!(page_numbers(1, 1), vec![Page(1)]);
        assert_eq!(
            page_numbers(3, 4),
            vec![Page(1), Page(2), Page(3), Page(4)]
        );
    }

    #[test]
    fn test_page_numbers_windows() {
        assert_eq!(
            page_numbers(1, 10),
            vec![Page(1), Page(2), Ellipsis, Page(9), Page(10)]
        );
        assert_eq!(
            page_numbers(2, 10),
            vec![Page(1), Page(2), Page(3), Ellipsis, Page(10)]
        );
        assert_eq!(
            page_numbers(10, 10),
            vec![Page(1), Ellipsis, Page(9), Page(10)]
        );
        assert_eq!(
            page_numbers(9, 10),
            vec![Page(1), Ellipsis, Page(8), Page(9), Page(10)]
        );
        assert_eq!(
            page_numbers(5, 10),
            vec![Page(1), Ellipsis, Page(5), Page(6), Ellipsis, Page(10)]
        );
    }

    #[test]
    fn test_page_numbers_clamps_current() {
        assert_eq!(
            page_numbers(9, 5),
            vec![Page(1), Ellipsis, Page(4), Page(5)]
        );
        assert_eq!(
            page_numbers(u32::MAX, 5),
            vec![Page(1), Ellipsis, Page(4), Page(5)]
        );
        assert_eq!(
            page_numbers(0, 10),
            vec![Page(1), Page(2), Ellipsis, Page(9), Page(10)]
        );
    }

    #[test]
    fn test_sort_order_round_trip() {
        for order in SortOrder::ALL {
            assert_eq!(order.as_str().parse::<SortOrder>().unwrap(), order);
        }
        assert_eq!(SortOrder::PriceDescending.label(), "Price, high to low");
        assert!("name".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_api_query_pairs() {
        let query = ProductQuery::new(10)
            .with_price_range("10", "")
            .unwrap()
            .with_sort(Some(SortOrder::PriceAscending))
            .with_page(3);
        assert_eq!(
            query.api_query_pairs(),
            vec![
                ("page", "3".to_string()),
                ("per_page", "10".to_string()),
                ("filter[price_from]", "10".to_string()),
                ("sort", "price".to_string()),
            ]
        );
    }

    #[test]
    fn test_price_range_validation() {
        let query = ProductQuery::default();
        assert_eq!(
            query.clone().with_price_range("50", "10").unwrap_err(),
            FilterError::InvertedRange
        );
        assert!(matches!(
            query.clone().with_price_range("-5", ""),
            Err(FilterError::Price { field: "price_from", .. })
        ));
        let query = query.with_page(4).with_price_range("", "").unwrap();
        assert!(!query.has_price_filter());
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_location_query_round_trip() {
        let query = ProductQuery::new(10)
            .with_price_range("10.5", "100")
            .unwrap()
            .with_sort(Some(SortOrder::NewestFirst))
            .with_page(2);
        let location = query.to_location_query();
        assert_eq!(
            location,
            "page=2&price_from=10.5&price_to=100&sort=-created_at"
        );
        assert_eq!(ProductQuery::from_location_query(&location, 10), query);
    }

    #[test]
    fn test_location_query_first_page_omits_page() {
        assert_eq!(ProductQuery::default().to_location_query(), "");
        let restored = ProductQuery::from_location_query("?page=abc&sort=bogus", 10);
        assert_eq!(restored, ProductQuery::default());
    }

    #[test]
    fn test_default_selection() {
        let product = product();
        let selection = ProductSelection::defaults(&product);
        assert_eq!(selection.color.as_deref(), Some("Red"));
        assert_eq!(selection.size.as_deref(), Some("S"));
        assert_eq!(selection.quantity, 1);
        assert_eq!(selection.image.as_deref(), Some("red.png"));
    }

    #[test]
    fn test_color_and_image_are_paired() {
        let product = product();
        let mut selection = ProductSelection::defaults(&product);

        selection.select_color(&product, "Blue").unwrap();
        assert_eq!(selection.image.as_deref(), Some("blue.png"));

        selection.select_color(&product, "Green").unwrap();
        assert_eq!(selection.image.as_deref(), Some("blue.png"));
        assert_eq!(selection.color.as_deref(), Some("Green"));

        selection.select_image(&product, 0);
        assert_eq!(selection.color.as_deref(), Some("Red"));
        assert_eq!(selection.image.as_deref(), Some("red.png"));

        assert!(selection.select_color(&product, "Pink").is_err());
        assert!(selection.select_size(&product, "XL").is_err());
    }

    #[test]
    fn test_quantity_bounds() {
        let mut selection = ProductSelection::defaults(&product());
        assert!(selection.set_quantity(10).is_ok());
        assert_eq!(selection.set_quantity(0), Err(SelectionError::Quantity(0)));
        assert_eq!(selection.set_quantity(11), Err(SelectionError::Quantity(11)));
        assert_eq!(selection.quantity, 10);
    }

    #[test]
    fn test_page_navigation() {
        let page = ProductPage {
            products: vec![],
            current_page: 1,
            last_page: 3,
            total: 25,
        };
        assert!(!page.has_previous());
        assert!(page.has_next());
        assert_eq!(page.page_numbers(), vec![Page(1), Page(2), Page(3)]);
    }
}
