//! Product listing and detail against the fake API.

#![allow(clippy::unwrap_used)]

use redseam_core::{Price, ProductId};
use redseam_integration_tests::{FakeApi, LISTING_SIZE};
use redseam_storefront::ApiError;
use redseam_storefront::catalog::{PageItem, ProductQuery, ProductSelection, SortOrder};
use secrecy::SecretString;

#[tokio::test]
async fn test_first_page() {
    let api = FakeApi::start().await.unwrap();
    let client = api.client();

    let page = client
        .list_products(None, &ProductQuery::new(10))
        .await
        .unwrap();

    assert_eq!(page.products.len(), 10);
    assert_eq!(page.current_page, 1);
    assert_eq!(page.last_page, 3);
    assert_eq!(page.total, u64::try_from(LISTING_SIZE).unwrap());
    assert!(!page.has_previous());
    assert!(page.has_next());
    assert_eq!(
        page.page_numbers(),
        vec![PageItem::Page(1), PageItem::Page(2), PageItem::Page(3)]
    );
}

#[tokio::test]
async fn test_price_filter_and_sort() {
    let api = FakeApi::start().await.unwrap();
    let client = api.client();
    let query = ProductQuery::new(10)
        .with_price_range("50", "120")
        .unwrap()
        .with_sort(Some(SortOrder::PriceDescending));

    let page = client.list_products(None, &query).await.unwrap();

    let prices: Vec<Price> = page.products.iter().map(|p| p.price).collect();
    assert_eq!(page.total, 8);
    assert_eq!(prices.first(), Some(&Price::from_units(120)));
    assert_eq!(prices.last(), Some(&Price::from_units(50)));
    assert!(prices.windows(2).all(|w| w[0] >= w[1]));

    let request = api.requests().pop().unwrap();
    assert_eq!(request.path, "/products");
}

#[tokio::test]
async fn test_later_page() {
    let api = FakeApi::start().await.unwrap();
    let query = ProductQuery::new(10).with_page(3);

    let page = api.client().list_products(None, &query).await.unwrap();

    assert_eq!(page.current_page, 3);
    assert_eq!(page.products.len(), 5);
    assert!(!page.has_next());
}

#[tokio::test]
async fn test_page_past_the_end_is_clamped() {
    let api = FakeApi::start().await.unwrap();
    let query = ProductQuery::new(10).with_page(u32::MAX);

    let page = api.client().list_products(None, &query).await.unwrap();

    assert_eq!(page.last_page, 3);
    assert_eq!(page.current_page, 3);
    assert!(page.products.is_empty());
    assert_eq!(
        page.page_numbers(),
        vec![PageItem::Page(1), PageItem::Page(2), PageItem::Page(3)]
    );
}

#[tokio::test]
async fn test_rejected_token_is_auth_error() {
    let api = FakeApi::start().await.unwrap();
    let token = SecretString::from("expired");

    let err = api
        .client()
        .list_products(Some(&token), &ProductQuery::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Auth { status: 401, .. }));
    assert!(!err.is_network());
}

#[tokio::test]
async fn test_product_detail_is_normalized() {
    let api = FakeApi::start().await.unwrap();

    let cap = api
        .client()
        .get_product(ProductId::new(7))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(cap.name, "Cap");
    assert!(cap.images.is_empty());
    assert!(cap.available_colors.is_empty());
    assert_eq!(cap.available_sizes, vec!["M".to_string()]);
    assert!(cap.brand.is_none());
    assert_eq!(cap.display_image(), None);
}

#[tokio::test]
async fn test_product_detail_is_cached() {
    let api = FakeApi::start().await.unwrap();
    let client = api.client();

    let first = client.get_product(ProductId::new(1)).await.unwrap().unwrap();
    let second = client.get_product(ProductId::new(1)).await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(api.request_count(), 1);

    client.invalidate_product_cache();
    client.get_product(ProductId::new(1)).await.unwrap();
    assert_eq!(api.request_count(), 2);
}

#[tokio::test]
async fn test_missing_product_is_none() {
    let api = FakeApi::start().await.unwrap();
    let product = api.client().get_product(ProductId::new(999)).await.unwrap();
    assert!(product.is_none());
}

#[tokio::test]
async fn test_incomplete_product_is_validation_error() {
    let api = FakeApi::start().await.unwrap();
    let err = api
        .client()
        .get_product(ProductId::new(2))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[tokio::test]
async fn test_selection_follows_color_images() {
    let api = FakeApi::start().await.unwrap();
    let tee = api
        .client()
        .get_product(ProductId::new(42))
        .await
        .unwrap()
        .unwrap();

    let mut selection = ProductSelection::defaults(&tee);
    assert_eq!(selection.color.as_deref(), Some("Red"));
    assert_eq!(selection.size.as_deref(), Some("M"));

    selection.select_color(&tee, "Blue").unwrap();
    assert_eq!(
        selection.image.as_deref(),
        Some("https://cdn.example.com/42/blue.png")
    );

    selection.select_image(&tee, 0);
    assert_eq!(selection.color.as_deref(), Some("Red"));
}
