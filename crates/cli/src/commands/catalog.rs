//! Product listing and detail commands.

use redseam_core::ProductId;
use redseam_storefront::ApiError;
use redseam_storefront::catalog::{ProductQuery, ProductSelection, SortOrder};

use super::Context;

/// Print one page of the product listing.
pub async fn list(
    ctx: &Context,
    page: u32,
    price_from: &str,
    price_to: &str,
    sort: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let sort = sort.map(str::parse::<SortOrder>).transpose()?;
    let query = ProductQuery::new(ctx.config.products_per_page)
        .with_price_range(price_from, price_to)?
        .with_sort(sort)
        .with_page(page);

    let token = ctx.session.token();
    let listing = ctx.client.list_products(token.as_ref(), &query).await?;

    let first = (u64::from(listing.current_page) - 1) * u64::from(query.per_page) + 1;
    let last = first + listing.products.len() as u64 - 1;
    if listing.products.is_empty() {
        println!("No products found");
    } else {
        println!("Showing {first}-{last} of {} results", listing.total);
    }
    for product in &listing.products {
        println!(
            "  #{:<6} {:<40} {}",
            product.id,
            product.name,
            product.price.display_rounded()
        );
    }

    let pages: Vec<String> = listing.page_numbers().iter().map(ToString::to_string).collect();
    if pages.len() > 1 {
        println!("Pages: {}", pages.join(" "));
    }
    let location = query.to_location_query();
    if !location.is_empty() {
        println!("Location: ?{location}");
    }
    Ok(())
}

/// Print a product's details and its default selection.
pub async fn show(ctx: &Context, id: i64) -> Result<(), ApiError> {
    let Some(product) = ctx.client.get_product(ProductId::new(id)).await? else {
        return Err(ApiError::NotFound(format!("product {id}")));
    };
    let selection = ProductSelection::defaults(&product);

    println!("{} (#{})", product.name, product.id);
    println!("  Price:   {}", product.price.display_rounded());
    if let Some(brand) = &product.brand {
        println!("  Brand:   {}", brand.name);
    }
    if !product.release_year.is_empty() {
        println!("  Year:    {}", product.release_year);
    }
    if !product.available_colors.is_empty() {
        println!("  Colors:  {}", product.available_colors.join(", "));
    }
    if !product.available_sizes.is_empty() {
        println!("  Sizes:   {}", product.available_sizes.join(", "));
    }
    if let Some(image) = &selection.image {
        println!("  Image:   {image}");
    }
    if !product.description.is_empty() {
        println!();
        println!("{}", product.description);
    }
    Ok(())
}
