//! Cart and checkout commands.
//!
//! Every command loads the remote cart first so that updates can be matched
//! against local lines.

use redseam_core::{CartLineKey, ProductId};
use redseam_storefront::catalog::ProductSelection;
use redseam_storefront::forms::CheckoutForm;
use redseam_storefront::{ApiError, CartStore};

use super::Context;
use super::account::print_form_errors;

/// Print the cart and its totals.
pub async fn show(ctx: &Context) {
    let cart = ctx.cart();
    cart.fetch_cart().await;
    print_cart(&cart);
}

/// Add a product; missing color/size default to the product's first option.
pub async fn add(
    ctx: &Context,
    product_id: i64,
    quantity: u32,
    color: Option<String>,
    size: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let product_id = ProductId::new(product_id);
    let product = ctx
        .client
        .get_product(product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("product {product_id}")))?;

    let mut selection = ProductSelection::defaults(&product);
    selection.set_quantity(quantity)?;
    if let Some(color) = color.as_deref() {
        selection.select_color(&product, color)?;
    }
    if let Some(size) = size.as_deref() {
        selection.select_size(&product, size)?;
    }

    let cart = ctx.cart();
    cart.add_to_cart(
        product_id,
        selection.quantity,
        selection.color.as_deref(),
        selection.size.as_deref(),
    )
    .await?;

    let key = CartLineKey::new(
        product_id,
        selection.color.as_deref(),
        selection.size.as_deref(),
    );
    println!("Added {} x {} ({key})", selection.quantity, product.name);
    print_cart(&cart);
    Ok(())
}

/// Change a line's quantity.
pub async fn update(ctx: &Context, key: &str, quantity: u32) -> Result<(), ApiError> {
    let key = CartLineKey::decode(key)?;
    let cart = ctx.cart();
    cart.fetch_cart().await;
    cart.update_cart_item(&key, quantity).await?;
    print_cart(&cart);
    Ok(())
}

/// Remove a line.
pub async fn remove(ctx: &Context, key: &str) -> Result<(), ApiError> {
    let key = CartLineKey::decode(key)?;
    let cart = ctx.cart();
    cart.fetch_cart().await;
    cart.remove_cart_item(&key).await?;
    print_cart(&cart);
    Ok(())
}

/// Place the order for the current cart.
pub async fn checkout(
    ctx: &Context,
    name: String,
    surname: String,
    email: Option<String>,
    address: String,
    zip_code: String,
) -> Result<(), ApiError> {
    let mut form = CheckoutForm::prefilled(ctx.session.user().as_ref());
    form.name = name;
    form.surname = surname;
    if let Some(email) = email {
        form.email = email;
    }
    form.address = address;
    form.zip_code = zip_code;

    let cart = ctx.cart();
    cart.fetch_cart().await;
    let summary = cart.summary();

    match cart.checkout(&form).await {
        Ok(()) => {
            println!("Congrats! Your order is placed.");
            println!("Charged {}", summary.total.display_rounded());
            Ok(())
        }
        Err(ApiError::Form(errors)) => {
            print_form_errors(&errors);
            Err(ApiError::Form(errors))
        }
        Err(e) => Err(e),
    }
}

fn print_cart(cart: &CartStore) {
    if let Some(error) = cart.error() {
        println!("Could not load cart: {error}");
        return;
    }

    let items = cart.items();
    if items.is_empty() {
        println!("Your cart is empty");
        return;
    }

    println!("Shopping cart ({})", cart.cart_count());
    for line in &items {
        let total = line.line_total().unwrap_or(line.price);
        println!(
            "  {:<24} {:<32} x{:<3} {}",
            line.key().encode(),
            line.name,
            line.quantity,
            total.display_rounded()
        );
    }

    let summary = cart.summary();
    println!("  Items subtotal  {}", summary.subtotal.display_rounded());
    println!("  Delivery        {}", summary.delivery.display_rounded());
    println!("  Total           {}", summary.total.display_rounded());
}
