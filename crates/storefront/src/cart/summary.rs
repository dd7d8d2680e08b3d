//! Cart totals.

use redseam_core::Price;

use crate::api::types::CartLine;

/// Totals shown beside the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSummary {
    /// Sum of `price × quantity` over all lines.
    pub subtotal: Price,
    /// Flat delivery fee; zero for an empty cart.
    pub delivery: Price,
    pub total: Price,
    /// Distinct lines.
    pub line_count: usize,
    /// Units across all lines.
    pub unit_count: u64,
}

impl CartSummary {
    /// Totals for `lines` with a flat `delivery_fee`.
    #[must_use]
    pub fn from_lines(lines: &[CartLine], delivery_fee: Price) -> Self {
        let subtotal: Price = lines
            .iter()
            .map(|line| {
                line.line_total().unwrap_or_else(|| {
                    tracing::warn!(key = %line.key(), "Cart line total overflowed");
                    Price::ZERO
                })
            })
            .sum();
        let delivery = if lines.is_empty() { Price::ZERO } else { delivery_fee };

        Self {
            subtotal,
            delivery,
            total: subtotal + delivery,
            line_count: lines.len(),
            unit_count: lines.iter().map(|line| u64::from(line.quantity)).sum(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.line_count == 0
    }
}

#[cfg(test)]
mod tests {
    use redseam_core::ProductId;
    use rust_decimal::Decimal;

    use super::*;

    fn line(id: i64, price: Price, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            price,
            cover_image: String::new(),
            color: None,
            size: None,
            quantity,
        }
    }

    #[test]
    fn test_totals() {
        let lines = [
            line(1, Price::new(Decimal::new(1250, 2)), 2),
            line(2, Price::from_units(30), 1),
        ];
        let summary = CartSummary::from_lines(&lines, Price::from_units(5));
        assert_eq!(summary.subtotal, Price::from_units(55));
        assert_eq!(summary.delivery, Price::from_units(5));
        assert_eq!(summary.total, Price::from_units(60));
        assert_eq!(summary.line_count, 2);
        assert_eq!(summary.unit_count, 3);
        assert_eq!(summary.total.display_rounded(), "$ 60");
    }

    #[test]
    fn test_empty_cart_has_no_delivery() {
        let summary = CartSummary::from_lines(&[], Price::from_units(5));
        assert!(summary.is_empty());
        assert_eq!(summary.delivery, Price::ZERO);
        assert_eq!(summary.total, Price::ZERO);
    }
}
