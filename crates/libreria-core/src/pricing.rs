//! # Pricing Engine
//!
//! Quote computation and price-drift handling.
//!
//! ## Quote Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal (frozen line prices)                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  discount code via DiscountPolicy (fixed evaluation order)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tax on the DISCOUNTED subtotal                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  + shipping (flat fee for home delivery, zero for pickup)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  customer_pays_tax = false → tax folded into the final total            │
//! │  customer_pays_tax = true  → tax reported separately, customer          │
//! │                              settles it directly                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::discount::{DiscountCode, DiscountPolicy};
use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{ShippingType, TaxRate};

// =============================================================================
// Quote
// =============================================================================

/// A priced cart, ready to become a sale's totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    /// What the store collects. Includes tax only when the customer does
    /// not settle it separately.
    pub total_cents: i64,
    /// Mirrors the caller-supplied `customer_pays_tax` flag.
    pub customer_pays_tax: bool,
}

impl Quote {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// Computes a quote for the cart. `home_delivery_fee` is the flat fee
/// charged when `shipping` is home delivery; pickup always ships free.
///
/// Fails with `ValidationError::EmptyCart` when there is nothing to price.
pub fn quote(
    cart: &Cart,
    policy: &DiscountPolicy,
    tax_rate: TaxRate,
    shipping: &ShippingType,
    home_delivery_fee: Money,
    customer_pays_tax: bool,
) -> CoreResult<Quote> {
    if cart.is_empty() {
        return Err(ValidationError::EmptyCart.into());
    }

    let subtotal = cart.subtotal();
    let codes: Vec<&DiscountCode> = cart.discount_code.iter().collect();
    let discount = policy.discount_total(&cart.lines, subtotal, &codes);
    let discounted = subtotal - discount;
    let tax = discounted.calculate_tax(tax_rate);
    let shipping_cost = shipping.shipping_cost(home_delivery_fee);

    let total = if customer_pays_tax {
        discounted + shipping_cost
    } else {
        discounted + tax + shipping_cost
    };

    Ok(Quote {
        subtotal_cents: subtotal.cents(),
        discount_cents: discount.cents(),
        tax_cents: tax.cents(),
        shipping_cents: shipping_cost.cents(),
        total_cents: total.cents(),
        customer_pays_tax,
    })
}

// =============================================================================
// Price Drift
// =============================================================================

/// One cart line whose frozen price no longer matches the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftLine {
    pub book_id: String,
    pub cart_price_cents: i64,
    pub current_price_cents: i64,
}

/// The set of drifted lines found by [`detect_drift`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    pub changed: Vec<DriftLine>,
}

impl DriftReport {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Compares each line's frozen price against the current catalog price and
/// flags divergent lines on the cart. `current_price` resolves a book id to
/// its live price; lines whose book has vanished from the catalog are left
/// untouched (the orchestrator fails those later with NotFound).
pub fn detect_drift<F>(cart: &mut Cart, current_price: F) -> DriftReport
where
    F: Fn(&str) -> Option<i64>,
{
    let mut report = DriftReport::default();

    for line in &mut cart.lines {
        if let Some(price) = current_price(&line.book_id) {
            if price != line.unit_price_cents {
                line.drift = true;
                report.changed.push(DriftLine {
                    book_id: line.book_id.clone(),
                    cart_price_cents: line.unit_price_cents,
                    current_price_cents: price,
                });
            }
        }
    }

    report
}

/// Re-stamps drifted line(s) with the current catalog price and clears the
/// drift flag. `book_id = None` confirms every drifted line. This is the
/// "confirm price changes" checkout step: after it, the customer has seen
/// and accepted the new price.
pub fn confirm_drift<F>(cart: &mut Cart, book_id: Option<&str>, current_price: F)
where
    F: Fn(&str) -> Option<i64>,
{
    for line in &mut cart.lines {
        if let Some(id) = book_id {
            if line.book_id != id {
                continue;
            }
        }
        if !line.drift {
            continue;
        }
        if let Some(price) = current_price(&line.book_id) {
            line.unit_price_cents = price;
            line.drift = false;
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::DiscountRule;
    use crate::types::Book;

    fn book(id: &str, price_cents: i64) -> Book {
        Book {
            id: id.to_string(),
            title: format!("Book {}", id),
            author: "Autora".to_string(),
            price_cents,
            active: true,
        }
    }

    fn pickup() -> ShippingType {
        ShippingType::RecogidaTienda {
            id_tienda: "t1".to_string(),
        }
    }

    fn fee() -> Money {
        Money::from_cents(crate::HOME_DELIVERY_FEE_CENTS)
    }

    #[test]
    fn test_quote_rejects_empty_cart() {
        let cart = Cart::new("user-1");
        let result = quote(
            &cart,
            &DiscountPolicy::default(),
            TaxRate::from_bps(1900),
            &pickup(),
            fee(),
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_quote_tax_folded_in() {
        // $100 subtotal, 10% code, 19% tax, pickup, store collects tax
        let mut cart = Cart::new("user-1");
        cart.add_line(&book("b1", 10_000), 1).unwrap();
        cart.apply_discount_code(DiscountCode::new(
            "DESC10",
            DiscountRule::Percentage { bps: 1000 },
        ));

        let q = quote(
            &cart,
            &DiscountPolicy::default(),
            TaxRate::from_bps(1900),
            &pickup(),
            fee(),
            false,
        )
        .unwrap();

        assert_eq!(q.subtotal_cents, 10_000);
        assert_eq!(q.discount_cents, 1000);
        assert_eq!(q.tax_cents, 1710);
        assert_eq!(q.shipping_cents, 0);
        assert_eq!(q.total_cents, 10_710); // $90 × 1.19 = $107.10
    }

    #[test]
    fn test_quote_tax_reported_separately() {
        let mut cart = Cart::new("user-1");
        cart.add_line(&book("b1", 10_000), 1).unwrap();

        let q = quote(
            &cart,
            &DiscountPolicy::default(),
            TaxRate::from_bps(1900),
            &pickup(),
            fee(),
            true,
        )
        .unwrap();

        assert_eq!(q.tax_cents, 1900);
        assert_eq!(q.total_cents, 10_000); // tax settled by the customer
        assert!(q.customer_pays_tax);
    }

    #[test]
    fn test_quote_includes_home_delivery_fee() {
        let mut cart = Cart::new("user-1");
        cart.add_line(&book("b1", 10_000), 1).unwrap();

        let home = ShippingType::Domicilio {
            direccion: "Calle 1".to_string(),
        };
        let q = quote(
            &cart,
            &DiscountPolicy::default(),
            TaxRate::zero(),
            &home,
            Money::from_cents(750),
            false,
        )
        .unwrap();

        // whatever fee the caller configures is what gets charged
        assert_eq!(q.shipping_cents, 750);
        assert_eq!(q.total_cents, 10_750);
    }

    #[test]
    fn test_detect_and_confirm_drift() {
        let mut cart = Cart::new("user-1");
        cart.add_line(&book("b1", 2500), 1).unwrap();
        cart.add_line(&book("b2", 3000), 1).unwrap();

        // b1 got more expensive; b2 unchanged
        let prices = |id: &str| match id {
            "b1" => Some(2800),
            "b2" => Some(3000),
            _ => None,
        };

        let report = detect_drift(&mut cart, prices);
        assert_eq!(report.changed.len(), 1);
        assert_eq!(report.changed[0].book_id, "b1");
        assert_eq!(report.changed[0].cart_price_cents, 2500);
        assert_eq!(report.changed[0].current_price_cents, 2800);
        assert!(cart.lines[0].drift);
        assert!(!cart.lines[1].drift);

        confirm_drift(&mut cart, Some("b1"), prices);
        assert!(!cart.lines[0].drift);
        assert_eq!(cart.lines[0].unit_price_cents, 2800);

        // nothing left drifted
        assert!(detect_drift(&mut cart, prices).is_empty());
    }

    #[test]
    fn test_confirm_all_drifted_lines() {
        let mut cart = Cart::new("user-1");
        cart.add_line(&book("b1", 2500), 1).unwrap();
        cart.add_line(&book("b2", 3000), 1).unwrap();

        let prices = |id: &str| match id {
            "b1" => Some(2000),
            "b2" => Some(3500),
            _ => None,
        };

        detect_drift(&mut cart, prices);
        confirm_drift(&mut cart, None, prices);

        assert_eq!(cart.lines[0].unit_price_cents, 2000);
        assert_eq!(cart.lines[1].unit_price_cents, 3500);
        assert!(cart.drifted_book_ids().is_empty());
    }
}
