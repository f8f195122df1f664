//! # Shopping Cart
//!
//! The cart with add-time price freezing and drift flags.
//!
//! ## Price Freezing and Drift
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Add to cart ──► line freezes unit_price at add time                    │
//! │                                                                         │
//! │  Catalog price changes later ──► detect_drift() flags the line          │
//! │                                                                         │
//! │  Checkout with a flagged line ──► rejected (PriceDriftUnconfirmed)      │
//! │                                                                         │
//! │  confirm_drift() ──► line re-stamped with the current price,            │
//! │                      flag cleared, checkout may proceed                 │
//! │                                                                         │
//! │  The customer is never silently charged a price different from the     │
//! │  one they saw.                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by `book_id` (adding the same book merges quantities)
//! - Quantity per line is 1..=MAX_LINE_QUANTITY (3)
//! - At most one active discount code
//! - Totals are recomputed on every mutation; the cart is cleared once a
//!   sale is created from it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::discount::{DiscountCode, DiscountPolicy};
use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Book, TaxRate};
use crate::validation::validate_quantity;

// =============================================================================
// Cart Line
// =============================================================================

/// A line in the shopping cart.
///
/// `unit_price_cents` is frozen at add time; `drift` is set when the
/// catalog price has since diverged and the customer has not confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub book_id: String,

    /// Title at time of adding (frozen).
    pub title: String,

    /// Author at time of adding (frozen).
    pub author: String,

    /// Price in cents at time of adding (frozen).
    pub unit_price_cents: i64,

    /// Copies of this title, 1..=3.
    pub quantity: i64,

    /// Set when the catalog price diverged from `unit_price_cents`.
    pub drift: bool,

    pub added_at: DateTime<Utc>,
}

impl CartLine {
    pub fn new(
        book_id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        unit_price_cents: i64,
        quantity: i64,
    ) -> Self {
        CartLine {
            book_id: book_id.into(),
            title: title.into(),
            author: author.into(),
            unit_price_cents,
            quantity,
            drift: false,
            added_at: Utc::now(),
        }
    }

    /// Creates a line from a catalog book, freezing its current price.
    pub fn from_book(book: &Book, quantity: i64) -> Self {
        CartLine::new(&book.id, &book.title, &book.author, book.price_cents, quantity)
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Cart Totals
// =============================================================================

/// Computed cart totals. Recomputed on every mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub final_cents: i64,
}

// =============================================================================
// Cart
// =============================================================================

/// A customer's shopping cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub customer_id: String,
    pub lines: Vec<CartLine>,

    /// At most one active code; the stacking policy decides how rules
    /// would combine if this ever becomes a list.
    pub discount_code: Option<DiscountCode>,

    pub totals: CartTotals,
    pub created_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart for a customer.
    pub fn new(customer_id: impl Into<String>) -> Self {
        Cart {
            customer_id: customer_id.into(),
            lines: Vec::new(),
            discount_code: None,
            totals: CartTotals::default(),
            created_at: Utc::now(),
        }
    }

    /// Adds a book to the cart or merges quantity if already present.
    ///
    /// The merged quantity must stay within 1..=3.
    pub fn add_line(&mut self, book: &Book, quantity: i64) -> Result<(), ValidationError> {
        validate_quantity(quantity)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.book_id == book.id) {
            let merged = line.quantity + quantity;
            validate_quantity(merged)?;
            line.quantity = merged;
            return Ok(());
        }

        self.lines.push(CartLine::from_book(book, quantity));
        Ok(())
    }

    /// Updates the quantity of a line. Quantity 0 removes the line.
    pub fn update_quantity(
        &mut self,
        book_id: &str,
        quantity: i64,
    ) -> Result<(), ValidationError> {
        if quantity == 0 {
            return self.remove_line(book_id);
        }

        validate_quantity(quantity)?;

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.book_id == book_id)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "book_id".to_string(),
                reason: format!("book {} not in cart", book_id),
            })?;

        line.quantity = quantity;
        Ok(())
    }

    /// Removes a line by book id.
    pub fn remove_line(&mut self, book_id: &str) -> Result<(), ValidationError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.book_id != book_id);

        if self.lines.len() == before {
            return Err(ValidationError::InvalidFormat {
                field: "book_id".to_string(),
                reason: format!("book {} not in cart", book_id),
            });
        }
        Ok(())
    }

    /// Replaces the active discount code.
    pub fn apply_discount_code(&mut self, code: DiscountCode) {
        self.discount_code = Some(code);
    }

    /// Clears all lines, the discount code and the totals.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.discount_code = None;
        self.totals = CartTotals::default();
        self.created_at = Utc::now();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of frozen line totals, before discounts and tax.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(|l| l.line_total()).sum()
    }

    /// Book ids of lines with an unconfirmed price drift flag.
    pub fn drifted_book_ids(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter(|l| l.drift)
            .map(|l| l.book_id.clone())
            .collect()
    }

    /// Recomputes stored totals. Called after every mutation by the cart
    /// store. Tax is computed on the discounted subtotal; shipping is not
    /// part of cart totals (it depends on the shipping type chosen at
    /// checkout).
    pub fn recompute(&mut self, policy: &DiscountPolicy, tax_rate: TaxRate) {
        let subtotal = self.subtotal();
        let codes: Vec<&DiscountCode> = self.discount_code.iter().collect();
        let discount = policy.discount_total(&self.lines, subtotal, &codes);
        let discounted = subtotal - discount;
        let tax = discounted.calculate_tax(tax_rate);

        self.totals = CartTotals {
            subtotal_cents: subtotal.cents(),
            discount_cents: discount.cents(),
            tax_cents: tax.cents(),
            final_cents: (discounted + tax).cents(),
        };
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discount::DiscountRule;

    fn book(id: &str, price_cents: i64) -> Book {
        Book {
            id: id.to_string(),
            title: format!("Book {}", id),
            author: "Autora".to_string(),
            price_cents,
            active: true,
        }
    }

    #[test]
    fn test_add_line_freezes_price() {
        let mut cart = Cart::new("user-1");
        let mut b = book("b1", 2500);
        cart.add_line(&b, 1).unwrap();

        // Catalog price change does not touch the cart line
        b.price_cents = 3000;
        assert_eq!(cart.lines[0].unit_price_cents, 2500);
    }

    #[test]
    fn test_add_same_book_merges_quantity() {
        let mut cart = Cart::new("user-1");
        let b = book("b1", 1000);

        cart.add_line(&b, 1).unwrap();
        cart.add_line(&b, 2).unwrap();

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 3);
    }

    #[test]
    fn test_merged_quantity_respects_cap() {
        let mut cart = Cart::new("user-1");
        let b = book("b1", 1000);

        cart.add_line(&b, 2).unwrap();
        assert!(cart.add_line(&b, 2).is_err());
        // original quantity untouched on failure
        assert_eq!(cart.lines[0].quantity, 2);
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let mut cart = Cart::new("user-1");
        cart.add_line(&book("b1", 1000), 2).unwrap();

        cart.update_quantity("b1", 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_missing_line_errors() {
        let mut cart = Cart::new("user-1");
        assert!(cart.remove_line("nope").is_err());
    }

    #[test]
    fn test_recompute_totals_with_discount_and_tax() {
        // $100 subtotal, 10% code, 19% tax on the discounted subtotal
        let mut cart = Cart::new("user-1");
        cart.add_line(&book("b1", 10_000), 1).unwrap();
        cart.apply_discount_code(DiscountCode::new(
            "DESC10",
            DiscountRule::Percentage { bps: 1000 },
        ));

        cart.recompute(&DiscountPolicy::default(), TaxRate::from_bps(1900));

        assert_eq!(cart.totals.subtotal_cents, 10_000);
        assert_eq!(cart.totals.discount_cents, 1000);
        assert_eq!(cart.totals.tax_cents, 1710); // 19% of $90
        assert_eq!(cart.totals.final_cents, 10_710); // $107.10
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut cart = Cart::new("user-1");
        cart.add_line(&book("b1", 1000), 1).unwrap();
        cart.apply_discount_code(DiscountCode::new(
            "X",
            DiscountRule::Fixed { amount_cents: 100 },
        ));
        cart.recompute(&DiscountPolicy::default(), TaxRate::from_bps(1900));

        cart.clear();
        assert!(cart.is_empty());
        assert!(cart.discount_code.is_none());
        assert_eq!(cart.totals, CartTotals::default());
    }

    #[test]
    fn test_drifted_book_ids() {
        let mut cart = Cart::new("user-1");
        cart.add_line(&book("b1", 1000), 1).unwrap();
        cart.add_line(&book("b2", 2000), 1).unwrap();
        cart.lines[1].drift = true;

        assert_eq!(cart.drifted_book_ids(), vec!["b2".to_string()]);
    }
}
