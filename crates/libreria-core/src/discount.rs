//! # Discount Rules
//!
//! Discount codes and the policy that evaluates them.
//!
//! ## Evaluation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DISCOUNT STACKING POLICY                                               │
//! │                                                                         │
//! │  Rules are evaluated in a fixed, documented order:                      │
//! │                                                                         │
//! │    1. Bundle      - set price for a fixed group of titles               │
//! │    2. TwoForOne   - every second copy of an eligible title is free      │
//! │    3. Fixed       - flat amount off the remaining subtotal              │
//! │    4. Percentage  - percent off the remaining subtotal (≤ 100%)         │
//! │                                                                         │
//! │  Each step works on the subtotal REMAINING after earlier steps, and     │
//! │  the combined discount can never exceed the original subtotal.          │
//! │                                                                         │
//! │  The order lives in DiscountPolicy, not in a hidden constant, so a      │
//! │  store can reconfigure stacking without touching the evaluator.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A cart carries at most one active code, but the evaluator accepts a
//! slice so a future multi-code policy only changes the cart, not the math.

use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::money::Money;

// =============================================================================
// Discount Rules
// =============================================================================

/// The kind of a discount rule, used for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Bundle,
    TwoForOne,
    Fixed,
    Percentage,
}

/// A single discount rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscountRule {
    /// Percent off the remaining subtotal, in basis points.
    /// Clamped to 10000 bps: a percentage discount never exceeds 100%.
    Percentage { bps: u32 },

    /// Flat amount off, capped at the remaining subtotal.
    Fixed { amount_cents: i64 },

    /// Every second copy of the given title is free.
    TwoForOne { book_id: String },

    /// A fixed group of titles for a set price. Applies once when every
    /// title in the group is present in the cart.
    Bundle {
        book_ids: Vec<String>,
        bundle_price_cents: i64,
    },
}

impl DiscountRule {
    pub fn kind(&self) -> DiscountKind {
        match self {
            DiscountRule::Percentage { .. } => DiscountKind::Percentage,
            DiscountRule::Fixed { .. } => DiscountKind::Fixed,
            DiscountRule::TwoForOne { .. } => DiscountKind::TwoForOne,
            DiscountRule::Bundle { .. } => DiscountKind::Bundle,
        }
    }

    /// Computes this rule's discount against the cart lines and the
    /// subtotal remaining after earlier rules.
    fn discount(&self, lines: &[CartLine], remaining: Money) -> Money {
        let raw = match self {
            DiscountRule::Percentage { bps } => remaining.percentage_of(*bps),

            DiscountRule::Fixed { amount_cents } => Money::from_cents(*amount_cents),

            DiscountRule::TwoForOne { book_id } => lines
                .iter()
                .filter(|l| &l.book_id == book_id)
                .map(|l| l.unit_price().multiply_quantity(l.quantity / 2))
                .sum(),

            DiscountRule::Bundle {
                book_ids,
                bundle_price_cents,
            } => {
                let all_present = book_ids
                    .iter()
                    .all(|id| lines.iter().any(|l| &l.book_id == id));
                if !all_present {
                    return Money::zero();
                }
                let bundle_sum: Money = book_ids
                    .iter()
                    .filter_map(|id| lines.iter().find(|l| &l.book_id == id))
                    .map(|l| l.unit_price())
                    .sum();
                let over = bundle_sum - Money::from_cents(*bundle_price_cents);
                if over.is_positive() {
                    over
                } else {
                    Money::zero()
                }
            }
        };

        // A rule never discounts more than what is left.
        raw.min(remaining)
    }
}

/// A named discount code carrying one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCode {
    pub code: String,
    pub rule: DiscountRule,
    pub active: bool,
}

impl DiscountCode {
    pub fn new(code: impl Into<String>, rule: DiscountRule) -> Self {
        DiscountCode {
            code: code.into(),
            rule,
            active: true,
        }
    }
}

// =============================================================================
// Discount Policy
// =============================================================================

/// Configurable stacking policy: which rule kinds apply, in what order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountPolicy {
    /// Evaluation order. Rule kinds absent from this list never apply.
    pub order: Vec<DiscountKind>,
}

impl Default for DiscountPolicy {
    fn default() -> Self {
        DiscountPolicy {
            order: vec![
                DiscountKind::Bundle,
                DiscountKind::TwoForOne,
                DiscountKind::Fixed,
                DiscountKind::Percentage,
            ],
        }
    }
}

impl DiscountPolicy {
    /// Evaluates the active codes against the cart in policy order and
    /// returns the total discount, capped at the subtotal.
    pub fn discount_total(
        &self,
        lines: &[CartLine],
        subtotal: Money,
        codes: &[&DiscountCode],
    ) -> Money {
        let mut remaining = subtotal;
        let mut total = Money::zero();

        for kind in &self.order {
            for code in codes {
                if !code.active || code.rule.kind() != *kind {
                    continue;
                }
                let d = code.rule.discount(lines, remaining);
                total += d;
                remaining -= d;
            }
        }

        total
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartLine;

    fn line(book_id: &str, unit_price_cents: i64, quantity: i64) -> CartLine {
        CartLine::new(book_id, "Title", "Author", unit_price_cents, quantity)
    }

    #[test]
    fn test_percentage_discount() {
        let lines = vec![line("b1", 10_000, 1)];
        let code = DiscountCode::new("DESC10", DiscountRule::Percentage { bps: 1000 });
        let policy = DiscountPolicy::default();

        let total = policy.discount_total(&lines, Money::from_cents(10_000), &[&code]);
        assert_eq!(total.cents(), 1000); // 10% of $100
    }

    #[test]
    fn test_percentage_never_exceeds_100() {
        let lines = vec![line("b1", 10_000, 1)];
        let code = DiscountCode::new("GRATIS", DiscountRule::Percentage { bps: 25_000 });
        let policy = DiscountPolicy::default();

        let total = policy.discount_total(&lines, Money::from_cents(10_000), &[&code]);
        assert_eq!(total.cents(), 10_000);
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let lines = vec![line("b1", 2000, 1)];
        let code = DiscountCode::new("MENOS50", DiscountRule::Fixed { amount_cents: 5000 });
        let policy = DiscountPolicy::default();

        let total = policy.discount_total(&lines, Money::from_cents(2000), &[&code]);
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_two_for_one() {
        // 3 copies at $10: one free
        let lines = vec![line("b1", 1000, 3)];
        let code = DiscountCode::new(
            "2X1",
            DiscountRule::TwoForOne {
                book_id: "b1".to_string(),
            },
        );
        let policy = DiscountPolicy::default();

        let total = policy.discount_total(&lines, Money::from_cents(3000), &[&code]);
        assert_eq!(total.cents(), 1000);
    }

    #[test]
    fn test_bundle_requires_all_titles() {
        let lines = vec![line("b1", 3000, 1)];
        let code = DiscountCode::new(
            "TRILOGIA",
            DiscountRule::Bundle {
                book_ids: vec!["b1".to_string(), "b2".to_string()],
                bundle_price_cents: 4000,
            },
        );
        let policy = DiscountPolicy::default();

        let total = policy.discount_total(&lines, Money::from_cents(3000), &[&code]);
        assert!(total.is_zero());
    }

    #[test]
    fn test_bundle_discount() {
        let lines = vec![line("b1", 3000, 1), line("b2", 3000, 1)];
        let code = DiscountCode::new(
            "TRILOGIA",
            DiscountRule::Bundle {
                book_ids: vec!["b1".to_string(), "b2".to_string()],
                bundle_price_cents: 4000,
            },
        );
        let policy = DiscountPolicy::default();

        // $60 of books for $40 → $20 off
        let total = policy.discount_total(&lines, Money::from_cents(6000), &[&code]);
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_inactive_code_ignored() {
        let lines = vec![line("b1", 10_000, 1)];
        let mut code = DiscountCode::new("VIEJO", DiscountRule::Percentage { bps: 1000 });
        code.active = false;
        let policy = DiscountPolicy::default();

        let total = policy.discount_total(&lines, Money::from_cents(10_000), &[&code]);
        assert!(total.is_zero());
    }

    #[test]
    fn test_stacking_applies_in_policy_order() {
        // $100 subtotal, $20 fixed then 10% of the remaining $80 = $8
        let lines = vec![line("b1", 10_000, 1)];
        let fixed = DiscountCode::new("F20", DiscountRule::Fixed { amount_cents: 2000 });
        let pct = DiscountCode::new("P10", DiscountRule::Percentage { bps: 1000 });
        let policy = DiscountPolicy::default();

        let total = policy.discount_total(&lines, Money::from_cents(10_000), &[&pct, &fixed]);
        assert_eq!(total.cents(), 2800);
    }
}
