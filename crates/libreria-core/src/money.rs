//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every price, discount, tax and refund is an i64 count of cents.      │
//! │    Rate math is basis points with explicit rounding, so a refund of     │
//! │    50% of $40.00 is exactly 2000 cents, never 19.999999 dollars.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for refunds and adjustments
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the smaller of two amounts. Used to cap refunds at the
    /// original line total.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// Calculates tax on this amount.
    ///
    /// ## Implementation
    /// Integer math over basis points: `(amount * bps + 5000) / 10000`.
    /// The +5000 rounds half away from zero. i128 prevents overflow on
    /// large amounts.
    ///
    /// ## Example
    /// ```rust
    /// use libreria_core::money::Money;
    /// use libreria_core::types::TaxRate;
    ///
    /// let discounted = Money::from_cents(9000); // $90.00
    /// let rate = TaxRate::from_bps(1900);       // 19%
    /// assert_eq!(discounted.calculate_tax(rate).cents(), 1710); // $17.10
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns the discount amount for a percentage expressed in basis
    /// points (1000 bps = 10%). Capped at 10000 bps so a percentage
    /// discount never exceeds 100% of the amount.
    pub fn percentage_of(&self, bps: u32) -> Money {
        let bps = bps.min(10_000);
        let amount = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money::from_cents(amount as i64)
    }

    /// Applies a 0-100 refund percentage to this amount.
    ///
    /// ## Example
    /// ```rust
    /// use libreria_core::money::Money;
    ///
    /// let line = Money::from_cents(4000); // $40.00
    /// assert_eq!(line.apply_refund_percentage(50).cents(), 2000); // $20.00
    /// ```
    pub fn apply_refund_percentage(&self, percentage: u8) -> Money {
        let pct = percentage.min(100) as i128;
        let amount = (self.0 as i128 * pct + 50) / 100;
        Money::from_cents(amount as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
/// For debugging and logs; presentation layers own real formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
    }

    #[test]
    fn test_tax_calculation() {
        // $90.00 at 19% = $17.10
        let amount = Money::from_cents(9000);
        let rate = TaxRate::from_bps(1900);
        assert_eq!(amount.calculate_tax(rate).cents(), 1710);
    }

    #[test]
    fn test_tax_calculation_with_rounding() {
        // $10.00 at 8.25% = $0.825 → $0.83
        let amount = Money::from_cents(1000);
        let rate = TaxRate::from_bps(825);
        assert_eq!(amount.calculate_tax(rate).cents(), 83);
    }

    #[test]
    fn test_percentage_of_caps_at_100() {
        let subtotal = Money::from_cents(10000);
        assert_eq!(subtotal.percentage_of(1000).cents(), 1000); // 10%
        assert_eq!(subtotal.percentage_of(10000).cents(), 10000); // 100%
        assert_eq!(subtotal.percentage_of(25000).cents(), 10000); // clamped
    }

    #[test]
    fn test_refund_percentage() {
        let line = Money::from_cents(4000);
        assert_eq!(line.apply_refund_percentage(50).cents(), 2000);
        assert_eq!(line.apply_refund_percentage(100).cents(), 4000);
        assert_eq!(line.apply_refund_percentage(0).cents(), 0);
        // values above 100 are clamped
        assert_eq!(line.apply_refund_percentage(150).cents(), 4000);
    }

    #[test]
    fn test_min_caps_refunds() {
        let computed = Money::from_cents(4500);
        let original = Money::from_cents(4000);
        assert_eq!(computed.min(original).cents(), 4000);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 200, 300]
            .iter()
            .map(|c| Money::from_cents(*c))
            .sum();
        assert_eq!(total.cents(), 600);
    }
}
