//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  In many tip pools:                                                     │
//! │    $10.00 / 3 = $3.33 (×3 = $9.99)  → Lost $0.01!                      │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    1000 cents / 3 = 333 cents (×3 = 999 cents)                         │
//! │    We KNOW where the leftover cent is, and assign it explicitly        │
//! │    (see the split module for the deterministic remainder rule)         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tiprail_core::money::Money;
//!
//! // Create from cents (preferred)
//! let tip = Money::from_cents(2000); // $20.00
//!
//! // Ownership share math always floors; the caller routes the remainder
//! let share = tip.share_floor(6000); // 60% of $20.00 = $12.00
//! assert_eq!(share.cents(), 1200);
//!
//! // NEVER do this:
//! // let bad = Money::from_float(10.99); // NO SUCH METHOD EXISTS!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

/// Basis points in a whole (100%). Ownership shares and refund fractions
/// are expressed in bps so 60% is 6000, never a float.
pub const FULL_SHARE_BPS: u32 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents for USD).
///
/// ## Design Decisions
/// - **i64 (signed)**: Balances can be negative where a location allows it
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Payment.tip_cents ──► owner shares ──► group splits ──► LedgerEntry   │
/// │                                                                         │
/// │  balance(employee) = Σ credits − Σ debits  (signed, hence i64)         │
/// │                                                                         │
/// │  EVERY monetary value in the engine flows through integer cents        │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use tiprail_core::money::Money;
    ///
    /// let tip = Money::from_cents(1099); // $10.99
    /// assert_eq!(tip.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
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

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the smaller of two values.
    ///
    /// Used for chargeback capping: `min(original_credit, current_balance)`.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// Computes a percentage share of this amount, **flooring** the result.
    ///
    /// ## Why Floor, Not Round?
    /// Shares of one amount must never sum to more than the amount. Flooring
    /// every share and assigning the leftover cents to a deterministic member
    /// keeps the conservation invariant exact (see [`crate::split`]).
    ///
    /// ## Example
    /// ```rust
    /// use tiprail_core::money::Money;
    ///
    /// let tip = Money::from_cents(2000); // $20.00
    /// assert_eq!(tip.share_floor(6000).cents(), 1200); // 60% → $12.00
    /// assert_eq!(tip.share_floor(4000).cents(), 800);  // 40% → $8.00
    ///
    /// // $10.01 at 33.33% floors to $3.33, never $3.34
    /// let odd = Money::from_cents(1001);
    /// assert_eq!(odd.share_floor(3333).cents(), 333);
    /// ```
    pub fn share_floor(&self, bps: u32) -> Money {
        // i128 intermediate to prevent overflow on large amounts
        let share = (self.0 as i128 * bps as i128) / FULL_SHARE_BPS as i128;
        Money::from_cents(share as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for debugging and memos. Use frontend formatting for actual UI
/// display to handle localization properly.
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

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
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
    }

    #[test]
    fn test_share_floor_exact() {
        let tip = Money::from_cents(2000);
        assert_eq!(tip.share_floor(6000).cents(), 1200);
        assert_eq!(tip.share_floor(4000).cents(), 800);
        assert_eq!(tip.share_floor(FULL_SHARE_BPS).cents(), 2000);
        assert_eq!(tip.share_floor(0).cents(), 0);
    }

    #[test]
    fn test_share_floor_never_rounds_up() {
        // $10.01 split 50/50: both floor to $5.00, the odd cent is the
        // caller's to route (last owner in sorted order)
        let tip = Money::from_cents(1001);
        assert_eq!(tip.share_floor(5000).cents(), 500);
    }

    #[test]
    fn test_min_for_chargeback_cap() {
        let credit = Money::from_cents(1500);
        let balance = Money::from_cents(1000);
        assert_eq!(credit.min(balance).cents(), 1000);
        assert_eq!(balance.min(credit).cents(), 1000);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let positive = Money::from_cents(100);
        assert!(positive.is_positive());

        let negative = Money::from_cents(-100);
        assert!(negative.is_negative());
    }

    /// Critical test: document the intentional precision behavior.
    /// $10.00 at one-third bps floors; the split module owns the remainder.
    #[test]
    fn test_division_precision_loss_documented() {
        let ten_dollars = Money::from_cents(1000);
        let one_third = ten_dollars.share_floor(3333); // 333 cents
        let reconstructed = Money::from_cents(one_third.cents() * 3); // 999

        assert_eq!(reconstructed.cents(), 999);
        let lost = ten_dollars - reconstructed;
        assert_eq!(lost.cents(), 1);
    }
}
