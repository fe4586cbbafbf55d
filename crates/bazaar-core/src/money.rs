//! # Money Module
//!
//! Provides the `Money` type used by invoice totals and every report figure.
//!
//! ## Integer Cents
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  All amounts are stored and summed as i64 cents.                        │
//! │                                                                         │
//! │    Store:      sales.grand_total_cents  INTEGER                         │
//! │    Compute:    Money(a) + Money(b)      exact                           │
//! │    Report:     revenue_cents            exact sum of grand totals       │
//! │                                                                         │
//! │  Summing 10,000 invoices never drifts by a cent.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bazaar_core::money::Money;
//!
//! let price = Money::from_cents(1099); // 10.99
//! let line = price.multiply_quantity(3);
//! assert_eq!(line.cents(), 3297);
//!
//! let total: Money = [line, Money::from_cents(3)].into_iter().sum();
//! assert_eq!(total.cents(), 3300);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Where Money is Used
/// ```text
/// Product.sale_price_cents ──► SaleItem.line_total ──► Sale.subtotal
///                                                          │
///                              Sale.tax ──────────────────►├──► Sale.grand_total
///                                                          │
///                              DashboardSummary.revenue ◄──┘  (sum over sales)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    ///
    /// ```rust
    /// use bazaar_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1099).major(), 10);
    /// assert_eq!(Money::from_cents(-550).major(), -5);
    /// ```
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
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

    /// Multiplies a unit amount by a line quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Clamps a negative amount to zero.
    ///
    /// Used for change due: paying less than the grand total leaves no change,
    /// never a negative one.
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented display ("10.99", "-5.50"). Currency symbols are a UI concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
