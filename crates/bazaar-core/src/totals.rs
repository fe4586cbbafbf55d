//! # Invoice Totals
//!
//! Header arithmetic for purchases and sales, plus per-line profit.
//!
//! ```text
//! Purchase                              Sale
//! ────────────────────────────          ─────────────────────────────────────
//! line  = qty × unit_cost               line   = qty × (unit_price − discount)
//! sub   = Σ line                        sub    = Σ line
//! grand = sub + tax                     grand  = sub + tax
//! balance_due = grand − paid            change = max(0, paid − grand)
//! ```
//!
//! Profit for the reports is attributed per sale line against the product's
//! *current* purchase price:
//!
//! ```text
//! profit = qty × (unit_price − discount) − qty × purchase_price
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

/// Prefix of generated purchase invoice numbers.
pub const PURCHASE_INVOICE_PREFIX: &str = "PUR";

/// Prefix of generated sale invoice numbers.
pub const SALE_INVOICE_PREFIX: &str = "SAL";

// =============================================================================
// Purchase Totals
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub grand_total: Money,
    pub amount_paid: Money,
    /// Negative when the supplier was overpaid.
    pub balance_due: Money,
}

impl PurchaseTotals {
    /// Computes totals from `(quantity, unit_cost_cents)` lines.
    ///
    /// ```rust
    /// use bazaar_core::totals::PurchaseTotals;
    ///
    /// let totals = PurchaseTotals::compute([(10, 250), (2, 1000)], 150, 2000);
    /// assert_eq!(totals.subtotal.cents(), 4500);
    /// assert_eq!(totals.grand_total.cents(), 4650);
    /// assert_eq!(totals.balance_due.cents(), 2650);
    /// ```
    pub fn compute(
        lines: impl IntoIterator<Item = (i64, i64)>,
        tax_cents: i64,
        amount_paid_cents: i64,
    ) -> Self {
        let subtotal: Money = lines
            .into_iter()
            .map(|(qty, unit_cost)| Money::from_cents(unit_cost).multiply_quantity(qty))
            .sum();
        let tax = Money::from_cents(tax_cents);
        let grand_total = subtotal + tax;
        let amount_paid = Money::from_cents(amount_paid_cents);

        PurchaseTotals {
            subtotal,
            tax,
            grand_total,
            amount_paid,
            balance_due: grand_total - amount_paid,
        }
    }

    /// Recomputes the balance after a payment correction.
    pub fn with_amount_paid(self, amount_paid_cents: i64) -> Self {
        let amount_paid = Money::from_cents(amount_paid_cents);
        PurchaseTotals {
            amount_paid,
            balance_due: self.grand_total - amount_paid,
            ..self
        }
    }
}

// =============================================================================
// Sale Totals
// =============================================================================

/// Line total of one sale line.
#[inline]
pub fn sale_line_total(quantity: i64, unit_price_cents: i64, discount_cents: i64) -> Money {
    Money::from_cents(unit_price_cents - discount_cents).multiply_quantity(quantity)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub grand_total: Money,
    pub amount_paid: Money,
    /// Never negative: paying short leaves no change.
    pub change_due: Money,
}

impl SaleTotals {
    /// Computes totals from `(quantity, unit_price_cents, discount_cents)` lines.
    ///
    /// ```rust
    /// use bazaar_core::totals::SaleTotals;
    ///
    /// let totals = SaleTotals::compute([(2, 150, 10)], 20, 500);
    /// assert_eq!(totals.subtotal.cents(), 280);
    /// assert_eq!(totals.grand_total.cents(), 300);
    /// assert_eq!(totals.change_due.cents(), 200);
    /// ```
    pub fn compute(
        lines: impl IntoIterator<Item = (i64, i64, i64)>,
        tax_cents: i64,
        amount_paid_cents: i64,
    ) -> Self {
        let subtotal: Money = lines
            .into_iter()
            .map(|(qty, price, discount)| sale_line_total(qty, price, discount))
            .sum();
        let tax = Money::from_cents(tax_cents);
        let grand_total = subtotal + tax;
        let amount_paid = Money::from_cents(amount_paid_cents);

        SaleTotals {
            subtotal,
            tax,
            grand_total,
            amount_paid,
            change_due: (amount_paid - grand_total).non_negative(),
        }
    }

    /// Recomputes change after a payment correction.
    pub fn with_amount_paid(self, amount_paid_cents: i64) -> Self {
        let amount_paid = Money::from_cents(amount_paid_cents);
        SaleTotals {
            amount_paid,
            change_due: (amount_paid - self.grand_total).non_negative(),
            ..self
        }
    }
}

// =============================================================================
// Profit
// =============================================================================

/// Profit of one sale line at the product's current purchase price.
///
/// ```rust
/// use bazaar_core::totals::line_profit;
///
/// // 2 × (150 − 10) − 2 × 100
/// assert_eq!(line_profit(2, 150, 10, 100).cents(), 80);
/// ```
#[inline]
pub fn line_profit(
    quantity: i64,
    unit_price_cents: i64,
    discount_cents: i64,
    purchase_price_cents: i64,
) -> Money {
    sale_line_total(quantity, unit_price_cents, discount_cents)
        - Money::from_cents(purchase_price_cents).multiply_quantity(quantity)
}

// =============================================================================
// Invoice Numbers
// =============================================================================

/// Formats a generated invoice number: `PREFIX-YYYYMMDD-XXXXXX`.
///
/// `token` supplies the random suffix; its first six alphanumeric characters
/// are used, upper-cased.
///
/// ```rust
/// use chrono::NaiveDate;
/// use bazaar_core::totals::format_invoice_number;
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
/// assert_eq!(
///     format_invoice_number("SAL", date, "9f1c2e7a-..."),
///     "SAL-20240309-9F1C2E"
/// );
/// ```
pub fn format_invoice_number(prefix: &str, date: NaiveDate, token: &str) -> String {
    let suffix: String = token
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(6)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("{}-{}-{}", prefix, date.format("%Y%m%d"), suffix)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_totals() {
        let totals = PurchaseTotals::compute([(3, 100), (1, 50)], 35, 400);
        assert_eq!(totals.subtotal.cents(), 350);
        assert_eq!(totals.grand_total.cents(), 385);
        assert_eq!(totals.balance_due.cents(), -15);
    }

    #[test]
    fn test_purchase_payment_correction() {
        let totals = PurchaseTotals::compute([(1, 1000)], 0, 0).with_amount_paid(600);
        assert_eq!(totals.balance_due.cents(), 400);
    }

    #[test]
    fn test_sale_totals_short_payment_has_no_change() {
        let totals = SaleTotals::compute([(1, 1000, 0)], 0, 900);
        assert_eq!(totals.change_due, Money::zero());
    }

    #[test]
    fn test_sale_totals_with_discount() {
        let totals = SaleTotals::compute([(2, 150, 10), (1, 500, 0)], 0, 780);
        assert_eq!(totals.subtotal.cents(), 780);
        assert_eq!(totals.change_due, Money::zero());

        let corrected = totals.with_amount_paid(1000);
        assert_eq!(corrected.change_due.cents(), 220);
    }

    #[test]
    fn test_largest_accepted_invoice_fits() {
        use crate::{MAX_AMOUNT_CENTS, MAX_LINE_ITEMS, MAX_LINE_QUANTITY};

        let lines = vec![(MAX_LINE_QUANTITY, MAX_AMOUNT_CENTS); MAX_LINE_ITEMS];
        let purchase = PurchaseTotals::compute(lines, MAX_AMOUNT_CENTS, 0);
        assert_eq!(
            purchase.grand_total.cents(),
            MAX_AMOUNT_CENTS * MAX_LINE_QUANTITY * MAX_LINE_ITEMS as i64 + MAX_AMOUNT_CENTS
        );
        assert!(purchase.balance_due.is_positive());

        let lines = vec![(MAX_LINE_QUANTITY, MAX_AMOUNT_CENTS, 0); MAX_LINE_ITEMS];
        let sale = SaleTotals::compute(lines, MAX_AMOUNT_CENTS, MAX_AMOUNT_CENTS);
        assert_eq!(sale.grand_total, purchase.grand_total);
        assert_eq!(sale.change_due, Money::zero());
    }

    #[test]
    fn test_line_profit_scenario() {
        assert_eq!(line_profit(2, 150, 10, 100), Money::from_cents(80));
    }

    #[test]
    fn test_line_profit_can_be_negative() {
        assert_eq!(line_profit(1, 100, 50, 80).cents(), -30);
    }

    #[test]
    fn test_invoice_number_format() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let number = format_invoice_number(PURCHASE_INVOICE_PREFIX, date, "ab-12cd34ef");
        assert_eq!(number, "PUR-20251231-AB12CD");
        assert!(crate::validation::validate_invoice_number(&number).is_ok());
    }
}
