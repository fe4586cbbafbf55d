//! # Validation Module
//!
//! Input validation for catalog entries and ledger mutations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (before any store round-trip)                    │
//! │  ├── Field format (sku, invoice number, names)                         │
//! │  └── Ranges (quantity 1..=100_000, amounts 0..=1e11, 1..=100 lines)    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Stock ledger plan (inside the transaction)                   │
//! │  └── Product exists, stock never negative                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE(sku), UNIQUE(invoice_number)                               │
//! │  └── CHECK(stock_quantity >= 0), CHECK(quantity > 0)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bazaar_core::validation::{validate_sku, validate_quantity};
//!
//! assert!(validate_sku("SHIRT-M").is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::{NewProduct, NewPurchase, NewSale, PaymentMethod};
use crate::{MAX_AMOUNT_CENTS, MAX_LINE_ITEMS, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_INVOICE_NUMBER_LEN: usize = 50;
const MAX_NOTES_LEN: usize = 1000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use bazaar_core::validation::validate_sku;
///
/// assert!(validate_sku("SHIRT-M").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, customer, supplier).
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a caller-supplied invoice number.
///
/// Letters, digits, `-`, `_` and `/` only, so generated (`SAL-20240101-AB12CD`)
/// and hand-written (`INV/2024/0017`) styles both pass.
///
/// ```rust
/// use bazaar_core::validation::validate_invoice_number;
///
/// assert!(validate_invoice_number("INV/2024/0017").is_ok());
/// assert!(validate_invoice_number("has space").is_err());
/// ```
pub fn validate_invoice_number(invoice_number: &str) -> ValidationResult<()> {
    if invoice_number.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "invoice_number".to_string(),
        });
    }

    if invoice_number.len() > MAX_INVOICE_NUMBER_LEN {
        return Err(ValidationError::TooLong {
            field: "invoice_number".to_string(),
            max: MAX_INVOICE_NUMBER_LEN,
        });
    }

    if !invoice_number
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "invoice_number".to_string(),
            reason: "must contain only letters, numbers, '-', '_' and '/'".to_string(),
        });
    }

    Ok(())
}

fn validate_notes(notes: Option<&str>) -> ValidationResult<()> {
    match notes {
        Some(notes) if notes.chars().count() > MAX_NOTES_LEN => Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LEN,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY (100,000)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an amount in cents (prices, costs, tax, payments).
///
/// ## Rules
/// - Must not be negative
/// - Must not exceed MAX_AMOUNT_CENTS, so invoice totals cannot overflow
///
/// ```rust
/// use bazaar_core::validation::validate_amount_cents;
/// use bazaar_core::MAX_AMOUNT_CENTS;
///
/// assert!(validate_amount_cents("tax", 0).is_ok());
/// assert!(validate_amount_cents("tax", -1).is_err());
/// assert!(validate_amount_cents("tax", MAX_AMOUNT_CENTS + 1).is_err());
/// ```
pub fn validate_amount_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_AMOUNT_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Validates the low-stock threshold of the reports.
pub fn validate_low_stock_threshold(threshold: i64) -> ValidationResult<()> {
    if threshold < 0 {
        return Err(ValidationError::OutOfRange {
            field: "low_threshold".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a product's price triple.
///
/// A discount larger than the sale price would sell below zero.
pub fn validate_product_prices(
    purchase_price_cents: i64,
    sale_price_cents: i64,
    discount_cents: i64,
) -> ValidationResult<()> {
    validate_amount_cents("purchase_price", purchase_price_cents)?;
    validate_amount_cents("sale_price", sale_price_cents)?;
    validate_amount_cents("discount", discount_cents)?;

    if discount_cents > sale_price_cents {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: sale_price_cents,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines on one invoice (1..=100).
pub fn validate_line_count(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if lines > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_LINE_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Input Validators
// =============================================================================

/// Validates a new catalog product.
pub fn validate_new_product(input: &NewProduct) -> ValidationResult<()> {
    validate_sku(&input.sku)?;
    validate_name("name", &input.name)?;
    if let Some(barcode) = input.barcode.as_deref() {
        validate_sku(barcode).map_err(|_| ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        })?;
    }
    validate_product_prices(
        input.purchase_price_cents,
        input.sale_price_cents,
        input.discount_cents,
    )
}

/// Validates a purchase before any stock is touched.
pub fn validate_new_purchase(input: &NewPurchase) -> ValidationResult<()> {
    if let Some(invoice_number) = input.invoice_number.as_deref() {
        validate_invoice_number(invoice_number)?;
    }
    validate_line_count(input.items.len())?;
    for line in &input.items {
        require_id("product_id", &line.product_id)?;
        validate_quantity(line.quantity)?;
        validate_amount_cents("unit_cost", line.unit_cost_cents)?;
    }
    validate_amount_cents("tax", input.tax_cents)?;
    validate_amount_cents("amount_paid", input.amount_paid_cents)?;
    validate_purchase_payment_method(input.payment_method)?;
    validate_notes(input.notes.as_deref())
}

/// Validates a sale before any stock is touched.
pub fn validate_new_sale(input: &NewSale) -> ValidationResult<()> {
    if let Some(invoice_number) = input.invoice_number.as_deref() {
        validate_invoice_number(invoice_number)?;
    }
    validate_line_count(input.items.len())?;
    for line in &input.items {
        require_id("product_id", &line.product_id)?;
        validate_quantity(line.quantity)?;
    }
    validate_amount_cents("tax", input.tax_cents)?;
    validate_amount_cents("amount_paid", input.amount_paid_cents)?;
    validate_notes(input.notes.as_deref())
}

/// Validates a notes/payment correction.
pub fn validate_details_update(
    notes: Option<&str>,
    amount_paid_cents: Option<i64>,
) -> ValidationResult<()> {
    if let Some(amount) = amount_paid_cents {
        validate_amount_cents("amount_paid", amount)?;
    }
    validate_notes(notes)
}

/// Purchases are settled by cash, card, bank transfer or credit only.
pub fn validate_purchase_payment_method(method: PaymentMethod) -> ValidationResult<()> {
    if method.allowed_for_purchase() {
        return Ok(());
    }

    Err(ValidationError::NotAllowed {
        field: "payment_method".to_string(),
        allowed: PaymentMethod::ALL
            .iter()
            .filter(|m| m.allowed_for_purchase())
            .map(|m| m.as_str().to_string())
            .collect(),
    })
}

fn require_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewPurchaseLine, NewSaleLine};

    fn purchase_line(qty: i64, cost: i64) -> NewPurchaseLine {
        NewPurchaseLine {
            product_id: "p-1".to_string(),
            quantity: qty,
            unit_cost_cents: cost,
        }
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("SHIRT-M").is_ok());
        assert!(validate_sku("product_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Lawn Suit 3pc").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_product_prices() {
        assert!(validate_product_prices(100, 150, 10).is_ok());
        assert!(validate_product_prices(100, 150, 150).is_ok());
        assert!(validate_product_prices(100, 150, 151).is_err());
        assert!(validate_product_prices(-1, 150, 0).is_err());
    }

    #[test]
    fn test_amounts_are_capped() {
        assert!(validate_amount_cents("unit_cost", MAX_AMOUNT_CENTS).is_ok());
        assert!(matches!(
            validate_amount_cents("unit_cost", i64::MAX / 2 + 1),
            Err(ValidationError::OutOfRange { max: MAX_AMOUNT_CENTS, .. })
        ));
        assert!(validate_product_prices(100, MAX_AMOUNT_CENTS + 1, 0).is_err());

        let oversized = NewPurchase {
            items: vec![purchase_line(2, i64::MAX / 2 + 1)],
            ..Default::default()
        };
        assert!(matches!(
            validate_new_purchase(&oversized),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "unit_cost"
        ));

        let huge_tax = NewSale {
            items: vec![NewSaleLine {
                product_id: "p-1".to_string(),
                quantity: 1,
            }],
            tax_cents: i64::MAX,
            ..Default::default()
        };
        assert!(matches!(
            validate_new_sale(&huge_tax),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "tax"
        ));
    }

    #[test]
    fn test_validate_line_count() {
        assert!(validate_line_count(0).is_err());
        assert!(validate_line_count(1).is_ok());
        assert!(validate_line_count(MAX_LINE_ITEMS).is_ok());
        assert!(validate_line_count(MAX_LINE_ITEMS + 1).is_err());
    }

    #[test]
    fn test_validate_new_purchase() {
        let mut input = NewPurchase {
            items: vec![purchase_line(10, 100)],
            ..Default::default()
        };
        assert!(validate_new_purchase(&input).is_ok());

        input.items.push(purchase_line(1, -5));
        assert!(matches!(
            validate_new_purchase(&input),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "unit_cost"
        ));
    }

    #[test]
    fn test_purchase_rejects_wallet_payment() {
        let input = NewPurchase {
            items: vec![purchase_line(1, 100)],
            payment_method: PaymentMethod::JazzCash,
            ..Default::default()
        };
        match validate_new_purchase(&input) {
            Err(ValidationError::NotAllowed { allowed, .. }) => {
                assert_eq!(allowed, vec!["cash", "card", "bank_transfer", "credit"]);
            }
            other => panic!("expected NotAllowed, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_new_sale() {
        let input = NewSale {
            items: vec![NewSaleLine {
                product_id: "p-1".to_string(),
                quantity: 0,
            }],
            ..Default::default()
        };
        assert!(matches!(
            validate_new_sale(&input),
            Err(ValidationError::MustBePositive { .. })
        ));

        let empty = NewSale::default();
        assert!(matches!(
            validate_new_sale(&empty),
            Err(ValidationError::Required { ref field }) if field == "items"
        ));
    }

    #[test]
    fn test_validate_invoice_number() {
        assert!(validate_invoice_number("SAL-20240101-AB12CD").is_ok());
        assert!(validate_invoice_number("").is_err());
        assert!(validate_invoice_number(&"X".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_low_stock_threshold() {
        assert!(validate_low_stock_threshold(0).is_ok());
        assert!(validate_low_stock_threshold(5).is_ok());
        assert!(validate_low_stock_threshold(-1).is_err());
    }
}
