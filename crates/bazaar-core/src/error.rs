//! # Error Types
//!
//! Domain-specific error types for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core errors (this file)                                        │
//! │  ├── CoreError        - Ledger business-rule violations                │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bazaar-db errors (separate crate)                                     │
//! │  ├── DbError          - Database operation failures                    │
//! │  ├── LedgerError      - What a ledger mutation returns to the boundary │
//! │  └── AnalyticsError   - Generic report computation failure             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → Boundary            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, invoice number, amounts)
//! 3. Errors are enum variants, never String
//! 4. A stock violation always names the product and the shortfall

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Ledger business-rule errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A line item or delta references a product that doesn't exist.
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: String },

    /// Applying a sale would take a product's stock below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale line: 5 × SHIRT-M
    ///      │
    ///      ▼
    /// Snapshot: available = 3
    ///      │
    ///      ▼
    /// InsufficientStock { product_id, requested: 5, available: 3 }
    ///      │
    ///      ▼
    /// Nothing written; cashier sees "only 3 in stock"
    /// ```
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// Reversing a ledger entry would take a product's stock below zero.
    ///
    /// ## When This Occurs
    /// Deleting a purchase of 10 units after 8 of them were already sold:
    /// the reversal needs 10 but only 2 remain. Stock is never clamped.
    #[error("Cannot reverse stock for product {product_id}: reversal needs {required}, only {available} on hand")]
    ReversalConflict {
        product_id: String,
        required: i64,
        available: i64,
    },

    /// Invoice number already used by another record of the same ledger.
    #[error("Invoice number '{invoice_number}' already exists")]
    DuplicateInvoice { invoice_number: String },

    /// A ledger record (purchase, sale) was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a ProductNotFound error.
    pub fn product_not_found(product_id: impl Into<String>) -> Self {
        CoreError::ProductNotFound {
            product_id: product_id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any store round-trip; always a client-side fix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, bad invoice number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            requested: 5,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product p-1: available 3, requested 5"
        );
    }

    #[test]
    fn test_reversal_conflict_message() {
        let err = CoreError::ReversalConflict {
            product_id: "p-9".to_string(),
            required: 10,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "Cannot reverse stock for product p-9: reversal needs 10, only 2 on hand"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "items".to_string(),
        };
        assert_eq!(err.to_string(), "items is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "sku".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
