//! # Database Error Types
//!
//! Error types for database operations and for the two services built on
//! them: ledger mutations and analytics reads.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ← Adds context and categorization                              │
//! │       │                                                                 │
//! │       ├──────────────────────────────┐                                  │
//! │       ▼                              ▼                                  │
//! │  LedgerError                    AnalyticsError                          │
//! │  (+ CoreError rule violations)  (generic ComputationFailed)             │
//! │       │                              │                                  │
//! │       ▼                              ▼                                  │
//! │  Boundary: which product, how short  Boundary: "report unavailable"     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bazaar_core::{CoreError, ValidationError};
use thiserror::Error;

// =============================================================================
// DbError
// =============================================================================

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - An update or delete by id matched nothing
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU or barcode
    /// - Duplicate invoice number
    /// - Duplicate supplier phone
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Deleting a product that ledger lines still reference
    /// - Referencing a non-existent supplier or customer
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Pool already closed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    ///
    /// ## When This Occurs
    /// - `database is locked` after the busy timeout elapsed
    /// - CHECK constraint failure
    /// - Runtime SQL error
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    ///
    /// ## When This Occurs
    /// - A guarded stock update matched no row after the plan said it would
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Input rejected before reaching SQLite.
    #[error("Invalid input: {0}")]
    Invalid(#[from] ValidationError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True when this is a UNIQUE violation on `table.column`.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field == column)
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// LedgerError
// =============================================================================

/// What a ledger mutation (create/delete purchase or sale, raw stock batch)
/// returns to its caller.
///
/// Every variant means nothing was written.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Surfaced with the product and the shortfall so the caller can react.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Invoice number '{invoice_number}' already exists")]
    DuplicateInvoice { invoice_number: String },

    /// The record is kept: its stock effect can no longer be undone cleanly.
    #[error("Cannot reverse stock for product {product_id}: reversal needs {required}, only {available} on hand")]
    ReversalConflict {
        product_id: String,
        required: i64,
        available: i64,
    },

    /// Transport or transaction failure. Not retried internally: stock
    /// mutations are not idempotent under blind retry.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] DbError),
}

impl LedgerError {
    /// Short machine-readable kind for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation",
            LedgerError::InsufficientStock { .. } => "insufficient_stock",
            LedgerError::ProductNotFound { .. } => "product_not_found",
            LedgerError::NotFound { .. } => "not_found",
            LedgerError::DuplicateInvoice { .. } => "duplicate_invoice",
            LedgerError::ReversalConflict { .. } => "reversal_conflict",
            LedgerError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound { product_id } => LedgerError::ProductNotFound { product_id },
            CoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => LedgerError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            CoreError::ReversalConflict {
                product_id,
                required,
                available,
            } => LedgerError::ReversalConflict {
                product_id,
                required,
                available,
            },
            CoreError::DuplicateInvoice { invoice_number } => {
                LedgerError::DuplicateInvoice { invoice_number }
            }
            CoreError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            CoreError::Validation(err) => LedgerError::Validation(err),
        }
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            DbError::Invalid(err) => LedgerError::Validation(err),
            other => LedgerError::StoreUnavailable(other),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::from(DbError::from(err))
    }
}

/// Result type for ledger mutations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// AnalyticsError
// =============================================================================

/// Report failures.
///
/// Store problems collapse into one generic variant: there is nothing a
/// dashboard user can do about them. The source stays chained for logs.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid report parameter: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("Failed to compute {report} report")]
    ComputationFailed {
        report: &'static str,
        #[source]
        source: DbError,
    },
}

/// Result type for analytics reads.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

// =============================================================================
// Unit Tests
// =============================================================================
