//! # bazaar-core: Pure Business Logic for the Bazaar Back Office
//!
//! This crate holds every rule of the inventory ledger as pure functions with
//! zero I/O dependencies. The database crate feeds it snapshots and fact rows;
//! it answers with plans, totals and reports.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Bazaar Back Office Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             Boundary (HTTP handlers, backoffice CLI)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          bazaar-db: Transaction Coordinator, StockLedger,       │   │
//! │  │          repositories, analytics read side (SQLite)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ snapshots / fact rows                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌─────────┐ │   │
//! │  │  │  types  │ │ ledger  │ │ totals  │ │ aggregate │ │analytics│ │   │
//! │  │  │ Product │ │ deltas  │ │ invoice │ │ group_by  │ │ reports │ │   │
//! │  │  │ Sale    │ │ plan    │ │ profit  │ │ rank/join │ │         │ │   │
//! │  │  └─────────┘ └─────────┘ └─────────┘ └───────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK READS • PURE FUNCTIONS        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Purchase, Sale, line items, inputs)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation rules
//! - [`ledger`] - Stock deltas, batch accumulation and all-or-nothing planning
//! - [`totals`] - Invoice totals and per-line profit
//! - [`aggregate`] - Grouping, ranking and join-by-id primitives
//! - [`analytics`] - Dashboard reports built from the primitives
//!
//! ## Example Usage
//!
//! ```rust
//! use std::collections::HashMap;
//! use bazaar_core::ledger::{plan, DeltaBatch, StockDelta};
//!
//! let batch = DeltaBatch::apply(vec![StockDelta::new("shirt", -2)]);
//! let snapshot = HashMap::from([("shirt".to_string(), 5)]);
//!
//! let levels = plan(&batch, &snapshot).unwrap();
//! assert_eq!(levels[0].after, 3);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregate;
pub mod analytics;
pub mod error;
pub mod ledger;
pub mod money;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Stock level at or below which a product counts as "low stock".
///
/// A product is low on stock when `0 < stock_quantity <= threshold`;
/// zero or below is "out of stock" instead.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Default row count for the top products / top customers reports.
pub const DEFAULT_TOP_LIMIT: usize = 5;

/// Number of calendar days covered by the weekly sales report.
pub const WEEKLY_WINDOW_DAYS: i64 = 7;

/// Maximum line items on a single purchase or sale invoice.
pub const MAX_LINE_ITEMS: usize = 100;

/// Maximum quantity on a single line item.
///
/// Guards against typos like 100000 instead of 100 on wholesale purchases.
pub const MAX_LINE_QUANTITY: i64 = 100_000;

/// Largest accepted amount in cents for a price, cost, tax or payment.
///
/// A full invoice (`MAX_LINE_ITEMS` lines of `MAX_LINE_QUANTITY` at this
/// price, plus tax) still fits in an `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;

const _: () = assert!(
    (MAX_LINE_ITEMS as i64) * MAX_LINE_QUANTITY <= (i64::MAX - MAX_AMOUNT_CENTS) / MAX_AMOUNT_CENTS
);

/// Placeholder name for report rows whose product no longer resolves.
pub const UNKNOWN_PRODUCT_NAME: &str = "Unknown Product";
