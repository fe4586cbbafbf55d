//! # Repository Module
//!
//! Database repository implementations for the Bazaar back office.
//!
//! ## Pool Methods and `_in` Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Kinds of Repository Methods                      │
//! │                                                                         │
//! │  db.purchases().get("uuid")          &self, runs on the pool           │
//! │  db.purchases().update_details(..)   (one statement or own tx)         │
//! │                                                                         │
//! │  PurchaseRepository::insert_in(&mut tx, &purchase)                     │
//! │  StockLedger::apply_in(&mut tx, &batch)                                │
//! │       │                                                                 │
//! │       └── associated fns over `&mut SqliteConnection`, so the          │
//! │           coordinator can compose them inside ONE transaction          │
//! │                                                                         │
//! │  Stock is never written outside `StockLedger::apply_in`.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog CRUD and lookups
//! - [`PartyRepository`](party::PartyRepository) - Customers and suppliers
//! - [`PurchaseRepository`](purchase::PurchaseRepository) - Inbound ledger rows
//! - [`SaleRepository`](sale::SaleRepository) - Outbound ledger rows
//! - [`StockLedger`](stock::StockLedger) - Stock deltas and reconciliation
//! - [`AnalyticsRepository`](analytics::AnalyticsRepository) - Dashboard reports

use sqlx::{QueryBuilder, Sqlite};

pub mod analytics;
pub mod party;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod stock;

/// Appends `(?, ?, ...)` binding every id to a query ending in `IN `.
///
/// SQLite accepts an empty list; callers usually short-circuit first anyway.
pub(crate) fn push_id_list<'args>(builder: &mut QueryBuilder<'args, Sqlite>, ids: &'args [String]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(")");
}

/// Generates a new row id.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
