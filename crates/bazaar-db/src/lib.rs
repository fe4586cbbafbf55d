//! # bazaar-db: Database Layer for the Bazaar Back Office
//!
//! SQLite storage for the catalog, both ledgers and the analytics read side.
//! Every stock mutation in the system goes through this crate.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Bazaar Back Office Data Flow                       │
//! │                                                                         │
//! │  backoffice CLI / HTTP handler                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   bazaar-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────────────────┐   ┌──────────────────────────────┐    │   │
//! │  │  │ TransactionCoord.   │──►│ StockLedger::apply_in        │    │   │
//! │  │  │ create/delete       │   │ lock rows → snapshot → plan  │    │   │
//! │  │  │ purchase & sale     │   │ → guarded updates            │    │   │
//! │  │  └─────────┬───────────┘   └──────────────────────────────┘    │   │
//! │  │            │ same SQLite transaction                            │   │
//! │  │            ▼                                                    │   │
//! │  │  ┌─────────────────────┐   ┌──────────────────────────────┐    │   │
//! │  │  │ Purchase/Sale repos │   │ AnalyticsRepository          │    │   │
//! │  │  │ header + lines      │   │ read tx → fact rows → core   │    │   │
//! │  │  └─────────────────────┘   └──────────────────────────────┘    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL) ← migrations/sqlite/*.sql embedded at compile time       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - `DbError`, `LedgerError`, `AnalyticsError`
//! - [`repository`] - Catalog, parties, ledgers, stock and analytics
//! - [`coordinator`] - All-or-nothing ledger mutations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./bazaar.db")).await?;
//!
//! let sale = db.coordinator().create_sale(new_sale).await?;
//! let top = db.analytics().top_products(5).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod coordinator;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use coordinator::TransactionCoordinator;
pub use error::{AnalyticsError, AnalyticsResult, DbError, DbResult, LedgerError, LedgerResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::analytics::AnalyticsRepository;
pub use repository::party::PartyRepository;
pub use repository::product::ProductRepository;
pub use repository::purchase::PurchaseRepository;
pub use repository::sale::SaleRepository;
pub use repository::stock::StockLedger;
