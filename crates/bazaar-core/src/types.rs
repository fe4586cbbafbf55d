//! # Domain Types
//!
//! Core domain types used throughout the Bazaar back office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Purchase     │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  invoice_number │   │  invoice_number │       │
//! │  │  sku (business) │   │  supplier_id    │   │  customer_id    │       │
//! │  │  prices (cents) │   │  items (+qty)   │   │  items (−qty)   │       │
//! │  │  stock_quantity │   │  balance_due    │   │  change_due     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Customer     │   │    Supplier     │   │ PaymentMethod   │       │
//! │  │  name, phone    │   │  name, company  │   │  Cash, Card,    │       │
//! │  └─────────────────┘   └─────────────────┘   │  JazzCash, ...  │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, invoice_number) - human-readable, unique
//!
//! ## Snapshot Pattern
//! Line items freeze the product's SKU and name at write time so a ledger entry
//! still reads correctly after the catalog entry is renamed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A catalog product with its single stock counter.
///
/// `stock_quantity` is only ever changed by the stock ledger; administrative
/// edits go through [`ProductUpdate`], which has no stock field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier, unique.
    pub sku: String,

    /// Barcode, when distinct from the SKU.
    pub barcode: Option<String>,

    /// Display name.
    pub name: String,

    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    pub supplier_id: Option<String>,
    pub description: Option<String>,

    /// Current cost per unit, used for present-cost profit.
    pub purchase_price_cents: i64,

    /// List price per unit.
    pub sale_price_cents: i64,

    /// Per-unit discount applied at sale time.
    pub discount_cents: i64,

    /// Units on hand. Never negative.
    pub stock_quantity: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn purchase_price(&self) -> Money {
        Money::from_cents(self.purchase_price_cents)
    }

    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    /// Checks if the requested quantity is on hand.
    ///
    /// Advisory only: the ledger re-checks under the write lock.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.stock_quantity >= quantity
    }

    /// Low stock: `0 < stock_quantity <= threshold`.
    pub fn is_low_stock(&self, threshold: i64) -> bool {
        self.stock_quantity > 0 && self.stock_quantity <= threshold
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.stock_quantity <= 0
    }
}

/// One page of a catalog search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductPage {
    pub items: Vec<Product>,
    /// Matching products across all pages.
    pub total: i64,
    /// 1-based.
    pub page: u32,
    pub per_page: u32,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How an invoice was settled.
///
/// Sales accept every method; purchases only the subset reported by
/// [`PaymentMethod::allowed_for_purchase`].
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    JazzCash,
    Easypaisa,
    BankTransfer,
    Credit,
}

impl PaymentMethod {
    /// Every method, in declaration order.
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::JazzCash,
        PaymentMethod::Easypaisa,
        PaymentMethod::BankTransfer,
        PaymentMethod::Credit,
    ];

    /// Returns the stored/serialized name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::JazzCash => "jazz_cash",
            PaymentMethod::Easypaisa => "easypaisa",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Credit => "credit",
        }
    }

    /// Wallet methods are only taken from customers, never paid to suppliers.
    pub const fn allowed_for_purchase(&self) -> bool {
        matches!(
            self,
            PaymentMethod::Cash
                | PaymentMethod::Card
                | PaymentMethod::BankTransfer
                | PaymentMethod::Credit
        )
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Purchase (inbound ledger)
// =============================================================================

/// A stock-inbound ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Purchase {
    pub id: String,
    pub invoice_number: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub supplier_id: Option<String>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub grand_total_cents: i64,
    pub payment_method: PaymentMethod,
    pub amount_paid_cents: i64,
    /// `grand_total - amount_paid`; negative when overpaid.
    pub balance_due_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Line items in invoice order. Loaded separately from the header row.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<PurchaseItem>,
}

impl Purchase {
    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }
}

/// A line item in a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseItem {
    pub id: String,
    pub purchase_id: String,
    pub product_id: String,
    /// Zero-based position on the invoice.
    pub position: i64,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub line_total_cents: i64,
}

// =============================================================================
// Sale (outbound ledger)
// =============================================================================

/// A stock-outbound ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub invoice_number: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub cashier_id: Option<String>,
    pub customer_id: Option<String>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub grand_total_cents: i64,
    pub payment_method: PaymentMethod,
    pub amount_paid_cents: i64,
    /// `max(0, amount_paid - grand_total)`.
    pub change_due_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<SaleItem>,
}

impl Sale {
    #[inline]
    pub fn grand_total(&self) -> Money {
        Money::from_cents(self.grand_total_cents)
    }
}

/// A line item in a sale.
/// Price and discount are frozen at sale time; the product may change later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub position: i64,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Per-unit discount.
    pub discount_cents: i64,
    /// `quantity × (unit_price − discount)`.
    pub line_total_cents: i64,
}

impl SaleItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Parties
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    /// Unique when present.
    pub phone: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Inputs
// =============================================================================

/// Input for creating a catalog product. Stock always starts at zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    /// Left blank, a SKU is generated on insert.
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub barcode: Option<String>,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub subcategory_id: Option<String>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub purchase_price_cents: i64,
    pub sale_price_cents: i64,
    #[serde(default)]
    pub discount_cents: i64,
}

/// Administrative edit of non-stock product fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub subcategory_id: Option<String>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub purchase_price_cents: Option<i64>,
    #[serde(default)]
    pub sale_price_cents: Option<i64>,
    #[serde(default)]
    pub discount_cents: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSupplier {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One purchase line as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchaseLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

/// Input for `create_purchase`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPurchase {
    /// Generated when absent.
    #[serde(default)]
    pub invoice_number: Option<String>,
    /// Defaults to now.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    pub items: Vec<NewPurchaseLine>,
    #[serde(default)]
    pub tax_cents: i64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub amount_paid_cents: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One sale line as submitted. Price and discount come from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSaleLine {
    pub product_id: String,
    pub quantity: i64,
}

/// Input for `create_sale`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cashier_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub items: Vec<NewSaleLine>,
    #[serde(default)]
    pub tax_cents: i64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub amount_paid_cents: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Non-quantity correction of a ledger entry. Never touches stock.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerDetailsUpdate {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub amount_paid_cents: Option<i64>,
}

// =============================================================================
// Unit Tests
// =============================================================================
