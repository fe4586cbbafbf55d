//! # Transaction Coordinator
//!
//! Every ledger mutation: create or delete a purchase or a sale together with
//! its stock effect, as one SQLite transaction.
//!
//! ## Create Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        create_sale(input)                              │
//! │                                                                         │
//! │  validate_new_sale ──✗──► Validation                                   │
//! │       │                                                                 │
//! │  load products, price lines from catalog ──✗──► ProductNotFound        │
//! │       │                                                                 │
//! │  invoice number: supplied (checked unique) or SAL-YYYYMMDD-XXXXXX      │
//! │       │                                                                 │
//! │  BEGIN                                                                  │
//! │   ├─ StockLedger::apply_in(−qty per line) ──✗──► InsufficientStock     │
//! │   ├─ customer exists ──✗──► NotFound { entity: "Customer" }            │
//! │   ├─ SaleRepository::insert_in(header + lines) ──✗──► DuplicateInvoice │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any ✗ after BEGIN drops the transaction: no record, no stock change.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Delete
//! The record is loaded inside the write transaction and its exact stock
//! effect is reversed before the rows go. A purchase whose stock has since
//! been sold cannot be reversed: the delete fails with `ReversalConflict` and
//! the purchase stays.

use chrono::{DateTime, Local, Utc};
use sqlx::SqlitePool;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{DbError, LedgerError, LedgerResult};
use crate::repository::new_id;
use crate::repository::party::PartyRepository;
use crate::repository::product::ProductRepository;
use crate::repository::purchase::PurchaseRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::stock::StockLedger;
use bazaar_core::aggregate::Lookup;
use bazaar_core::ledger::DeltaBatch;
use bazaar_core::totals::{
    format_invoice_number, sale_line_total, PurchaseTotals, SaleTotals, PURCHASE_INVOICE_PREFIX,
    SALE_INVOICE_PREFIX,
};
use bazaar_core::validation::{validate_new_purchase, validate_new_sale};
use bazaar_core::{Money, NewPurchase, NewSale, Product, Purchase, PurchaseItem, Sale, SaleItem};

/// Runs ledger mutations atomically with their stock deltas.
///
/// ```rust,ignore
/// let coordinator = db.coordinator();
///
/// match coordinator.create_sale(input).await {
///     Ok(sale) => println!("{}", sale.invoice_number),
///     Err(LedgerError::InsufficientStock { product_id, requested, available }) => { ... }
///     Err(other) => return Err(other.into()),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TransactionCoordinator {
    pool: SqlitePool,
}

impl TransactionCoordinator {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionCoordinator { pool }
    }

    // =========================================================================
    // Purchases
    // =========================================================================

    /// Records a purchase and adds its quantities to stock.
    pub async fn create_purchase(&self, input: NewPurchase) -> LedgerResult<Purchase> {
        match self.insert_purchase(input).await {
            Ok(purchase) => {
                info!(
                    purchase_id = %purchase.id,
                    invoice_number = %purchase.invoice_number,
                    lines = purchase.items.len(),
                    grand_total = %purchase.grand_total(),
                    "Purchase recorded"
                );
                Ok(purchase)
            }
            Err(err) => Err(rejected("create_purchase", err)),
        }
    }

    /// Deletes a purchase and takes its quantities back out of stock.
    ///
    /// Returns the deleted purchase.
    pub async fn delete_purchase(&self, id: &str) -> LedgerResult<Purchase> {
        match self.remove_purchase(id).await {
            Ok(purchase) => {
                info!(
                    purchase_id = %purchase.id,
                    invoice_number = %purchase.invoice_number,
                    "Purchase deleted, stock reversed"
                );
                Ok(purchase)
            }
            Err(err) => Err(rejected("delete_purchase", err)),
        }
    }

    async fn insert_purchase(&self, input: NewPurchase) -> LedgerResult<Purchase> {
        validate_new_purchase(&input)?;

        let catalog = self.catalog(input.items.iter().map(|l| &l.product_id)).await?;
        let date = input.date.unwrap_or_else(Utc::now);
        let invoice_number = match input.invoice_number.as_deref() {
            Some(number) => {
                let number = number.trim();
                if PurchaseRepository::new(self.pool.clone())
                    .exists_invoice(number)
                    .await?
                {
                    return Err(LedgerError::DuplicateInvoice {
                        invoice_number: number.to_string(),
                    });
                }
                number.to_string()
            }
            None => generate_invoice_number(PURCHASE_INVOICE_PREFIX, date),
        };

        let purchase_id = new_id();
        let mut items = Vec::with_capacity(input.items.len());
        for (position, line) in input.items.iter().enumerate() {
            let product = resolve(&catalog, &line.product_id)?;
            items.push(PurchaseItem {
                id: new_id(),
                purchase_id: purchase_id.clone(),
                product_id: product.id.clone(),
                position: position as i64,
                sku_snapshot: product.sku.clone(),
                name_snapshot: product.name.clone(),
                quantity: line.quantity,
                unit_cost_cents: line.unit_cost_cents,
                line_total_cents: Money::from_cents(line.unit_cost_cents)
                    .multiply_quantity(line.quantity)
                    .cents(),
            });
        }

        let totals = PurchaseTotals::compute(
            items.iter().map(|i| (i.quantity, i.unit_cost_cents)),
            input.tax_cents,
            input.amount_paid_cents,
        );

        let now = Utc::now();
        let purchase = Purchase {
            id: purchase_id,
            invoice_number,
            date,
            supplier_id: input.supplier_id,
            subtotal_cents: totals.subtotal.cents(),
            tax_cents: totals.tax.cents(),
            grand_total_cents: totals.grand_total.cents(),
            payment_method: input.payment_method,
            amount_paid_cents: totals.amount_paid.cents(),
            balance_due_cents: totals.balance_due.cents(),
            notes: input.notes,
            created_at: now,
            updated_at: now,
            items,
        };

        let mut tx = self.pool.begin().await?;

        StockLedger::apply_in(&mut tx, &DeltaBatch::for_purchase(&purchase.items)).await?;
        if let Some(supplier_id) = purchase.supplier_id.as_deref() {
            if !PartyRepository::supplier_exists_in(&mut tx, supplier_id).await? {
                return Err(DbError::not_found("Supplier", supplier_id).into());
            }
        }
        PurchaseRepository::insert_in(&mut tx, &purchase)
            .await
            .map_err(|err| invoice_conflict(err, "purchases.invoice_number", &purchase.invoice_number))?;

        tx.commit().await?;
        Ok(purchase)
    }

    async fn remove_purchase(&self, id: &str) -> LedgerResult<Purchase> {
        let mut tx = self.pool.begin().await?;

        PurchaseRepository::touch_in(&mut tx, id).await?;
        let purchase = PurchaseRepository::get_in(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Purchase", id))?;

        StockLedger::apply_in(&mut tx, &DeltaBatch::for_purchase(&purchase.items).reversed())
            .await?;
        PurchaseRepository::delete_in(&mut tx, id).await?;

        tx.commit().await?;
        Ok(purchase)
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Records a sale priced from the catalog and takes its quantities out of
    /// stock.
    ///
    /// Fails with `InsufficientStock` naming the first short product (by
    /// product id) when any line cannot be covered; nothing is written then.
    pub async fn create_sale(&self, input: NewSale) -> LedgerResult<Sale> {
        match self.insert_sale(input).await {
            Ok(sale) => {
                info!(
                    sale_id = %sale.id,
                    invoice_number = %sale.invoice_number,
                    lines = sale.items.len(),
                    grand_total = %sale.grand_total(),
                    "Sale recorded"
                );
                Ok(sale)
            }
            Err(err) => Err(rejected("create_sale", err)),
        }
    }

    /// Deletes a sale and puts its quantities back into stock.
    pub async fn delete_sale(&self, id: &str) -> LedgerResult<Sale> {
        match self.remove_sale(id).await {
            Ok(sale) => {
                info!(
                    sale_id = %sale.id,
                    invoice_number = %sale.invoice_number,
                    "Sale deleted, stock restored"
                );
                Ok(sale)
            }
            Err(err) => Err(rejected("delete_sale", err)),
        }
    }

    async fn insert_sale(&self, input: NewSale) -> LedgerResult<Sale> {
        validate_new_sale(&input)?;

        let catalog = self.catalog(input.items.iter().map(|l| &l.product_id)).await?;
        let date = input.date.unwrap_or_else(Utc::now);
        let invoice_number = match input.invoice_number.as_deref() {
            Some(number) => {
                let number = number.trim();
                if SaleRepository::new(self.pool.clone())
                    .exists_invoice(number)
                    .await?
                {
                    return Err(LedgerError::DuplicateInvoice {
                        invoice_number: number.to_string(),
                    });
                }
                number.to_string()
            }
            None => generate_invoice_number(SALE_INVOICE_PREFIX, date),
        };

        let sale_id = new_id();
        let mut items = Vec::with_capacity(input.items.len());
        for (position, line) in input.items.iter().enumerate() {
            let product = resolve(&catalog, &line.product_id)?;
            items.push(SaleItem {
                id: new_id(),
                sale_id: sale_id.clone(),
                product_id: product.id.clone(),
                position: position as i64,
                sku_snapshot: product.sku.clone(),
                name_snapshot: product.name.clone(),
                quantity: line.quantity,
                unit_price_cents: product.sale_price_cents,
                discount_cents: product.discount_cents,
                line_total_cents: sale_line_total(
                    line.quantity,
                    product.sale_price_cents,
                    product.discount_cents,
                )
                .cents(),
            });
        }

        let totals = SaleTotals::compute(
            items
                .iter()
                .map(|i| (i.quantity, i.unit_price_cents, i.discount_cents)),
            input.tax_cents,
            input.amount_paid_cents,
        );

        let now = Utc::now();
        let sale = Sale {
            id: sale_id,
            invoice_number,
            date,
            cashier_id: input.cashier_id,
            customer_id: input.customer_id,
            subtotal_cents: totals.subtotal.cents(),
            tax_cents: totals.tax.cents(),
            grand_total_cents: totals.grand_total.cents(),
            payment_method: input.payment_method,
            amount_paid_cents: totals.amount_paid.cents(),
            change_due_cents: totals.change_due.cents(),
            notes: input.notes,
            created_at: now,
            updated_at: now,
            items,
        };

        let mut tx = self.pool.begin().await?;

        // Stock first: a short line must fail before any row is written.
        StockLedger::apply_in(&mut tx, &DeltaBatch::for_sale(&sale.items)).await?;
        if let Some(customer_id) = sale.customer_id.as_deref() {
            if !PartyRepository::customer_exists_in(&mut tx, customer_id).await? {
                return Err(DbError::not_found("Customer", customer_id).into());
            }
        }
        SaleRepository::insert_in(&mut tx, &sale)
            .await
            .map_err(|err| invoice_conflict(err, "sales.invoice_number", &sale.invoice_number))?;

        tx.commit().await?;
        Ok(sale)
    }

    async fn remove_sale(&self, id: &str) -> LedgerResult<Sale> {
        let mut tx = self.pool.begin().await?;

        SaleRepository::touch_in(&mut tx, id).await?;
        let sale = SaleRepository::get_in(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;

        StockLedger::apply_in(&mut tx, &DeltaBatch::for_sale(&sale.items).reversed()).await?;
        SaleRepository::delete_in(&mut tx, id).await?;

        tx.commit().await?;
        Ok(sale)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Current catalog rows for the products referenced by the lines.
    ///
    /// Read outside the write transaction: it supplies names, SKUs and prices.
    /// Stock is re-read under the write lock by `StockLedger::apply_in`.
    async fn catalog<'a>(
        &self,
        product_ids: impl Iterator<Item = &'a String>,
    ) -> LedgerResult<Lookup<Product>> {
        let mut ids: Vec<String> = product_ids.cloned().collect();
        ids.sort();
        ids.dedup();

        let products = ProductRepository::new(self.pool.clone())
            .get_many(&ids)
            .await?;

        Ok(Lookup::new(products, |p| p.id.clone()))
    }
}

fn resolve<'c>(catalog: &'c Lookup<Product>, product_id: &str) -> LedgerResult<&'c Product> {
    catalog
        .get(product_id)
        .ok_or_else(|| LedgerError::ProductNotFound {
            product_id: product_id.to_string(),
        })
}

/// `PREFIX-YYYYMMDD-XXXXXX` using the local calendar date of `date`.
fn generate_invoice_number(prefix: &str, date: DateTime<Utc>) -> String {
    let local_date = date.with_timezone(&Local).date_naive();
    format_invoice_number(prefix, local_date, &Uuid::new_v4().simple().to_string())
}

/// Turns a UNIQUE violation on the invoice column into `DuplicateInvoice`.
fn invoice_conflict(err: DbError, column: &str, invoice_number: &str) -> LedgerError {
    if err.is_unique_violation_on(column) {
        LedgerError::DuplicateInvoice {
            invoice_number: invoice_number.to_string(),
        }
    } else {
        err.into()
    }
}

/// Logs a failed mutation at the level it deserves and passes it on.
fn rejected(operation: &'static str, err: LedgerError) -> LedgerError {
    match &err {
        LedgerError::StoreUnavailable(source) => {
            error!(operation, error = %source, "Ledger mutation failed");
        }
        other => {
            warn!(operation, kind = other.kind(), error = %other, "Ledger mutation rejected");
        }
    }
    err
}

// =============================================================================
// Unit Tests
// =============================================================================
