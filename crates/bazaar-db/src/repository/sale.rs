//! # Sale Repository
//!
//! Rows of the outbound ledger: a `sales` header plus its `sale_items`.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (coordinator, one transaction)                              │
//! │     └── StockLedger::apply_in(−qty per line)                           │
//! │     └── SaleRepository::insert_in(header + items)                      │
//! │                                                                         │
//! │  2. (OPTIONAL) CORRECT                                                 │
//! │     └── update_details() → notes / payment method / amount paid        │
//! │         change_due recomputed, stock untouched                         │
//! │                                                                         │
//! │  3. (OPTIONAL) DELETE (coordinator, one transaction)                   │
//! │     └── touch_in → get_in → apply_in(+qty per line) → delete_in        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::totals::SaleTotals;
use bazaar_core::validation::validate_details_update;
use bazaar_core::{LedgerDetailsUpdate, Money, Sale, SaleItem};

const SELECT_SALE: &str = r#"
    SELECT
        id, invoice_number, date, cashier_id, customer_id,
        subtotal_cents, tax_cents, grand_total_cents,
        payment_method, amount_paid_cents, change_due_cents,
        notes, created_at, updated_at
    FROM sales
"#;

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale with its line items.
    pub async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in(&mut conn, id).await
    }

    /// Lists sale headers, newest first. `items` is left empty.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "{SELECT_SALE} ORDER BY date DESC, invoice_number LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    pub async fn exists_invoice(&self, invoice_number: &str) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sales WHERE invoice_number = ?1)")
                .bind(invoice_number)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Corrects notes, payment method or amount paid; change due follows.
    pub async fn update_details(&self, id: &str, update: &LedgerDetailsUpdate) -> DbResult<Sale> {
        validate_details_update(update.notes.as_deref(), update.amount_paid_cents)?;

        let mut tx = self.pool.begin().await?;

        Self::touch_in(&mut tx, id).await?;
        let mut sale = Self::get_in(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;

        let totals = SaleTotals {
            subtotal: Money::from_cents(sale.subtotal_cents),
            tax: Money::from_cents(sale.tax_cents),
            grand_total: Money::from_cents(sale.grand_total_cents),
            amount_paid: Money::from_cents(sale.amount_paid_cents),
            change_due: Money::from_cents(sale.change_due_cents),
        }
        .with_amount_paid(update.amount_paid_cents.unwrap_or(sale.amount_paid_cents));

        if let Some(notes) = &update.notes {
            sale.notes = Some(notes.clone());
        }
        if let Some(method) = update.payment_method {
            sale.payment_method = method;
        }
        sale.amount_paid_cents = totals.amount_paid.cents();
        sale.change_due_cents = totals.change_due.cents();
        sale.updated_at = Utc::now();

        debug!(id = %id, change_due = sale.change_due_cents, "Updating sale details");

        sqlx::query(
            r#"
            UPDATE sales SET
                notes = ?2,
                payment_method = ?3,
                amount_paid_cents = ?4,
                change_due_cents = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.notes)
        .bind(sale.payment_method)
        .bind(sale.amount_paid_cents)
        .bind(sale.change_due_cents)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(sale)
    }

    // =========================================================================
    // Transaction-scoped operations
    // =========================================================================

    /// Inserts the header and every line item.
    ///
    /// ## Snapshot Pattern
    /// SKU, name, price and discount are copied onto each line, so the sale
    /// reads the same after the product changes.
    pub async fn insert_in(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(
            id = %sale.id,
            invoice_number = %sale.invoice_number,
            lines = sale.items.len(),
            "Inserting sale"
        );

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, invoice_number, date, cashier_id, customer_id,
                subtotal_cents, tax_cents, grand_total_cents,
                payment_method, amount_paid_cents, change_due_cents,
                notes, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10, ?11,
                ?12, ?13, ?14
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.invoice_number)
        .bind(sale.date)
        .bind(&sale.cashier_id)
        .bind(&sale.customer_id)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.grand_total_cents)
        .bind(sale.payment_method)
        .bind(sale.amount_paid_cents)
        .bind(sale.change_due_cents)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *conn)
        .await?;

        for item in &sale.items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, position,
                    sku_snapshot, name_snapshot,
                    quantity, unit_price_cents, discount_cents, line_total_cents
                ) VALUES (
                    ?1, ?2, ?3, ?4,
                    ?5, ?6,
                    ?7, ?8, ?9, ?10
                )
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(item.position)
            .bind(&item.sku_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.discount_cents)
            .bind(item.line_total_cents)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!("{SELECT_SALE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match sale {
            Some(mut sale) => {
                sale.items = Self::items_in(conn, id).await?;
                Ok(Some(sale))
            }
            None => Ok(None),
        }
    }

    pub async fn items_in(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT
                id, sale_id, product_id, position,
                sku_snapshot, name_snapshot,
                quantity, unit_price_cents, discount_cents, line_total_cents
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY position
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    /// No-op write that takes the write lock and checks the sale exists.
    pub async fn touch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE sales SET updated_at = updated_at WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        Ok(())
    }

    /// Deletes the header; line items cascade.
    pub async fn delete_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting sale");

        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        Ok(())
    }
}
