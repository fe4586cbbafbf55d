//! # Purchase Repository
//!
//! Rows of the inbound ledger: a `purchases` header plus its
//! `purchase_items`.
//!
//! Creating and deleting purchases changes stock, so those writes are only
//! exposed as `_in` functions for the
//! [`TransactionCoordinator`](crate::coordinator::TransactionCoordinator) to
//! run next to the matching stock batch. What remains on the pool is reads and
//! the payment/notes correction, which never touches stock.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::totals::PurchaseTotals;
use bazaar_core::validation::{validate_details_update, validate_purchase_payment_method};
use bazaar_core::{LedgerDetailsUpdate, Money, Purchase, PurchaseItem};

const SELECT_PURCHASE: &str = r#"
    SELECT
        id, invoice_number, date, supplier_id,
        subtotal_cents, tax_cents, grand_total_cents,
        payment_method, amount_paid_cents, balance_due_cents,
        notes, created_at, updated_at
    FROM purchases
"#;

/// Repository for purchase database operations.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Gets a purchase with its line items.
    pub async fn get(&self, id: &str) -> DbResult<Option<Purchase>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in(&mut conn, id).await
    }

    /// Lists purchase headers, newest first. `items` is left empty.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Purchase>> {
        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            "{SELECT_PURCHASE} ORDER BY date DESC, invoice_number LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(purchases)
    }

    /// Whether an invoice number is already taken.
    pub async fn exists_invoice(&self, invoice_number: &str) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM purchases WHERE invoice_number = ?1)")
                .bind(invoice_number)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchases")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Corrects notes, payment method or amount paid.
    ///
    /// The balance is recomputed from the stored grand total. Quantities and
    /// prices cannot be edited; delete and re-create the purchase instead.
    pub async fn update_details(
        &self,
        id: &str,
        update: &LedgerDetailsUpdate,
    ) -> DbResult<Purchase> {
        validate_details_update(update.notes.as_deref(), update.amount_paid_cents)?;
        if let Some(method) = update.payment_method {
            validate_purchase_payment_method(method)?;
        }

        let mut tx = self.pool.begin().await?;

        Self::touch_in(&mut tx, id).await?;
        let mut purchase = Self::get_in(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Purchase", id))?;

        let totals = PurchaseTotals {
            subtotal: Money::from_cents(purchase.subtotal_cents),
            tax: Money::from_cents(purchase.tax_cents),
            grand_total: Money::from_cents(purchase.grand_total_cents),
            amount_paid: Money::from_cents(purchase.amount_paid_cents),
            balance_due: Money::from_cents(purchase.balance_due_cents),
        }
        .with_amount_paid(update.amount_paid_cents.unwrap_or(purchase.amount_paid_cents));

        if let Some(notes) = &update.notes {
            purchase.notes = Some(notes.clone());
        }
        if let Some(method) = update.payment_method {
            purchase.payment_method = method;
        }
        purchase.amount_paid_cents = totals.amount_paid.cents();
        purchase.balance_due_cents = totals.balance_due.cents();
        purchase.updated_at = Utc::now();

        debug!(id = %id, balance_due = purchase.balance_due_cents, "Updating purchase details");

        sqlx::query(
            r#"
            UPDATE purchases SET
                notes = ?2,
                payment_method = ?3,
                amount_paid_cents = ?4,
                balance_due_cents = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.notes)
        .bind(purchase.payment_method)
        .bind(purchase.amount_paid_cents)
        .bind(purchase.balance_due_cents)
        .bind(purchase.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(purchase)
    }

    // =========================================================================
    // Transaction-scoped operations
    // =========================================================================

    /// Inserts the header and every line item.
    pub async fn insert_in(conn: &mut SqliteConnection, purchase: &Purchase) -> DbResult<()> {
        debug!(
            id = %purchase.id,
            invoice_number = %purchase.invoice_number,
            lines = purchase.items.len(),
            "Inserting purchase"
        );

        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, invoice_number, date, supplier_id,
                subtotal_cents, tax_cents, grand_total_cents,
                payment_method, amount_paid_cents, balance_due_cents,
                notes, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10,
                ?11, ?12, ?13
            )
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.invoice_number)
        .bind(purchase.date)
        .bind(&purchase.supplier_id)
        .bind(purchase.subtotal_cents)
        .bind(purchase.tax_cents)
        .bind(purchase.grand_total_cents)
        .bind(purchase.payment_method)
        .bind(purchase.amount_paid_cents)
        .bind(purchase.balance_due_cents)
        .bind(&purchase.notes)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut *conn)
        .await?;

        for item in &purchase.items {
            sqlx::query(
                r#"
                INSERT INTO purchase_items (
                    id, purchase_id, product_id, position,
                    sku_snapshot, name_snapshot,
                    quantity, unit_cost_cents, line_total_cents
                ) VALUES (
                    ?1, ?2, ?3, ?4,
                    ?5, ?6,
                    ?7, ?8, ?9
                )
                "#,
            )
            .bind(&item.id)
            .bind(&item.purchase_id)
            .bind(&item.product_id)
            .bind(item.position)
            .bind(&item.sku_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.unit_cost_cents)
            .bind(item.line_total_cents)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Header plus items, read on the caller's connection.
    pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Purchase>> {
        let purchase =
            sqlx::query_as::<_, Purchase>(&format!("{SELECT_PURCHASE} WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        match purchase {
            Some(mut purchase) => {
                purchase.items = Self::items_in(conn, id).await?;
                Ok(Some(purchase))
            }
            None => Ok(None),
        }
    }

    /// Line items in invoice order.
    pub async fn items_in(
        conn: &mut SqliteConnection,
        purchase_id: &str,
    ) -> DbResult<Vec<PurchaseItem>> {
        let items = sqlx::query_as::<_, PurchaseItem>(
            r#"
            SELECT
                id, purchase_id, product_id, position,
                sku_snapshot, name_snapshot,
                quantity, unit_cost_cents, line_total_cents
            FROM purchase_items
            WHERE purchase_id = ?1
            ORDER BY position
            "#,
        )
        .bind(purchase_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    /// No-op write on the header.
    ///
    /// Run first in a write transaction: it takes SQLite's write lock before
    /// anything is read, and reports `NotFound` for an unknown id.
    pub async fn touch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE purchases SET updated_at = updated_at WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Purchase", id));
        }

        Ok(())
    }

    /// Deletes the header; line items cascade.
    pub async fn delete_in(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting purchase");

        let result = sqlx::query("DELETE FROM purchases WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Purchase", id));
        }

        Ok(())
    }
}
