//! # Stock Ledger
//!
//! The only code that writes `products.stock_quantity`.
//!
//! ## Applying a Batch
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  StockLedger::apply_in(&mut tx, &batch)                │
//! │                                                                         │
//! │  1. LOCK      UPDATE products SET stock_quantity = stock_quantity      │
//! │               WHERE id IN (...)                                        │
//! │               → takes SQLite's write lock before any read; a          │
//! │                 competing writer waits here (busy_timeout)             │
//! │                                                                         │
//! │  2. SNAPSHOT  SELECT id, stock_quantity WHERE id IN (...)              │
//! │               → nobody else can change these rows until commit        │
//! │                                                                         │
//! │  3. PLAN      bazaar_core::ledger::plan(batch, snapshot)               │
//! │               → whole batch checked, first violation by product id    │
//! │                                                                         │
//! │  4. WRITE     UPDATE ... SET stock_quantity = stock_quantity + Δ       │
//! │               WHERE id = ? AND stock_quantity + Δ >= 0                 │
//! │               → guarded delta, never an absolute overwrite            │
//! │                                                                         │
//! │  Any error: the caller drops the transaction and SQLite rolls back.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Products are touched in product-id order (the order
//! [`DeltaBatch::accumulated`] yields), so the row order is deterministic.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::push_id_list;
use crate::error::{DbError, DbResult, LedgerError, LedgerResult};
use bazaar_core::ledger::{find_discrepancies, plan, DeltaBatch, StockDelta, StockDiscrepancy, StockLevel};

/// Stock store adapter over the `products` table.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    /// Applies a standalone batch of deltas in its own transaction.
    ///
    /// All deltas commit together or none do. Ledger records use the
    /// coordinator instead, which runs [`apply_in`](Self::apply_in) next to
    /// the record write.
    pub async fn apply_deltas(&self, deltas: Vec<StockDelta>) -> LedgerResult<Vec<StockLevel>> {
        let batch = DeltaBatch::apply(deltas);

        let mut tx = self.pool.begin().await?;
        let levels = Self::apply_in(&mut tx, &batch).await?;
        tx.commit().await?;

        info!(products = levels.len(), "Stock batch committed");
        Ok(levels)
    }

    /// Locks, plans and writes `batch` on the caller's transaction.
    ///
    /// Must be the first statement of a write transaction, or run after
    /// another write in it; see the module docs.
    pub async fn apply_in(
        conn: &mut SqliteConnection,
        batch: &DeltaBatch,
    ) -> LedgerResult<Vec<StockLevel>> {
        let product_ids = batch.product_ids();
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut lock = QueryBuilder::<Sqlite>::new(
            "UPDATE products SET stock_quantity = stock_quantity WHERE id IN ",
        );
        push_id_list(&mut lock, &product_ids);
        lock.build().execute(&mut *conn).await?;

        let mut select =
            QueryBuilder::<Sqlite>::new("SELECT id, stock_quantity FROM products WHERE id IN ");
        push_id_list(&mut select, &product_ids);
        let snapshot: HashMap<String, i64> = select
            .build_query_as::<(String, i64)>()
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

        let levels = plan(batch, &snapshot).map_err(|err| {
            warn!(kind = ?batch.kind, error = %err, "Stock batch rejected");
            LedgerError::from(err)
        })?;

        let now = Utc::now();
        for level in &levels {
            let delta = level.delta();
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity + ?1, updated_at = ?2
                WHERE id = ?3 AND stock_quantity + ?1 >= 0
                "#,
            )
            .bind(delta)
            .bind(now)
            .bind(&level.product_id)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                return Err(LedgerError::StoreUnavailable(DbError::TransactionFailed(
                    format!("stock of product {} moved under the write lock", level.product_id),
                )));
            }

            debug!(
                product_id = %level.product_id,
                delta = delta,
                before = level.before,
                after = level.after,
                "Stock updated"
            );
        }

        Ok(levels)
    }

    /// Current stock of one product.
    pub async fn stock_of(&self, product_id: &str) -> DbResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT stock_quantity FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product_id))
    }

    /// Products whose stored stock differs from `Σ purchased − Σ sold`.
    ///
    /// Read-only. All three scans share one read transaction, so a ledger
    /// write committing midway cannot show up as a false discrepancy.
    pub async fn reconcile(&self) -> DbResult<Vec<StockDiscrepancy>> {
        let mut tx = self.pool.begin().await?;

        let stored: Vec<(String, String, i64)> =
            sqlx::query_as("SELECT id, sku, stock_quantity FROM products ORDER BY sku")
                .fetch_all(&mut *tx)
                .await?;

        let purchased = quantity_by_product(&mut tx, "purchase_items").await?;
        let sold = quantity_by_product(&mut tx, "sale_items").await?;

        tx.commit().await?;

        let discrepancies = find_discrepancies(&stored, &purchased, &sold);
        if discrepancies.is_empty() {
            info!(products = stored.len(), "Stock reconciled, no discrepancies");
        } else {
            warn!(
                products = stored.len(),
                discrepancies = discrepancies.len(),
                "Stock does not match ledger history"
            );
        }

        Ok(discrepancies)
    }
}

async fn quantity_by_product(
    conn: &mut SqliteConnection,
    table: &'static str,
) -> DbResult<HashMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
        "SELECT product_id, SUM(quantity) FROM {table} GROUP BY product_id"
    ))
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().collect())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use bazaar_core::NewProduct;

    async fn product(db: &Database, sku: &str) -> String {
        db.products()
            .insert(&NewProduct {
                sku: sku.to_string(),
                name: sku.to_string(),
                purchase_price_cents: 100,
                sale_price_cents: 150,
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_apply_deltas_is_all_or_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = product(&db, "A").await;
        let b = product(&db, "B").await;

        db.stock()
            .apply_deltas(vec![StockDelta::new(&a, 5), StockDelta::new(&b, 1)])
            .await
            .unwrap();

        let err = db
            .stock()
            .apply_deltas(vec![StockDelta::new(&a, -2), StockDelta::new(&b, -3)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientStock {
                requested: 3,
                available: 1,
                ..
            }
        ));

        assert_eq!(db.stock().stock_of(&a).await.unwrap(), 5);
        assert_eq!(db.stock().stock_of(&b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_apply_deltas_merges_same_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = product(&db, "A").await;

        let levels = db
            .stock()
            .apply_deltas(vec![StockDelta::new(&a, 4), StockDelta::new(&a, -1)])
            .await
            .unwrap();

        assert_eq!(levels.len(), 1);
        assert_eq!((levels[0].before, levels[0].after), (0, 3));
        assert_eq!(db.stock().stock_of(&a).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unknown_product_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = product(&db, "A").await;

        let err = db
            .stock()
            .apply_deltas(vec![StockDelta::new(&a, 2), StockDelta::new("ghost", 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::ProductNotFound { ref product_id } if product_id == "ghost"));
        assert_eq!(db.stock().stock_of(&a).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.stock().apply_deltas(Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stock_of_missing_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.stock().stock_of("ghost").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reconcile_flags_stock_without_ledger_history() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = product(&db, "A").await;
        product(&db, "B").await;

        assert!(db.stock().reconcile().await.unwrap().is_empty());

        // A raw batch has no purchase behind it.
        db.stock()
            .apply_deltas(vec![StockDelta::new(&a, 7)])
            .await
            .unwrap();

        let discrepancies = db.stock().reconcile().await.unwrap();
        assert_eq!(discrepancies.len(), 1);
        assert_eq!(discrepancies[0].product_id, a);
        assert_eq!(discrepancies[0].stored, 7);
        assert_eq!(discrepancies[0].expected, 0);
    }
}
