//! # Analytics Repository
//!
//! Read side of the dashboard. Loads fact rows, hands them to
//! [`bazaar_core::analytics`] with the local clock, returns the report.
//!
//! ## Consistency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  summary()                                                             │
//! │    BEGIN ─► sales ─► sale lines ─► products ─► counts ─► COMMIT        │
//! │             └──────────── one WAL read snapshot ───────────┘           │
//! │                                                                         │
//! │  A sale committing concurrently is either entirely in the report       │
//! │  (header, lines and stock) or entirely absent.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Store failures are logged here with their cause and surface to callers
//! only as [`AnalyticsError::ComputationFailed`].

use chrono::{DateTime, Duration, Local, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error};

use super::party::PartyRepository;
use crate::error::{AnalyticsError, AnalyticsResult, DbError, DbResult};
use bazaar_core::analytics::{
    self, CustomerContact, DailySales, DashboardSummary, EntityCounts, PaymentMethodSales,
    ProductFact, ProductsSummary, PurchaseFact, PurchasesSummary, SaleFact, SaleLineFact,
    TopCustomer, TopProduct,
};
use bazaar_core::validation::validate_low_stock_threshold;
use bazaar_core::WEEKLY_WINDOW_DAYS;

/// Days of purchases scanned for "this month": a month plus time zone slack.
const MONTH_SCAN_DAYS: i64 = 32;

/// Repository for dashboard reports.
#[derive(Debug, Clone)]
pub struct AnalyticsRepository {
    pool: SqlitePool,
}

impl AnalyticsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AnalyticsRepository { pool }
    }

    /// Headline counts, revenue and profit: all time, today and this month.
    pub async fn summary(&self, low_threshold: i64) -> AnalyticsResult<DashboardSummary> {
        validate_low_stock_threshold(low_threshold)?;

        let (sales, lines, products, counts) =
            self.load_summary_facts().await.map_err(failed("summary"))?;

        Ok(analytics::summary(
            &sales,
            &lines,
            &products,
            counts,
            low_threshold,
            &Local::now(),
        )?)
    }

    /// Best sellers by quantity, `limit` clamped to at least one.
    pub async fn top_products(&self, limit: usize) -> AnalyticsResult<Vec<TopProduct>> {
        let (lines, products) = self
            .load_top_product_facts()
            .await
            .map_err(failed("top_products"))?;

        Ok(analytics::top_products(&lines, &products, limit))
    }

    /// Seven zero-filled local days ending today.
    pub async fn weekly_sales(&self) -> AnalyticsResult<Vec<DailySales>> {
        let now = Local::now();
        let since = now.with_timezone(&Utc) - Duration::days(WEEKLY_WINDOW_DAYS + 1);

        let sales = self
            .load_sales_since(Some(since))
            .await
            .map_err(failed("weekly_sales"))?;

        Ok(analytics::weekly_sales(&sales, &now))
    }

    /// One row per payment method in use.
    pub async fn sales_by_payment_method(&self) -> AnalyticsResult<Vec<PaymentMethodSales>> {
        let sales = self
            .load_sales_since(None)
            .await
            .map_err(failed("sales_by_payment_method"))?;

        Ok(analytics::sales_by_payment_method(&sales))
    }

    /// Biggest spenders; walk-in sales form one anonymous row.
    pub async fn top_customers(&self, limit: usize) -> AnalyticsResult<Vec<TopCustomer>> {
        let (sales, contacts) = self
            .load_top_customer_facts()
            .await
            .map_err(failed("top_customers"))?;

        Ok(analytics::top_customers(&sales, &contacts, limit))
    }

    /// Catalog size plus low-stock and out-of-stock products.
    pub async fn products_summary(&self, low_threshold: i64) -> AnalyticsResult<ProductsSummary> {
        validate_low_stock_threshold(low_threshold)?;

        let products = self
            .load_product_facts()
            .await
            .map_err(failed("products_summary"))?;

        Ok(analytics::products_summary(&products, low_threshold)?)
    }

    /// This month's purchase spend and the supplier count.
    pub async fn purchases_summary(&self) -> AnalyticsResult<PurchasesSummary> {
        let now = Local::now();
        let since = now.with_timezone(&Utc) - Duration::days(MONTH_SCAN_DAYS);

        let (purchases, suppliers) = self
            .load_purchase_facts(since)
            .await
            .map_err(failed("purchases_summary"))?;

        Ok(analytics::purchases_summary(&purchases, suppliers, &now))
    }

    // =========================================================================
    // Fact loading
    // =========================================================================

    async fn load_summary_facts(
        &self,
    ) -> DbResult<(Vec<SaleFact>, Vec<SaleLineFact>, Vec<ProductFact>, EntityCounts)> {
        let mut tx = self.pool.begin().await?;

        let sales = sale_facts(&mut tx, None).await?;
        let lines = sale_line_facts(&mut tx).await?;
        let products = product_facts(&mut tx).await?;
        let counts = entity_counts(&mut tx).await?;

        tx.commit().await?;

        debug!(
            sales = sales.len(),
            lines = lines.len(),
            products = products.len(),
            "Loaded summary facts"
        );
        Ok((sales, lines, products, counts))
    }

    async fn load_top_product_facts(&self) -> DbResult<(Vec<SaleLineFact>, Vec<ProductFact>)> {
        let mut tx = self.pool.begin().await?;
        let lines = sale_line_facts(&mut tx).await?;
        let products = product_facts(&mut tx).await?;
        tx.commit().await?;

        Ok((lines, products))
    }

    async fn load_top_customer_facts(&self) -> DbResult<(Vec<SaleFact>, Vec<CustomerContact>)> {
        let mut tx = self.pool.begin().await?;

        let sales = sale_facts(&mut tx, None).await?;
        let mut customer_ids: Vec<String> =
            sales.iter().filter_map(|s| s.customer_id.clone()).collect();
        customer_ids.sort();
        customer_ids.dedup();
        let contacts = PartyRepository::customer_contacts_in(&mut tx, &customer_ids).await?;

        tx.commit().await?;

        debug!(sales = sales.len(), customers = contacts.len(), "Loaded customer facts");
        Ok((sales, contacts))
    }

    async fn load_sales_since(&self, since: Option<DateTime<Utc>>) -> DbResult<Vec<SaleFact>> {
        let mut conn = self.pool.acquire().await?;
        sale_facts(&mut conn, since).await
    }

    async fn load_product_facts(&self) -> DbResult<Vec<ProductFact>> {
        let mut conn = self.pool.acquire().await?;
        product_facts(&mut conn).await
    }

    async fn load_purchase_facts(&self, since: DateTime<Utc>) -> DbResult<(Vec<PurchaseFact>, i64)> {
        let mut tx = self.pool.begin().await?;

        let purchases = sqlx::query_as::<_, PurchaseFact>(
            "SELECT date, grand_total_cents FROM purchases WHERE date >= ?1 ORDER BY date",
        )
        .bind(since)
        .fetch_all(&mut *tx)
        .await?;
        let suppliers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM suppliers")
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((purchases, suppliers))
    }
}

/// Logs the store error and collapses it into the generic report failure.
fn failed(report: &'static str) -> impl FnOnce(DbError) -> AnalyticsError {
    move |source| {
        error!(report, error = %source, "Report computation failed");
        AnalyticsError::ComputationFailed { report, source }
    }
}

/// Sale headers in scan order (date, then id).
async fn sale_facts(
    conn: &mut SqliteConnection,
    since: Option<DateTime<Utc>>,
) -> DbResult<Vec<SaleFact>> {
    let facts = sqlx::query_as::<_, SaleFact>(
        r#"
        SELECT id, date, customer_id, payment_method, grand_total_cents
        FROM sales
        WHERE ?1 IS NULL OR date >= ?1
        ORDER BY date, id
        "#,
    )
    .bind(since)
    .fetch_all(&mut *conn)
    .await?;

    Ok(facts)
}

/// Sale lines with their sale's date, in invoice order.
async fn sale_line_facts(conn: &mut SqliteConnection) -> DbResult<Vec<SaleLineFact>> {
    let facts = sqlx::query_as::<_, SaleLineFact>(
        r#"
        SELECT
            si.product_id, s.date, si.quantity,
            si.unit_price_cents, si.discount_cents, si.line_total_cents
        FROM sale_items si
        INNER JOIN sales s ON s.id = si.sale_id
        ORDER BY s.date, s.id, si.position
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(facts)
}

async fn product_facts(conn: &mut SqliteConnection) -> DbResult<Vec<ProductFact>> {
    let facts = sqlx::query_as::<_, ProductFact>(
        "SELECT id, sku, name, purchase_price_cents, stock_quantity FROM products ORDER BY sku",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(facts)
}

async fn entity_counts(conn: &mut SqliteConnection) -> DbResult<EntityCounts> {
    let (purchases, customers, suppliers): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM purchases),
            (SELECT COUNT(*) FROM customers),
            (SELECT COUNT(*) FROM suppliers)
        "#,
    )
    .fetch_one(&mut *conn)
    .await?;

    Ok(EntityCounts {
        purchases,
        customers,
        suppliers,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
