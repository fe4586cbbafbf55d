//! # Product Repository
//!
//! Database operations for catalog products.
//!
//! ## Key Operations
//! - Create with validated SKU, name and prices (stock starts at zero)
//! - Lookups by id, by batch of ids, by SKU, by scanned code
//! - Administrative edits of non-stock fields
//!
//! `stock_quantity` is read here but never written: see
//! [`StockLedger`](super::stock::StockLedger).
//!
//! ## Scanned Code Lookup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     find_by_code("SHIRT-M")                            │
//! │                                                                         │
//! │  1. products.sku = code      ── hit ──► Product                        │
//! │       │ miss                                                            │
//! │       ▼                                                                 │
//! │  2. products.barcode = code  ── hit ──► Product                        │
//! │       │ miss                                                            │
//! │       ▼                                                                 │
//! │  None                                                                   │
//! │                                                                         │
//! │  Products without a barcode are still found by SKU.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::{new_id, push_id_list};
use crate::error::{DbError, DbResult};
use bazaar_core::validation::{validate_name, validate_new_product, validate_product_prices, validate_sku};
use bazaar_core::{NewProduct, Product, ProductPage, ProductUpdate, ValidationError};

/// Prefix of SKUs generated for products created without one.
const GENERATED_SKU_PREFIX: &str = "BZ";

/// Largest page a catalog search returns.
const MAX_PAGE_SIZE: u32 = 200;

const SELECT_PRODUCT: &str = r#"
    SELECT
        id, sku, barcode, name,
        category_id, subcategory_id, supplier_id, description,
        purchase_price_cents, sale_price_cents, discount_cents,
        stock_quantity, created_at, updated_at
    FROM products
"#;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let shirt = repo.insert(&new_product).await?;
/// let found = repo.find_by_code("SHIRT-M").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product with zero stock.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product with generated id and timestamps
    /// * `Err(DbError::Invalid)` - SKU, name or prices rejected
    ///
    /// A blank SKU is replaced by a generated `BZ-NNNNNN-XXX` one.
    /// * `Err(DbError::UniqueViolation)` - SKU or barcode already exists
    pub async fn insert(&self, input: &NewProduct) -> DbResult<Product> {
        let now = Utc::now();
        let sku = match input.sku.trim() {
            "" => generate_sku(now),
            given => given.to_string(),
        };
        validate_new_product(&NewProduct {
            sku: sku.clone(),
            ..input.clone()
        })?;

        let product = Product {
            id: new_id(),
            sku,
            barcode: input.barcode.as_deref().map(|b| b.trim().to_string()),
            name: input.name.trim().to_string(),
            category_id: input.category_id.clone(),
            subcategory_id: input.subcategory_id.clone(),
            supplier_id: input.supplier_id.clone(),
            description: input.description.clone(),
            purchase_price_cents: input.purchase_price_cents,
            sale_price_cents: input.sale_price_cents,
            discount_cents: input.discount_cents,
            stock_quantity: 0,
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, barcode, name,
                category_id, subcategory_id, supplier_id, description,
                purchase_price_cents, sale_price_cents, discount_cents,
                stock_quantity, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11,
                ?12, ?13, ?14
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(&product.subcategory_id)
        .bind(&product.supplier_id)
        .bind(&product.description)
        .bind(product.purchase_price_cents)
        .bind(product.sale_price_cents)
        .bind(product.discount_cents)
        .bind(product.stock_quantity)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| with_duplicate_value(err.into(), &product))?;

        Ok(product)
    }

    /// Gets a product by its ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets every product whose id is in `ids`, in SKU order.
    ///
    /// Unknown ids are simply absent from the result.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_PRODUCT);
        builder.push(" WHERE id IN ");
        push_id_list(&mut builder, ids);
        builder.push(" ORDER BY sku");

        let products = builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;

        debug!(requested = ids.len(), found = products.len(), "Loaded products");
        Ok(products)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE sku = ?1"))
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Resolves a scanned or typed code: SKU first, then barcode.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }

        if let Some(product) = self.get_by_sku(code).await? {
            return Ok(Some(product));
        }

        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE barcode = ?1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Applies an administrative edit to non-stock fields.
    ///
    /// The merged prices are re-validated, so a lower sale price cannot
    /// leave the existing discount above it.
    pub async fn update_details(&self, id: &str, update: &ProductUpdate) -> DbResult<Product> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        let merged = merge_update(current, update)?;

        debug!(id = %id, "Updating product details");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                barcode = ?2,
                name = ?3,
                category_id = ?4,
                subcategory_id = ?5,
                supplier_id = ?6,
                description = ?7,
                purchase_price_cents = ?8,
                sale_price_cents = ?9,
                discount_cents = ?10,
                updated_at = ?11
            WHERE id = ?1
            "#,
        )
        .bind(&merged.id)
        .bind(&merged.barcode)
        .bind(&merged.name)
        .bind(&merged.category_id)
        .bind(&merged.subcategory_id)
        .bind(&merged.supplier_id)
        .bind(&merged.description)
        .bind(merged.purchase_price_cents)
        .bind(merged.sale_price_cents)
        .bind(merged.discount_cents)
        .bind(merged.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| with_duplicate_value(err.into(), &merged))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        // Stock may have moved since the read; return the stored row.
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Deletes a product.
    ///
    /// Refused with `ForeignKeyViolation` while purchase or sale lines still
    /// reference it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Lists products by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products =
            sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} ORDER BY name, sku LIMIT ?1"))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        Ok(products)
    }

    /// Searches name and SKU (case-insensitive substring) one page at a time.
    ///
    /// `page` is 1-based; 0 reads as 1. `per_page` is clamped to 1..=200.
    /// A blank query matches every product.
    pub async fn search(
        &self,
        query: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> DbResult<ProductPage> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(q)));

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products");
        push_search_filter(&mut count, pattern.as_deref());
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_PRODUCT);
        push_search_filter(&mut select, pattern.as_deref());
        select
            .push(" ORDER BY name, sku LIMIT ")
            .push_bind(i64::from(per_page))
            .push(" OFFSET ")
            .push_bind(i64::from(page - 1) * i64::from(per_page));
        let items = select.build_query_as::<Product>().fetch_all(&self.pool).await?;

        debug!(query = ?query, page, per_page, total, "Searched products");

        Ok(ProductPage {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Counts total products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn push_search_filter(builder: &mut QueryBuilder<'_, Sqlite>, pattern: Option<&str>) {
    if let Some(pattern) = pattern {
        builder
            .push(r" WHERE name LIKE ")
            .push_bind(pattern.to_string())
            .push(r" ESCAPE '\' OR sku LIKE ")
            .push_bind(pattern.to_string())
            .push(r" ESCAPE '\'");
    }
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `BZ-NNNNNN-XXX`: the last six digits of the creation time in
/// milliseconds, then three random characters.
fn generate_sku(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().rem_euclid(1_000_000);
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(3)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("{GENERATED_SKU_PREFIX}-{millis:06}-{suffix}")
}

fn merge_update(mut product: Product, update: &ProductUpdate) -> DbResult<Product> {
    if let Some(name) = update.name.as_deref() {
        validate_name("name", name)?;
        product.name = name.trim().to_string();
    }
    if let Some(barcode) = update.barcode.as_deref() {
        validate_sku(barcode).map_err(|_| ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        })?;
        product.barcode = Some(barcode.trim().to_string());
    }
    if let Some(category_id) = &update.category_id {
        product.category_id = Some(category_id.clone());
    }
    if let Some(subcategory_id) = &update.subcategory_id {
        product.subcategory_id = Some(subcategory_id.clone());
    }
    if let Some(supplier_id) = &update.supplier_id {
        product.supplier_id = Some(supplier_id.clone());
    }
    if let Some(description) = &update.description {
        product.description = Some(description.clone());
    }
    if let Some(cents) = update.purchase_price_cents {
        product.purchase_price_cents = cents;
    }
    if let Some(cents) = update.sale_price_cents {
        product.sale_price_cents = cents;
    }
    if let Some(cents) = update.discount_cents {
        product.discount_cents = cents;
    }

    validate_product_prices(
        product.purchase_price_cents,
        product.sale_price_cents,
        product.discount_cents,
    )?;

    product.updated_at = Utc::now();
    Ok(product)
}

/// Fills in the offending value of a SKU/barcode UNIQUE violation.
fn with_duplicate_value(err: DbError, product: &Product) -> DbError {
    match err {
        DbError::UniqueViolation { field, .. } => {
            let value = if field == "products.barcode" {
                product.barcode.clone().unwrap_or_default()
            } else {
                product.sku.clone()
            };
            DbError::duplicate(field, value)
        }
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn shirt() -> NewProduct {
        NewProduct {
            sku: "SHIRT-M".to_string(),
            barcode: Some("5901234123457".to_string()),
            name: "Cotton Shirt M".to_string(),
            purchase_price_cents: 100,
            sale_price_cents: 150,
            discount_cents: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_starts_with_zero_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().insert(&shirt()).await.unwrap();

        assert_eq!(product.stock_quantity, 0);
        let stored = db.products().get(&product.id).await.unwrap().unwrap();
        assert_eq!(stored, product);
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sku_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&shirt()).await.unwrap();

        let mut again = shirt();
        again.barcode = None;
        let err = db.products().insert(&again).await.unwrap_err();
        assert!(err.is_unique_violation_on("products.sku"));
        assert!(err.to_string().contains("SHIRT-M"));
    }

    #[tokio::test]
    async fn test_invalid_prices_are_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut input = shirt();
        input.discount_cents = 200;

        let err = db.products().insert(&input).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
        assert_eq!(db.products().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_by_code_prefers_sku_then_barcode() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().insert(&shirt()).await.unwrap();

        let by_sku = db.products().find_by_code("SHIRT-M").await.unwrap().unwrap();
        assert_eq!(by_sku.id, product.id);

        let by_barcode = db
            .products()
            .find_by_code(" 5901234123457 ")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_barcode.id, product.id);

        assert!(db.products().find_by_code("NOPE").await.unwrap().is_none());
        assert!(db.products().find_by_code("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_many_skips_unknown_ids() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().insert(&shirt()).await.unwrap();

        let found = db
            .products()
            .get_many(&[product.id.clone(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(db.products().get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_details_revalidates_merged_prices() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().insert(&shirt()).await.unwrap();

        let lowered = ProductUpdate {
            sale_price_cents: Some(5),
            ..Default::default()
        };
        let err = db
            .products()
            .update_details(&product.id, &lowered)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));

        let renamed = ProductUpdate {
            name: Some("Cotton Shirt Medium".to_string()),
            purchase_price_cents: Some(120),
            ..Default::default()
        };
        let updated = db
            .products()
            .update_details(&product.id, &renamed)
            .await
            .unwrap();
        assert_eq!(updated.name, "Cotton Shirt Medium");
        assert_eq!(updated.purchase_price_cents, 120);
        assert_eq!(updated.stock_quantity, 0);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db
            .products()
            .update_details("missing", &ProductUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let err = db.products().delete("missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_blank_sku_is_generated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let input = NewProduct {
            sku: "  ".to_string(),
            barcode: None,
            ..shirt()
        };

        let product = db.products().insert(&input).await.unwrap();

        assert!(product.sku.starts_with("BZ-"));
        assert_eq!(product.sku.len(), "BZ-000000-XXX".len());
        assert!(validate_sku(&product.sku).is_ok());
        let stored = db.products().get_by_sku(&product.sku).await.unwrap().unwrap();
        assert_eq!(stored.id, product.id);
    }

    #[tokio::test]
    async fn test_search_matches_name_or_sku_by_page() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for (sku, name) in [
            ("SHIRT-S", "Cotton Shirt S"),
            ("SHIRT-M", "Cotton Shirt M"),
            ("SHIRT-L", "Cotton Shirt L"),
            ("CAP-01", "Baseball Cap"),
            ("JUG_50", "Steel Jug 50% off"),
        ] {
            db.products()
                .insert(&NewProduct {
                    sku: sku.to_string(),
                    name: name.to_string(),
                    purchase_price_cents: 50,
                    sale_price_cents: 90,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let products = db.products();

        let first = products.search(Some("shirt"), 1, 2).await.unwrap();
        assert_eq!(first.total, 3);
        let names: Vec<&str> = first.items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Cotton Shirt L", "Cotton Shirt M"]);

        let second = products.search(Some("shirt"), 2, 2).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].sku, "SHIRT-S");

        let by_sku = products.search(Some("cap-0"), 0, 10).await.unwrap();
        assert_eq!(by_sku.page, 1);
        assert_eq!(by_sku.items[0].name, "Baseball Cap");

        // LIKE wildcards in the query are literal.
        assert_eq!(products.search(Some("50%"), 1, 10).await.unwrap().total, 1);
        assert_eq!(products.search(Some("G_5"), 1, 10).await.unwrap().total, 1);
        assert_eq!(products.search(Some("P_0"), 1, 10).await.unwrap().total, 0);

        let everything = products.search(None, 1, 0).await.unwrap();
        assert_eq!(everything.total, 5);
        assert_eq!(everything.per_page, 1);
        assert_eq!(everything.items.len(), 1);
        assert_eq!(products.search(Some("  "), 9, 10).await.unwrap().items.len(), 0);
    }

    #[tokio::test]
    async fn test_list_orders_by_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&shirt()).await.unwrap();
        db.products()
            .insert(&NewProduct {
                sku: "CAP-01".to_string(),
                name: "Baseball Cap".to_string(),
                purchase_price_cents: 50,
                sale_price_cents: 90,
                ..Default::default()
            })
            .await
            .unwrap();

        let listed = db.products().list(10).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Baseball Cap", "Cotton Shirt M"]);
        assert_eq!(db.products().list(1).await.unwrap().len(), 1);
    }
}
