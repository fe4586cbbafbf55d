//! Stock consistency under the transaction coordinator.
//!
//! These run against file-backed databases so several pooled connections
//! really compete for SQLite's write lock.

use std::time::Duration;

use bazaar_core::{NewProduct, NewPurchase, NewPurchaseLine, NewSale, NewSaleLine};
use bazaar_db::{Database, DbConfig, LedgerError};
use tempfile::TempDir;

async fn file_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::new(dir.path().join("bazaar.db"))
        .max_connections(8)
        .busy_timeout(Duration::from_secs(10));
    let db = Database::new(config).await.unwrap();
    (dir, db)
}

async fn product(db: &Database, sku: &str) -> String {
    db.products()
        .insert(&NewProduct {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            purchase_price_cents: 400,
            sale_price_cents: 500,
            ..Default::default()
        })
        .await
        .unwrap()
        .id
}

fn purchase(lines: &[(&str, i64)]) -> NewPurchase {
    NewPurchase {
        items: lines
            .iter()
            .map(|(id, qty)| NewPurchaseLine {
                product_id: id.to_string(),
                quantity: *qty,
                unit_cost_cents: 400,
            })
            .collect(),
        ..Default::default()
    }
}

fn sale(lines: &[(&str, i64)]) -> NewSale {
    NewSale {
        items: lines
            .iter()
            .map(|(id, qty)| NewSaleLine {
                product_id: id.to_string(),
                quantity: *qty,
            })
            .collect(),
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sales_never_oversell() {
    let (_dir, db) = file_db().await;
    let id = product(&db, "LAST-FIVE").await;
    db.coordinator()
        .create_purchase(purchase(&[(&id, 5)]))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let coordinator = db.coordinator();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            coordinator.create_sale(sale(&[(&id, 1)])).await
        }));
    }

    let mut sold = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => sold += 1,
            Err(LedgerError::InsufficientStock { available, .. }) => {
                assert_eq!(available, 0);
                refused += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(sold, 5);
    assert_eq!(refused, 15);
    assert_eq!(db.stock().stock_of(&id).await.unwrap(), 0);
    assert_eq!(db.sales().count().await.unwrap(), 5);
    assert!(db.stock().reconcile().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_purchases_all_land() {
    let (_dir, db) = file_db().await;
    let a = product(&db, "A").await;
    let b = product(&db, "B").await;

    let mut handles = Vec::new();
    for n in 0..12 {
        let coordinator = db.coordinator();
        // Alternate line order so writers touch the two products in
        // different orders.
        let input = if n % 2 == 0 {
            purchase(&[(&a, 1), (&b, 2)])
        } else {
            purchase(&[(&b, 2), (&a, 1)])
        };
        handles.push(tokio::spawn(async move {
            coordinator.create_purchase(input).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(db.stock().stock_of(&a).await.unwrap(), 12);
    assert_eq!(db.stock().stock_of(&b).await.unwrap(), 24);
    assert!(db.stock().reconcile().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn purchase_delete_racing_sales_ends_in_a_serial_outcome() {
    let (_dir, db) = file_db().await;

    for round in 0..8 {
        let id = product(&db, &format!("RACE-{round}")).await;
        let bought = db
            .coordinator()
            .create_purchase(purchase(&[(&id, 10)]))
            .await
            .unwrap();

        let deleting = {
            let coordinator = db.coordinator();
            let purchase_id = bought.id.clone();
            tokio::spawn(async move { coordinator.delete_purchase(&purchase_id).await })
        };
        let mut selling = Vec::new();
        for _ in 0..3 {
            let coordinator = db.coordinator();
            let id = id.clone();
            selling.push(tokio::spawn(async move {
                coordinator.create_sale(sale(&[(&id, 3)])).await
            }));
        }

        let deleted = match deleting.await.unwrap() {
            Ok(_) => true,
            Err(LedgerError::ReversalConflict { required: 10, .. }) => false,
            Err(other) => panic!("unexpected delete error: {other}"),
        };
        let mut sold = 0;
        for handle in selling {
            match handle.await.unwrap() {
                Ok(_) => sold += 1,
                Err(LedgerError::InsufficientStock { available: 0, .. }) => {}
                Err(other) => panic!("unexpected sale error: {other}"),
            }
        }

        // Either the delete ran first and every sale found no stock, or at
        // least one sale landed first and the purchase could not be reversed.
        let stock = db.stock().stock_of(&id).await.unwrap();
        if deleted {
            assert_eq!((sold, stock), (0, 0), "round {round}");
            assert!(db.purchases().get(&bought.id).await.unwrap().is_none());
        } else {
            assert_eq!((sold, stock), (3, 1), "round {round}");
            assert!(db.purchases().get(&bought.id).await.unwrap().is_some());
        }
        assert!(db.stock().reconcile().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn stock_follows_the_ledger_sequence() {
    let (_dir, db) = file_db().await;
    let id = product(&db, "SEQ").await;
    let coordinator = db.coordinator();

    coordinator.create_purchase(purchase(&[(&id, 10)])).await.unwrap();
    let first = coordinator.create_sale(sale(&[(&id, 3)])).await.unwrap();
    coordinator.create_purchase(purchase(&[(&id, 4)])).await.unwrap();
    coordinator.create_sale(sale(&[(&id, 6)])).await.unwrap();
    assert_eq!(db.stock().stock_of(&id).await.unwrap(), 5);

    coordinator.delete_sale(&first.id).await.unwrap();
    assert_eq!(db.stock().stock_of(&id).await.unwrap(), 8);
    assert!(db.stock().reconcile().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_product_leaves_no_trace() {
    let (_dir, db) = file_db().await;
    let known = product(&db, "KNOWN").await;

    let err = db
        .coordinator()
        .create_purchase(purchase(&[(&known, 5), ("no-such-product", 1)]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::ProductNotFound { ref product_id } if product_id == "no-such-product"
    ));
    assert_eq!(db.stock().stock_of(&known).await.unwrap(), 0);
    assert_eq!(db.purchases().count().await.unwrap(), 0);
}

#[tokio::test]
async fn short_line_rejects_the_whole_sale() {
    let (_dir, db) = file_db().await;
    let plenty = product(&db, "PLENTY").await;
    let scarce = product(&db, "SCARCE").await;
    db.coordinator()
        .create_purchase(purchase(&[(&plenty, 50), (&scarce, 1)]))
        .await
        .unwrap();

    let err = db
        .coordinator()
        .create_sale(sale(&[(&plenty, 10), (&scarce, 1), (&scarce, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::InsufficientStock {
            ref product_id,
            requested: 2,
            available: 1,
        } if *product_id == scarce
    ));
    assert_eq!(db.stock().stock_of(&plenty).await.unwrap(), 50);
    assert_eq!(db.stock().stock_of(&scarce).await.unwrap(), 1);
    assert_eq!(db.sales().count().await.unwrap(), 0);
}

#[tokio::test]
async fn unreversible_purchase_is_kept() {
    let (_dir, db) = file_db().await;
    let id = product(&db, "SOLD-THROUGH").await;
    let bought = db
        .coordinator()
        .create_purchase(purchase(&[(&id, 10)]))
        .await
        .unwrap();
    db.coordinator().create_sale(sale(&[(&id, 8)])).await.unwrap();

    let err = db.coordinator().delete_purchase(&bought.id).await.unwrap_err();

    assert!(matches!(
        err,
        LedgerError::ReversalConflict {
            required: 10,
            available: 2,
            ..
        }
    ));
    assert!(db.purchases().get(&bought.id).await.unwrap().is_some());
    assert_eq!(db.stock().stock_of(&id).await.unwrap(), 2);

    // Once the sale is gone the purchase reverses cleanly.
    let sale_id = db.sales().list(1).await.unwrap()[0].id.clone();
    db.coordinator().delete_sale(&sale_id).await.unwrap();
    db.coordinator().delete_purchase(&bought.id).await.unwrap();
    assert_eq!(db.stock().stock_of(&id).await.unwrap(), 0);
    assert!(db.stock().reconcile().await.unwrap().is_empty());
}
