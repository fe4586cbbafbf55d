//! # Seed Data Generator
//!
//! Populates the database with a small shop's worth of ledger history for
//! development and dashboard demos.
//!
//! ## Usage
//! ```bash
//! # 200 products plus matching purchases and sales (default)
//! cargo run -p bazaar-db --bin seed
//!
//! # Custom product count
//! cargo run -p bazaar-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p bazaar-db --bin seed -- --db ./data/bazaar.db
//! ```
//!
//! ## Generated Data
//! - Suppliers and customers from fixed name lists
//! - Products: SKU `{CATEGORY}-{ABBR}-{INDEX}`, cost 55-80% of sale price
//! - One opening purchase per supplier batch, stocking every product
//! - Sales spread over the last 10 days, some walk-in, some to customers
//!
//! Purchases and sales go through the transaction coordinator, so stock
//! always matches the ledger history afterwards.

use std::env;
use std::time::Instant;

use bazaar_core::{
    NewCustomer, NewProduct, NewPurchase, NewPurchaseLine, NewSale, NewSaleLine, NewSupplier,
    PaymentMethod, Product,
};
use bazaar_db::{Database, DbConfig, LedgerError};
use chrono::{Duration, Utc};

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "APP",
        &[
            "Cotton Shirt",
            "Denim Jeans",
            "Kurta Shalwar",
            "Lawn Suit",
            "Wool Shawl",
            "Polo Shirt",
            "Track Suit",
            "Dupatta",
        ],
    ),
    (
        "FTW",
        &[
            "Leather Chappal",
            "Peshawari Chappal",
            "Running Shoes",
            "Khussa",
            "Sandals",
            "School Shoes",
        ],
    ),
    (
        "GRO",
        &[
            "Basmati Rice",
            "Chakki Atta",
            "Cooking Oil",
            "Tea Leaves",
            "Red Chilli Powder",
            "Lentils Masoor",
            "Chickpeas",
            "Sugar",
        ],
    ),
    (
        "HOM",
        &[
            "Steel Jug",
            "Dinner Set",
            "Bedsheet",
            "Prayer Mat",
            "Wall Clock",
            "Table Lamp",
        ],
    ),
];

/// Size variants with their price addon in cents
const SIZES: &[(&str, i64)] = &[
    ("S", 0),
    ("M", 5_000),
    ("L", 10_000),
    ("XL", 15_000),
];

const SUPPLIERS: &[(&str, &str, &str)] = &[
    ("Hamid Traders", "0300-1111111", "Hamid & Sons"),
    ("Lahore Textiles", "0300-2222222", "LT Mills"),
    ("Karachi Wholesale", "0300-3333333", "KW Distribution"),
];

const CUSTOMERS: &[&str] = &[
    "Ayesha Khan",
    "Bilal Ahmed",
    "Sana Iqbal",
    "Usman Tariq",
    "Fatima Noor",
    "Hassan Raza",
];

const SALE_METHODS: &[PaymentMethod] = &[
    PaymentMethod::Cash,
    PaymentMethod::Cash,
    PaymentMethod::Card,
    PaymentMethod::JazzCash,
    PaymentMethod::Easypaisa,
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./bazaar_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bazaar Back Office Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./bazaar_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Bazaar Back Office Seed Data Generator");
    println!("=========================================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = Instant::now();

    // Parties
    let mut supplier_ids = Vec::new();
    for (name, phone, company) in SUPPLIERS {
        let supplier = db
            .parties()
            .insert_supplier(&NewSupplier {
                name: name.to_string(),
                phone: Some(phone.to_string()),
                company: Some(company.to_string()),
                ..Default::default()
            })
            .await?;
        supplier_ids.push(supplier.id);
    }

    let mut customer_ids = Vec::new();
    for (idx, name) in CUSTOMERS.iter().enumerate() {
        let customer = db
            .parties()
            .insert_customer(&NewCustomer {
                name: name.to_string(),
                phone: Some(format!("0321-{:07}", 1_000_000 + idx * 7919)),
                ..Default::default()
            })
            .await?;
        customer_ids.push(customer.id);
    }
    println!("✓ {} suppliers, {} customers", supplier_ids.len(), customer_ids.len());

    // Products
    println!();
    println!("Generating products...");

    let mut products: Vec<Product> = Vec::with_capacity(count);
    'outer: for (category_idx, (category_code, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, price_addon)) in SIZES.iter().enumerate() {
                if products.len() >= count {
                    break 'outer;
                }

                let input = generate_product(
                    category_code,
                    name,
                    size,
                    *price_addon,
                    category_idx * 1000 + name_idx * 20 + size_idx,
                    supplier_ids.get(category_idx % supplier_ids.len()).cloned(),
                );

                match db.products().insert(&input).await {
                    Ok(product) => products.push(product),
                    Err(e) => eprintln!("Failed to insert {}: {}", input.sku, e),
                }
            }
        }
    }
    println!("✓ Generated {} products", products.len());

    // Opening stock: one purchase per chunk of products.
    println!();
    println!("Recording purchases...");

    let opening_date = Utc::now() - Duration::days(12);
    let mut purchases = 0;
    for (chunk_idx, chunk) in products.chunks(25).enumerate() {
        let items = chunk
            .iter()
            .enumerate()
            .map(|(idx, p)| NewPurchaseLine {
                product_id: p.id.clone(),
                quantity: 10 + ((chunk_idx * 25 + idx) % 40) as i64,
                unit_cost_cents: p.purchase_price_cents,
            })
            .collect();

        let purchase = db
            .coordinator()
            .create_purchase(NewPurchase {
                date: Some(opening_date + Duration::hours(chunk_idx as i64)),
                supplier_id: supplier_ids.get(chunk_idx % supplier_ids.len()).cloned(),
                items,
                payment_method: if chunk_idx % 2 == 0 {
                    PaymentMethod::BankTransfer
                } else {
                    PaymentMethod::Credit
                },
                ..Default::default()
            })
            .await?;

        purchases += 1;
        println!("  {} ({} lines)", purchase.invoice_number, purchase.items.len());
    }

    // Sales over the last 10 days.
    println!();
    println!("Recording sales...");

    let mut sales = 0;
    let mut short = 0;
    let sale_count = products.len() * 2;
    for n in 0..sale_count {
        let first = &products[(n * 7) % products.len()];
        let second = &products[(n * 13 + 3) % products.len()];

        let mut items = vec![NewSaleLine {
            product_id: first.id.clone(),
            quantity: 1 + (n % 3) as i64,
        }];
        if n % 3 == 0 && second.id != first.id {
            items.push(NewSaleLine {
                product_id: second.id.clone(),
                quantity: 1,
            });
        }

        let days_ago = (n % 10) as i64;
        let input = NewSale {
            date: Some(Utc::now() - Duration::days(days_ago) - Duration::minutes(n as i64)),
            customer_id: if n % 4 == 0 {
                None
            } else {
                customer_ids.get(n % customer_ids.len()).cloned()
            },
            items,
            payment_method: SALE_METHODS[n % SALE_METHODS.len()],
            ..Default::default()
        };

        match db.coordinator().create_sale(input).await {
            Ok(_) => sales += 1,
            Err(LedgerError::InsufficientStock { .. }) => short += 1,
            Err(e) => return Err(e.into()),
        }

        if sales > 0 && sales % 100 == 0 {
            println!("  Recorded {} sales...", sales);
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ {} purchases, {} sales in {:?}", purchases, sales, elapsed);
    if short > 0 {
        println!("  {} sales skipped for insufficient stock", short);
    }

    // Verify the ledger
    println!();
    println!("Reconciling stock...");
    let discrepancies = db.stock().reconcile().await?;
    println!("  Discrepancies: {}", discrepancies.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one product with deterministic pseudo-random prices.
fn generate_product(
    category: &str,
    name: &str,
    size: &str,
    price_addon: i64,
    seed: usize,
    supplier_id: Option<String>,
) -> NewProduct {
    let abbr: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{}-{}-{:04}", category, abbr, seed);

    // Barcode (EAN-13 shaped, checksum not valid)
    let barcode = Some(format!("896{:010}", seed));

    // Sale price: Rs 250 - Rs 2,250 plus size addon
    let sale_price_cents = 25_000 + ((seed * 37) % 200) as i64 * 1_000 + price_addon;

    // Cost: 55-80% of sale price
    let cost_pct = 55 + (seed % 26) as i64;
    let purchase_price_cents = sale_price_cents * cost_pct / 100;

    // Every fifth product carries a small per-unit discount
    let discount_cents = if seed % 5 == 0 {
        sale_price_cents / 20
    } else {
        0
    };

    NewProduct {
        sku,
        barcode,
        name: format!("{} {}", name, size),
        supplier_id,
        purchase_price_cents,
        sale_price_cents,
        discount_cents,
        ..Default::default()
    }
}
