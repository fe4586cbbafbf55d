//! # Bazaar Back Office
//!
//! Prints dashboard reports and runs the stock audit against a shop database.
//!
//! ## Usage
//! ```bash
//! bazaar-backoffice summary
//! bazaar-backoffice top-products 10
//! bazaar-backoffice products 3
//! BAZAAR_DB_PATH=/var/lib/bazaar/shop.db bazaar-backoffice reconcile
//! ```
//!
//! Output is pretty JSON on stdout; logs go to stderr. The exit code is
//! non-zero on any failure and when `reconcile` finds a discrepancy.

mod config;

use std::process::ExitCode;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::BackofficeConfig;
use bazaar_db::Database;

/// One back office command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Summary,
    TopProducts(Option<usize>),
    Weekly,
    Payments,
    TopCustomers(Option<usize>),
    Products(Option<i64>),
    Purchases,
    Search { query: Option<String>, page: Option<u32> },
    Reconcile,
    Help,
}

impl Command {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let name = args.first().map(String::as_str).unwrap_or("help");
        let arg = args.get(1).map(String::as_str);

        let command = match name {
            "summary" => Command::Summary,
            "top-products" => Command::TopProducts(parse_arg(arg, "N")?),
            "weekly" => Command::Weekly,
            "payments" => Command::Payments,
            "top-customers" => Command::TopCustomers(parse_arg(arg, "N")?),
            "products" => Command::Products(parse_arg(arg, "THRESHOLD")?),
            "purchases" => Command::Purchases,
            "search" => Command::Search {
                query: arg.map(str::to_string),
                page: parse_arg(args.get(2).map(String::as_str), "PAGE")?,
            },
            "reconcile" => Command::Reconcile,
            "help" | "--help" | "-h" => Command::Help,
            other => bail!("unknown command '{other}' (try 'help')"),
        };

        Ok(command)
    }
}

fn parse_arg<T: std::str::FromStr>(arg: Option<&str>, name: &str) -> anyhow::Result<Option<T>> {
    arg.map(|raw| {
        raw.parse()
            .map_err(|_| anyhow::anyhow!("{name} must be a number, got '{raw}'"))
    })
    .transpose()
}

const SEARCH_PAGE_SIZE: u32 = 50;

const USAGE: &str = "\
Bazaar Back Office

Usage: bazaar-backoffice <COMMAND> [ARGS]

Commands:
  summary               Record counts, revenue and profit overall, today
                        and this month, low-stock count
  top-products [N]      Best-selling products by quantity
  weekly                Sales per day for the last 7 days
  payments              Sales totals per payment method
  top-customers [N]     Customers by total spent
  products [THRESHOLD]  Product count, low-stock list, out-of-stock count
  purchases             Purchase total and invoice count this month,
                        supplier count
  search [QUERY] [PAGE] Products whose name or SKU contains QUERY, 50 a page
  reconcile             Compare stored stock with ledger history

Environment:
  BAZAAR_DB_PATH, BAZAAR_MAX_CONNECTIONS, BAZAAR_BUSY_TIMEOUT_MS,
  BAZAAR_LOW_STOCK_THRESHOLD, BAZAAR_TOP_LIMIT, RUST_LOG";

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("Back office command failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs one command. `Ok(false)` means it ran but found a problem.
async fn run(args: &[String]) -> anyhow::Result<bool> {
    let command = Command::parse(args)?;
    if command == Command::Help {
        println!("{USAGE}");
        return Ok(true);
    }

    let config = BackofficeConfig::load().context("loading configuration")?;
    info!(
        path = %config.database_path.display(),
        ?command,
        "Configuration loaded"
    );

    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;

    let outcome = execute(&db, &config, command).await;
    db.close().await;
    outcome
}

async fn execute(db: &Database, config: &BackofficeConfig, command: Command) -> anyhow::Result<bool> {
    let analytics = db.analytics();

    match command {
        Command::Summary => print(&analytics.summary(config.low_stock_threshold).await?)?,
        Command::TopProducts(n) => {
            print(&analytics.top_products(n.unwrap_or(config.top_limit)).await?)?
        }
        Command::Weekly => print(&analytics.weekly_sales().await?)?,
        Command::Payments => print(&analytics.sales_by_payment_method().await?)?,
        Command::TopCustomers(n) => {
            print(&analytics.top_customers(n.unwrap_or(config.top_limit)).await?)?
        }
        Command::Products(threshold) => print(
            &analytics
                .products_summary(threshold.unwrap_or(config.low_stock_threshold))
                .await?,
        )?,
        Command::Purchases => print(&analytics.purchases_summary().await?)?,
        Command::Search { query, page } => print(
            &db.products()
                .search(query.as_deref(), page.unwrap_or(1), SEARCH_PAGE_SIZE)
                .await?,
        )?,
        Command::Reconcile => {
            let discrepancies = db.stock().reconcile().await?;
            print(&discrepancies)?;
            if !discrepancies.is_empty() {
                warn!(count = discrepancies.len(), "Stock audit found discrepancies");
                return Ok(false);
            }
        }
        Command::Help => println!("{USAGE}"),
    }

    Ok(true)
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=bazaar_db=trace` - Show trace for the database crate only
/// - Default: `info,bazaar=debug,sqlx=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bazaar=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
