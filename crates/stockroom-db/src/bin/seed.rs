//! # Seed Data Generator
//!
//! Populates the database with a demo catalog and runs one checkout.
//!
//! ## Usage
//! ```bash
//! # Database from config / platform data dir
//! cargo run -p stockroom-db --bin seed
//!
//! # Explicit database file
//! cargo run -p stockroom-db --bin seed -- --db ./data/stockroom.db
//!
//! # Explicit config file
//! cargo run -p stockroom-db --bin seed -- --config ./stockroom.toml
//! ```
//!
//! ## Generated Data
//! For every product in [`PRODUCTS`]:
//! - one regular variant (allocated UPC, priced delivery)
//! - one promotional variant (0.8 × price, same stock)
//! - a second delivery that re-prices and restocks both
//!
//! Finally one checkout over the regular variants is printed as JSON.

use chrono::Utc;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stockroom_core::{CheckoutLine, CheckoutRequest, Money, NewVariant};
use stockroom_db::{CheckoutProcessor, Database, PricingSyncEngine, StockroomConfig};

/// (category, product, characteristics, first price, second price, stock)
const PRODUCTS: &[(&str, &str, &str, &str, &str, i64)] = &[
    ("Dairy", "Whole Milk", "1L carton", "1.20", "1.35", 40),
    ("Dairy", "Greek Yogurt", "500g tub", "2.80", "2.95", 25),
    ("Bakery", "Sourdough Loaf", "800g", "3.50", "3.75", 12),
    ("Beverages", "Sparkling Water", "6 x 500ml", "4.10", "3.90", 30),
    ("Grocery", "Basmati Rice", "2kg bag", "6.49", "6.99", 18),
];

const DEMO_EMPLOYEE: &str = "EMP0000001";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,stockroom=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockroom Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -d, --db <PATH>      Database file (overrides config)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = StockroomConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = Some(path);
    }

    let db_config = config.database.to_db_config()?;
    if let Some(parent) = db_config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    info!(path = %db_config.database_path.display(), "Seeding database");
    let db = Database::new(db_config).await?;

    let existing = db.variants().list_all().await?;
    if !existing.is_empty() {
        println!("Database already has {} variants", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let pricing = PricingSyncEngine::new(db.clone());
    let checkout = CheckoutProcessor::new(db.clone(), config.checkout.clone());

    let mut categories = std::collections::HashMap::new();
    let mut sellable = Vec::new();

    for (category_name, name, characteristics, first, second, stock) in PRODUCTS {
        let category_id = match categories.get(category_name) {
            Some(id) => *id,
            None => {
                let category = db.catalog().insert_category(category_name).await?;
                categories.insert(*category_name, category.category_id);
                category.category_id
            }
        };

        let product = db
            .catalog()
            .insert_product(category_id, name, characteristics)
            .await?;

        let regular = pricing
            .create_variant(NewVariant {
                upc: None,
                promo_link: None,
                product_id: product.product_id,
                selling_price: Money::parse("selling_price", first)?,
                stock_count: *stock,
                is_promotional: false,
            })
            .await?;

        let first_price = Money::parse("selling_price", first)?;
        pricing
            .create_variant(NewVariant {
                upc: None,
                promo_link: None,
                product_id: product.product_id,
                selling_price: first_price.promotional()?,
                stock_count: *stock,
                is_promotional: true,
            })
            .await?;

        // Second delivery: restocks and re-prices both variants above
        pricing
            .create_variant(NewVariant {
                upc: None,
                promo_link: None,
                product_id: product.product_id,
                selling_price: Money::parse("selling_price", second)?,
                stock_count: *stock / 2,
                is_promotional: false,
            })
            .await?;

        sellable.push((regular.upc, Money::parse("selling_price", second)?));
    }

    let variants = db.variants().list_with_details().await?;
    println!("{}", serde_json::to_string_pretty(&variants)?);

    let request = CheckoutRequest {
        lines: sellable
            .iter()
            .take(3)
            .map(|(upc, price)| CheckoutLine {
                upc: upc.clone(),
                quantity: 2,
                unit_price: *price,
            })
            .collect(),
        employee_id: DEMO_EMPLOYEE.to_string(),
        card_number: None,
        print_date: Utc::now(),
        vat_rate: None,
    };

    let receipt = checkout.create_check(request).await?;
    let stored = db.receipts().get_with_lines(&receipt.receipt_number).await?;
    println!("{}", serde_json::to_string_pretty(&stored)?);

    info!(
        variants = variants.len(),
        receipt_number = %receipt.receipt_number,
        "Seed complete"
    );

    db.close().await;
    Ok(())
}
