//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use std::path::Path;
use std::time::Duration;

use stockroom_core::{CheckoutLine, CheckoutRequest, Money, NewVariant};
use stockroom_db::{Database, DbConfig};

pub const EMPLOYEE: &str = "EMP0000001";

pub async fn memory_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// File database with several pooled connections, for concurrency tests.
pub async fn file_db(dir: &Path) -> Database {
    file_db_waiting(dir, Duration::from_secs(10)).await
}

/// Like [`file_db`], with writers giving up on the lock after `busy_timeout`.
pub async fn file_db_waiting(dir: &Path, busy_timeout: Duration) -> Database {
    let config = DbConfig::new(dir.join("stockroom.db"))
        .max_connections(4)
        .busy_timeout(busy_timeout);
    Database::new(config).await.unwrap()
}

/// Inserts a category and one product in it, returning the product id.
pub async fn product(db: &Database, name: &str) -> i64 {
    let category = db.catalog().insert_category("General").await.unwrap();
    db.catalog()
        .insert_product(category.category_id, name, "")
        .await
        .unwrap()
        .product_id
}

pub fn price(s: &str) -> Money {
    Money::parse("price", s).unwrap()
}

pub fn regular(upc: &str, product_id: i64, stock: i64, p: &str) -> NewVariant {
    NewVariant {
        upc: Some(upc.to_string()),
        promo_link: None,
        product_id,
        selling_price: price(p),
        stock_count: stock,
        is_promotional: false,
    }
}

pub fn promotional(upc: &str, product_id: i64, stock: i64, p: &str) -> NewVariant {
    NewVariant {
        is_promotional: true,
        ..regular(upc, product_id, stock, p)
    }
}

/// Checkout request over `(upc, quantity, unit_price)` lines.
pub fn sale(lines: &[(&str, i64, &str)]) -> CheckoutRequest {
    CheckoutRequest {
        lines: lines
            .iter()
            .map(|(upc, quantity, p)| CheckoutLine {
                upc: upc.to_string(),
                quantity: *quantity,
                unit_price: price(p),
            })
            .collect(),
        employee_id: EMPLOYEE.to_string(),
        card_number: None,
        print_date: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        vat_rate: None,
    }
}
