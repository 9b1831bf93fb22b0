//! Atomic checkout: pricing, rollback and concurrent sales.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use stockroom_core::{CoreError, ErrorKind};
use stockroom_db::{CheckoutProcessor, CheckoutSettings, Database, DbError, PricingSyncEngine};

/// One regular variant under a fresh product, so it has no siblings.
async fn single(db: &Database, upc: &str, stock: i64, p: &str) {
    let product_id = product(db, "Espresso Beans").await;
    PricingSyncEngine::new(db.clone())
        .create_variant(regular(upc, product_id, stock, p))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_checkout_sells_out_then_rejects() {
    let db = memory_db().await;
    single(&db, "300000000001", 2, "50.00").await;
    let checkout = CheckoutProcessor::new(db.clone(), CheckoutSettings::default());

    let receipt = checkout
        .create_check(sale(&[("300000000001", 2, "50.00")]))
        .await
        .unwrap();
    assert_eq!(receipt.total_amount, price("100.00"));
    assert_eq!(receipt.vat_amount, price("20.00"));
    assert_eq!(db.variants().get("300000000001").await.unwrap().stock_count, 0);

    let err = checkout
        .create_check(sale(&[("300000000001", 1, "50.00")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientStock);

    assert_eq!(db.receipts().count().await.unwrap(), 1);
    assert_eq!(db.receipts().line_count().await.unwrap(), 1);
    assert_eq!(db.variants().get("300000000001").await.unwrap().stock_count, 0);
}

#[tokio::test]
async fn test_short_line_rolls_back_whole_sale() {
    let db = memory_db().await;
    let product_id = product(&db, "Tea").await;
    let pricing = PricingSyncEngine::new(db.clone());
    pricing
        .create_variant(regular("300000000001", product_id, 10, "4.00"))
        .await
        .unwrap();
    // Promotional create: no sibling sync, so 300000000001 keeps 10
    pricing
        .create_variant(promotional("300000000002", product_id, 1, "3.20"))
        .await
        .unwrap();
    let checkout = CheckoutProcessor::new(db.clone(), CheckoutSettings::default());

    let err = checkout
        .create_check(sale(&[("300000000001", 3, "4.00"), ("300000000002", 2, "3.20")]))
        .await
        .unwrap_err();
    match err {
        DbError::Domain(CoreError::InsufficientStock {
            upc,
            available,
            requested,
        }) => {
            assert_eq!(upc, "300000000002");
            assert_eq!(available, Some(1));
            assert_eq!(requested, 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(db.receipts().count().await.unwrap(), 0);
    assert_eq!(db.receipts().line_count().await.unwrap(), 0);
    assert_eq!(db.variants().get("300000000001").await.unwrap().stock_count, 10);
    assert_eq!(db.variants().get("300000000002").await.unwrap().stock_count, 1);
}

#[tokio::test]
async fn test_receipt_and_lines_are_persisted() {
    let db = memory_db().await;
    let product_id = product(&db, "Tea").await;
    let pricing = PricingSyncEngine::new(db.clone());
    pricing
        .create_variant(regular("300000000001", product_id, 10, "4.00"))
        .await
        .unwrap();
    pricing
        .create_variant(promotional("300000000002", product_id, 6, "3.20"))
        .await
        .unwrap();
    let checkout = CheckoutProcessor::new(db.clone(), CheckoutSettings::default());

    let mut request = sale(&[("300000000002", 2, "3.20"), ("300000000001", 3, "4.00")]);
    request.card_number = Some("1234567890123".to_string());
    let print_date = request.print_date;

    let receipt = checkout.create_check(request).await.unwrap();
    assert_eq!(receipt.total_amount, price("18.40"));
    assert_eq!(receipt.vat_amount, price("3.68"));
    assert_eq!(receipt.print_date, print_date);

    let stored = db.receipts().get_with_lines(&receipt.receipt_number).await.unwrap();
    assert_eq!(stored.receipt.employee_id, EMPLOYEE);
    assert_eq!(stored.receipt.card_number.as_deref(), Some("1234567890123"));
    assert_eq!(stored.receipt.total_amount, receipt.total_amount);
    assert_eq!(stored.receipt.print_date, print_date);
    assert_eq!(stored.lines.len(), 2);
    assert_eq!(stored.lines[0].upc, "300000000001");
    assert_eq!(stored.lines[0].quantity, 3);
    assert_eq!(stored.lines[1].unit_price, price("3.20"));

    assert_eq!(db.variants().get("300000000001").await.unwrap().stock_count, 7);
    assert_eq!(db.variants().get("300000000002").await.unwrap().stock_count, 4);
}

#[tokio::test]
async fn test_invalid_requests_write_nothing() {
    let db = memory_db().await;
    single(&db, "300000000001", 5, "1.00").await;
    let checkout = CheckoutProcessor::new(db.clone(), CheckoutSettings::default());

    let empty = sale(&[]);
    let zero_quantity = sale(&[("300000000001", 0, "1.00")]);
    let duplicate = sale(&[("300000000001", 1, "1.00"), ("300000000001", 1, "1.00")]);
    let mut short_employee = sale(&[("300000000001", 1, "1.00")]);
    short_employee.employee_id = "E1".to_string();
    let mut bad_card = sale(&[("300000000001", 1, "1.00")]);
    bad_card.card_number = Some("42".to_string());
    let mut bad_vat = sale(&[("300000000001", 1, "1.00")]);
    bad_vat.vat_rate = Some(rust_decimal::Decimal::new(15, 1));
    let imprecise = sale(&[("300000000001", 1, "1.00001")]);

    for request in [
        empty,
        zero_quantity,
        duplicate,
        short_employee,
        bad_card,
        bad_vat,
        imprecise,
    ] {
        let err = checkout.create_check(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError, "{err}");
    }

    assert_eq!(db.receipts().count().await.unwrap(), 0);
    assert_eq!(db.variants().get("300000000001").await.unwrap().stock_count, 5);
}

#[tokio::test]
async fn test_configured_receipt_number_length() {
    let db = memory_db().await;
    single(&db, "300000000001", 5, "1.00").await;

    let settings = CheckoutSettings {
        receipt_number_length: 16,
        ..CheckoutSettings::default()
    };
    let checkout = CheckoutProcessor::new(db.clone(), settings);

    let receipt = checkout
        .create_check(sale(&[("300000000001", 1, "1.00")]))
        .await
        .unwrap();
    assert_eq!(receipt.receipt_number.len(), 16);
    assert!(receipt.receipt_number.bytes().all(|b| b.is_ascii_alphanumeric()));
}

#[tokio::test]
async fn test_total_above_price_precision_is_accepted() {
    let db = memory_db().await;
    single(&db, "300000000001", 5, "9000000000.00").await;
    let checkout = CheckoutProcessor::new(db.clone(), CheckoutSettings::default());

    let receipt = checkout
        .create_check(sale(&[("300000000001", 2, "9000000000.00")]))
        .await
        .unwrap();
    assert_eq!(receipt.total_amount, price("18000000000.00"));
    assert_eq!(receipt.vat_amount, price("3600000000.00"));

    let stored = db.receipts().get(&receipt.receipt_number).await.unwrap();
    assert_eq!(stored.total_amount, price("18000000000"));
    assert_eq!(db.variants().get("300000000001").await.unwrap().stock_count, 3);
}

#[tokio::test]
async fn test_overflowing_total_is_a_validation_error() {
    let db = memory_db().await;
    single(&db, "300000000001", i64::MAX, "9999999999.9999").await;
    let checkout = CheckoutProcessor::new(db.clone(), CheckoutSettings::default());

    let err = checkout
        .create_check(sale(&[("300000000001", 9_000_000_000_000_000_000, "9999999999.9999")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError, "{err}");

    assert_eq!(db.receipts().count().await.unwrap(), 0);
    assert_eq!(db.variants().get("300000000001").await.unwrap().stock_count, i64::MAX);
}

// =============================================================================
// Lock Timeouts and Cancellation
// =============================================================================

#[tokio::test]
async fn test_lock_timeout_is_a_transaction_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db_waiting(dir.path(), Duration::from_millis(200)).await;
    single(&db, "300000000001", 5, "2.00").await;
    let checkout = CheckoutProcessor::new(db.clone(), CheckoutSettings::default());

    let writer = db.begin_immediate().await.unwrap();
    let err = checkout
        .create_check(sale(&[("300000000001", 1, "2.00")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionError, "{err}");
    Database::finish(writer, Ok(())).await.unwrap();

    assert_eq!(db.receipts().count().await.unwrap(), 0);
    assert_eq!(db.variants().get("300000000001").await.unwrap().stock_count, 5);
}

#[tokio::test]
async fn test_cancelled_checkout_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(dir.path()).await;
    single(&db, "300000000001", 5, "2.00").await;
    let checkout = CheckoutProcessor::new(db.clone(), CheckoutSettings::default());

    // The checkout queues behind this writer until the caller gives up on it.
    let writer = db.begin_immediate().await.unwrap();
    let cancelled = tokio::time::timeout(
        Duration::from_millis(100),
        checkout.create_check(sale(&[("300000000001", 1, "2.00")])),
    )
    .await;
    assert!(cancelled.is_err());

    // Abandoning the writer must release the lock as well.
    drop(writer);

    let receipt = checkout
        .create_check(sale(&[("300000000001", 2, "2.00")]))
        .await
        .unwrap();
    assert_eq!(db.receipts().count().await.unwrap(), 1);
    assert_eq!(db.receipts().line_count().await.unwrap(), 1);
    assert_eq!(db.receipts().get(&receipt.receipt_number).await.unwrap().total_amount, price("4.00"));
    assert_eq!(db.variants().get("300000000001").await.unwrap().stock_count, 3);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_never_oversell() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(dir.path()).await;
    single(&db, "300000000001", 5, "2.00").await;
    let checkout = Arc::new(CheckoutProcessor::new(db.clone(), CheckoutSettings::default()));

    let mut handles = Vec::new();
    for _ in 0..12 {
        let checkout = Arc::clone(&checkout);
        handles.push(tokio::spawn(async move {
            checkout
                .create_check(sale(&[("300000000001", 1, "2.00")]))
                .await
        }));
    }

    let mut numbers = HashSet::new();
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => assert!(numbers.insert(receipt.receipt_number)),
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::InsufficientStock, "{err}");
                rejected += 1;
            }
        }
    }

    assert_eq!(numbers.len(), 5);
    assert_eq!(rejected, 7);
    assert_eq!(db.variants().get("300000000001").await.unwrap().stock_count, 0);
    assert_eq!(db.receipts().count().await.unwrap(), 5);
    assert_eq!(db.receipts().line_count().await.unwrap(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sales_and_restocks_keep_stock_non_negative() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(dir.path()).await;
    single(&db, "300000000001", 3, "2.00").await;
    let checkout = Arc::new(CheckoutProcessor::new(db.clone(), CheckoutSettings::default()));
    let pricing = Arc::new(PricingSyncEngine::new(db.clone()));

    let mut sales = Vec::new();
    for _ in 0..10 {
        let checkout = Arc::clone(&checkout);
        sales.push(tokio::spawn(async move {
            checkout
                .create_check(sale(&[("300000000001", 1, "2.00")]))
                .await
        }));
    }
    let mut restocks = Vec::new();
    for _ in 0..3 {
        let pricing = Arc::clone(&pricing);
        restocks.push(tokio::spawn(async move {
            pricing.adjust_stock("300000000001", 2).await
        }));
    }

    for handle in restocks {
        handle.await.unwrap().unwrap();
    }
    let mut sold = 0;
    for handle in sales {
        if handle.await.unwrap().is_ok() {
            sold += 1;
        }
    }

    let remaining = db.variants().get("300000000001").await.unwrap().stock_count;
    assert!(remaining >= 0);
    assert_eq!(remaining, 3 + 6 - sold);
    assert_eq!(db.receipts().count().await.unwrap(), sold);
}
