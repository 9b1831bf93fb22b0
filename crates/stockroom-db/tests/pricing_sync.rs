//! Sibling synchronization, link rules and deletion through the pricing engine.

mod common;

use std::sync::Arc;

use common::*;
use stockroom_core::{ErrorKind, VariantPatch};
use stockroom_db::repository::inventory;
use stockroom_db::{CheckoutProcessor, DbError, PricingSyncEngine};

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_create_adds_stock_and_copies_price_to_regular_sibling() {
    let db = memory_db().await;
    let product_id = product(&db, "Olive Oil").await;
    let pricing = PricingSyncEngine::new(db.clone());

    pricing
        .create_variant(regular("100000000001", product_id, 10, "100.00"))
        .await
        .unwrap();
    let created = pricing
        .create_variant(regular("100000000002", product_id, 5, "120.00"))
        .await
        .unwrap();

    let u1 = db.variants().get("100000000001").await.unwrap();
    assert_eq!(u1.stock_count, 15);
    assert_eq!(u1.selling_price, price("120.00"));

    let u2 = db.variants().get("100000000002").await.unwrap();
    assert_eq!(u2, created);
    assert_eq!(u2.stock_count, 5);
}

#[tokio::test]
async fn test_create_discounts_promotional_sibling() {
    let db = memory_db().await;
    let product_id = product(&db, "Olive Oil").await;
    let pricing = PricingSyncEngine::new(db.clone());

    pricing
        .create_variant(regular("100000000001", product_id, 10, "100.00"))
        .await
        .unwrap();
    pricing
        .create_variant(promotional("100000000002", product_id, 10, "80.00"))
        .await
        .unwrap();
    pricing
        .create_variant(regular("100000000003", product_id, 5, "110.00"))
        .await
        .unwrap();

    let u1 = db.variants().get("100000000001").await.unwrap();
    let u2 = db.variants().get("100000000002").await.unwrap();
    assert_eq!(u1.stock_count, 15);
    assert_eq!(u2.stock_count, 15);
    assert_eq!(u1.selling_price, price("110.00"));
    assert_eq!(u2.selling_price, price("88.00"));
}

#[tokio::test]
async fn test_create_does_not_touch_other_products() {
    let db = memory_db().await;
    let oil = product(&db, "Olive Oil").await;
    let salt = product(&db, "Sea Salt").await;
    let pricing = PricingSyncEngine::new(db.clone());

    pricing
        .create_variant(regular("100000000001", oil, 10, "100.00"))
        .await
        .unwrap();
    pricing
        .create_variant(regular("200000000001", salt, 3, "2.00"))
        .await
        .unwrap();

    let u1 = db.variants().get("100000000001").await.unwrap();
    assert_eq!(u1.stock_count, 10);
    assert_eq!(u1.selling_price, price("100.00"));
}

#[tokio::test]
async fn test_imprecise_promotional_price_aborts_create() {
    let db = memory_db().await;
    let product_id = product(&db, "Olive Oil").await;
    let pricing = PricingSyncEngine::new(db.clone());

    pricing
        .create_variant(regular("100000000001", product_id, 10, "100.00"))
        .await
        .unwrap();
    pricing
        .create_variant(promotional("100000000002", product_id, 10, "80.00"))
        .await
        .unwrap();

    // 0.8 × 1.0003 = 0.80024 has five fractional digits
    let err = pricing
        .create_variant(regular("100000000003", product_id, 5, "1.0003"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    assert!(db.variants().find("100000000003").await.unwrap().is_none());
    let u1 = db.variants().get("100000000001").await.unwrap();
    assert_eq!(u1.stock_count, 10);
    assert_eq!(u1.selling_price, price("100.00"));
}

#[tokio::test]
async fn test_promotional_create_with_link_rejected() {
    let db = memory_db().await;
    let product_id = product(&db, "Olive Oil").await;
    let pricing = PricingSyncEngine::new(db.clone());

    pricing
        .create_variant(regular("100000000001", product_id, 10, "100.00"))
        .await
        .unwrap();

    let mut bad = promotional("100000000002", product_id, 10, "80.00");
    bad.promo_link = Some("100000000001".to_string());
    let err = pricing.create_variant(bad).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert!(db.variants().find("100000000002").await.unwrap().is_none());
}

#[tokio::test]
async fn test_link_requires_matching_anchor() {
    let db = memory_db().await;
    let oil = product(&db, "Olive Oil").await;
    let salt = product(&db, "Sea Salt").await;
    let pricing = PricingSyncEngine::new(db.clone());

    pricing
        .create_variant(promotional("100000000001", oil, 10, "80.00"))
        .await
        .unwrap();

    // stock differs
    let mut stock_mismatch = regular("100000000002", oil, 7, "100.00");
    stock_mismatch.promo_link = Some("100000000001".to_string());
    let err = pricing.create_variant(stock_mismatch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);

    // product differs
    let mut product_mismatch = regular("200000000001", salt, 10, "2.00");
    product_mismatch.promo_link = Some("100000000001".to_string());
    let err = pricing.create_variant(product_mismatch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);

    // anchor missing
    let mut missing = regular("100000000003", oil, 10, "100.00");
    missing.promo_link = Some("199999999999".to_string());
    let err = pricing.create_variant(missing).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);

    assert_eq!(db.variants().list_all().await.unwrap().len(), 1);
    let anchor = db.variants().get("100000000001").await.unwrap();
    assert_eq!(anchor.stock_count, 10);
    assert_eq!(anchor.selling_price, price("80.00"));
}

#[tokio::test]
async fn test_linked_create_syncs_anchor() {
    let db = memory_db().await;
    let product_id = product(&db, "Olive Oil").await;
    let pricing = PricingSyncEngine::new(db.clone());

    pricing
        .create_variant(promotional("100000000001", product_id, 10, "80.00"))
        .await
        .unwrap();

    let mut linked = regular("100000000002", product_id, 10, "100.00");
    linked.promo_link = Some("100000000001".to_string());
    let created = pricing.create_variant(linked).await.unwrap();
    assert_eq!(created.promo_link.as_deref(), Some("100000000001"));

    let anchor = db.variants().get("100000000001").await.unwrap();
    assert_eq!(anchor.stock_count, 20);
    assert_eq!(anchor.selling_price, price("80.00"));
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn test_update_sets_sibling_stock_absolutely() {
    let db = memory_db().await;
    let product_id = product(&db, "Olive Oil").await;
    let pricing = PricingSyncEngine::new(db.clone());

    pricing
        .create_variant(regular("100000000001", product_id, 10, "100.00"))
        .await
        .unwrap();
    pricing
        .create_variant(promotional("100000000002", product_id, 10, "80.00"))
        .await
        .unwrap();

    let patch = VariantPatch {
        stock_count: Some(30),
        selling_price: Some(price("50.00")),
        ..VariantPatch::default()
    };
    let updated = pricing.update_variant("100000000001", patch).await.unwrap();
    assert_eq!(updated.stock_count, 30);
    assert_eq!(updated.selling_price, price("50.00"));

    let u2 = db.variants().get("100000000002").await.unwrap();
    assert_eq!(u2.stock_count, 30);
    assert_eq!(u2.selling_price, price("40.00"));
}

#[tokio::test]
async fn test_update_of_promotional_row_keeps_sibling_prices() {
    let db = memory_db().await;
    let product_id = product(&db, "Olive Oil").await;
    let pricing = PricingSyncEngine::new(db.clone());

    pricing
        .create_variant(regular("100000000001", product_id, 10, "100.00"))
        .await
        .unwrap();
    pricing
        .create_variant(promotional("100000000002", product_id, 10, "80.00"))
        .await
        .unwrap();

    let patch = VariantPatch {
        stock_count: Some(4),
        selling_price: Some(price("75.00")),
        ..VariantPatch::default()
    };
    pricing.update_variant("100000000002", patch).await.unwrap();

    let u1 = db.variants().get("100000000001").await.unwrap();
    assert_eq!(u1.stock_count, 4);
    assert_eq!(u1.selling_price, price("100.00"));

    let u2 = db.variants().get("100000000002").await.unwrap();
    assert_eq!(u2.selling_price, price("75.00"));
}

#[tokio::test]
async fn test_unpromoting_an_unreferenced_variant_reprices_siblings() {
    let db = memory_db().await;
    let product_id = product(&db, "Olive Oil").await;
    let pricing = PricingSyncEngine::new(db.clone());

    pricing
        .create_variant(promotional("100000000001", product_id, 10, "80.00"))
        .await
        .unwrap();
    pricing
        .create_variant(promotional("100000000002", product_id, 10, "80.00"))
        .await
        .unwrap();

    let patch = VariantPatch {
        is_promotional: Some(false),
        selling_price: Some(price("90.00")),
        ..VariantPatch::default()
    };
    let updated = pricing.update_variant("100000000001", patch).await.unwrap();
    assert!(!updated.is_promotional);

    let u2 = db.variants().get("100000000002").await.unwrap();
    assert!(u2.is_promotional);
    assert_eq!(u2.selling_price, price("72.00"));
}

#[tokio::test]
async fn test_unpromoting_a_referenced_anchor_is_rejected() {
    let db = memory_db().await;
    let product_id = product(&db, "Olive Oil").await;
    let pricing = PricingSyncEngine::new(db.clone());

    pricing
        .create_variant(promotional("100000000002", product_id, 10, "80.00"))
        .await
        .unwrap();
    let mut linked = regular("100000000001", product_id, 10, "100.00");
    linked.promo_link = Some("100000000002".to_string());
    pricing.create_variant(linked).await.unwrap();

    let before = db.variants().list_all().await.unwrap();

    let patch = VariantPatch {
        is_promotional: Some(false),
        ..VariantPatch::default()
    };
    let err = pricing.update_variant("100000000002", patch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    match err {
        DbError::Domain(stockroom_core::CoreError::AnchorInUse { referenced_by, .. }) => {
            assert_eq!(referenced_by, vec!["100000000001".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(db.variants().list_all().await.unwrap(), before);
}

#[tokio::test]
async fn test_promoting_a_linked_variant_is_rejected() {
    let db = memory_db().await;
    let product_id = product(&db, "Olive Oil").await;
    let pricing = PricingSyncEngine::new(db.clone());

    pricing
        .create_variant(promotional("100000000002", product_id, 10, "80.00"))
        .await
        .unwrap();
    let mut linked = regular("100000000001", product_id, 10, "100.00");
    linked.promo_link = Some("100000000002".to_string());
    pricing.create_variant(linked).await.unwrap();

    let promote = VariantPatch {
        is_promotional: Some(true),
        ..VariantPatch::default()
    };
    let err = pricing
        .update_variant("100000000001", promote)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);

    // Clearing the link in the same patch makes it legal
    let promote_unlinked = VariantPatch {
        is_promotional: Some(true),
        promo_link: Some(None),
        ..VariantPatch::default()
    };
    let updated = pricing
        .update_variant("100000000001", promote_unlinked)
        .await
        .unwrap();
    assert!(updated.is_promotional);
    assert!(updated.promo_link.is_none());
}

#[tokio::test]
async fn test_update_unknown_variant() {
    let db = memory_db().await;
    let pricing = PricingSyncEngine::new(db.clone());

    let patch = VariantPatch {
        stock_count: Some(1),
        ..VariantPatch::default()
    };
    let err = pricing.update_variant("999999999999", patch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_rules() {
    let db = memory_db().await;
    let product_id = product(&db, "Olive Oil").await;
    let pricing = PricingSyncEngine::new(db.clone());
    let checkout = CheckoutProcessor::new(db.clone(), Default::default());

    pricing
        .create_variant(promotional("100000000001", product_id, 10, "80.00"))
        .await
        .unwrap();
    let mut linked = regular("100000000002", product_id, 10, "100.00");
    linked.promo_link = Some("100000000001".to_string());
    pricing.create_variant(linked).await.unwrap();
    pricing
        .create_variant(regular("100000000003", product_id, 0, "100.00"))
        .await
        .unwrap();

    // Referenced anchor
    let err = pricing.delete_variant("100000000001").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);

    // Sold variant is kept by its sale lines
    checkout
        .create_check(sale(&[("100000000002", 1, "100.00")]))
        .await
        .unwrap();
    let err = pricing.delete_variant("100000000002").await.unwrap_err();
    assert!(matches!(err, DbError::ForeignKeyViolation { .. }));

    // Unknown
    let err = pricing.delete_variant("999999999999").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Free variant
    pricing.delete_variant("100000000003").await.unwrap();
    assert!(db.variants().find("100000000003").await.unwrap().is_none());
    assert_eq!(db.variants().list_all().await.unwrap().len(), 2);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_abandoned_transaction_does_not_block_later_writes() {
    let db = memory_db().await;
    let product_id = product(&db, "Olive Oil").await;
    let pricing = PricingSyncEngine::new(db.clone());
    pricing
        .create_variant(regular("100000000001", product_id, 4, "10.00"))
        .await
        .unwrap();

    let mut tx = db.begin_immediate().await.unwrap();
    inventory::adjust_stock(&mut *tx, "100000000001", 50).await.unwrap();
    drop(tx);

    let variant = pricing.adjust_stock("100000000001", 1).await.unwrap();
    assert_eq!(variant.stock_count, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_never_lose_a_restock() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(dir.path()).await;
    let product_id = product(&db, "Olive Oil").await;
    let pricing = Arc::new(PricingSyncEngine::new(db.clone()));

    pricing
        .create_variant(regular("100000000000", product_id, 0, "10.00"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 1..=8 {
        let pricing = Arc::clone(&pricing);
        handles.push(tokio::spawn(async move {
            pricing
                .create_variant(regular(&format!("1000000000{n:02}"), product_id, 1, "10.00"))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Every create added one unit to the first variant
    let first = db.variants().get("100000000000").await.unwrap();
    assert_eq!(first.stock_count, 8);
    assert_eq!(db.variants().list_by_product(product_id).await.unwrap().len(), 9);
}
