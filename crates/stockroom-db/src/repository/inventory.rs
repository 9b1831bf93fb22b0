//! # Inventory Store
//!
//! Persistence for store-product variants.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Free functions (this module)        InventoryRepository               │
//! │  ──────────────────────────────      ─────────────────────────         │
//! │  generic over any sqlx Executor      owns a pool clone                 │
//! │  one statement each                  read side for collaborators       │
//! │  used by the engines with the        (reporting, stock checks)         │
//! │  BEGIN IMMEDIATE connection                                            │
//! │                                                                         │
//! │  inventory::fetch(&mut *conn, upc)   db.variants().get(upc)            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Oversell Guard
//! [`conditional_decrement`] is the authoritative stock check. It subtracts
//! only `WHERE stock_count - quantity >= 0`; zero affected rows means the
//! sale lost the race and the caller decides what to do.

use sqlx::{Executor, FromRow, Sqlite, SqliteConnection, SqlitePool};
use std::future::Future;
use tracing::debug;

use stockroom_core::{ExistenceCheck, StockLevel, StoreProductVariant, VariantDetails, VariantPatch};

use super::decode_money;
use crate::error::{DbError, DbResult};

const VARIANT_COLUMNS: &str =
    "upc, promo_link, product_id, selling_price, stock_count, is_promotional";

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct VariantRow {
    upc: String,
    promo_link: Option<String>,
    product_id: i64,
    selling_price: String,
    stock_count: i64,
    is_promotional: bool,
}

impl TryFrom<VariantRow> for StoreProductVariant {
    type Error = DbError;

    fn try_from(row: VariantRow) -> DbResult<Self> {
        Ok(StoreProductVariant {
            selling_price: decode_money("selling_price", row.selling_price)?,
            upc: row.upc,
            promo_link: row.promo_link,
            product_id: row.product_id,
            stock_count: row.stock_count,
            is_promotional: row.is_promotional,
        })
    }
}

#[derive(Debug, FromRow)]
struct VariantDetailsRow {
    #[sqlx(flatten)]
    variant: VariantRow,
    product_name: String,
    characteristics: String,
    category_name: String,
}

impl TryFrom<VariantDetailsRow> for VariantDetails {
    type Error = DbError;

    fn try_from(row: VariantDetailsRow) -> DbResult<Self> {
        Ok(VariantDetails {
            variant: row.variant.try_into()?,
            product_name: row.product_name,
            characteristics: row.characteristics,
            category_name: row.category_name,
        })
    }
}

fn into_variants(rows: Vec<VariantRow>) -> DbResult<Vec<StoreProductVariant>> {
    rows.into_iter().map(StoreProductVariant::try_from).collect()
}

// =============================================================================
// Executor-Generic Operations
// =============================================================================

/// Point lookup. `None` when the UPC is unknown.
pub async fn fetch<'e, E>(executor: E, upc: &str) -> DbResult<Option<StoreProductVariant>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {VARIANT_COLUMNS} FROM store_product_variant WHERE upc = ?1");
    let row: Option<VariantRow> = sqlx::query_as(&sql)
        .bind(upc)
        .fetch_optional(executor)
        .await?;

    row.map(StoreProductVariant::try_from).transpose()
}

/// Point lookup that fails with `NotFound`.
pub async fn get<'e, E>(executor: E, upc: &str) -> DbResult<StoreProductVariant>
where
    E: Executor<'e, Database = Sqlite>,
{
    fetch(executor, upc)
        .await?
        .ok_or_else(|| DbError::not_found("Variant", upc))
}

/// All variants of one catalog product, ordered by UPC.
pub async fn list_by_product<'e, E>(executor: E, product_id: i64) -> DbResult<Vec<StoreProductVariant>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {VARIANT_COLUMNS} FROM store_product_variant WHERE product_id = ?1 ORDER BY upc"
    );
    let rows: Vec<VariantRow> = sqlx::query_as(&sql)
        .bind(product_id)
        .fetch_all(executor)
        .await?;

    into_variants(rows)
}

/// Inserts a variant. Fails with `UniqueViolation` on a duplicate UPC.
pub async fn insert<'e, E>(executor: E, variant: &StoreProductVariant) -> DbResult<String>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(upc = %variant.upc, product_id = variant.product_id, "Inserting variant");

    sqlx::query(
        r#"
        INSERT INTO store_product_variant (
            upc, promo_link, product_id, selling_price, stock_count, is_promotional
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&variant.upc)
    .bind(&variant.promo_link)
    .bind(variant.product_id)
    .bind(variant.selling_price.to_string())
    .bind(variant.stock_count)
    .bind(variant.is_promotional)
    .execute(executor)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
            field,
            value: variant.upc.clone(),
        },
        other => other,
    })?;

    Ok(variant.upc.clone())
}

/// Applies the fields a patch sets. Returns the number of rows touched
/// (0 when the UPC is unknown).
pub async fn update<'e, E>(executor: E, upc: &str, patch: &VariantPatch) -> DbResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(upc = %upc, ?patch, "Updating variant");

    let (set_link, link) = match &patch.promo_link {
        Some(link) => (true, link.clone()),
        None => (false, None),
    };

    let result = sqlx::query(
        r#"
        UPDATE store_product_variant SET
            promo_link     = CASE WHEN ?2 THEN ?3 ELSE promo_link END,
            product_id     = COALESCE(?4, product_id),
            selling_price  = COALESCE(?5, selling_price),
            stock_count    = COALESCE(?6, stock_count),
            is_promotional = COALESCE(?7, is_promotional)
        WHERE upc = ?1
        "#,
    )
    .bind(upc)
    .bind(set_link)
    .bind(link)
    .bind(patch.product_id)
    .bind(patch.selling_price.map(|p| p.to_string()))
    .bind(patch.stock_count)
    .bind(patch.is_promotional)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Compare-and-decrement. Returns affected rows: 1 on success, 0 when the
/// UPC is unknown or the stock would go negative.
pub async fn conditional_decrement<'e, E>(executor: E, upc: &str, quantity: i64) -> DbResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE store_product_variant
        SET stock_count = stock_count - ?2
        WHERE upc = ?1 AND stock_count - ?2 >= 0
        "#,
    )
    .bind(upc)
    .bind(quantity)
    .execute(executor)
    .await?;

    debug!(upc = %upc, quantity, rows = result.rows_affected(), "Conditional decrement");
    Ok(result.rows_affected())
}

/// Signed stock adjustment guarded by `stock_count + delta >= 0`.
pub async fn adjust_stock<'e, E>(executor: E, upc: &str, delta: i64) -> DbResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE store_product_variant
        SET stock_count = stock_count + ?2
        WHERE upc = ?1 AND stock_count + ?2 >= 0
        "#,
    )
    .bind(upc)
    .bind(delta)
    .execute(executor)
    .await?;

    debug!(upc = %upc, delta, rows = result.rows_affected(), "Stock adjustment");
    Ok(result.rows_affected())
}

/// Current stock count, `None` when the UPC is unknown.
pub async fn stock_count<'e, E>(executor: E, upc: &str) -> DbResult<Option<i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: Option<i64> =
        sqlx::query_scalar("SELECT stock_count FROM store_product_variant WHERE upc = ?1")
            .bind(upc)
            .fetch_optional(executor)
            .await?;
    Ok(count)
}

pub async fn exists<'e, E>(executor: E, upc: &str) -> DbResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let found: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM store_product_variant WHERE upc = ?1)",
    )
    .bind(upc)
    .fetch_one(executor)
    .await?;
    Ok(found)
}

/// UPCs of the other variants whose promo link points at `upc`.
pub async fn referencing_variants<'e, E>(executor: E, upc: &str) -> DbResult<Vec<String>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let upcs: Vec<String> = sqlx::query_scalar(
        "SELECT upc FROM store_product_variant WHERE promo_link = ?1 AND upc <> ?1 ORDER BY upc",
    )
    .bind(upc)
    .fetch_all(executor)
    .await?;
    Ok(upcs)
}

/// Deletes a variant row. Returns affected rows.
pub async fn delete<'e, E>(executor: E, upc: &str) -> DbResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(upc = %upc, "Deleting variant");

    let result = sqlx::query("DELETE FROM store_product_variant WHERE upc = ?1")
        .bind(upc)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

// =============================================================================
// UPC Probe
// =============================================================================

/// Existence probe over the variant table, bound to a transaction connection.
pub struct UpcProbe<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> UpcProbe<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        UpcProbe { conn }
    }
}

impl ExistenceCheck for UpcProbe<'_> {
    type Error = DbError;

    fn exists(&mut self, candidate: &str) -> impl Future<Output = DbResult<bool>> + Send {
        exists(&mut *self.conn, candidate)
    }
}

// =============================================================================
// Repository (read side)
// =============================================================================

/// Pooled read access to variants for collaborators.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Gets a variant, failing with `NotFound`.
    pub async fn get(&self, upc: &str) -> DbResult<StoreProductVariant> {
        get(&self.pool, upc).await
    }

    /// Gets a variant if it exists.
    pub async fn find(&self, upc: &str) -> DbResult<Option<StoreProductVariant>> {
        fetch(&self.pool, upc).await
    }

    /// All variants, ordered by UPC.
    pub async fn list_all(&self) -> DbResult<Vec<StoreProductVariant>> {
        let sql = format!("SELECT {VARIANT_COLUMNS} FROM store_product_variant ORDER BY upc");
        let rows: Vec<VariantRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        into_variants(rows)
    }

    /// All variants of one catalog product.
    pub async fn list_by_product(&self, product_id: i64) -> DbResult<Vec<StoreProductVariant>> {
        list_by_product(&self.pool, product_id).await
    }

    /// Variants flagged promotional.
    pub async fn list_promotional(&self) -> DbResult<Vec<StoreProductVariant>> {
        let sql = format!(
            "SELECT {VARIANT_COLUMNS} FROM store_product_variant \
             WHERE is_promotional = 1 ORDER BY upc"
        );
        let rows: Vec<VariantRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        into_variants(rows)
    }

    /// Stock count and promotional flag of one variant.
    pub async fn check_stock(&self, upc: &str) -> DbResult<StockLevel> {
        let row: Option<(i64, bool)> = sqlx::query_as(
            "SELECT stock_count, is_promotional FROM store_product_variant WHERE upc = ?1",
        )
        .bind(upc)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(stock_count, is_promotional)| StockLevel {
            stock_count,
            is_promotional,
        })
        .ok_or_else(|| DbError::not_found("Variant", upc))
    }

    /// Variants joined with product and category names, for reporting views.
    pub async fn list_with_details(&self) -> DbResult<Vec<VariantDetails>> {
        let sql = format!("{DETAILS_SELECT} ORDER BY p.name, v.upc");
        let rows: Vec<VariantDetailsRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter().map(VariantDetails::try_from).collect()
    }

    /// Detailed variants whose product belongs to `category_id`.
    pub async fn list_by_category(&self, category_id: i64) -> DbResult<Vec<VariantDetails>> {
        let sql = format!("{DETAILS_SELECT} WHERE p.category_id = ?1 ORDER BY p.name, v.upc");
        let rows: Vec<VariantDetailsRow> = sqlx::query_as(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(VariantDetails::try_from).collect()
    }

    /// Detailed variants whose product name contains `name`.
    ///
    /// Matching is case-insensitive for ASCII; `%` and `_` match literally.
    pub async fn search_by_name(&self, name: &str) -> DbResult<Vec<VariantDetails>> {
        let sql = format!(
            r"{DETAILS_SELECT} WHERE p.name LIKE ?1 ESCAPE '\' ORDER BY p.name, v.upc"
        );
        let rows: Vec<VariantDetailsRow> = sqlx::query_as(&sql)
            .bind(format!("%{}%", escape_like(name)))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(VariantDetails::try_from).collect()
    }
}

const DETAILS_SELECT: &str = r#"
    SELECT
        v.upc, v.promo_link, v.product_id, v.selling_price,
        v.stock_count, v.is_promotional,
        p.name AS product_name,
        p.characteristics,
        c.name AS category_name
    FROM store_product_variant v
    JOIN product p ON p.product_id = v.product_id
    JOIN category c ON c.category_id = p.category_id
"#;

fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
