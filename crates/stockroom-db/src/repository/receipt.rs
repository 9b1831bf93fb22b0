//! # Receipt Repository
//!
//! Receipts and their sale lines.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CheckoutProcessor (inside BEGIN IMMEDIATE)                             │
//! │     ├── number_exists()     ← ReceiptNumberProbe, per candidate         │
//! │     ├── insert_receipt()                                                │
//! │     └── insert_sale_line()  ← once per line                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here writes outside a checkout transaction; the pooled
//! [`ReceiptRepository`] is read-only.

use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection, SqlitePool};
use std::future::Future;
use tracing::debug;

use stockroom_core::{ExistenceCheck, Receipt, ReceiptWithLines, SaleLine};

use super::decode_money;
use crate::error::{DbError, DbResult};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct ReceiptRow {
    receipt_number: String,
    employee_id: String,
    card_number: Option<String>,
    print_date: DateTime<Utc>,
    total_amount: String,
    vat_amount: String,
}

impl TryFrom<ReceiptRow> for Receipt {
    type Error = DbError;

    fn try_from(row: ReceiptRow) -> DbResult<Self> {
        Ok(Receipt {
            total_amount: decode_money("total_amount", row.total_amount)?,
            vat_amount: decode_money("vat_amount", row.vat_amount)?,
            receipt_number: row.receipt_number,
            employee_id: row.employee_id,
            card_number: row.card_number,
            print_date: row.print_date,
        })
    }
}

#[derive(Debug, FromRow)]
struct SaleLineRow {
    upc: String,
    receipt_number: String,
    quantity: i64,
    unit_price: String,
}

impl TryFrom<SaleLineRow> for SaleLine {
    type Error = DbError;

    fn try_from(row: SaleLineRow) -> DbResult<Self> {
        Ok(SaleLine {
            unit_price: decode_money("unit_price", row.unit_price)?,
            upc: row.upc,
            receipt_number: row.receipt_number,
            quantity: row.quantity,
        })
    }
}

// =============================================================================
// Executor-Generic Operations
// =============================================================================

pub async fn insert_receipt<'e, E>(executor: E, receipt: &Receipt) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(receipt_number = %receipt.receipt_number, total = %receipt.total_amount, "Inserting receipt");

    sqlx::query(
        r#"
        INSERT INTO receipt (
            receipt_number, employee_id, card_number, print_date, total_amount, vat_amount
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&receipt.receipt_number)
    .bind(&receipt.employee_id)
    .bind(&receipt.card_number)
    .bind(receipt.print_date)
    .bind(receipt.total_amount.to_string())
    .bind(receipt.vat_amount.to_string())
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn insert_sale_line<'e, E>(executor: E, line: &SaleLine) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    debug!(
        receipt_number = %line.receipt_number,
        upc = %line.upc,
        quantity = line.quantity,
        "Inserting sale line"
    );

    sqlx::query(
        r#"
        INSERT INTO sale_line (upc, receipt_number, quantity, unit_price)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(&line.upc)
    .bind(&line.receipt_number)
    .bind(line.quantity)
    .bind(line.unit_price.to_string())
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn number_exists<'e, E>(executor: E, receipt_number: &str) -> DbResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let found: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM receipt WHERE receipt_number = ?1)")
            .bind(receipt_number)
            .fetch_one(executor)
            .await?;
    Ok(found)
}

/// Existence probe over receipt numbers, bound to a transaction connection.
pub struct ReceiptNumberProbe<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ReceiptNumberProbe<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ReceiptNumberProbe { conn }
    }
}

impl ExistenceCheck for ReceiptNumberProbe<'_> {
    type Error = DbError;

    fn exists(&mut self, candidate: &str) -> impl Future<Output = DbResult<bool>> + Send {
        number_exists(&mut *self.conn, candidate)
    }
}

// =============================================================================
// Repository (read side)
// =============================================================================

/// Pooled read access to receipts for reporting collaborators.
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    pool: SqlitePool,
}

impl ReceiptRepository {
    /// Creates a new ReceiptRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReceiptRepository { pool }
    }

    /// Gets a receipt by number.
    pub async fn get(&self, receipt_number: &str) -> DbResult<Receipt> {
        let row: Option<ReceiptRow> = sqlx::query_as(
            r#"
            SELECT receipt_number, employee_id, card_number, print_date, total_amount, vat_amount
            FROM receipt
            WHERE receipt_number = ?1
            "#,
        )
        .bind(receipt_number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Receipt::try_from)
            .transpose()?
            .ok_or_else(|| DbError::not_found("Receipt", receipt_number))
    }

    /// Receipts, newest print date first.
    pub async fn list(&self, limit: i64) -> DbResult<Vec<Receipt>> {
        let rows: Vec<ReceiptRow> = sqlx::query_as(
            r#"
            SELECT receipt_number, employee_id, card_number, print_date, total_amount, vat_amount
            FROM receipt
            ORDER BY print_date DESC, receipt_number
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Receipt::try_from).collect()
    }

    /// Lines of one receipt, ordered by UPC.
    pub async fn lines_for(&self, receipt_number: &str) -> DbResult<Vec<SaleLine>> {
        let rows: Vec<SaleLineRow> = sqlx::query_as(
            r#"
            SELECT upc, receipt_number, quantity, unit_price
            FROM sale_line
            WHERE receipt_number = ?1
            ORDER BY upc
            "#,
        )
        .bind(receipt_number)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SaleLine::try_from).collect()
    }

    /// A receipt together with its lines.
    pub async fn get_with_lines(&self, receipt_number: &str) -> DbResult<ReceiptWithLines> {
        let receipt = self.get(receipt_number).await?;
        let lines = self.lines_for(receipt_number).await?;
        Ok(ReceiptWithLines { receipt, lines })
    }

    /// Number of stored receipts.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM receipt")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Number of stored sale lines across all receipts.
    pub async fn line_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sale_line")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
