//! # Schema
//!
//! The SQL files under `migrations/sqlite` are compiled into the binary and
//! applied by [`run_migrations`] when a [`Database`](crate::Database) opens.
//!
//! ```text
//! category ◄──── product ◄──── store_product_variant ◄──┐ promo_link
//!                                  │        └───────────┘ (self reference)
//!                                  ▼
//!                              sale_line ────► receipt
//! ```
//!
//! Row-level constraints backing the engine rules:
//!
//! | Table                   | Constraint                                         |
//! |-------------------------|----------------------------------------------------|
//! | `store_product_variant` | `length(upc) = 12`                                 |
//! | `store_product_variant` | `stock_count >= 0`                                 |
//! | `store_product_variant` | `is_promotional = 0 OR promo_link IS NULL`         |
//! | `sale_line`             | `quantity >= 1`, one row per `(upc, receipt)`      |
//! | all                     | foreign keys (the pool turns `foreign_keys` on)    |
//!
//! Money columns are TEXT holding the exact decimal string.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations; applied ones are tracked in `_sqlx_migrations`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
///
/// Idempotent: safe to run multiple times.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}
