//! # Repository Module
//!
//! Database repository implementations for Stockroom.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Engine (inside BEGIN IMMEDIATE)       Collaborator (reporting)         │
//! │       │                                      │                          │
//! │       │  inventory::fetch(&mut *conn, upc)   │  db.variants().get(upc)  │
//! │       ▼                                      ▼                          │
//! │  free functions, generic over       Repository structs holding a       │
//! │  sqlx::Executor                     pool clone                         │
//! │       │                                      │                          │
//! │       └──────────────┬───────────────────────┘                          │
//! │                      ▼                                                  │
//! │                SQLite Database                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`inventory`] - Store-product variants (the InventoryStore)
//! - [`receipt`] - Receipts and sale lines
//! - [`catalog`] - Categories and catalog products (FK targets)

pub mod catalog;
pub mod inventory;
pub mod receipt;

use rust_decimal::Decimal;
use stockroom_core::Money;

use crate::error::{DbError, DbResult};

/// Parses a TEXT money column back into [`Money`].
pub(crate) fn decode_money(column: &'static str, value: String) -> DbResult<Money> {
    match value.parse::<Decimal>() {
        Ok(amount) => Ok(Money::new(amount)),
        Err(_) => Err(DbError::Corrupt { column, value }),
    }
}
