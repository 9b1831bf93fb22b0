//! # stockroom-db: Database Layer and Engines for Stockroom
//!
//! Persistence for the inventory and receipts, plus the two engines that
//! mutate them: pricing synchronization and atomic checkout.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockroom Data Flow                              │
//! │                                                                         │
//! │  Caller (admin UI, till, seed binary)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  stockroom-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────────┐        ┌──────────────────────┐          │   │
//! │  │   │ PricingSyncEngine│        │  CheckoutProcessor   │          │   │
//! │  │   │ (engine/pricing) │        │  (engine/checkout)   │          │   │
//! │  │   └────────┬─────────┘        └──────────┬───────────┘          │   │
//! │  │            │   BEGIN IMMEDIATE ... COMMIT │                      │   │
//! │  │            ▼                              ▼                      │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │    │   │
//! │  │   │   (pool.rs)   │    │ inventory     │    │  (embedded)  │    │   │
//! │  │   │ SqlitePool    │◄───│ receipt       │    │ 001_init.sql │    │   │
//! │  │   │               │    │ catalog       │    │              │    │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (WAL) or shared in-memory database                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and write-transaction helpers
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and configuration error types
//! - [`repository`] - Inventory, receipt and catalog persistence
//! - [`engine`] - Pricing synchronization and checkout
//! - [`config`] - TOML + environment configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockroom_db::{CheckoutProcessor, Database, DbConfig, PricingSyncEngine};
//!
//! let db = Database::new(DbConfig::in_memory()).await?;
//! let pricing = PricingSyncEngine::new(db.clone());
//! let checkout = CheckoutProcessor::new(db.clone(), Default::default());
//!
//! let variant = pricing.create_variant(new_variant).await?;
//! let receipt = checkout.create_check(request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{CheckoutSettings, DatabaseSettings, StockroomConfig};
pub use engine::{CheckoutProcessor, PricingSyncEngine};
pub use error::{ConfigError, DbError, DbResult};
pub use pool::{Database, DbConfig, WriteTransaction};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::receipt::ReceiptRepository;
