//! # stockroom-core: Pure Business Logic for Stockroom
//!
//! This crate holds the rules that keep store-product variants consistent
//! and that shape a checkout. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockroom Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               Callers (HTTP handlers, seed binary)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        stockroom-db engines: PricingSyncEngine, Checkout        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockroom-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │    ids    │  │ validation│  │   │
//! │  │   │  Variant  │  │   Money   │  │ IdGen     │  │   rules   │  │   │
//! │  │   │  Receipt  │  │  VAT, 0.8 │  │ probe     │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO DATABASE • NO NETWORK • NO FILE SYSTEM                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (variants, patches, checkout, receipts)
//! - [`money`] - Exact decimal money, precision rule, promotional price, VAT
//! - [`ids`] - Random identifier generation with a pluggable uniqueness probe
//! - [`error`] - Domain error types and the caller-facing [`ErrorKind`]
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use stockroom_core::money::Money;
//! use stockroom_core::types::VatRate;
//! use rust_decimal::Decimal;
//!
//! let total = Money::parse("total", "100.00").unwrap();
//! let vat = total.calculate_vat(VatRate::new(Decimal::new(2, 1)).unwrap());
//! assert_eq!(vat, Money::parse("vat", "20").unwrap());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ids;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use ids::{AllocationError, ExistenceCheck, IdGenerator};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Length of a UPC and of a promo link.
pub const UPC_LENGTH: usize = 12;

/// Length of a generated receipt number.
pub const RECEIPT_NUMBER_LENGTH: usize = 10;

/// Length of an employee id.
pub const EMPLOYEE_ID_LENGTH: usize = 10;

/// Length of a customer loyalty card number.
pub const CARD_NUMBER_LENGTH: usize = 13;
