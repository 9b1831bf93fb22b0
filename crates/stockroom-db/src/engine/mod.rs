//! # Engines
//!
//! The only code that writes to the inventory and receipt tables.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  every mutation                                                         │
//! │     1. validate input (stockroom-core, no I/O)                          │
//! │     2. db.begin_immediate()       ← write lock taken up front           │
//! │     3. read + check + write on that one connection                      │
//! │     4. Database::finish(tx, result)                                     │
//! │           Ok  → COMMIT                                                  │
//! │           Err → ROLLBACK, nothing persisted                             │
//! │        future dropped before 4 → ROLLBACK from the guard's Drop         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! While a transaction is open the engine touches only its own
//! connection. Going back to the pool would deadlock an in-memory
//! database, whose pool holds a single connection.

pub mod checkout;
pub mod pricing;

pub use checkout::CheckoutProcessor;
pub use pricing::PricingSyncEngine;
