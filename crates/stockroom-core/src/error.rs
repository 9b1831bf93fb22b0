//! # Error Types
//!
//! Domain-specific error types for stockroom-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockroom-core errors (this file)                                     │
//! │  ├── CoreError        - Invariant, stock and identifier failures       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stockroom-db errors (separate crate)                                  │
//! │  └── DbError          - Database and transaction failures              │
//! │                                                                         │
//! │  Every error maps onto one ErrorKind, which is what callers branch on  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (UPC, receipt number, etc.)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to exactly one [`ErrorKind`]

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// The caller-facing classification of every failure.
///
/// ## Kinds
/// ```text
/// ┌──────────────────────┬──────────────────────────────────────────────────┐
/// │ VALIDATION_ERROR     │ quantity < 1, bad price precision, future date   │
/// │ NOT_FOUND            │ unknown UPC, receipt or catalog product          │
/// │ INVARIANT_VIOLATION  │ un-promoting an anchor, promo-link mismatch      │
/// │ INSUFFICIENT_STOCK   │ pre-check failure or lost decrement race         │
/// │ GENERATION_EXHAUSTED │ identifier retries used up                       │
/// │ TRANSACTION_ERROR    │ begin/commit/rollback failure, pool timeout      │
/// │ INTERNAL             │ anything the caller cannot act on                │
/// └──────────────────────┴──────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    InvariantViolation,
    InsufficientStock,
    GenerationExhausted,
    TransactionError,
    Internal,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// None of them are retried automatically.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity could not be found.
    ///
    /// ## When This Occurs
    /// - Unknown UPC on update, delete or checkout
    /// - Unknown receipt number
    /// - Referenced catalog product does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A variant's promo link does not point at a compatible anchor.
    ///
    /// ## When This Occurs
    /// - The anchor UPC does not exist
    /// - The anchor belongs to another catalog product
    /// - The anchor's stock count differs from the new variant's
    #[error("Invalid promo link {anchor} on {upc}: {reason}")]
    InvalidLink {
        upc: String,
        anchor: String,
        reason: String,
    },

    /// The variant is still referenced as another variant's promo link.
    ///
    /// ## User Workflow
    /// ```text
    /// U1.promo_link = U2
    ///      │
    ///      ▼
    /// update U2 { is_promotional: false }
    ///      │
    ///      ▼
    /// AnchorInUse { upc: U2, referenced_by: [U1] }
    /// ```
    #[error("Variant {upc} is the promotional anchor of {referenced_by:?}")]
    AnchorInUse {
        upc: String,
        referenced_by: Vec<String>,
    },

    /// A promotional variant was given a promo link of its own.
    #[error("Promotional variant {upc} cannot carry a promo link")]
    PromotionalWithLink { upc: String },

    /// Insufficient stock to complete a sale or adjustment.
    ///
    /// `available` is `None` when the shortfall was detected by the
    /// conditional decrement, which does not report the current count.
    #[error("Insufficient stock for {upc}: available {available:?}, requested {requested}")]
    InsufficientStock {
        upc: String,
        available: Option<i64>,
        requested: i64,
    },

    /// Every candidate identifier was already taken.
    #[error("Could not allocate a unique identifier after {attempts} attempts")]
    GenerationExhausted { attempts: usize },

    /// The operating system randomness source failed.
    #[error("Randomness source failed: {0}")]
    RandomSource(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns the caller-facing classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::InvalidLink { .. }
            | CoreError::AnchorInUse { .. }
            | CoreError::PromotionalWithLink { .. } => ErrorKind::InvariantViolation,
            CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CoreError::GenerationExhausted { .. } => ErrorKind::GenerationExhausted,
            CoreError::RandomSource(_) => ErrorKind::Internal,
            CoreError::Validation(_) => ErrorKind::ValidationError,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before any row is touched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value does not have the exact length required.
    #[error("{field} must be exactly {expected} characters, got {actual}")]
    WrongLength {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// A decimal does not fit the stored precision.
    #[error("{field} {value} exceeds {max_integer} integer or {max_fraction} fractional digits")]
    InvalidPrecision {
        field: String,
        value: String,
        max_integer: u32,
        max_fraction: u32,
    },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
    },

    /// Invalid format (e.g., non-numeric price string).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Date lies in the future.
    #[error("{field} cannot be in the future")]
    FutureDate { field: String },

    /// Duplicate value (e.g., the same UPC on two checkout lines).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Returns true for precision failures on recomputed prices.
    pub fn is_invalid_price(&self) -> bool {
        matches!(self, ValidationError::InvalidPrecision { .. })
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            upc: "000000000042".to_string(),
            available: Some(3),
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for 000000000042: available Some(3), requested 5"
        );

        let err = ValidationError::WrongLength {
            field: "upc".to_string(),
            expected: 12,
            actual: 3,
        };
        assert_eq!(err.to_string(), "upc must be exactly 12 characters, got 3");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            CoreError::not_found("Variant", "x").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::AnchorInUse {
                upc: "a".into(),
                referenced_by: vec!["b".into()]
            }
            .kind(),
            ErrorKind::InvariantViolation
        );
        assert_eq!(
            CoreError::GenerationExhausted { attempts: 10 }.kind(),
            ErrorKind::GenerationExhausted
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "upc".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::InsufficientStock).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_STOCK\"");
    }
}
