//! # Validation Module
//!
//! Input validation for variant mutations and checkouts.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialization (serde)                                      │
//! │  └── Shape and type of the request                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before any transaction is opened)              │
//! │  ├── Identifier lengths (UPC, employee id, card number)                │
//! │  ├── Price precision, quantities, print date                           │
//! │  └── Duplicate UPCs across checkout lines                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Engines (inside the transaction)                            │
//! │  └── Cross-row invariants: promo links, anchors, stock                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: Database (SQLite)                                            │
//! │  ├── CHECK (stock_count >= 0), CHECK (quantity >= 1)                   │
//! │  └── PRIMARY KEY / FOREIGN KEY constraints                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockroom_core::validation::{validate_upc, validate_quantity};
//!
//! validate_upc("upc", "036000291452").unwrap();
//! validate_quantity(5).unwrap();
//! assert!(validate_quantity(0).is_err());
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{CheckoutRequest, NewVariant, VariantPatch, VatRate};
use crate::{CARD_NUMBER_LENGTH, EMPLOYEE_ID_LENGTH, UPC_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

fn validate_exact_length(field: &str, value: &str, expected: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    let actual = value.chars().count();
    if actual != expected {
        return Err(ValidationError::WrongLength {
            field: field.to_string(),
            expected,
            actual,
        });
    }

    Ok(())
}

/// Validates a UPC (also used for promo links).
///
/// ## Rules
/// - Exactly 12 characters
/// - No whitespace
///
/// ## Example
/// ```rust
/// use stockroom_core::validation::validate_upc;
///
/// assert!(validate_upc("upc", "036000291452").is_ok());
/// assert!(validate_upc("upc", "0360").is_err());
/// assert!(validate_upc("upc", "03600029 452").is_err());
/// ```
pub fn validate_upc(field: &str, upc: &str) -> ValidationResult<()> {
    validate_exact_length(field, upc, UPC_LENGTH)?;

    if upc.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates an employee id (exactly 10 characters).
pub fn validate_employee_id(employee_id: &str) -> ValidationResult<()> {
    validate_exact_length("employee_id", employee_id, EMPLOYEE_ID_LENGTH)
}

/// Validates a loyalty card number (exactly 13 characters).
pub fn validate_card_number(card_number: &str) -> ValidationResult<()> {
    validate_exact_length("card_number", card_number, CARD_NUMBER_LENGTH)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a catalog product id.
pub fn validate_product_id(product_id: i64) -> ValidationResult<()> {
    if product_id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "product_id".to_string(),
        });
    }
    Ok(())
}

/// Validates a stock count (zero allowed).
pub fn validate_stock_count(stock_count: i64) -> ValidationResult<()> {
    if stock_count < 0 {
        return Err(ValidationError::Negative {
            field: "stock_count".to_string(),
        });
    }
    Ok(())
}

/// Validates a sale quantity.
///
/// ## Rules
/// - Must be at least 1
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Checkout line { upc, quantity: 0, unit_price: 5 }                      │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(0) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty < 1? → Error: "quantity must be positive"                 │
/// │       │                                                                 │
/// │       └── OK → next line                                               │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 1 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a price: non-negative and within the stored precision.
///
/// ## Example
/// ```rust
/// use stockroom_core::money::Money;
/// use stockroom_core::validation::validate_price;
///
/// let ok = Money::parse("selling_price", "19.9900").unwrap();
/// assert!(validate_price("selling_price", ok).is_ok());
///
/// let too_fine = Money::parse("selling_price", "19.99001").unwrap();
/// assert!(validate_price("selling_price", too_fine).is_err());
/// ```
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    price.checked(field).map(|_| ())
}

/// Validates a VAT rate and converts it.
pub fn validate_vat_rate(rate: Decimal) -> ValidationResult<VatRate> {
    VatRate::new(rate)
}

// =============================================================================
// Date Validators
// =============================================================================

/// Validates that a print date is not in the future relative to `now`.
pub fn validate_print_date(print_date: DateTime<Utc>, now: DateTime<Utc>) -> ValidationResult<()> {
    if print_date > now {
        return Err(ValidationError::FutureDate {
            field: "print_date".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a create request before the pricing engine opens a transaction.
pub fn validate_new_variant(new: &NewVariant) -> ValidationResult<()> {
    if let Some(upc) = &new.upc {
        validate_upc("upc", upc)?;
    }
    if let Some(link) = &new.promo_link {
        validate_upc("promo_link", link)?;
    }
    validate_product_id(new.product_id)?;
    validate_stock_count(new.stock_count)?;
    validate_price("selling_price", new.selling_price)
}

/// Validates the fields a patch sets.
pub fn validate_patch(patch: &VariantPatch) -> ValidationResult<()> {
    if let Some(Some(link)) = &patch.promo_link {
        validate_upc("promo_link", link)?;
    }
    if let Some(product_id) = patch.product_id {
        validate_product_id(product_id)?;
    }
    if let Some(stock_count) = patch.stock_count {
        validate_stock_count(stock_count)?;
    }
    if let Some(price) = patch.selling_price {
        validate_price("selling_price", price)?;
    }
    Ok(())
}

/// Validates a checkout request against the clock reading `now`.
///
/// ## Rules
/// - At least one line, each UPC at most once
/// - Each line: valid UPC, quantity >= 1, unit price passes [`validate_price`]
/// - Employee id 10 characters, card number 13 characters when present
/// - Print date not in the future
/// - VAT override, when present, within `[0, 1]`
pub fn validate_checkout(request: &CheckoutRequest, now: DateTime<Utc>) -> ValidationResult<()> {
    if request.lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    let mut seen = HashSet::with_capacity(request.lines.len());
    for line in &request.lines {
        validate_upc("upc", &line.upc)?;
        validate_quantity(line.quantity)?;
        validate_price("unit_price", line.unit_price)?;

        if !seen.insert(line.upc.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "upc".to_string(),
                value: line.upc.clone(),
            });
        }
    }

    validate_employee_id(&request.employee_id)?;
    if let Some(card) = &request.card_number {
        validate_card_number(card)?;
    }
    validate_print_date(request.print_date, now)?;
    if let Some(rate) = request.vat_rate {
        validate_vat_rate(rate)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
