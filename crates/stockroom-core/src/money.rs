//! # Money Module
//!
//! Provides the `Money` type for prices, line totals and VAT.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Prices here carry up to 4 fractional digits (12.5 × 0.8 = 10.0000),   │
//! │  so whole cents are not enough either.                                  │
//! │                                                                         │
//! │  OUR SOLUTION: base-10 Decimal                                          │
//! │    every price is exact, every product is exact,                        │
//! │    rounding happens in exactly one place (VAT)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stored Precision
//! A price is storable when it is non-negative, has at most
//! [`MAX_INTEGER_DIGITS`] digits before the point and at most
//! [`MAX_FRACTION_DIGITS`] significant digits after it. Trailing zeros do not
//! count: `10.00000` is storable, `10.00001` is not.
//!
//! ## Usage
//! ```rust
//! use stockroom_core::money::Money;
//!
//! let price = Money::parse("selling_price", "12.50").unwrap();
//! let promo = price.promotional().unwrap();
//! assert_eq!(promo, Money::parse("promo", "10").unwrap());
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;
use crate::types::VatRate;

/// Digits allowed before the decimal point.
pub const MAX_INTEGER_DIGITS: u32 = 10;

/// Significant digits allowed after the decimal point.
pub const MAX_FRACTION_DIGITS: u32 = 4;

/// Factor applied to a reference price to obtain a promotional price (0.8).
pub const PROMOTIONAL_FACTOR: Decimal = Decimal::from_parts(8, 0, 0, false, 1);

// =============================================================================
// Money Type
// =============================================================================

/// An exact non-float monetary amount.
///
/// ## User Workflow Context
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                    Where Money is Used                                  │
/// │                                                                         │
/// │  Variant.selling_price ──┬──► sibling sync (× 1 or × 0.8)              │
/// │                          │                                              │
/// │                          └──► CheckoutLine.unit_price × quantity        │
/// │                                       │                                 │
/// │                                       ▼                                 │
/// │                           Receipt.total_amount ──► Receipt.vat_amount   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Wraps a decimal amount without checking precision.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Parses a decimal string, rejecting anything that is not a number.
    pub fn parse(field: &str, value: &str) -> Result<Self, ValidationError> {
        value
            .trim()
            .parse::<Decimal>()
            .map(Money)
            .map_err(|e| ValidationError::InvalidFormat {
                field: field.to_string(),
                reason: e.to_string(),
            })
    }

    /// Returns the underlying decimal.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Returns true when the amount fits the stored precision.
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::Money;
    ///
    /// assert!(Money::parse("p", "9999999999.9999").unwrap().fits_precision());
    /// assert!(Money::parse("p", "10.00000").unwrap().fits_precision());
    /// assert!(!Money::parse("p", "10.00001").unwrap().fits_precision());
    /// assert!(!Money::parse("p", "10000000000").unwrap().fits_precision());
    /// assert!(!Money::parse("p", "-1").unwrap().fits_precision());
    /// ```
    pub fn fits_precision(&self) -> bool {
        if self.is_negative() {
            return false;
        }
        let normalized = self.0.normalize();
        if normalized.scale() > MAX_FRACTION_DIGITS {
            return false;
        }
        let limit = Decimal::from(10_i64.pow(MAX_INTEGER_DIGITS));
        normalized.trunc() < limit
    }

    /// Returns `self` if it fits the stored precision, otherwise an
    /// `InvalidPrecision` error naming `field`.
    pub fn checked(self, field: &str) -> Result<Self, ValidationError> {
        if self.is_negative() {
            return Err(ValidationError::Negative {
                field: field.to_string(),
            });
        }
        if !self.fits_precision() {
            return Err(ValidationError::InvalidPrecision {
                field: field.to_string(),
                value: self.0.to_string(),
                max_integer: MAX_INTEGER_DIGITS,
                max_fraction: MAX_FRACTION_DIGITS,
            });
        }
        Ok(self)
    }

    /// The promotional counterpart of this reference price.
    ///
    /// Fails with `InvalidPrecision` when the product cannot be stored.
    ///
    /// ## User Workflow
    /// ```text
    /// Anchor price: 12.50
    ///      │
    ///      ▼
    /// promotional() ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Promotional sibling price: 10.00
    /// ```
    pub fn promotional(&self) -> Result<Self, ValidationError> {
        let promo = self
            .0
            .checked_mul(PROMOTIONAL_FACTOR)
            .ok_or_else(|| ValidationError::InvalidPrecision {
                field: "selling_price".to_string(),
                value: self.0.to_string(),
                max_integer: MAX_INTEGER_DIGITS,
                max_fraction: MAX_FRACTION_DIGITS,
            })?;
        Money(promo).checked("selling_price")
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// Fails with `OutOfRange` instead of overflowing the decimal.
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::Money;
    ///
    /// let unit_price = Money::parse("unit_price", "2.99").unwrap();
    /// let line_total = unit_price.multiply_quantity(3).unwrap();
    /// assert_eq!(line_total, Money::parse("t", "8.97").unwrap());
    ///
    /// let huge = Money::parse("unit_price", "9999999999.9999").unwrap();
    /// assert!(huge.multiply_quantity(9_000_000_000_000_000_000).is_err());
    /// ```
    pub fn multiply_quantity(&self, qty: i64) -> Result<Self, ValidationError> {
        self.0
            .checked_mul(Decimal::from(qty))
            .map(Money)
            .ok_or_else(|| out_of_range("line_total"))
    }

    /// Adds two amounts, failing with `OutOfRange` on overflow.
    pub fn checked_add(self, other: Money) -> Result<Self, ValidationError> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| out_of_range("total_amount"))
    }

    /// VAT owed on this total, rounded to [`MAX_FRACTION_DIGITS`] places
    /// with round-half-to-even.
    ///
    /// ## User Workflow
    /// ```text
    /// Receipt total: 25.00
    ///      │
    ///      ▼
    /// calculate_vat(0.20) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// VAT: 5.0000
    /// ```
    pub fn calculate_vat(&self, rate: VatRate) -> Money {
        // rate <= 1, so the product never exceeds self
        Money((self.0 * rate.fraction()).round_dp(MAX_FRACTION_DIGITS))
    }
}

fn out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: Decimal::MIN.to_string(),
        max: Decimal::MAX.to_string(),
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
