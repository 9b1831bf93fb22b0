//! # Domain Types
//!
//! Core domain types for Stockroom.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐        ┌──────────────────────────┐               │
//! │  │ CatalogProduct  │ 1    * │  StoreProductVariant     │               │
//! │  │  ─────────────  │◄───────┤  ──────────────────────  │               │
//! │  │  product_id     │        │  upc (12 chars, PK)      │               │
//! │  │  category_id    │        │  promo_link ─────┐       │               │
//! │  │  name           │        │  selling_price   │ weak  │               │
//! │  └─────────────────┘        │  stock_count     │ ref   │               │
//! │                             │  is_promotional ◄┘       │               │
//! │                             └────────────┬─────────────┘               │
//! │                                          │ 1                            │
//! │                                          │                              │
//! │  ┌─────────────────┐ 1    * ┌────────────┴─────────────┐               │
//! │  │    Receipt      │◄───────┤        SaleLine          │               │
//! │  │  ─────────────  │        │  ──────────────────────  │               │
//! │  │  receipt_number │        │  (upc, receipt_number)   │               │
//! │  │  total_amount   │        │  quantity, unit_price    │               │
//! │  │  vat_amount     │        └──────────────────────────┘               │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Variants are keyed by their UPC and receipts by their receipt number.
//! Both are business identifiers; there is no separate surrogate id.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// VAT Rate
// =============================================================================

/// VAT rate as a fraction of the receipt total (0.2 = 20%).
///
/// Always within `[0, 1]`; construction outside that range fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct VatRate(Decimal);

impl VatRate {
    /// Creates a VAT rate, rejecting values outside `[0, 1]`.
    pub fn new(fraction: Decimal) -> Result<Self, ValidationError> {
        if fraction < Decimal::ZERO || fraction > Decimal::ONE {
            return Err(ValidationError::OutOfRange {
                field: "vat_rate".to_string(),
                min: "0".to_string(),
                max: "1".to_string(),
            });
        }
        Ok(VatRate(fraction))
    }

    /// Returns the rate as a fraction.
    #[inline]
    pub const fn fraction(&self) -> Decimal {
        self.0
    }

    /// Zero VAT rate.
    #[inline]
    pub const fn zero() -> Self {
        VatRate(Decimal::ZERO)
    }
}

impl Default for VatRate {
    fn default() -> Self {
        VatRate::zero()
    }
}

impl TryFrom<Decimal> for VatRate {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        VatRate::new(value)
    }
}

impl From<VatRate> for Decimal {
    fn from(rate: VatRate) -> Self {
        rate.0
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A catalog category. Owned by an external CRUD surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Category {
    pub category_id: i64,
    pub name: String,
}

/// A catalog product. Variants group by `product_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CatalogProduct {
    pub product_id: i64,
    pub category_id: i64,
    pub name: String,
    pub characteristics: String,
}

// =============================================================================
// Store Product Variant
// =============================================================================

/// One stockable, individually priced instance of a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StoreProductVariant {
    /// 12-character UPC, primary key.
    pub upc: String,

    /// UPC of the promotional counterpart, if any.
    pub promo_link: Option<String>,

    pub product_id: i64,

    #[ts(as = "String")]
    pub selling_price: Money,

    pub stock_count: i64,

    pub is_promotional: bool,
}

impl StoreProductVariant {
    /// Price this variant takes when a sibling sets `reference` as the new
    /// reference price.
    pub fn synced_price(&self, reference: Money) -> Result<Money, ValidationError> {
        if self.is_promotional {
            reference.promotional()
        } else {
            reference.checked("selling_price")
        }
    }

    /// Whether this row can satisfy a sale of `quantity` units.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.stock_count >= quantity
    }
}

/// Input for creating a variant.
///
/// A missing `upc` is allocated by the pricing engine.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewVariant {
    #[serde(default)]
    pub upc: Option<String>,
    #[serde(default)]
    pub promo_link: Option<String>,
    pub product_id: i64,
    #[ts(as = "String")]
    pub selling_price: Money,
    pub stock_count: i64,
    #[serde(default)]
    pub is_promotional: bool,
}

impl NewVariant {
    /// Materializes the row to insert once the UPC is known.
    pub fn into_variant(self, upc: String) -> StoreProductVariant {
        StoreProductVariant {
            upc,
            promo_link: self.promo_link,
            product_id: self.product_id,
            selling_price: self.selling_price,
            stock_count: self.stock_count,
            is_promotional: self.is_promotional,
        }
    }
}

/// Partial update of a variant. `None` leaves the field as it is.
///
/// `promo_link` distinguishes "absent" (`None`) from "clear"
/// (`Some(None)`), so a JSON `null` unlinks the variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VariantPatch {
    #[serde(default, deserialize_with = "present")]
    pub promo_link: Option<Option<String>>,
    #[serde(default)]
    #[ts(optional)]
    pub product_id: Option<i64>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub selling_price: Option<Money>,
    #[serde(default)]
    #[ts(optional)]
    pub stock_count: Option<i64>,
    #[serde(default)]
    #[ts(optional)]
    pub is_promotional: Option<bool>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl VariantPatch {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.promo_link.is_none()
            && self.product_id.is_none()
            && self.selling_price.is_none()
            && self.stock_count.is_none()
            && self.is_promotional.is_none()
    }

    /// True when the patch explicitly turns promotion off.
    #[inline]
    pub fn unpromotes(&self) -> bool {
        self.is_promotional == Some(false)
    }

    /// The row as it will look after the patch is applied.
    pub fn apply_to(&self, current: &StoreProductVariant) -> StoreProductVariant {
        StoreProductVariant {
            upc: current.upc.clone(),
            promo_link: match &self.promo_link {
                Some(link) => link.clone(),
                None => current.promo_link.clone(),
            },
            product_id: self.product_id.unwrap_or(current.product_id),
            selling_price: self.selling_price.unwrap_or(current.selling_price),
            stock_count: self.stock_count.unwrap_or(current.stock_count),
            is_promotional: self.is_promotional.unwrap_or(current.is_promotional),
        }
    }
}

/// A variant joined with its catalog product and category, for reporting.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VariantDetails {
    #[serde(flatten)]
    pub variant: StoreProductVariant,
    pub product_name: String,
    pub characteristics: String,
    pub category_name: String,
}

/// Stock snapshot returned by a stock check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockLevel {
    pub stock_count: i64,
    pub is_promotional: bool,
}

// =============================================================================
// Checkout
// =============================================================================

/// One line of a checkout request.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutLine {
    pub upc: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub unit_price: Money,
}

impl CheckoutLine {
    /// quantity × unit_price, or `OutOfRange` when it overflows.
    #[inline]
    pub fn line_total(&self) -> Result<Money, ValidationError> {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// A multi-line sale to be committed atomically.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    pub lines: Vec<CheckoutLine>,
    pub employee_id: String,
    #[serde(default)]
    pub card_number: Option<String>,
    #[ts(as = "String")]
    pub print_date: DateTime<Utc>,
    /// Overrides the configured VAT rate for this sale.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub vat_rate: Option<Decimal>,
}

impl CheckoutRequest {
    /// Sum of all line totals.
    ///
    /// No precision rule applies to the total; it only has to fit a decimal.
    pub fn total(&self) -> Result<Money, ValidationError> {
        self.lines
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.checked_add(line.line_total()?))
    }
}

/// What a successful checkout returns to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutReceipt {
    pub receipt_number: String,
    #[ts(as = "String")]
    pub print_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub total_amount: Money,
    #[ts(as = "String")]
    pub vat_amount: Money,
}

// =============================================================================
// Receipt
// =============================================================================

/// A persisted receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Receipt {
    pub receipt_number: String,
    pub employee_id: String,
    pub card_number: Option<String>,
    #[ts(as = "String")]
    pub print_date: DateTime<Utc>,
    #[ts(as = "String")]
    pub total_amount: Money,
    #[ts(as = "String")]
    pub vat_amount: Money,
}

impl From<&Receipt> for CheckoutReceipt {
    fn from(receipt: &Receipt) -> Self {
        CheckoutReceipt {
            receipt_number: receipt.receipt_number.clone(),
            print_date: receipt.print_date,
            total_amount: receipt.total_amount,
            vat_amount: receipt.vat_amount,
        }
    }
}

/// One persisted line of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub upc: String,
    pub receipt_number: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub unit_price: Money,
}

/// A receipt together with its lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptWithLines {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub lines: Vec<SaleLine>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(is_promotional: bool) -> StoreProductVariant {
        StoreProductVariant {
            upc: "000000000001".to_string(),
            promo_link: None,
            product_id: 1,
            selling_price: Money::parse("p", "100").unwrap(),
            stock_count: 10,
            is_promotional,
        }
    }

    #[test]
    fn test_vat_rate_bounds() {
        assert!(VatRate::new(Decimal::ZERO).is_ok());
        assert!(VatRate::new(Decimal::ONE).is_ok());
        assert!(VatRate::new(Decimal::new(-1, 2)).is_err());
        assert!(VatRate::new(Decimal::new(101, 2)).is_err());
    }

    #[test]
    fn test_vat_rate_deserialize_validates() {
        assert!(serde_json::from_str::<VatRate>("\"0.2\"").is_ok());
        assert!(serde_json::from_str::<VatRate>("\"1.5\"").is_err());
    }

    #[test]
    fn test_synced_price() {
        let reference = Money::parse("p", "110").unwrap();
        assert_eq!(variant(false).synced_price(reference).unwrap(), reference);
        assert_eq!(
            variant(true).synced_price(reference).unwrap(),
            Money::parse("p", "88").unwrap()
        );
    }

    #[test]
    fn test_patch_apply_falls_back_to_current() {
        let current = StoreProductVariant {
            promo_link: Some("000000000002".to_string()),
            ..variant(false)
        };
        let patch = VariantPatch {
            stock_count: Some(3),
            ..Default::default()
        };
        let effective = patch.apply_to(&current);
        assert_eq!(effective.stock_count, 3);
        assert_eq!(effective.selling_price, current.selling_price);
        assert_eq!(effective.promo_link, current.promo_link);
    }

    #[test]
    fn test_patch_distinguishes_absent_and_null_link() {
        let absent: VariantPatch = serde_json::from_str(r#"{"stock_count": 4}"#).unwrap();
        assert_eq!(absent.promo_link, None);

        let cleared: VariantPatch = serde_json::from_str(r#"{"promo_link": null}"#).unwrap();
        assert_eq!(cleared.promo_link, Some(None));

        let current = StoreProductVariant {
            promo_link: Some("000000000002".to_string()),
            ..variant(false)
        };
        assert_eq!(cleared.apply_to(&current).promo_link, None);
        assert!(!cleared.is_empty());
        assert!(VariantPatch::default().is_empty());
    }

    #[test]
    fn test_checkout_total() {
        let request = CheckoutRequest {
            lines: vec![
                CheckoutLine {
                    upc: "000000000001".to_string(),
                    quantity: 2,
                    unit_price: Money::parse("p", "50").unwrap(),
                },
                CheckoutLine {
                    upc: "000000000002".to_string(),
                    quantity: 1,
                    unit_price: Money::parse("p", "0.25").unwrap(),
                },
            ],
            employee_id: "E000000001".to_string(),
            card_number: None,
            print_date: Utc::now(),
            vat_rate: None,
        };
        assert_eq!(request.total().unwrap(), Money::parse("p", "100.25").unwrap());

        // each line fits, their sum does not
        let max = Money::parse("p", "9999999999.9999").unwrap();
        let overflowing = CheckoutRequest {
            lines: vec![
                CheckoutLine {
                    upc: "000000000001".to_string(),
                    quantity: 5_000_000_000_000_000_000,
                    unit_price: max,
                },
                CheckoutLine {
                    upc: "000000000002".to_string(),
                    quantity: 5_000_000_000_000_000_000,
                    unit_price: max,
                },
            ],
            ..request
        };
        assert!(overflowing.lines[0].line_total().is_ok());
        assert!(matches!(
            overflowing.total(),
            Err(ValidationError::OutOfRange { .. })
        ));
    }
}
