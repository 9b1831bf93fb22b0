//! # Pricing Synchronization
//!
//! Keeps stock and price consistent across the variants of one catalog
//! product.
//!
//! ## Restock Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_variant (priced delivery of Q units at price P)                 │
//! │     sibling.stock  = sibling.stock + Q          (additive)              │
//! │     sibling.price  = P         non-promotional sibling                  │
//! │                    = 0.8 × P   promotional sibling                      │
//! │                                                                         │
//! │  update_variant (correction of an existing row)                         │
//! │     sibling.stock  = effective stock            (absolute)              │
//! │     sibling.price  = same rule, only when the row was not promotional   │
//! │                      or the patch explicitly un-promotes it             │
//! │                                                                         │
//! │  creating a promotional variant is not a delivery: no sibling writes    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Link Rules
//! - A promotional variant never carries a promo link.
//! - A new link must point at an existing anchor with the same product
//!   and the same stock count.
//! - A variant that some other variant links to cannot be un-promoted or
//!   deleted while the link exists.
//!
//! Every operation runs in one `BEGIN IMMEDIATE` transaction. A rejected
//! sibling price aborts the whole call and nothing is written.

use rand::rngs::OsRng;
use rand::RngCore;
use sqlx::SqliteConnection;
use tokio::sync::Mutex;
use tracing::{info, warn};

use stockroom_core::ids::NUMERIC;
use stockroom_core::validation::{validate_new_variant, validate_patch, validate_upc};
use stockroom_core::{
    CoreError, IdGenerator, NewVariant, StoreProductVariant, ValidationError, VariantPatch,
    UPC_LENGTH,
};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::inventory::{self, UpcProbe};
use crate::repository::catalog;

/// Owner of every variant mutation.
///
/// ## Usage
/// ```rust,ignore
/// let pricing = PricingSyncEngine::new(db.clone());
///
/// let created = pricing.create_variant(NewVariant {
///     upc: None,               // allocated
///     promo_link: None,
///     product_id: 1,
///     selling_price: Money::parse("selling_price", "120.00")?,
///     stock_count: 5,
///     is_promotional: false,
/// }).await?;
/// ```
#[derive(Debug)]
pub struct PricingSyncEngine<R = OsRng> {
    db: Database,
    ids: Mutex<IdGenerator<R>>,
}

impl PricingSyncEngine<OsRng> {
    /// Engine allocating UPCs from the operating system CSPRNG.
    pub fn new(db: Database) -> Self {
        PricingSyncEngine::with_generator(db, IdGenerator::os())
    }
}

impl<R: RngCore + Send> PricingSyncEngine<R> {
    /// Engine with an injected identifier generator.
    pub fn with_generator(db: Database, ids: IdGenerator<R>) -> Self {
        PricingSyncEngine {
            db,
            ids: Mutex::new(ids),
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Inserts a variant and, for a non-promotional one, synchronizes every
    /// sibling of the same product.
    ///
    /// ## Errors
    /// - `Validation` on malformed input or a sibling price that fails the
    ///   precision rule after the 0.8 factor
    /// - `NotFound` when the catalog product does not exist
    /// - `PromotionalWithLink` / `InvalidLink` on link rule violations
    /// - `UniqueViolation` when an explicit UPC is already taken
    /// - `GenerationExhausted` when no free UPC was found
    pub async fn create_variant(&self, new: NewVariant) -> DbResult<StoreProductVariant> {
        validate_new_variant(&new)?;

        if new.is_promotional && new.promo_link.is_some() {
            let upc = new.upc.clone().unwrap_or_default();
            warn!(upc = %upc, "Rejected promotional variant with promo link");
            return Err(CoreError::PromotionalWithLink { upc }.into());
        }

        let product_id = new.product_id;
        let mut tx = self.db.begin_immediate().await?;
        let result = self.insert_and_sync(&mut tx, new).await;
        let outcome = Database::finish(tx, result).await;

        match &outcome {
            Ok(variant) => info!(
                upc = %variant.upc,
                product_id,
                stock_count = variant.stock_count,
                price = %variant.selling_price,
                is_promotional = variant.is_promotional,
                "Variant created"
            ),
            Err(e) => warn!(product_id, error = %e, "Variant creation rejected"),
        }

        outcome
    }

    async fn insert_and_sync(
        &self,
        conn: &mut SqliteConnection,
        new: NewVariant,
    ) -> DbResult<StoreProductVariant> {
        if !catalog::product_exists(&mut *conn, new.product_id).await? {
            return Err(DbError::not_found("Product", new.product_id.to_string()));
        }

        let upc = match new.upc.clone() {
            Some(upc) => {
                if inventory::exists(&mut *conn, &upc).await? {
                    return Err(DbError::duplicate("upc", upc));
                }
                upc
            }
            None => {
                let mut ids = self.ids.lock().await;
                ids.allocate_unique(UPC_LENGTH, NUMERIC, &mut UpcProbe::new(&mut *conn))
                    .await?
            }
        };

        if !new.is_promotional {
            if let Some(anchor) = &new.promo_link {
                check_anchor(&mut *conn, &upc, anchor, new.product_id, new.stock_count).await?;
            }

            let siblings = inventory::list_by_product(&mut *conn, new.product_id).await?;
            for sibling in &siblings {
                let stock_count = sibling
                    .stock_count
                    .checked_add(new.stock_count)
                    .ok_or_else(|| stock_overflow(&sibling.upc))?;

                let patch = VariantPatch {
                    stock_count: Some(stock_count),
                    selling_price: Some(sibling.synced_price(new.selling_price)?),
                    ..VariantPatch::default()
                };
                inventory::update(&mut *conn, &sibling.upc, &patch).await?;
            }
        }

        let variant = new.into_variant(upc);
        inventory::insert(&mut *conn, &variant).await?;
        Ok(variant)
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Applies a patch to one variant and propagates the effective stock
    /// (and, when allowed, price) to its siblings.
    ///
    /// Returns the row as stored after the patch.
    pub async fn update_variant(&self, upc: &str, patch: VariantPatch) -> DbResult<StoreProductVariant> {
        validate_upc("upc", upc)?;
        validate_patch(&patch)?;

        let mut tx = self.db.begin_immediate().await?;
        let result = Self::patch_and_sync(&mut tx, upc, &patch).await;
        let outcome = Database::finish(tx, result).await;

        match &outcome {
            Ok(variant) => info!(
                upc = %upc,
                product_id = variant.product_id,
                stock_count = variant.stock_count,
                price = %variant.selling_price,
                "Variant updated"
            ),
            Err(e) => warn!(upc = %upc, error = %e, "Variant update rejected"),
        }

        outcome
    }

    async fn patch_and_sync(
        conn: &mut SqliteConnection,
        upc: &str,
        patch: &VariantPatch,
    ) -> DbResult<StoreProductVariant> {
        let current = inventory::get(&mut *conn, upc).await?;

        if patch.unpromotes() {
            let referenced_by = inventory::referencing_variants(&mut *conn, upc).await?;
            if !referenced_by.is_empty() {
                return Err(CoreError::AnchorInUse {
                    upc: upc.to_string(),
                    referenced_by,
                }
                .into());
            }
        }

        let effective = patch.apply_to(&current);

        if effective.is_promotional && effective.promo_link.is_some() {
            return Err(CoreError::PromotionalWithLink {
                upc: upc.to_string(),
            }
            .into());
        }

        if let Some(Some(anchor)) = &patch.promo_link {
            if anchor == upc {
                return Err(CoreError::InvalidLink {
                    upc: upc.to_string(),
                    anchor: anchor.clone(),
                    reason: "a variant cannot link to itself".to_string(),
                }
                .into());
            }
            if !inventory::exists(&mut *conn, anchor).await? {
                return Err(CoreError::InvalidLink {
                    upc: upc.to_string(),
                    anchor: anchor.clone(),
                    reason: "anchor does not exist".to_string(),
                }
                .into());
            }
        }

        if effective.product_id != current.product_id
            && !catalog::product_exists(&mut *conn, effective.product_id).await?
        {
            return Err(DbError::not_found("Product", effective.product_id.to_string()));
        }

        let reprice = patch.unpromotes() || !current.is_promotional;

        let siblings = inventory::list_by_product(&mut *conn, effective.product_id).await?;
        for sibling in siblings.iter().filter(|v| v.upc != upc) {
            let selling_price = if reprice {
                Some(sibling.synced_price(effective.selling_price)?)
            } else {
                None
            };

            let sync = VariantPatch {
                stock_count: Some(effective.stock_count),
                selling_price,
                ..VariantPatch::default()
            };
            inventory::update(&mut *conn, &sibling.upc, &sync).await?;
        }

        inventory::update(&mut *conn, upc, patch).await?;
        Ok(effective)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Deletes a variant nobody links to.
    ///
    /// A variant with recorded sale lines is kept by the foreign key and the
    /// call fails with `ForeignKeyViolation`.
    pub async fn delete_variant(&self, upc: &str) -> DbResult<()> {
        validate_upc("upc", upc)?;

        let mut tx = self.db.begin_immediate().await?;
        let result = Self::delete_unreferenced(&mut tx, upc).await;
        let outcome = Database::finish(tx, result).await;

        match &outcome {
            Ok(()) => info!(upc = %upc, "Variant deleted"),
            Err(e) => warn!(upc = %upc, error = %e, "Variant deletion rejected"),
        }

        outcome
    }

    async fn delete_unreferenced(conn: &mut SqliteConnection, upc: &str) -> DbResult<()> {
        if !inventory::exists(&mut *conn, upc).await? {
            return Err(DbError::not_found("Variant", upc));
        }

        let referenced_by = inventory::referencing_variants(&mut *conn, upc).await?;
        if !referenced_by.is_empty() {
            return Err(CoreError::AnchorInUse {
                upc: upc.to_string(),
                referenced_by,
            }
            .into());
        }

        inventory::delete(&mut *conn, upc).await?;
        Ok(())
    }

    // =========================================================================
    // Stock Adjustment
    // =========================================================================

    /// Adds a signed `delta` to one variant's stock.
    ///
    /// A manual count correction for a single row: siblings and prices are
    /// left alone. Returns the adjusted row.
    pub async fn adjust_stock(&self, upc: &str, delta: i64) -> DbResult<StoreProductVariant> {
        validate_upc("upc", upc)?;

        let mut tx = self.db.begin_immediate().await?;
        let result = Self::apply_delta(&mut tx, upc, delta).await;
        let outcome = Database::finish(tx, result).await;

        match &outcome {
            Ok(variant) => info!(upc = %upc, delta, stock_count = variant.stock_count, "Stock adjusted"),
            Err(e) => warn!(upc = %upc, delta, error = %e, "Stock adjustment rejected"),
        }

        outcome
    }

    async fn apply_delta(conn: &mut SqliteConnection, upc: &str, delta: i64) -> DbResult<StoreProductVariant> {
        if inventory::adjust_stock(&mut *conn, upc, delta).await? == 0 {
            return match inventory::stock_count(&mut *conn, upc).await? {
                None => Err(DbError::not_found("Variant", upc)),
                Some(available) => Err(CoreError::InsufficientStock {
                    upc: upc.to_string(),
                    available: Some(available),
                    requested: delta.saturating_neg(),
                }
                .into()),
            };
        }

        inventory::get(&mut *conn, upc).await
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// The anchor of a new link must exist and already agree on product and
/// stock count.
async fn check_anchor(
    conn: &mut SqliteConnection,
    upc: &str,
    anchor: &str,
    product_id: i64,
    stock_count: i64,
) -> DbResult<()> {
    let invalid = |reason: String| -> DbError {
        CoreError::InvalidLink {
            upc: upc.to_string(),
            anchor: anchor.to_string(),
            reason,
        }
        .into()
    };

    let Some(found) = inventory::fetch(&mut *conn, anchor).await? else {
        return Err(invalid("anchor does not exist".to_string()));
    };

    if found.product_id != product_id {
        return Err(invalid(format!(
            "anchor belongs to product {}, not {}",
            found.product_id, product_id
        )));
    }

    if found.stock_count != stock_count {
        return Err(invalid(format!(
            "anchor stock {} differs from {}",
            found.stock_count, stock_count
        )));
    }

    Ok(())
}

fn stock_overflow(upc: &str) -> DbError {
    ValidationError::OutOfRange {
        field: format!("stock_count of {upc}"),
        min: "0".to_string(),
        max: i64::MAX.to_string(),
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================
