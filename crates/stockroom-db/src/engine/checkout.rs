//! # Checkout
//!
//! Records a multi-line sale as one receipt, all or nothing.
//!
//! ## Transaction Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_check(request)                                                  │
//! │     │                                                                   │
//! │     ├── validate_checkout(request, now)          no I/O                 │
//! │     │                                                                   │
//! │     ▼  BEGIN IMMEDIATE                                                  │
//! │     ├── stock_count(upc) per line                NotFound / Insufficient│
//! │     ├── total = Σ quantity × unit_price          overflow → OutOfRange  │
//! │     ├── vat   = round4(total × vat_rate)                                │
//! │     ├── allocate receipt number (≤ 10 tries)     GenerationExhausted    │
//! │     ├── INSERT receipt                                                  │
//! │     ├── per line: INSERT sale_line                                      │
//! │     │             conditional_decrement(upc, q)  0 rows → Insufficient  │
//! │     ▼  COMMIT            (any error above → ROLLBACK, nothing persisted)│
//! │  CheckoutReceipt { receipt_number, print_date, total, vat }             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The stock read is advisory and yields a useful `available` count. The
//! conditional decrement is what actually prevents overselling.

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use sqlx::SqliteConnection;
use tokio::sync::Mutex;
use tracing::{info, warn};

use stockroom_core::ids::ALPHANUMERIC;
use stockroom_core::validation::{validate_checkout, validate_vat_rate};
use stockroom_core::{
    CheckoutReceipt, CheckoutRequest, CoreError, IdGenerator, Receipt, SaleLine, VatRate,
};

use crate::config::CheckoutSettings;
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::inventory;
use crate::repository::receipt::{self as receipts, ReceiptNumberProbe};

/// Atomic checkout over the shared database handle.
#[derive(Debug)]
pub struct CheckoutProcessor<R = OsRng> {
    db: Database,
    ids: Mutex<IdGenerator<R>>,
    settings: CheckoutSettings,
}

impl CheckoutProcessor<OsRng> {
    /// Processor drawing receipt numbers from the operating system CSPRNG.
    pub fn new(db: Database, settings: CheckoutSettings) -> Self {
        CheckoutProcessor::with_generator(db, settings, IdGenerator::os())
    }
}

impl<R: RngCore + Send> CheckoutProcessor<R> {
    /// Processor with an injected identifier generator.
    pub fn with_generator(db: Database, settings: CheckoutSettings, ids: IdGenerator<R>) -> Self {
        CheckoutProcessor {
            db,
            ids: Mutex::new(ids),
            settings,
        }
    }

    /// The settings this processor was built with.
    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Validates, prices and persists one sale.
    ///
    /// ## Errors
    /// - `Validation` for malformed input (no lines, quantity < 1, bad
    ///   identifiers, future print date, VAT outside `[0, 1]`)
    /// - `NotFound` for an unknown UPC
    /// - `InsufficientStock` from the stock pre-check or a lost decrement
    /// - `GenerationExhausted` when no free receipt number was found
    /// - `TransactionFailed` / `PoolExhausted` on lock or pool timeouts
    ///
    /// On any error nothing is persisted.
    pub async fn create_check(&self, request: CheckoutRequest) -> DbResult<CheckoutReceipt> {
        validate_checkout(&request, Utc::now())?;

        let vat_rate = match request.vat_rate {
            Some(rate) => validate_vat_rate(rate)?,
            None => self.settings.vat_rate,
        };

        let mut tx = self.db.begin_immediate().await?;
        let result = self.record_sale(&mut tx, &request, vat_rate).await;
        let outcome = Database::finish(tx, result).await;

        match &outcome {
            Ok(receipt) => info!(
                receipt_number = %receipt.receipt_number,
                employee_id = %receipt.employee_id,
                lines = request.lines.len(),
                total = %receipt.total_amount,
                vat = %receipt.vat_amount,
                "Checkout committed"
            ),
            Err(e) => warn!(
                employee_id = %request.employee_id,
                lines = request.lines.len(),
                error = %e,
                "Checkout rolled back"
            ),
        }

        outcome.map(|receipt| CheckoutReceipt::from(&receipt))
    }

    async fn record_sale(
        &self,
        conn: &mut SqliteConnection,
        request: &CheckoutRequest,
        vat_rate: VatRate,
    ) -> DbResult<Receipt> {
        for line in &request.lines {
            match inventory::stock_count(&mut *conn, &line.upc).await? {
                None => return Err(DbError::not_found("Variant", line.upc.as_str())),
                Some(available) if available < line.quantity => {
                    return Err(CoreError::InsufficientStock {
                        upc: line.upc.clone(),
                        available: Some(available),
                        requested: line.quantity,
                    }
                    .into());
                }
                Some(_) => {}
            }
        }

        let total_amount = request.total()?;
        let vat_amount = total_amount.calculate_vat(vat_rate);

        let receipt_number = {
            let mut ids = self.ids.lock().await;
            ids.allocate_unique(
                self.settings.receipt_number_length,
                ALPHANUMERIC,
                &mut ReceiptNumberProbe::new(&mut *conn),
            )
            .await?
        };

        let receipt = Receipt {
            receipt_number,
            employee_id: request.employee_id.clone(),
            card_number: request.card_number.clone(),
            print_date: request.print_date,
            total_amount,
            vat_amount,
        };
        receipts::insert_receipt(&mut *conn, &receipt).await?;

        for line in &request.lines {
            let sale_line = SaleLine {
                upc: line.upc.clone(),
                receipt_number: receipt.receipt_number.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            };
            receipts::insert_sale_line(&mut *conn, &sale_line).await?;

            if inventory::conditional_decrement(&mut *conn, &line.upc, line.quantity).await? == 0 {
                return Err(CoreError::InsufficientStock {
                    upc: line.upc.clone(),
                    available: None,
                    requested: line.quantity,
                }
                .into());
            }
        }

        Ok(receipt)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
