use super::bounded;
use super::projector::PaymentStatusProjector;
use crate::config::EngineConfig;
use crate::domain::booking::{BookingId, PaymentMethod, PaymentStatus, TransactionRecord};
use crate::domain::ledger::{PaymentLedger, PaymentReceipt};
use crate::domain::money::Money;
use crate::domain::ports::BookingStoreRef;
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Payment state held for one booking.
#[derive(Debug, Clone)]
pub struct Till {
    pub ledger: PaymentLedger,
    pub transaction: Option<TransactionRecord>,
}

/// Takes tenders for bookings and keeps the durable record in step.
///
/// Each booking has its own till behind its own lock, so tenders for one
/// booking are applied one at a time while different bookings proceed
/// independently.
pub struct PaymentDesk {
    store: BookingStoreRef,
    projector: PaymentStatusProjector,
    tills: Mutex<HashMap<BookingId, Arc<Mutex<Till>>>>,
    timeout: Duration,
}

impl PaymentDesk {
    /// Creates a desk with no tills open.
    ///
    /// # Arguments
    ///
    /// * `store` - The durable booking store tenders are reconciled into.
    /// * `config` - Supplies the per-call store timeout.
    pub fn new(store: BookingStoreRef, config: &EngineConfig) -> Self {
        Self {
            projector: PaymentStatusProjector::new(store.clone(), config),
            store,
            tills: Mutex::new(HashMap::new()),
            timeout: config.store_timeout(),
        }
    }

    pub fn projector(&self) -> &PaymentStatusProjector {
        &self.projector
    }

    /// Opens a till for `booking_id` unless one is already open.
    pub async fn open(&self, booking_id: BookingId, target: Money) {
        self.resume(booking_id, target, Money::ZERO).await;
    }

    /// Opens a till that already has `paid` collected.
    pub async fn resume(&self, booking_id: BookingId, target: Money, paid: Money) {
        let mut tills = self.tills.lock().await;
        tills.entry(booking_id).or_insert_with(|| {
            tracing::debug!(booking_id, %target, %paid, "till opened");
            Arc::new(Mutex::new(Till {
                ledger: PaymentLedger::resume(target, paid),
                transaction: None,
            }))
        });
    }

    /// The booking's ledger, opening a till from the stored record when none
    /// is open in this process yet.
    ///
    /// The amount already paid is taken from the recorded payment history, or
    /// the full total when the record is marked paid.
    pub async fn attach(&self, booking_id: BookingId) -> Result<PaymentLedger> {
        if let Some(ledger) = self.ledger(booking_id).await {
            return Ok(ledger);
        }
        let booking = self.projector.load(booking_id).await?;
        let paid = if PaymentStatusProjector::stored_status(&booking) == Some(PaymentStatus::Paid) {
            booking.total_price
        } else {
            booking.payment_history.iter().map(|event| event.amount).sum()
        };
        self.resume(booking_id, booking.total_price, paid).await;
        self.ledger(booking_id)
            .await
            .ok_or_else(|| EngineError::NotFoundError(format!("no open till for booking {}", booking_id)))
    }

    /// Drops the booking's till once the sale is over, returning its final ledger.
    ///
    /// Later status reads come from the stored record alone.
    pub async fn close(&self, booking_id: BookingId) -> Option<PaymentLedger> {
        let till = self.tills.lock().await.remove(&booking_id)?;
        let till = till.lock().await;
        tracing::debug!(booking_id, paid = %till.ledger.paid(), "till closed");
        Some(till.ledger.clone())
    }

    async fn till(&self, booking_id: BookingId) -> Result<Arc<Mutex<Till>>> {
        self.tills
            .lock()
            .await
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFoundError(format!("no open till for booking {}", booking_id)))
    }

    /// Applies one tender to a booking.
    ///
    /// The tender is worked out on a copy of the ledger and only committed
    /// after the booking record accepted it; a failed write leaves the ledger
    /// exactly as it was. The transaction record is created once, when the
    /// balance first reaches zero.
    pub async fn record_payment(
        &self,
        booking_id: BookingId,
        tendered: Decimal,
        method: PaymentMethod,
    ) -> Result<PaymentReceipt> {
        let till = self.till(booking_id).await?;
        let mut till = till.lock().await;

        if self.projector.current(booking_id, Some(&till.ledger)).await? == PaymentStatus::Paid {
            return Err(EngineError::ValidationError(
                "Booking is already paid; no further tender accepted".to_string(),
            ));
        }

        let mut ledger = till.ledger.clone();
        let receipt = ledger.record_payment(tendered, method)?;

        if receipt.settled && till.transaction.is_none() {
            let record = bounded(
                self.timeout,
                "create_transaction",
                self.store.create_transaction(booking_id, ledger.paid(), method),
            )
            .await?;
            tracing::info!(booking_id, transaction_id = record.id, amount = %record.amount, "transaction recorded");
            till.transaction = Some(record);
        }

        self.projector.reconcile(booking_id, &ledger).await?;
        till.ledger = ledger;

        tracing::info!(
            booking_id,
            paid = %receipt.new_paid,
            remaining = %receipt.new_remaining,
            change = %receipt.change,
            "tender accepted"
        );
        Ok(receipt)
    }

    /// Current status, combining the live ledger with the stored record.
    pub async fn status(&self, booking_id: BookingId) -> Result<PaymentStatus> {
        let ledger = self.ledger(booking_id).await;
        self.projector.current(booking_id, ledger.as_ref()).await
    }

    /// Copy of the booking's ledger, if a till is open.
    pub async fn ledger(&self, booking_id: BookingId) -> Option<PaymentLedger> {
        let till = self.till(booking_id).await.ok()?;
        let till = till.lock().await;
        Some(till.ledger.clone())
    }

    pub async fn transaction(&self, booking_id: BookingId) -> Option<TransactionRecord> {
        let till = self.till(booking_id).await.ok()?;
        let till = till.lock().await;
        till.transaction.clone()
    }
}
