use super::bounded;
use crate::config::EngineConfig;
use crate::domain::annotation;
use crate::domain::booking::{Booking, BookingId, PaymentEvent, PaymentMethod, PaymentStatus};
use crate::domain::ledger::PaymentLedger;
use crate::domain::ports::{BookingStoreRef, PaymentUpdate};
use crate::error::{EngineError, Result};
use chrono::Utc;
use std::time::Duration;

/// Derives a booking's payment status and writes it back to the store.
#[derive(Clone)]
pub struct PaymentStatusProjector {
    store: BookingStoreRef,
    timeout: Duration,
}

impl PaymentStatusProjector {
    /// Creates a projector over `store`.
    ///
    /// # Arguments
    ///
    /// * `store` - The durable booking store that is read and reconciled.
    /// * `config` - Supplies the per-call store timeout.
    pub fn new(store: BookingStoreRef, config: &EngineConfig) -> Self {
        Self {
            store,
            timeout: config.store_timeout(),
        }
    }

    /// Status persisted on the record.
    ///
    /// Both the structured field and the notes are read, and the more settled
    /// of the two wins, so a paid marker written by an older client is honored
    /// even when the structured field lags behind.
    pub fn stored_status(booking: &Booking) -> Option<PaymentStatus> {
        booking
            .payment_status
            .max(annotation::read_status(&booking.notes))
    }

    /// Combines the persisted record with the live ledger.
    ///
    /// A record already marked paid stays paid. Otherwise the ledger decides,
    /// falling back to the record (and then to unpaid) when there is no ledger.
    pub fn project(booking: Option<&Booking>, ledger: Option<&PaymentLedger>) -> PaymentStatus {
        let stored = booking.and_then(Self::stored_status);
        if stored == Some(PaymentStatus::Paid) {
            return PaymentStatus::Paid;
        }
        match ledger {
            Some(ledger) => ledger.status(),
            None => stored.unwrap_or(PaymentStatus::Unpaid),
        }
    }

    /// Reads the booking and projects its current status.
    pub async fn current(
        &self,
        booking_id: BookingId,
        ledger: Option<&PaymentLedger>,
    ) -> Result<PaymentStatus> {
        let booking = self.load(booking_id).await?;
        Ok(Self::project(Some(&booking), ledger))
    }

    /// Writes the ledger's status into the booking.
    ///
    /// The latest ledger entry is appended to the structured history and the
    /// notes are rewritten to carry a single matching marker.
    pub async fn reconcile(
        &self,
        booking_id: BookingId,
        ledger: &PaymentLedger,
    ) -> Result<PaymentStatus> {
        let booking = self.load(booking_id).await?;
        let status = Self::project(Some(&booking), Some(ledger));
        let method: Option<PaymentMethod> = ledger.entries().last().map(|e| e.method());

        let mut history = booking.payment_history.clone();
        if let Some(entry) = ledger.entries().last() {
            history.push(PaymentEvent {
                amount: entry.applied(),
                method: entry.method(),
                recorded_at: entry.timestamp(),
            });
        }

        let update = PaymentUpdate {
            status,
            notes: annotation::write_status(&booking.notes, status, method),
            history,
            updated_at: Utc::now(),
        };
        bounded(
            self.timeout,
            "update_booking_payment",
            self.store.update_booking_payment(booking_id, &update),
        )
        .await?;

        tracing::info!(booking_id, %status, "payment status reconciled");
        Ok(status)
    }

    /// Reads a booking, failing with `NotFoundError` when it does not exist.
    pub async fn load(&self, booking_id: BookingId) -> Result<Booking> {
        bounded(self.timeout, "get_booking", self.store.get_booking(booking_id))
            .await?
            .ok_or_else(|| EngineError::NotFoundError(format!("booking {}", booking_id)))
    }
}
