use super::lifecycle::{BookingDraft, BookingLifecycle, FinishOutcome, StartOutcome};
use super::payments::PaymentDesk;
use crate::config::EngineConfig;
use crate::domain::booking::{FinishDecision, LifecycleState, PaymentMethod, PaymentStatus};
use crate::domain::cart::{Cart, CartLine};
use crate::domain::customer::CustomerInfo;
use crate::domain::ledger::{PaymentLedger, PaymentReceipt};
use crate::domain::money::Money;
use crate::domain::ports::BookingStoreRef;
use crate::domain::pricing::{compute_totals, Totals};
use crate::domain::session::{BookingReference, SessionSnapshot};
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;

/// One point-of-sale station's in-flight sale.
///
/// Owns the cart and customer details, drives the booking lifecycle and
/// routes tenders through the shared [`PaymentDesk`].
pub struct Checkout {
    desk: Arc<PaymentDesk>,
    lifecycle: BookingLifecycle,
    cart: Cart,
    customer: Option<CustomerInfo>,
    license_plate: Option<String>,
    notes: String,
    view_only: bool,
    // total fixed when the booking was created; later cart edits are refused
    booked_total: Option<Money>,
    // final ledger of a completed or cancelled sale, once its till is closed
    closed_ledger: Option<PaymentLedger>,
}

impl Checkout {
    /// Creates an empty sale.
    ///
    /// # Arguments
    ///
    /// * `store` - The durable booking store.
    /// * `desk` - The payment desk shared by every station in the process.
    /// * `config` - Store timeout and placeholder policy.
    pub fn new(store: BookingStoreRef, desk: Arc<PaymentDesk>, config: EngineConfig) -> Self {
        Self {
            lifecycle: BookingLifecycle::new(store, desk.clone(), config),
            desk,
            cart: Cart::new(),
            customer: None,
            license_plate: None,
            notes: String::new(),
            view_only: false,
            booked_total: None,
            closed_ledger: None,
        }
    }

    /// Picks a sale back up from a handed-off snapshot.
    ///
    /// When the snapshot names a booking, a till is opened for it with the
    /// snapshot's paid amount unless the desk already holds one.
    ///
    /// # Arguments
    ///
    /// * `store` - The durable booking store.
    /// * `desk` - The payment desk shared by every station in the process.
    /// * `config` - Store timeout and placeholder policy.
    /// * `snapshot` - The session received through a handoff.
    pub async fn restore(
        store: BookingStoreRef,
        desk: Arc<PaymentDesk>,
        config: EngineConfig,
        snapshot: SessionSnapshot,
    ) -> Self {
        let (booking_id, state, plate, total) = match &snapshot.booking {
            Some(reference) => (
                reference.booking_id,
                reference.status,
                Some(reference.license_plate.clone()),
                Some(reference.total),
            ),
            None => (None, LifecycleState::Unstarted, None, None),
        };
        if let (Some(booking_id), Some(total)) = (booking_id, total) {
            desk.resume(booking_id, total, snapshot.paid_amount).await;
        }
        Self {
            lifecycle: BookingLifecycle::resume(store, desk.clone(), config, booking_id, state),
            desk,
            cart: snapshot.cart,
            customer: snapshot.customer,
            license_plate: plate,
            notes: String::new(),
            view_only: snapshot.view_only,
            booked_total: booking_id.and(total),
            closed_ledger: None,
        }
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn booking_id(&self) -> Option<u64> {
        self.lifecycle.booking_id()
    }

    pub fn is_view_only(&self) -> bool {
        self.view_only
    }

    pub fn set_customer(&mut self, customer: CustomerInfo, license_plate: impl Into<String>) {
        self.customer = Some(customer);
        self.license_plate = Some(license_plate.into());
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    fn ensure_cart_editable(&self) -> Result<()> {
        if self.booked_total.is_some() || self.view_only {
            return Err(EngineError::ValidationError(
                "Cart is locked once the booking has been created".to_string(),
            ));
        }
        Ok(())
    }

    pub fn add_line(&mut self, line: CartLine) -> Result<()> {
        self.ensure_cart_editable()?;
        self.cart.add_line(line)
    }

    pub fn update_quantity(&mut self, service_id: &str, quantity: u32) -> Result<()> {
        self.ensure_cart_editable()?;
        self.cart.update_quantity(service_id, quantity)
    }

    pub fn remove_line(&mut self, service_id: &str) -> Result<CartLine> {
        self.ensure_cart_editable()?;
        self.cart.remove_line(service_id)
    }

    pub fn clear_cart(&mut self) -> Result<()> {
        self.ensure_cart_editable()?;
        self.cart.clear();
        Ok(())
    }

    fn vip(&self) -> bool {
        self.customer.as_ref().is_some_and(|c| c.vip)
    }

    pub fn totals(&self) -> Totals {
        compute_totals(&self.cart, self.vip())
    }

    /// Amount the sale is settled against: the booked total once a booking
    /// exists, the live cart total before that.
    pub fn target(&self) -> Money {
        self.booked_total.unwrap_or_else(|| self.totals().total)
    }

    pub async fn start(&mut self) -> Result<StartOutcome> {
        if self.lifecycle.booking_id().is_none() && self.cart.is_empty() {
            return Err(EngineError::ValidationError("Cart is empty".to_string()));
        }
        let customer = self
            .customer
            .clone()
            .ok_or_else(|| EngineError::ValidationError("Customer details are required".to_string()))?;
        let draft = BookingDraft {
            customer,
            license_plate: self.license_plate.clone().unwrap_or_default(),
            vehicle_model: None,
            total: self.target(),
            notes: self.notes.clone(),
        };
        let outcome = self.lifecycle.start(&draft).await?;
        self.booked_total.get_or_insert(draft.total);
        Ok(outcome)
    }

    pub async fn tender(&mut self, amount: Decimal, method: PaymentMethod) -> Result<PaymentReceipt> {
        if self.view_only {
            return Err(EngineError::ValidationError(
                "Sale is fully paid; showing receipt only".to_string(),
            ));
        }
        let booking_id = self.lifecycle.booking_id().ok_or_else(|| {
            EngineError::ValidationError("Start the service before taking payment".to_string())
        })?;
        let receipt = self.desk.record_payment(booking_id, amount, method).await?;
        if receipt.settled {
            self.view_only = true;
        }
        Ok(receipt)
    }

    pub async fn payment_status(&self) -> Result<PaymentStatus> {
        match self.lifecycle.booking_id() {
            Some(booking_id) => self.desk.status(booking_id).await,
            None => Ok(PaymentStatus::Unpaid),
        }
    }

    /// The sale's ledger: the open till's, or the final one once the sale closed.
    pub async fn ledger(&self) -> Option<PaymentLedger> {
        let booking_id = self.lifecycle.booking_id()?;
        match self.desk.ledger(booking_id).await {
            Some(ledger) => Some(ledger),
            None => self.closed_ledger.clone(),
        }
    }

    pub async fn paid(&self) -> Money {
        self.ledger().await.map(|l| l.paid()).unwrap_or_default()
    }

    async fn close_till(&mut self) {
        if let Some(booking_id) = self.lifecycle.booking_id()
            && let Some(ledger) = self.desk.close(booking_id).await
        {
            self.closed_ledger = Some(ledger);
        }
    }

    pub async fn finish(&mut self, decision: Option<FinishDecision>) -> Result<FinishOutcome> {
        self.lifecycle.finish(decision).await
    }

    /// Marks the sale complete: requires full payment, hands the vehicle
    /// over and clears the cart.
    pub async fn complete_sale(&mut self) -> Result<()> {
        if self.payment_status().await? != PaymentStatus::Paid {
            return Err(EngineError::ValidationError(
                "Sale cannot complete while payment is outstanding".to_string(),
            ));
        }
        self.lifecycle.collect().await?;
        self.close_till().await;
        self.cart.clear();
        tracing::info!(booking_id = ?self.lifecycle.booking_id(), "sale completed");
        Ok(())
    }

    pub async fn cancel(&mut self) -> Result<()> {
        self.lifecycle.cancel().await?;
        self.close_till().await;
        Ok(())
    }

    /// Captures the sale for handing off to another context.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let booking = self.license_plate.as_ref().map(|plate| BookingReference {
            license_plate: plate.clone(),
            booking_id: self.lifecycle.booking_id(),
            status: self.lifecycle.state(),
            total: self.target(),
        });
        SessionSnapshot {
            cart: self.cart.clone(),
            customer: self.customer.clone(),
            booking,
            paid_amount: self.paid().await,
            view_only: self.view_only,
        }
    }
}
