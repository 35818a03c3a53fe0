use super::bounded;
use super::payments::PaymentDesk;
use crate::config::EngineConfig;
use crate::domain::annotation;
use crate::domain::booking::{
    BookingId, FinishDecision, LifecycleEvent, LifecycleState, NewBooking, PaymentStatus, StateId,
};
use crate::domain::customer::{normalize_plate, CustomerInfo, EntityRef, NewVehicle};
use crate::domain::money::Money;
use crate::domain::ports::BookingStoreRef;
use crate::error::{EngineError, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// What `start` needs to create a booking.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingDraft {
    pub customer: CustomerInfo,
    pub license_plate: String,
    pub vehicle_model: Option<String>,
    pub total: Money,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started {
        booking_id: BookingId,
        customer: EntityRef,
        vehicle: EntityRef,
    },
    /// Booking existed already (created by an earlier, partly failed start).
    Resumed { booking_id: BookingId },
    AlreadyStarted { booking_id: BookingId },
}

impl StartOutcome {
    pub fn booking_id(&self) -> BookingId {
        match self {
            StartOutcome::Started { booking_id, .. }
            | StartOutcome::Resumed { booking_id }
            | StartOutcome::AlreadyStarted { booking_id } => *booking_id,
        }
    }
}

/// Reply to a finish request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    Finished { status: PaymentStatus },
    /// Payment is outstanding; ask the operator and call `finish` again with
    /// their decision.
    DecisionRequired { status: PaymentStatus, remaining: Money },
    /// Operator chose to take payment first.
    AwaitingPayment,
    /// Operator backed out.
    Aborted,
}

/// Drives one booking through its service lifecycle.
///
/// In-memory state only moves after the matching durable write succeeded.
pub struct BookingLifecycle {
    store: BookingStoreRef,
    desk: Arc<PaymentDesk>,
    config: EngineConfig,
    state: LifecycleState,
    booking_id: Option<BookingId>,
}

impl BookingLifecycle {
    /// Creates a machine for a booking that does not exist yet.
    ///
    /// # Arguments
    ///
    /// * `store` - The durable booking store.
    /// * `desk` - The payment desk shared by every station in the process.
    /// * `config` - Store timeout and placeholder policy.
    pub fn new(store: BookingStoreRef, desk: Arc<PaymentDesk>, config: EngineConfig) -> Self {
        Self {
            store,
            desk,
            config,
            state: LifecycleState::Unstarted,
            booking_id: None,
        }
    }

    /// Rebuilds the machine for a booking carried over from another context.
    pub fn resume(
        store: BookingStoreRef,
        desk: Arc<PaymentDesk>,
        config: EngineConfig,
        booking_id: Option<BookingId>,
        state: LifecycleState,
    ) -> Self {
        Self {
            store,
            desk,
            config,
            state,
            booking_id,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn booking_id(&self) -> Option<BookingId> {
        self.booking_id
    }

    fn timeout(&self) -> Duration {
        self.config.store_timeout()
    }

    /// `Unstarted -> InProgress`, creating the booking first if needed.
    ///
    /// Calling it again once in progress is a no-op.
    pub async fn start(&mut self, draft: &BookingDraft) -> Result<StartOutcome> {
        if self.state == LifecycleState::InProgress
            && let Some(booking_id) = self.booking_id
        {
            tracing::debug!(booking_id, "start ignored, already in progress");
            return Ok(StartOutcome::AlreadyStarted { booking_id });
        }
        let next = self.state.next(LifecycleEvent::Start)?;

        let outcome = match self.booking_id {
            Some(booking_id) => StartOutcome::Resumed { booking_id },
            None => {
                let outcome = self.create_booking(draft).await?;
                self.booking_id = Some(outcome.booking_id());
                outcome
            }
        };
        let booking_id = outcome.booking_id();

        self.desk.open(booking_id, draft.total).await;
        self.write_state(booking_id, next).await?;
        self.state = next;
        tracing::info!(booking_id, state = %self.state, "service started");
        Ok(outcome)
    }

    /// `InProgress -> Finished`, gated on payment.
    ///
    /// With a balance outstanding and no `decision`, nothing changes and the
    /// reply asks for one.
    pub async fn finish(&mut self, decision: Option<FinishDecision>) -> Result<FinishOutcome> {
        let next = self.state.next(LifecycleEvent::Finish)?;
        let booking_id = self.require_booking()?;

        let ledger = self.desk.attach(booking_id).await?;
        let status = self.desk.status(booking_id).await?;
        if status != PaymentStatus::Paid {
            match decision {
                None => {
                    return Ok(FinishOutcome::DecisionRequired {
                        status,
                        remaining: ledger.remaining(),
                    });
                }
                Some(FinishDecision::PayFirst) => {
                    tracing::info!(booking_id, %status, "finish held for payment");
                    return Ok(FinishOutcome::AwaitingPayment);
                }
                Some(FinishDecision::CancelFinish) => {
                    tracing::info!(booking_id, %status, "finish aborted by operator");
                    return Ok(FinishOutcome::Aborted);
                }
                Some(FinishDecision::FinishAndDefer) => {
                    tracing::warn!(booking_id, %status, "finishing with payment outstanding");
                }
            }
        }

        self.write_state(booking_id, next).await?;
        self.state = next;
        tracing::info!(booking_id, state = %self.state, %status, "service finished");
        Ok(FinishOutcome::Finished { status })
    }

    /// `Finished -> Collected`.
    pub async fn collect(&mut self) -> Result<()> {
        let next = self.state.next(LifecycleEvent::Collect)?;
        let booking_id = self.require_booking()?;
        self.write_state(booking_id, next).await?;
        self.state = next;
        tracing::info!(booking_id, "vehicle collected");
        Ok(())
    }

    /// Any non-terminal state `-> Cancelled`. Cancelling twice is harmless.
    pub async fn cancel(&mut self) -> Result<()> {
        if self.state == LifecycleState::Cancelled {
            return Ok(());
        }
        let next = self.state.next(LifecycleEvent::Cancel)?;
        if let Some(booking_id) = self.booking_id {
            self.write_state(booking_id, next).await?;
        }
        self.state = next;
        tracing::info!(booking_id = ?self.booking_id, "booking cancelled");
        Ok(())
    }

    fn require_booking(&self) -> Result<BookingId> {
        self.booking_id.ok_or_else(|| {
            EngineError::invalid_transition(self.state, "advance a booking that does not exist")
        })
    }

    async fn create_booking(&self, draft: &BookingDraft) -> Result<StartOutcome> {
        draft.customer.validate()?;
        if draft.license_plate.trim().is_empty() {
            return Err(EngineError::ValidationError(
                "License plate is required".to_string(),
            ));
        }

        let customer = self.provision_customer(&draft.customer).await?;
        let vehicle = self.provision_vehicle(customer.id(), draft).await?;

        let booking = NewBooking {
            customer_id: customer.id(),
            vehicle_id: vehicle.id(),
            total_price: draft.total,
            notes: annotation::write_status(&draft.notes, PaymentStatus::Unpaid, None),
        };
        let booking_id = bounded(
            self.timeout(),
            "create_booking",
            self.store.create_booking(&booking),
        )
        .await
        .inspect_err(|e| tracing::error!(error = %e, "booking creation failed"))?;

        tracing::info!(booking_id, ?customer, ?vehicle, total = %draft.total, "booking created");
        Ok(StartOutcome::Started {
            booking_id,
            customer,
            vehicle,
        })
    }

    async fn provision_customer(&self, info: &CustomerInfo) -> Result<EntityRef> {
        let timeout = self.timeout();
        match bounded(timeout, "find_customer_by_phone", self.store.find_customer_by_phone(&info.phone)).await {
            Ok(Some(customer)) => return Ok(EntityRef::Existing(customer.id)),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "customer lookup failed, creating a new record"),
        }
        match bounded(timeout, "create_customer", self.store.create_customer(info)).await {
            Ok(id) => Ok(EntityRef::Created(id)),
            Err(e) => self.placeholder_or(e, "customer"),
        }
    }

    async fn provision_vehicle(
        &self,
        customer_id: u64,
        draft: &BookingDraft,
    ) -> Result<EntityRef> {
        let timeout = self.timeout();
        let plate = normalize_plate(&draft.license_plate);
        match bounded(timeout, "find_vehicle_by_plate", self.store.find_vehicle_by_plate(&plate)).await {
            Ok(Some(vehicle)) => return Ok(EntityRef::Existing(vehicle.id)),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "vehicle lookup failed, creating a new record"),
        }
        let fields = NewVehicle {
            customer_id,
            license_plate: plate,
            model: draft.vehicle_model.clone(),
        };
        match bounded(timeout, "create_vehicle", self.store.create_vehicle(&fields)).await {
            Ok(id) => Ok(EntityRef::Created(id)),
            Err(e) => self.placeholder_or(e, "vehicle"),
        }
    }

    fn placeholder_or(&self, err: EngineError, entity: &str) -> Result<EntityRef> {
        match self.config.placeholder() {
            Some(id) => {
                tracing::warn!(error = %err, entity, placeholder = id, "using placeholder reference");
                Ok(EntityRef::Placeholder(id))
            }
            None => {
                tracing::error!(error = %err, entity, "auxiliary record creation failed");
                Err(err)
            }
        }
    }

    async fn resolve_state_id(&self, state: LifecycleState) -> Result<StateId> {
        let timeout = self.timeout();
        let name = state.store_name();
        if let Some(id) = bounded(timeout, "lookup_state_id", self.store.lookup_state_id(name)).await? {
            return Ok(id);
        }
        let fallback = bounded(timeout, "any_state_id", self.store.any_state_id())
            .await?
            .ok_or_else(|| EngineError::NotFoundError(format!("booking state {}", name)))?;
        tracing::warn!(state = name, fallback, "state missing from store, using fallback");
        Ok(fallback)
    }

    /// Persists `state`, keeping whatever notes the record currently holds.
    async fn write_state(&self, booking_id: BookingId, state: LifecycleState) -> Result<()> {
        let timeout = self.timeout();
        let state_id = self.resolve_state_id(state).await?;
        let notes = bounded(timeout, "get_booking", self.store.get_booking(booking_id))
            .await?
            .map(|b| b.notes)
            .ok_or_else(|| EngineError::NotFoundError(format!("booking {}", booking_id)))?;
        bounded(
            timeout,
            "update_booking_state",
            self.store
                .update_booking_state(booking_id, state_id, &notes, Utc::now()),
        )
        .await
        .inspect_err(|e| tracing::error!(booking_id, %state, error = %e, "state write failed"))
    }
}
