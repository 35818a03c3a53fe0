use super::booking::{
    Booking, BookingId, NewBooking, PaymentEvent, PaymentMethod, PaymentStatus, StateId,
    TransactionRecord,
};
use super::customer::{Customer, CustomerId, CustomerInfo, NewVehicle, Vehicle, VehicleId};
use super::money::Money;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Durable storage for customers, vehicles, bookings and payments.
///
/// Every method may block on the network; callers bound them with a timeout
/// and treat an elapsed deadline as a transient failure.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>>;
    async fn find_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>>;
    async fn create_customer(&self, fields: &CustomerInfo) -> Result<CustomerId>;
    async fn create_vehicle(&self, fields: &NewVehicle) -> Result<VehicleId>;
    async fn create_booking(&self, booking: &NewBooking) -> Result<BookingId>;
    async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>>;
    async fn update_booking_state(
        &self,
        booking_id: BookingId,
        state_id: StateId,
        notes: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;
    /// Writes the structured payment fields together with the rewritten notes.
    async fn update_booking_payment(
        &self,
        booking_id: BookingId,
        update: &PaymentUpdate,
    ) -> Result<()>;
    async fn create_transaction(
        &self,
        booking_id: BookingId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<TransactionRecord>;
    async fn lookup_state_id(&self, state_name: &str) -> Result<Option<StateId>>;
    /// Any state id the store knows, used when an exact name is missing.
    async fn any_state_id(&self) -> Result<Option<StateId>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub notes: String,
    pub history: Vec<PaymentEvent>,
    pub updated_at: DateTime<Utc>,
}

/// Single-slot mailbox a session token is handed through.
///
/// `take` empties the slot, so a token is read at most once.
#[async_trait]
pub trait HandoffSlot: Send + Sync {
    async fn put(&self, blob: String) -> Result<()>;
    async fn take(&self) -> Result<Option<String>>;
}

pub type BookingStoreRef = Arc<dyn BookingStore>;
pub type HandoffSlotBox = Box<dyn HandoffSlot>;
