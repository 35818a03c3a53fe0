use crate::domain::annotation;
use crate::domain::booking::{
    Booking, BookingId, LifecycleState, NewBooking, PaymentMethod, StateId, TransactionRecord,
};
use crate::domain::customer::{
    normalize_plate, Customer, CustomerId, CustomerInfo, NewVehicle, Vehicle, VehicleId,
};
use crate::domain::money::Money;
use crate::domain::ports::{BookingStore, HandoffSlot, PaymentUpdate};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct Tables {
    next_id: u64,
    customers: BTreeMap<CustomerId, Customer>,
    vehicles: BTreeMap<VehicleId, Vehicle>,
    bookings: BTreeMap<BookingId, Booking>,
    transactions: Vec<TransactionRecord>,
    states: Vec<(StateId, String)>,
}

impl Tables {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A thread-safe in-memory booking store.
///
/// Clones share the same tables, so a test can keep a handle for inspection
/// while the engine owns another.
#[derive(Clone)]
pub struct InMemoryBookingStore {
    tables: Arc<RwLock<Tables>>,
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::with_states(LifecycleState::ALL.iter().map(|s| s.store_name()))
    }
}

impl InMemoryBookingStore {
    /// Creates a store whose state table holds every lifecycle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with a custom state table.
    ///
    /// # Arguments
    ///
    /// * `names` - State names in table order; ids are assigned from 1.
    pub fn with_states<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let states = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (i as StateId + 1, name.to_string()))
            .collect::<Vec<_>>();
        let tables = Tables {
            // entity ids start after the state ids so the two are easy to tell apart
            next_id: 100,
            states,
            ..Default::default()
        };
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    pub async fn booking_count(&self) -> usize {
        self.tables.read().await.bookings.len()
    }

    pub async fn transactions(&self) -> Vec<TransactionRecord> {
        self.tables.read().await.transactions.clone()
    }

    pub async fn state_name(&self, state_id: StateId) -> Option<String> {
        let tables = self.tables.read().await;
        tables
            .states
            .iter()
            .find(|(id, _)| *id == state_id)
            .map(|(_, name)| name.clone())
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>> {
        let plate = normalize_plate(plate);
        let tables = self.tables.read().await;
        Ok(tables
            .vehicles
            .values()
            .find(|v| v.license_plate == plate)
            .cloned())
    }

    async fn find_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>> {
        let tables = self.tables.read().await;
        Ok(tables
            .customers
            .values()
            .find(|c| c.phone == phone.trim())
            .cloned())
    }

    async fn create_customer(&self, fields: &CustomerInfo) -> Result<CustomerId> {
        fields.validate()?;
        let mut tables = self.tables.write().await;
        let id = tables.allocate();
        tables.customers.insert(
            id,
            Customer {
                id,
                name: fields.name.trim().to_string(),
                phone: fields.phone.trim().to_string(),
                email: fields.email.clone(),
                vip: fields.vip,
            },
        );
        Ok(id)
    }

    async fn create_vehicle(&self, fields: &NewVehicle) -> Result<VehicleId> {
        let mut tables = self.tables.write().await;
        let id = tables.allocate();
        tables.vehicles.insert(
            id,
            Vehicle {
                id,
                customer_id: fields.customer_id,
                license_plate: normalize_plate(&fields.license_plate),
                model: fields.model.clone(),
            },
        );
        Ok(id)
    }

    async fn create_booking(&self, booking: &NewBooking) -> Result<BookingId> {
        let mut tables = self.tables.write().await;
        let state_id = tables
            .states
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| EngineError::NotFoundError("booking state table is empty".into()))?;
        let id = tables.allocate();
        let now = Utc::now();
        tables.bookings.insert(
            id,
            Booking {
                id,
                customer_id: booking.customer_id,
                vehicle_id: booking.vehicle_id,
                state_id,
                total_price: booking.total_price,
                notes: booking.notes.clone(),
                payment_status: annotation::read_status(&booking.notes),
                payment_history: Vec::new(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables.bookings.get(&booking_id).cloned())
    }

    async fn update_booking_state(
        &self,
        booking_id: BookingId,
        state_id: StateId,
        notes: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let booking = tables
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| EngineError::NotFoundError(format!("booking {}", booking_id)))?;
        booking.state_id = state_id;
        booking.notes = notes.to_string();
        booking.updated_at = updated_at;
        Ok(())
    }

    async fn update_booking_payment(
        &self,
        booking_id: BookingId,
        update: &PaymentUpdate,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let booking = tables
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| EngineError::NotFoundError(format!("booking {}", booking_id)))?;
        booking.payment_status = Some(update.status);
        booking.notes = update.notes.clone();
        booking.payment_history = update.history.clone();
        booking.updated_at = update.updated_at;
        Ok(())
    }

    async fn create_transaction(
        &self,
        booking_id: BookingId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<TransactionRecord> {
        let mut tables = self.tables.write().await;
        if !tables.bookings.contains_key(&booking_id) {
            return Err(EngineError::NotFoundError(format!("booking {}", booking_id)));
        }
        let id = tables.allocate();
        let record = TransactionRecord {
            id,
            booking_id,
            amount,
            method,
            created_at: Utc::now(),
        };
        tables.transactions.push(record.clone());
        Ok(record)
    }

    async fn lookup_state_id(&self, state_name: &str) -> Result<Option<StateId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .states
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(state_name))
            .map(|(id, _)| *id))
    }

    async fn any_state_id(&self) -> Result<Option<StateId>> {
        let tables = self.tables.read().await;
        Ok(tables.states.first().map(|(id, _)| *id))
    }
}

/// Handoff slot living in process memory.
#[derive(Default, Clone)]
pub struct InMemoryHandoffSlot {
    blob: Arc<Mutex<Option<String>>>,
}

impl InMemoryHandoffSlot {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HandoffSlot for InMemoryHandoffSlot {
    async fn put(&self, blob: String) -> Result<()> {
        *self.blob.lock().await = Some(blob);
        Ok(())
    }

    async fn take(&self) -> Result<Option<String>> {
        Ok(self.blob.lock().await.take())
    }
}
