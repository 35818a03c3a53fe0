#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use washpos::config::EngineConfig;
use washpos::domain::booking::{
    Booking, BookingId, NewBooking, PaymentMethod, StateId, TransactionRecord,
};
use washpos::domain::cart::CartLine;
use washpos::domain::customer::{Customer, CustomerId, CustomerInfo, NewVehicle, Vehicle, VehicleId};
use washpos::domain::money::Money;
use washpos::domain::ports::{BookingStore, PaymentUpdate};
use washpos::error::{EngineError, Result};
use washpos::infrastructure::in_memory::InMemoryBookingStore;

/// Switches a test flips to make individual store calls fail.
#[derive(Default)]
pub struct Faults {
    pub create_customer: AtomicBool,
    pub create_vehicle: AtomicBool,
    pub create_booking: AtomicBool,
    pub update_state: AtomicBool,
    pub update_payment: AtomicBool,
    pub create_transaction: AtomicBool,
    /// Delay applied to every booking read, to push calls past their deadline.
    pub slow_reads_ms: AtomicUsize,
}

/// Wraps the in-memory store and injects failures on demand.
#[derive(Clone)]
pub struct FlakyStore {
    pub inner: InMemoryBookingStore,
    pub faults: Arc<Faults>,
    pub create_booking_calls: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(inner: InMemoryBookingStore) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
            create_booking_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fail(switch: &AtomicBool, on: bool) {
        switch.store(on, Ordering::SeqCst);
    }
}

fn check(switch: &AtomicBool, operation: &str) -> Result<()> {
    if switch.load(Ordering::SeqCst) {
        return Err(EngineError::TransientStoreError(format!(
            "{} unavailable",
            operation
        )));
    }
    Ok(())
}

#[async_trait]
impl BookingStore for FlakyStore {
    async fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>> {
        self.inner.find_vehicle_by_plate(plate).await
    }

    async fn find_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>> {
        self.inner.find_customer_by_phone(phone).await
    }

    async fn create_customer(&self, fields: &CustomerInfo) -> Result<CustomerId> {
        check(&self.faults.create_customer, "create_customer")?;
        self.inner.create_customer(fields).await
    }

    async fn create_vehicle(&self, fields: &NewVehicle) -> Result<VehicleId> {
        check(&self.faults.create_vehicle, "create_vehicle")?;
        self.inner.create_vehicle(fields).await
    }

    async fn create_booking(&self, booking: &NewBooking) -> Result<BookingId> {
        self.create_booking_calls.fetch_add(1, Ordering::SeqCst);
        check(&self.faults.create_booking, "create_booking")?;
        self.inner.create_booking(booking).await
    }

    async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        let delay = self.faults.slow_reads_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        self.inner.get_booking(booking_id).await
    }

    async fn update_booking_state(
        &self,
        booking_id: BookingId,
        state_id: StateId,
        notes: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        check(&self.faults.update_state, "update_booking_state")?;
        self.inner
            .update_booking_state(booking_id, state_id, notes, updated_at)
            .await
    }

    async fn update_booking_payment(
        &self,
        booking_id: BookingId,
        update: &PaymentUpdate,
    ) -> Result<()> {
        check(&self.faults.update_payment, "update_booking_payment")?;
        self.inner.update_booking_payment(booking_id, update).await
    }

    async fn create_transaction(
        &self,
        booking_id: BookingId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<TransactionRecord> {
        check(&self.faults.create_transaction, "create_transaction")?;
        self.inner.create_transaction(booking_id, amount, method).await
    }

    async fn lookup_state_id(&self, state_name: &str) -> Result<Option<StateId>> {
        self.inner.lookup_state_id(state_name).await
    }

    async fn any_state_id(&self) -> Result<Option<StateId>> {
        self.inner.any_state_id().await
    }
}

pub fn customer() -> CustomerInfo {
    CustomerInfo {
        name: "Budi Santoso".into(),
        phone: "0812-555-0101".into(),
        email: None,
        vip: false,
    }
}

pub fn line(service_id: &str, price: i64, quantity: u32) -> CartLine {
    CartLine::new(service_id, service_id, Money::new(price.into()), quantity).unwrap()
}

pub fn fast_config() -> EngineConfig {
    EngineConfig {
        store_timeout_ms: 200,
        ..Default::default()
    }
}

pub fn write_cart_csv(rows: &[(&str, &str, &str, &str)]) -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut wtr = csv::Writer::from_path(file.path()).unwrap();
    wtr.write_record(["service_id", "name", "unit_price", "quantity"])
        .unwrap();
    for (id, name, price, qty) in rows {
        wtr.write_record([*id, *name, *price, *qty]).unwrap();
    }
    wtr.flush().unwrap();
    file
}
