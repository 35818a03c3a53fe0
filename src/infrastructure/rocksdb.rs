use crate::domain::annotation;
use crate::domain::booking::{
    Booking, BookingId, LifecycleState, NewBooking, PaymentMethod, StateId, TransactionRecord,
};
use crate::domain::customer::{
    normalize_plate, Customer, CustomerId, CustomerInfo, NewVehicle, Vehicle, VehicleId,
};
use crate::domain::money::Money;
use crate::domain::ports::{BookingStore, PaymentUpdate};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const CF_CUSTOMERS: &str = "customers";
pub const CF_VEHICLES: &str = "vehicles";
pub const CF_BOOKINGS: &str = "bookings";
pub const CF_TRANSACTIONS: &str = "transactions";
pub const CF_STATES: &str = "states";
pub const CF_META: &str = "meta";

const NEXT_ID_KEY: &[u8] = b"next_id";
const FIRST_ENTITY_ID: u64 = 100;

/// A persistent booking store using RocksDB.
///
/// Each entity kind lives in its own column family keyed by big-endian id.
/// Clones share the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    // serializes id allocation and read-modify-write updates
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a database at `path`.
    ///
    /// Ensures every column family exists and seeds the lifecycle state table
    /// the first time the database is used.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_CUSTOMERS, CF_VEHICLES, CF_BOOKINGS, CF_TRANSACTIONS, CF_STATES, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, families)?;

        let store = Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        };
        store.seed_states()?;
        Ok(store)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            EngineError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| {
            EngineError::InternalError(Box::new(std::io::Error::other("store lock poisoned")))
        })
    }

    fn seed_states(&self) -> Result<()> {
        let cf = self.cf(CF_STATES)?;
        if self.db.iterator_cf(cf, IteratorMode::Start).next().is_some() {
            return Ok(());
        }
        for (i, state) in LifecycleState::ALL.iter().enumerate() {
            let id = i as StateId + 1;
            self.db
                .put_cf(cf, id.to_be_bytes(), state.store_name().as_bytes())?;
        }
        Ok(())
    }

    fn allocate(&self) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let current = match self.db.get_cf(cf, NEXT_ID_KEY)? {
            Some(bytes) => decode_id(&bytes)?,
            None => FIRST_ENTITY_ID,
        };
        let next = current + 1;
        self.db.put_cf(cf, NEXT_ID_KEY, next.to_be_bytes())?;
        Ok(next)
    }

    fn put<T: Serialize>(&self, family: &str, id: u64, value: &T) -> Result<()> {
        let cf = self.cf(family)?;
        self.db.put_cf(cf, id.to_be_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, family: &str, id: u64) -> Result<Option<T>> {
        let cf = self.cf(family)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, family: &str) -> Result<Vec<T>> {
        let cf = self.cf(family)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn states(&self) -> Result<Vec<(StateId, String)>> {
        let cf = self.cf(CF_STATES)?;
        let mut states = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let name = String::from_utf8(value.to_vec()).map_err(|e| EngineError::InternalError(Box::new(e)))?;
            states.push((decode_id(&key)?, name));
        }
        Ok(states)
    }

    fn update_booking<F>(&self, booking_id: BookingId, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Booking),
    {
        let _guard = self.lock()?;
        let mut booking: Booking = self
            .get(CF_BOOKINGS, booking_id)?
            .ok_or_else(|| EngineError::NotFoundError(format!("booking {}", booking_id)))?;
        apply(&mut booking);
        self.put(CF_BOOKINGS, booking_id, &booking)
    }
}

fn decode_id(bytes: &[u8]) -> Result<u64> {
    let array: [u8; 8] = bytes.try_into().map_err(|_| {
        EngineError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "malformed id key",
        )))
    })?;
    Ok(u64::from_be_bytes(array))
}

#[async_trait]
impl BookingStore for RocksDBStore {
    async fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>> {
        let plate = normalize_plate(plate);
        let vehicles: Vec<Vehicle> = self.scan(CF_VEHICLES)?;
        Ok(vehicles.into_iter().find(|v| v.license_plate == plate))
    }

    async fn find_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>> {
        let customers: Vec<Customer> = self.scan(CF_CUSTOMERS)?;
        Ok(customers.into_iter().find(|c| c.phone == phone.trim()))
    }

    async fn create_customer(&self, fields: &CustomerInfo) -> Result<CustomerId> {
        fields.validate()?;
        let _guard = self.lock()?;
        let id = self.allocate()?;
        let customer = Customer {
            id,
            name: fields.name.trim().to_string(),
            phone: fields.phone.trim().to_string(),
            email: fields.email.clone(),
            vip: fields.vip,
        };
        self.put(CF_CUSTOMERS, id, &customer)?;
        Ok(id)
    }

    async fn create_vehicle(&self, fields: &NewVehicle) -> Result<VehicleId> {
        let _guard = self.lock()?;
        let id = self.allocate()?;
        let vehicle = Vehicle {
            id,
            customer_id: fields.customer_id,
            license_plate: normalize_plate(&fields.license_plate),
            model: fields.model.clone(),
        };
        self.put(CF_VEHICLES, id, &vehicle)?;
        Ok(id)
    }

    async fn create_booking(&self, booking: &NewBooking) -> Result<BookingId> {
        let state_id = self
            .states()?
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| EngineError::NotFoundError("booking state table is empty".into()))?;
        let _guard = self.lock()?;
        let id = self.allocate()?;
        let now = Utc::now();
        let record = Booking {
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
        };
        self.put(CF_BOOKINGS, id, &record)?;
        Ok(id)
    }

    async fn get_booking(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        self.get(CF_BOOKINGS, booking_id)
    }

    async fn update_booking_state(
        &self,
        booking_id: BookingId,
        state_id: StateId,
        notes: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        self.update_booking(booking_id, |booking| {
            booking.state_id = state_id;
            booking.notes = notes.to_string();
            booking.updated_at = updated_at;
        })
    }

    async fn update_booking_payment(
        &self,
        booking_id: BookingId,
        update: &PaymentUpdate,
    ) -> Result<()> {
        self.update_booking(booking_id, |booking| {
            booking.payment_status = Some(update.status);
            booking.notes = update.notes.clone();
            booking.payment_history = update.history.clone();
            booking.updated_at = update.updated_at;
        })
    }

    async fn create_transaction(
        &self,
        booking_id: BookingId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<TransactionRecord> {
        if self.get::<Booking>(CF_BOOKINGS, booking_id)?.is_none() {
            return Err(EngineError::NotFoundError(format!("booking {}", booking_id)));
        }
        let _guard = self.lock()?;
        let id = self.allocate()?;
        let record = TransactionRecord {
            id,
            booking_id,
            amount,
            method,
            created_at: Utc::now(),
        };
        self.put(CF_TRANSACTIONS, id, &record)?;
        Ok(record)
    }

    async fn lookup_state_id(&self, state_name: &str) -> Result<Option<StateId>> {
        Ok(self
            .states()?
            .into_iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(state_name))
            .map(|(id, _)| id))
    }

    async fn any_state_id(&self) -> Result<Option<StateId>> {
        Ok(self.states()?.first().map(|(id, _)| *id))
    }
}
