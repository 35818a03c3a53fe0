mod common;

use common::{FlakyStore, customer, fast_config};
use rust_decimal_macros::dec;
use std::sync::Arc;
use washpos::application::lifecycle::{BookingDraft, BookingLifecycle};
use washpos::application::payments::PaymentDesk;
use washpos::domain::booking::{BookingId, PaymentMethod, PaymentStatus};
use washpos::domain::money::Money;
use washpos::domain::ports::{BookingStore, BookingStoreRef};
use washpos::error::EngineError;
use washpos::infrastructure::in_memory::InMemoryBookingStore;

async fn started_booking(store: &FlakyStore, total: Money) -> (Arc<PaymentDesk>, BookingId) {
    let config = fast_config();
    let shared: BookingStoreRef = Arc::new(store.clone());
    let desk = Arc::new(PaymentDesk::new(shared.clone(), &config));
    let mut lc = BookingLifecycle::new(shared, desk.clone(), config);
    let draft = BookingDraft {
        customer: customer(),
        license_plate: "D 77 QQ".into(),
        vehicle_model: None,
        total,
        notes: String::new(),
    };
    let booking_id = lc.start(&draft).await.unwrap().booking_id();
    (desk, booking_id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tenders_are_not_double_counted() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (desk, booking_id) = started_booking(&store, Money::new(dec!(1000))).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let desk = desk.clone();
            tokio::spawn(async move {
                desk.record_payment(booking_id, dec!(100), PaymentMethod::Cash)
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let ledger = desk.ledger(booking_id).await.unwrap();
    assert_eq!(ledger.paid(), Money::new(dec!(1000)));
    assert_eq!(ledger.entries().len(), 10);
    assert!(ledger.is_settled());
    assert_eq!(store.inner.transactions().await.len(), 1);

    let booking = store.inner.get_booking(booking_id).await.unwrap().unwrap();
    assert_eq!(booking.payment_status, Some(PaymentStatus::Paid));
    assert_eq!(booking.payment_history.len(), 10);
}

#[tokio::test]
async fn test_failed_reconcile_leaves_ledger_untouched() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (desk, booking_id) = started_booking(&store, Money::new(dec!(115500))).await;
    desk.record_payment(booking_id, dec!(100000), PaymentMethod::Cash)
        .await
        .unwrap();

    FlakyStore::fail(&store.faults.update_payment, true);
    let err = desk
        .record_payment(booking_id, dec!(20000), PaymentMethod::Cash)
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let ledger = desk.ledger(booking_id).await.unwrap();
    assert_eq!(ledger.paid(), Money::new(dec!(100000)));
    assert_eq!(ledger.entries().len(), 1);

    // the retry completes the sale and the record is not duplicated
    FlakyStore::fail(&store.faults.update_payment, false);
    let receipt = desk
        .record_payment(booking_id, dec!(20000), PaymentMethod::Cash)
        .await
        .unwrap();
    assert_eq!(receipt.change, Money::new(dec!(4500)));
    assert_eq!(store.inner.transactions().await.len(), 1);
    assert_eq!(desk.status(booking_id).await.unwrap(), PaymentStatus::Paid);
}

#[tokio::test]
async fn test_failed_transaction_record_leaves_balance_owing() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (desk, booking_id) = started_booking(&store, Money::new(dec!(50))).await;

    FlakyStore::fail(&store.faults.create_transaction, true);
    assert!(matches!(
        desk.record_payment(booking_id, dec!(50), PaymentMethod::Card).await,
        Err(EngineError::TransientStoreError(_))
    ));
    assert_eq!(desk.status(booking_id).await.unwrap(), PaymentStatus::Unpaid);
    assert!(desk.transaction(booking_id).await.is_none());
}

#[tokio::test]
async fn test_paid_annotation_written_once() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (desk, booking_id) = started_booking(&store, Money::new(dec!(300))).await;
    desk.record_payment(booking_id, dec!(100), PaymentMethod::Cash)
        .await
        .unwrap();
    desk.record_payment(booking_id, dec!(250), PaymentMethod::EWallet)
        .await
        .unwrap();

    let notes = store.inner.get_booking(booking_id).await.unwrap().unwrap().notes;
    assert_eq!(notes.matches("Payment:").count(), 1);
    assert!(notes.contains("Payment: Paid"));
}

#[tokio::test]
async fn test_settled_booking_refuses_more_tender() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (desk, booking_id) = started_booking(&store, Money::new(dec!(10))).await;
    desk.record_payment(booking_id, dec!(10), PaymentMethod::Cash)
        .await
        .unwrap();
    assert!(matches!(
        desk.record_payment(booking_id, dec!(1), PaymentMethod::Cash).await,
        Err(EngineError::ValidationError(_))
    ));
    assert!(matches!(
        desk.record_payment(booking_id + 1, dec!(1), PaymentMethod::Cash).await,
        Err(EngineError::NotFoundError(_))
    ));
}
