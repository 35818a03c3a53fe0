mod common;

use common::{FlakyStore, customer, fast_config};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use washpos::application::lifecycle::{BookingDraft, BookingLifecycle, FinishOutcome, StartOutcome};
use washpos::application::payments::PaymentDesk;
use washpos::config::EngineConfig;
use washpos::domain::booking::{FinishDecision, LifecycleState, PaymentMethod, PaymentStatus};
use washpos::domain::customer::EntityRef;
use washpos::domain::money::Money;
use washpos::domain::ports::{BookingStore, BookingStoreRef};
use washpos::error::EngineError;
use washpos::infrastructure::in_memory::InMemoryBookingStore;

fn draft() -> BookingDraft {
    BookingDraft {
        customer: customer(),
        license_plate: "B 1234 XY".into(),
        vehicle_model: Some("Avanza".into()),
        total: Money::new(dec!(115500)),
        notes: "Check tyre pressure".into(),
    }
}

fn lifecycle(store: &FlakyStore, config: EngineConfig) -> (BookingLifecycle, Arc<PaymentDesk>) {
    let store: BookingStoreRef = Arc::new(store.clone());
    let desk = Arc::new(PaymentDesk::new(store.clone(), &config));
    (BookingLifecycle::new(store, desk.clone(), config), desk)
}

#[tokio::test]
async fn test_failed_creation_leaves_machine_unstarted() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    FlakyStore::fail(&store.faults.create_booking, true);
    let (mut lc, _) = lifecycle(&store, fast_config());

    let err = lc.start(&draft()).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(lc.state(), LifecycleState::Unstarted);
    assert_eq!(lc.booking_id(), None);
    assert_eq!(store.inner.booking_count().await, 0);

    FlakyStore::fail(&store.faults.create_booking, false);
    let outcome = lc.start(&draft()).await.unwrap();
    assert!(matches!(outcome, StartOutcome::Started { .. }));
    assert_eq!(lc.state(), LifecycleState::InProgress);
    assert_eq!(store.inner.booking_count().await, 1);
}

#[tokio::test]
async fn test_failed_state_write_is_retried_without_a_second_booking() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    FlakyStore::fail(&store.faults.update_state, true);
    let (mut lc, _) = lifecycle(&store, fast_config());

    assert!(matches!(
        lc.start(&draft()).await,
        Err(EngineError::TransientStoreError(_))
    ));
    assert_eq!(lc.state(), LifecycleState::Unstarted);
    let booking_id = lc.booking_id().unwrap();

    FlakyStore::fail(&store.faults.update_state, false);
    let outcome = lc.start(&draft()).await.unwrap();
    assert_eq!(outcome, StartOutcome::Resumed { booking_id });
    assert_eq!(store.create_booking_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.inner.booking_count().await, 1);

    let booking = store.inner.get_booking(booking_id).await.unwrap().unwrap();
    assert_eq!(
        store.inner.state_name(booking.state_id).await.as_deref(),
        Some("In Progress")
    );
}

#[tokio::test]
async fn test_auxiliary_failure_uses_placeholder() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    FlakyStore::fail(&store.faults.create_customer, true);
    let (mut lc, _) = lifecycle(&store, fast_config());

    match lc.start(&draft()).await.unwrap() {
        StartOutcome::Started { customer, vehicle, .. } => {
            assert_eq!(customer, EntityRef::Placeholder(1));
            assert!(!vehicle.is_placeholder());
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_auxiliary_failure_aborts_without_placeholder() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    FlakyStore::fail(&store.faults.create_vehicle, true);
    let config = EngineConfig {
        no_placeholder: true,
        ..fast_config()
    };
    let (mut lc, _) = lifecycle(&store, config);

    assert!(lc.start(&draft()).await.is_err());
    assert_eq!(lc.state(), LifecycleState::Unstarted);
    assert_eq!(store.create_booking_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pay_first_writes_nothing() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (mut lc, _) = lifecycle(&store, fast_config());
    let booking_id = lc.start(&draft()).await.unwrap().booking_id();
    let before = store.inner.get_booking(booking_id).await.unwrap().unwrap();

    assert_eq!(
        lc.finish(Some(FinishDecision::PayFirst)).await.unwrap(),
        FinishOutcome::AwaitingPayment
    );
    assert_eq!(
        lc.finish(Some(FinishDecision::CancelFinish)).await.unwrap(),
        FinishOutcome::Aborted
    );
    assert_eq!(lc.state(), LifecycleState::InProgress);
    let after = store.inner.get_booking(booking_id).await.unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_partial_payment_still_asks_for_decision() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (mut lc, desk) = lifecycle(&store, fast_config());
    let booking_id = lc.start(&draft()).await.unwrap().booking_id();
    desk.record_payment(booking_id, dec!(50000), PaymentMethod::Card)
        .await
        .unwrap();

    assert_eq!(
        lc.finish(None).await.unwrap(),
        FinishOutcome::DecisionRequired {
            status: PaymentStatus::Partial,
            remaining: Money::new(dec!(65500)),
        }
    );
    assert_eq!(lc.state(), LifecycleState::InProgress);
}

#[tokio::test]
async fn test_finish_and_defer_keeps_booking_unpaid() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (mut lc, desk) = lifecycle(&store, fast_config());
    let booking_id = lc.start(&draft()).await.unwrap().booking_id();

    assert_eq!(
        lc.finish(Some(FinishDecision::FinishAndDefer)).await.unwrap(),
        FinishOutcome::Finished {
            status: PaymentStatus::Unpaid
        }
    );
    assert_eq!(lc.state(), LifecycleState::Finished);
    assert_eq!(desk.status(booking_id).await.unwrap(), PaymentStatus::Unpaid);

    let booking = store.inner.get_booking(booking_id).await.unwrap().unwrap();
    assert!(booking.notes.contains("Payment: Unpaid"));
    assert!(booking.notes.contains("Check tyre pressure"));
}

#[tokio::test]
async fn test_cancel_is_idempotent_and_terminal() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (mut lc, _) = lifecycle(&store, fast_config());
    lc.start(&draft()).await.unwrap();

    lc.cancel().await.unwrap();
    lc.cancel().await.unwrap();
    assert_eq!(lc.state(), LifecycleState::Cancelled);
    assert!(matches!(
        lc.finish(Some(FinishDecision::FinishAndDefer)).await,
        Err(EngineError::InvalidTransitionError { .. })
    ));
}

#[tokio::test]
async fn test_cancel_after_collect_is_refused() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (mut lc, desk) = lifecycle(&store, fast_config());
    let booking_id = lc.start(&draft()).await.unwrap().booking_id();
    desk.record_payment(booking_id, dec!(115500), PaymentMethod::Transfer)
        .await
        .unwrap();
    lc.finish(None).await.unwrap();
    lc.collect().await.unwrap();

    assert!(matches!(
        lc.cancel().await,
        Err(EngineError::InvalidTransitionError { .. })
    ));
    assert_eq!(lc.state(), LifecycleState::Collected);
}

#[tokio::test]
async fn test_missing_state_name_falls_back() {
    let store = FlakyStore::new(InMemoryBookingStore::with_states([
        "Not Started",
        "In Progress",
    ]));
    let (mut lc, _) = lifecycle(&store, fast_config());
    let booking_id = lc.start(&draft()).await.unwrap().booking_id();

    lc.finish(Some(FinishDecision::FinishAndDefer)).await.unwrap();
    assert_eq!(lc.state(), LifecycleState::Finished);
    let booking = store.inner.get_booking(booking_id).await.unwrap().unwrap();
    assert_eq!(booking.state_id, 1);
}

#[tokio::test]
async fn test_slow_store_times_out_as_retryable() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (mut lc, _) = lifecycle(&store, fast_config());
    lc.start(&draft()).await.unwrap();

    store.faults.slow_reads_ms.store(1000, Ordering::SeqCst);
    let err = lc.finish(None).await.unwrap_err();
    assert!(matches!(err, EngineError::TransientStoreError(_)));
    assert!(err.is_retryable());
    assert_eq!(lc.state(), LifecycleState::InProgress);
}

#[tokio::test]
async fn test_failed_finish_write_keeps_state() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (mut lc, _) = lifecycle(&store, fast_config());
    lc.start(&draft()).await.unwrap();

    FlakyStore::fail(&store.faults.update_state, true);
    let err = lc
        .finish(Some(FinishDecision::FinishAndDefer))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(lc.state(), LifecycleState::InProgress);

    FlakyStore::fail(&store.faults.update_state, false);
    lc.finish(Some(FinishDecision::FinishAndDefer)).await.unwrap();
    assert_eq!(lc.state(), LifecycleState::Finished);
}

#[tokio::test]
async fn test_failed_collect_write_keeps_state() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (mut lc, desk) = lifecycle(&store, fast_config());
    let booking_id = lc.start(&draft()).await.unwrap().booking_id();
    desk.record_payment(booking_id, dec!(115500), PaymentMethod::Cash)
        .await
        .unwrap();
    lc.finish(None).await.unwrap();

    FlakyStore::fail(&store.faults.update_state, true);
    let err = lc.collect().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(lc.state(), LifecycleState::Finished);

    let booking = store.inner.get_booking(booking_id).await.unwrap().unwrap();
    assert_eq!(
        store.inner.state_name(booking.state_id).await.as_deref(),
        Some("Finished")
    );
}

#[tokio::test]
async fn test_failed_cancel_write_keeps_state() {
    let store = FlakyStore::new(InMemoryBookingStore::new());
    let (mut lc, _) = lifecycle(&store, fast_config());
    lc.start(&draft()).await.unwrap();

    FlakyStore::fail(&store.faults.update_state, true);
    let err = lc.cancel().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(lc.state(), LifecycleState::InProgress);

    FlakyStore::fail(&store.faults.update_state, false);
    lc.cancel().await.unwrap();
    assert_eq!(lc.state(), LifecycleState::Cancelled);
}
