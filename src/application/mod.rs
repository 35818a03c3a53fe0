//! Application layer orchestrating the domain over the storage ports.
//!
//! [`checkout::Checkout`] is the per-station entry point. It drives the
//! [`lifecycle::BookingLifecycle`] state machine and tenders through the shared
//! [`payments::PaymentDesk`], which keeps one ledger per booking and reconciles
//! it into the durable record via [`projector::PaymentStatusProjector`].
//! [`handoff::SessionHandoff`] carries an in-flight sale across contexts.

pub mod checkout;
pub mod handoff;
pub mod lifecycle;
pub mod payments;
pub mod projector;

use crate::error::{EngineError, Result};
use std::future::Future;
use std::time::Duration;

/// Runs a store call under a deadline; an elapsed deadline is a transient failure.
pub(crate) async fn bounded<T, F>(deadline: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(operation, ?deadline, "store call timed out");
            Err(EngineError::TransientStoreError(format!(
                "{} timed out after {:?}",
                operation, deadline
            )))
        }
    }
}
