use super::customer::{CustomerId, VehicleId};
use super::money::Money;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type BookingId = u64;
pub type StateId = u64;
pub type TransactionId = u64;

/// Physical progress of the service, independent of payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    #[default]
    Unstarted,
    InProgress,
    Finished,
    Collected,
    Cancelled,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 5] = [
        LifecycleState::Unstarted,
        LifecycleState::InProgress,
        LifecycleState::Finished,
        LifecycleState::Collected,
        LifecycleState::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Collected | LifecycleState::Cancelled)
    }

    /// Name of the matching row in the store's state table.
    pub fn store_name(&self) -> &'static str {
        match self {
            LifecycleState::Unstarted => "Not Started",
            LifecycleState::InProgress => "In Progress",
            LifecycleState::Finished => "Finished",
            LifecycleState::Collected => "Collected",
            LifecycleState::Cancelled => "Cancelled",
        }
    }

    /// Forward-only transition table; cancellation is the only sideways move.
    pub fn next(self, event: LifecycleEvent) -> Result<LifecycleState> {
        use LifecycleEvent::*;
        use LifecycleState::*;
        match (self, event) {
            (Unstarted, Start) => Ok(InProgress),
            (InProgress, Finish) => Ok(Finished),
            (Finished, Collect) => Ok(Collected),
            (Cancelled, Cancel) => Ok(Cancelled),
            (from, Cancel) if !from.is_terminal() => Ok(Cancelled),
            (from, event) => Err(EngineError::invalid_transition(from, event.verb())),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Start,
    Finish,
    Collect,
    Cancel,
}

impl LifecycleEvent {
    pub fn verb(&self) -> &'static str {
        match self {
            LifecycleEvent::Start => "start",
            LifecycleEvent::Finish => "finish",
            LifecycleEvent::Collect => "collect",
            LifecycleEvent::Cancel => "cancel",
        }
    }
}

/// Operator's answer when asked to finish a service that is not fully paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishDecision {
    /// Abort the finish and take payment first.
    PayFirst,
    /// Finish now, leave the balance outstanding.
    FinishAndDefer,
    /// Abort without doing anything.
    CancelFinish,
}

impl FromStr for FinishDecision {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pay-first" => Ok(FinishDecision::PayFirst),
            "finish-and-defer" => Ok(FinishDecision::FinishAndDefer),
            "cancel-finish" => Ok(FinishDecision::CancelFinish),
            other => Err(EngineError::ValidationError(format!(
                "Unknown finish decision: {}",
                other
            ))),
        }
    }
}

/// Ordered from least to most settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Transfer,
    EWallet,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::Transfer,
        PaymentMethod::EWallet,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::Transfer => "Transfer",
            PaymentMethod::EWallet => "E-Wallet",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentMethod {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "transfer" => Ok(PaymentMethod::Transfer),
            "ewallet" | "e-wallet" => Ok(PaymentMethod::EWallet),
            other => Err(EngineError::ValidationError(format!(
                "Unknown payment method: {}",
                other
            ))),
        }
    }
}

/// One accepted tender, as kept on the booking record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub amount: Money,
    pub method: PaymentMethod,
    pub recorded_at: DateTime<Utc>,
}

/// Durable booking record.
///
/// `notes` is shared free text; it still carries a payment marker for readers
/// that predate `payment_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub state_id: StateId,
    pub total_price: Money,
    pub notes: String,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub payment_history: Vec<PaymentEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBooking {
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub total_price: Money,
    pub notes: String,
}

/// Payment written against a booking once its balance reaches zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub booking_id: BookingId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}
