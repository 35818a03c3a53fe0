use super::booking::{PaymentMethod, PaymentStatus};
use super::money::{Amount, Money};
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Audit record of a single tender. Never edited once appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    amount: Money,
    applied: Money,
    change: Money,
    method: PaymentMethod,
    timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    /// What the customer handed over.
    pub fn amount(&self) -> Money {
        self.amount
    }

    /// The part that went towards the balance.
    pub fn applied(&self) -> Money {
        self.applied
    }

    pub fn change(&self) -> Money {
        self.change
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Outcome of one call to [`PaymentLedger::record_payment`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PaymentReceipt {
    pub accepted: bool,
    pub new_paid: Money,
    pub new_remaining: Money,
    pub change: Money,
    /// True when this tender brought the balance to zero.
    pub settled: bool,
}

/// Accumulates tenders against a target total.
///
/// `paid` is capped at `target`: anything above it is handed back as change,
/// never kept as credit.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentLedger {
    target: Money,
    paid: Money,
    entries: Vec<LedgerEntry>,
}

impl PaymentLedger {
    pub fn new(target: Money) -> Self {
        Self {
            target,
            paid: Money::ZERO,
            entries: Vec::new(),
        }
    }

    /// Rebuilds a ledger for a booking that already has `paid` on record.
    pub fn resume(target: Money, paid: Money) -> Self {
        Self {
            target,
            paid: paid.min(target).max(Money::ZERO),
            entries: Vec::new(),
        }
    }

    pub fn target(&self) -> Money {
        self.target
    }

    pub fn paid(&self) -> Money {
        self.paid
    }

    pub fn remaining(&self) -> Money {
        self.target.saturating_sub(self.paid)
    }

    pub fn is_settled(&self) -> bool {
        self.remaining().is_zero()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Status implied by the figures alone.
    pub fn status(&self) -> PaymentStatus {
        if self.is_settled() {
            PaymentStatus::Paid
        } else if self.paid.is_zero() {
            PaymentStatus::Unpaid
        } else {
            PaymentStatus::Partial
        }
    }

    /// Applies one tender.
    ///
    /// Non-positive tenders and tenders against a settled balance are refused
    /// and leave the ledger untouched.
    pub fn record_payment(
        &mut self,
        tendered: Decimal,
        method: PaymentMethod,
    ) -> Result<PaymentReceipt> {
        let tendered: Money = Amount::new(tendered)?.into();
        let remaining = self.remaining();
        if remaining.is_zero() {
            return Err(EngineError::ValidationError(
                "Balance is already settled; no further tender accepted".to_string(),
            ));
        }

        let (applied, change) = if tendered < remaining {
            (tendered, Money::ZERO)
        } else {
            (remaining, tendered - remaining)
        };
        self.paid += applied;
        self.entries.push(LedgerEntry {
            amount: tendered,
            applied,
            change,
            method,
            timestamp: Utc::now(),
        });

        tracing::debug!(
            %tendered,
            %applied,
            %change,
            paid = %self.paid,
            remaining = %self.remaining(),
            "tender recorded"
        );

        Ok(PaymentReceipt {
            accepted: true,
            new_paid: self.paid,
            new_remaining: self.remaining(),
            change,
            settled: self.is_settled(),
        })
    }
}
