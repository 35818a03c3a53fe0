use crate::application::handoff::ResumedSession;
use crate::domain::ledger::PaymentLedger;
use crate::domain::pricing::Totals;
use crate::error::{EngineError, Result};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct ReceiptRow {
    amount: String,
    applied: String,
    change: String,
    method: String,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct TotalsRow {
    subtotal: String,
    discount: String,
    tax: String,
    total: String,
}

#[derive(Debug, Serialize)]
struct SessionRow {
    plate: String,
    booking_id: String,
    status: String,
    lines: usize,
    total: String,
    paid: String,
    view_only: bool,
    from_payment: bool,
}

/// Writes quotes and a ledger's tenders as CSV.
pub struct ReceiptWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReceiptWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// A single `subtotal,discount,tax,total` row.
    pub fn write_totals(&mut self, totals: &Totals) -> Result<()> {
        self.writer.serialize(TotalsRow {
            subtotal: totals.subtotal.to_string(),
            discount: totals.discount.to_string(),
            tax: totals.tax.to_string(),
            total: totals.total.to_string(),
        })?;
        self.writer.flush()?;
        Ok(())
    }

    /// One row per tender in the order taken, `amount,applied,change,method,timestamp`.
    pub fn write_ledger(&mut self, ledger: &PaymentLedger) -> Result<()> {
        if ledger.entries().is_empty() {
            self.writer
                .write_record(["amount", "applied", "change", "method", "timestamp"])?;
        }
        for entry in ledger.entries() {
            self.writer.serialize(ReceiptRow {
                amount: entry.amount().to_string(),
                applied: entry.applied().to_string(),
                change: entry.change().to_string(),
                method: entry.method().label().to_string(),
                timestamp: entry.timestamp().to_rfc3339(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Summarizes a resumed session in one row; no session leaves only the header.
    pub fn write_session(&mut self, session: &ResumedSession) -> Result<()> {
        let snapshot = &session.snapshot;
        if snapshot.is_empty() {
            self.writer.write_record([
                "plate",
                "booking_id",
                "status",
                "lines",
                "total",
                "paid",
                "view_only",
                "from_payment",
            ])?;
        } else {
            let booking = snapshot.booking.as_ref();
            self.writer.serialize(SessionRow {
                plate: booking.map(|b| b.license_plate.clone()).unwrap_or_default(),
                booking_id: booking
                    .and_then(|b| b.booking_id)
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                status: booking.map(|b| b.status.to_string()).unwrap_or_default(),
                lines: snapshot.cart.lines().len(),
                total: booking.map(|b| b.total.to_string()).unwrap_or_default(),
                paid: snapshot.paid_amount.to_string(),
                view_only: snapshot.view_only,
                from_payment: session.from_payment,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| EngineError::IoError(e.into_error()))
    }
}
