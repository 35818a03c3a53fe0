use super::booking::{BookingId, LifecycleState};
use super::cart::Cart;
use super::customer::CustomerInfo;
use super::money::Money;

/// The vehicle and booking an in-flight sale is attached to.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingReference {
    pub license_plate: String,
    pub booking_id: Option<BookingId>,
    pub status: LifecycleState,
    pub total: Money,
}

/// Everything needed to resume a sale in another execution context.
///
/// `view_only` is carried as-is: a fully paid order resumes as a receipt and
/// must never be reopened for tender by re-deriving it from other fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub cart: Cart,
    pub customer: Option<CustomerInfo>,
    pub booking: Option<BookingReference>,
    pub paid_amount: Money,
    pub view_only: bool,
}

impl SessionSnapshot {
    /// True for the "no active session" value.
    pub fn is_empty(&self) -> bool {
        self.cart.is_empty() && self.customer.is_none() && self.booking.is_none()
    }
}
