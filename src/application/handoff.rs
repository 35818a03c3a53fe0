use crate::domain::booking::{BookingId, LifecycleState};
use crate::domain::cart::{Cart, CartLine};
use crate::domain::customer::CustomerInfo;
use crate::domain::money::Money;
use crate::domain::ports::HandoffSlotBox;
use crate::domain::session::{BookingReference, SessionSnapshot};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Flat wire layout of a handed-off session.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandoffBlob {
    cart: Vec<CartLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    customer_info: Option<CustomerInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    car_info: Option<CarInfo>,
    #[serde(default)]
    paid_amount: Money,
    // required: a blob without it is malformed, never defaulted
    view_only: bool,
    #[serde(default)]
    from_payment: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CarInfo {
    license_plate: String,
    booking_id: Option<BookingId>,
    status: LifecycleState,
    total: Money,
}

/// Serialized session, produced once and consumed once.
///
/// Deliberately not `Clone`: the only ways to get the blob out are handing
/// the token to a [`HandoffSlot`](crate::domain::ports::HandoffSlot) or
/// consuming it with [`SessionToken::into_blob`].
#[derive(Debug)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_blob(self) -> String {
        self.0
    }
}

/// A session read back on the receiving side.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResumedSession {
    pub snapshot: SessionSnapshot,
    /// Set when control came back from the payment screen. Seen only by the
    /// first reader, since the slot empties on read.
    pub from_payment: bool,
}

/// Encodes snapshots for transport and decodes them leniently.
pub struct SessionHandoff {
    slot: HandoffSlotBox,
}

impl SessionHandoff {
    /// Creates a handoff over `slot`.
    ///
    /// # Arguments
    ///
    /// * `slot` - The single-use mailbox tokens are passed through.
    pub fn new(slot: HandoffSlotBox) -> Self {
        Self { slot }
    }

    pub fn serialize_session(snapshot: &SessionSnapshot, from_payment: bool) -> Result<SessionToken> {
        let blob = HandoffBlob {
            cart: snapshot.cart.lines().to_vec(),
            customer_info: snapshot.customer.clone(),
            car_info: snapshot.booking.as_ref().map(|b| CarInfo {
                license_plate: b.license_plate.clone(),
                booking_id: b.booking_id,
                status: b.status,
                total: b.total,
            }),
            paid_amount: snapshot.paid_amount,
            view_only: snapshot.view_only,
            from_payment,
        };
        Ok(SessionToken(serde_json::to_string(&blob)?))
    }

    /// Decodes a blob. Anything missing or malformed is "no active session".
    pub fn deserialize_session(blob: Option<&str>) -> ResumedSession {
        let Some(raw) = blob.filter(|b| !b.trim().is_empty()) else {
            return ResumedSession::default();
        };
        let decoded: HandoffBlob = match serde_json::from_str(raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed session blob");
                return ResumedSession::default();
            }
        };
        let cart = match Cart::try_from(decoded.cart) {
            Ok(cart) => cart,
            Err(e) => {
                tracing::warn!(error = %e, "discarding session blob with invalid cart");
                return ResumedSession::default();
            }
        };
        ResumedSession {
            snapshot: SessionSnapshot {
                cart,
                customer: decoded.customer_info,
                booking: decoded.car_info.map(|c| BookingReference {
                    license_plate: c.license_plate,
                    booking_id: c.booking_id,
                    status: c.status,
                    total: c.total,
                }),
                paid_amount: decoded.paid_amount,
                view_only: decoded.view_only,
            },
            from_payment: decoded.from_payment,
        }
    }

    /// Leaves the current context: the token goes into the slot.
    pub async fn hand_off(&self, token: SessionToken) -> Result<()> {
        self.slot.put(token.into_blob()).await?;
        tracing::debug!("session handed off");
        Ok(())
    }

    /// Returns to a context: empties the slot and decodes what was there.
    ///
    /// A slot that cannot be read counts as empty.
    pub async fn receive(&self) -> ResumedSession {
        match self.slot.take().await {
            Ok(blob) => Self::deserialize_session(blob.as_deref()),
            Err(e) => {
                tracing::warn!(error = %e, "handoff slot unreadable, starting fresh");
                ResumedSession::default()
            }
        }
    }
}
