use super::cart::Cart;
use super::money::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Flat loyalty discount applied to the subtotal of VIP customers (10%).
pub const VIP_DISCOUNT_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);
/// Tax charged on the discounted subtotal (10%).
pub const TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

/// Prices a cart.
///
/// Discount and tax are carried unrounded; only `total` is rounded, once.
/// Lines are assumed to have passed [`CartLine::validate`](super::cart::CartLine::validate).
pub fn compute_totals(cart: &Cart, vip: bool) -> Totals {
    let subtotal = cart.subtotal();
    let discount = if vip {
        subtotal * VIP_DISCOUNT_RATE
    } else {
        Money::ZERO
    };
    let taxable = subtotal - discount;
    let tax = taxable * TAX_RATE;
    let total = (taxable + tax).round_total();

    tracing::debug!(%subtotal, %discount, %tax, %total, vip, "computed cart totals");

    Totals {
        subtotal,
        discount,
        tax,
        total,
    }
}
