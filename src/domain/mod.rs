//! Domain layer: the pure rules of pricing, payment and service progress.
//!
//! Nothing here performs I/O. Storage is reached only through the traits in
//! [`ports`].

pub mod annotation;
pub mod booking;
pub mod cart;
pub mod customer;
pub mod ledger;
pub mod money;
pub mod ports;
pub mod pricing;
pub mod session;
