//! Tally
//!
//! Tally is a storefront cart and checkout engine: a persistent, observable
//! cart, zone-based shipping, flat tax, coupon discounts and order snapshots.

pub mod cart;
pub mod checkout;
pub mod config;
pub mod coupons;
pub mod delivery;
pub mod items;
pub mod prelude;
pub mod pricing;
pub mod products;
pub mod storage;
pub mod store;
