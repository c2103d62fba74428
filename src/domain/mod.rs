//! Storefront domain: pricing, carts, quotes and delivery rules.
pub mod aggregates;
pub mod events;
pub mod flags;
pub mod shipping;
pub mod sizing;
pub mod value_objects;
