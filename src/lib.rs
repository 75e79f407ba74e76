//! Resource reservation and availability engine
//!
//! Lets an organization book finite-quantity assets over inclusive date
//! ranges without ever over-committing any asset. The [`service`] module is
//! the operational surface; [`availability`] holds the pure conflict
//! calculator; everything persists in an embedded sled store, one value per
//! entity, keyed by tenant.

pub mod asset;
pub mod availability;
pub mod builder;
pub mod dates;
pub mod error;
pub mod kit;
pub mod reservation;
pub mod service;
pub mod utils;
