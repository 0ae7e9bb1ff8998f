//! HTTP handlers
//!
//! `factory` holds the generic CRUD handlers; the other modules cover the
//! endpoints that do not fit the CRUD mould.

pub mod auth;
pub mod bookings;
pub mod factory;
pub mod reviews;
pub mod tours;
pub mod users;
pub mod views;
