//! Domain layer for the Event RSVP backend.
//!
//! This crate contains:
//! - Domain models (Event, Registration, CheckIn)
//! - The admission error taxonomy
//! - Store ports plus the in-memory arena store
//! - Admission services (capacity ledger, registration, waitlist, check-in)

pub mod errors;
pub mod models;
pub mod services;
pub mod store;
