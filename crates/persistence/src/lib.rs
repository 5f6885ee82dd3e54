//! Persistence layer for the Event RSVP backend.
//!
//! This crate contains:
//! - Database connection management and embedded migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - The PostgreSQL implementation of the admission store port

pub mod db;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod repositories;
pub mod store;

pub use store::PgAdmissionStore;
