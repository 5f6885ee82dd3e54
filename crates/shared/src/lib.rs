//! Shared utilities and common types for the Event RSVP backend.
//!
//! This crate provides functionality used across all other crates:
//! - Telegram Mini App identity verification
//! - Slug generation for public event links
//! - Common validation logic

pub mod slug;
pub mod telegram;
pub mod validation;
