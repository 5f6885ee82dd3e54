//! Custom Axum extractors.

pub mod telegram_auth;

pub use telegram_auth::{TelegramAuth, TMA_SCHEME};
