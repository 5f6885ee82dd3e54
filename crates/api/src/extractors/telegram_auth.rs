//! Telegram Mini App authentication extractor.
//!
//! Reads `Authorization: tma <initData>` and verifies the signature with the
//! configured bot token.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use shared::telegram::{verify_init_data, TelegramUser};

use crate::app::AppState;
use crate::error::ApiError;

/// Authorization scheme used by Telegram Mini Apps.
pub const TMA_SCHEME: &str = "tma ";

/// Authenticated Telegram user.
#[derive(Debug, Clone)]
pub struct TelegramAuth {
    /// Telegram user id rendered as a decimal string.
    pub user_id: String,
    pub user: TelegramUser,
}

#[async_trait]
impl FromRequestParts<AppState> for TelegramAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let init_data = auth_header.strip_prefix(TMA_SCHEME).ok_or_else(|| {
            ApiError::Unauthorized("Invalid Authorization header format".to_string())
        })?;

        let telegram = &state.config.telegram;
        let verified = verify_init_data(
            init_data,
            &telegram.bot_token,
            Duration::seconds(telegram.init_data_max_age_secs),
            Utc::now(),
        )?;

        parts.extensions.insert(verified.user.clone());

        Ok(TelegramAuth {
            user_id: verified.user_id(),
            user: verified.user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_scheme() {
        assert_eq!("tma query_id=1".strip_prefix(TMA_SCHEME), Some("query_id=1"));
        assert_eq!("Bearer abc".strip_prefix(TMA_SCHEME), None);
    }

    #[test]
    fn test_telegram_auth_clone() {
        let auth = TelegramAuth {
            user_id: "42".to_string(),
            user: TelegramUser {
                id: 42,
                first_name: "Jane".to_string(),
                last_name: None,
                username: None,
                language_code: None,
                is_premium: None,
                photo_url: None,
            },
        };
        let cloned = auth.clone();
        assert_eq!(cloned.user_id, "42");
        assert_eq!(cloned.user.id, 42);
    }
}
