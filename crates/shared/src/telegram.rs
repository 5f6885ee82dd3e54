//! Telegram Mini App `initData` verification.
//!
//! The Mini App hands the backend a url-encoded `initData` string signed by
//! Telegram with a key derived from the bot token. Verifying it yields a
//! stable user identifier; nothing downstream re-validates identity.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Key used to derive the secret from the bot token.
const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";

/// Default maximum age of `initData` (24 hours).
pub const DEFAULT_MAX_AGE_SECS: i64 = 86_400;

/// Error type for `initData` verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TelegramAuthError {
    #[error("Invalid initData: missing {0}")]
    MissingField(&'static str),

    #[error("Invalid initData: {0}")]
    Malformed(String),

    #[error("initData expired")]
    Expired,

    #[error("Invalid initData: hash mismatch")]
    HashMismatch,
}

/// Telegram user as embedded in `initData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_premium: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedInitData {
    pub user: TelegramUser,
    pub auth_date: DateTime<Utc>,
}

impl VerifiedInitData {
    /// Stable user identifier handed to the rest of the system.
    pub fn user_id(&self) -> String {
        self.user.id.to_string()
    }
}

fn secret_key(bot_token: &str) -> Result<Vec<u8>, TelegramAuthError> {
    let mut mac = HmacSha256::new_from_slice(WEB_APP_DATA_KEY)
        .map_err(|e| TelegramAuthError::Malformed(e.to_string()))?;
    mac.update(bot_token.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn signing_mac(bot_token: &str, data_check_string: &str) -> Result<HmacSha256, TelegramAuthError> {
    let secret = secret_key(bot_token)?;
    let mut mac = HmacSha256::new_from_slice(&secret)
        .map_err(|e| TelegramAuthError::Malformed(e.to_string()))?;
    mac.update(data_check_string.as_bytes());
    Ok(mac)
}

/// Builds the data-check-string: `key=value` pairs sorted by key, joined by `\n`.
fn data_check_string(pairs: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Verifies a raw `initData` string against the bot token.
///
/// Fails when the hash does not match, when `auth_date` is older than
/// `max_age` relative to `now`, or when the embedded user cannot be parsed.
pub fn verify_init_data(
    init_data: &str,
    bot_token: &str,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<VerifiedInitData, TelegramAuthError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(init_data)
        .map_err(|e| TelegramAuthError::Malformed(e.to_string()))?;

    let hash = pairs
        .iter()
        .find(|(k, _)| k == "hash")
        .map(|(_, v)| v.clone())
        .ok_or(TelegramAuthError::MissingField("hash"))?;

    let auth_date_raw = pairs
        .iter()
        .find(|(k, _)| k == "auth_date")
        .map(|(_, v)| v.clone())
        .ok_or(TelegramAuthError::MissingField("auth_date"))?;

    let auth_timestamp: i64 = auth_date_raw
        .parse()
        .map_err(|_| TelegramAuthError::Malformed("auth_date is not a number".to_string()))?;
    let auth_date = Utc
        .timestamp_opt(auth_timestamp, 0)
        .single()
        .ok_or_else(|| TelegramAuthError::Malformed("auth_date out of range".to_string()))?;

    if now - auth_date > max_age {
        return Err(TelegramAuthError::Expired);
    }

    let signed: Vec<(String, String)> = pairs.into_iter().filter(|(k, _)| k != "hash").collect();
    let expected = hex::decode(&hash).map_err(|_| TelegramAuthError::HashMismatch)?;
    signing_mac(bot_token, &data_check_string(&signed))?
        .verify_slice(&expected)
        .map_err(|_| TelegramAuthError::HashMismatch)?;

    let user_raw = signed
        .iter()
        .find(|(k, _)| k == "user")
        .map(|(_, v)| v.as_str())
        .ok_or(TelegramAuthError::MissingField("user"))?;
    let user: TelegramUser = serde_json::from_str(user_raw)
        .map_err(|e| TelegramAuthError::Malformed(format!("user: {}", e)))?;

    Ok(VerifiedInitData { user, auth_date })
}

/// Produces a signed `initData` string for the given fields.
///
/// Used by tests and local tooling to act as the Telegram client.
pub fn sign_init_data(fields: &[(&str, &str)], bot_token: &str) -> Result<String, TelegramAuthError> {
    let pairs: Vec<(String, String)> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let hash = hex::encode(
        signing_mac(bot_token, &data_check_string(&pairs))?
            .finalize()
            .into_bytes(),
    );

    let mut encoded = pairs;
    encoded.push(("hash".to_string(), hash));
    serde_urlencoded::to_string(&encoded).map_err(|e| TelegramAuthError::Malformed(e.to_string()))
}
