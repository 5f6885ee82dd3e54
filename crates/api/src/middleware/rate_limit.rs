//! Rate limiting middleware.
//!
//! Provides per-user rate limiting of RSVP submissions.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovRateLimiter,
};
use serde_json::json;
use std::{
    collections::HashMap,
    num::NonZeroU32,
    sync::{Arc, RwLock},
};

use crate::app::AppState;
use crate::extractors::TelegramAuth;

/// Type alias for the rate limiter used per user.
type UserRateLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter state shared across all requests, keyed by user id.
pub struct RateLimiterState {
    limiters: RwLock<HashMap<String, Arc<UserRateLimiter>>>,
    rate_limit_per_hour: u32,
}

impl RateLimiterState {
    /// Create a new rate limiter state with the specified limit per hour.
    pub fn new(rate_limit_per_hour: u32) -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
            rate_limit_per_hour,
        }
    }

    pub fn rate_limit_per_hour(&self) -> u32 {
        self.rate_limit_per_hour
    }

    /// Get or create a rate limiter for the given user.
    fn get_or_create_limiter(&self, user_id: &str) -> Arc<UserRateLimiter> {
        {
            let limiters = self.limiters.read().unwrap();
            if let Some(limiter) = limiters.get(user_id) {
                return limiter.clone();
            }
        }

        let mut limiters = self.limiters.write().unwrap();

        // Another request may have created it meanwhile
        if let Some(limiter) = limiters.get(user_id) {
            return limiter.clone();
        }

        let quota = Quota::per_hour(NonZeroU32::new(self.rate_limit_per_hour).unwrap_or(NonZeroU32::MIN));
        let limiter = Arc::new(GovRateLimiter::direct(quota));
        limiters.insert(user_id.to_string(), limiter.clone());
        limiter
    }

    /// Check if a request from the given user should be allowed.
    /// Returns Ok(()) if allowed, or Err with retry_after seconds if rate limited.
    pub fn check(&self, user_id: &str) -> Result<(), u64> {
        let limiter = self.get_or_create_limiter(user_id);

        match limiter.check() {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait_time = not_until.wait_time_from(governor::clock::Clock::now(
                    &governor::clock::DefaultClock::default(),
                ));
                Err(wait_time.as_secs().max(1))
            }
        }
    }
}

impl std::fmt::Debug for RateLimiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterState")
            .field("rate_limit_per_hour", &self.rate_limit_per_hour)
            .field("active_limiters", &self.limiters.read().unwrap().len())
            .finish()
    }
}

/// Middleware that limits RSVP submissions per Telegram user.
///
/// Requests without valid initData pass through; the handler rejects them.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(rate_limiter) = state.rate_limiter.clone() else {
        return next.run(req).await;
    };

    let (mut parts, body) = req.into_parts();
    let auth = TelegramAuth::from_request_parts(&mut parts, &state).await;
    let req = Request::from_parts(parts, body);

    if let Ok(auth) = auth {
        if let Err(retry_after) = rate_limiter.check(&auth.user_id) {
            tracing::warn!(user_id = %auth.user_id, retry_after, "RSVP rate limit exceeded");
            return rate_limited_response(rate_limiter.rate_limit_per_hour(), retry_after);
        }
    }

    next.run(req).await
}

/// Create a rate limited response with proper headers and body.
fn rate_limited_response(limit: u32, retry_after: u64) -> Response {
    let body = json!({
        "error": "rate_limit_exceeded",
        "message": format!("Rate limit of {} requests/hour exceeded", limit),
        "retry_after": retry_after
    });

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));

    response
}
