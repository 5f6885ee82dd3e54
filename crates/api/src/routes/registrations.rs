//! RSVP routes for attendees.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::{RegisterRequest, Registration};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::TelegramAuth;

/// Register for an event.
///
/// POST /api/v1/events/:event_id/rsvp
///
/// Confirms the registration while capacity remains, otherwise places it
/// on the waitlist. Registering again while active returns 409.
pub async fn register(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Path(event_id): Path<Uuid>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    let registration = state
        .registrations
        .register(event_id, &auth.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

/// The caller's registration for an event.
///
/// GET /api/v1/events/:event_id/rsvp/me
pub async fn my_registration(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Registration>, ApiError> {
    let registration = state
        .registrations
        .my_registration(event_id, &auth.user_id)
        .await?;
    Ok(Json(registration))
}

/// Cancel the caller's registration.
///
/// DELETE /api/v1/events/:event_id/rsvp
///
/// Freed places are handed to the waitlist before this returns.
pub async fn cancel(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Registration>, ApiError> {
    let registration = state.registrations.cancel(event_id, &auth.user_id).await?;
    Ok(Json(registration))
}
