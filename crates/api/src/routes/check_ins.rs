//! Door check-in routes for hosts and staff.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::{CheckInOutcome, CheckInRequest};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::TelegramAuth;

/// Check a registration in.
///
/// POST /api/v1/events/:event_id/checkin
///
/// Returns 201 for a fresh check-in and 200 with the existing record when
/// the registration was already checked in.
pub async fn check_in(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Path(event_id): Path<Uuid>,
    Json(request): Json<CheckInRequest>,
) -> Result<(StatusCode, Json<CheckInOutcome>), ApiError> {
    state.events.require_staff(event_id, &auth.user_id).await?;

    let outcome = state
        .check_ins
        .check_in(event_id, request.registration_id, &auth.user_id)
        .await?;

    let status = if outcome.already_checked_in {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(outcome)))
}
