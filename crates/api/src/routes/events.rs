//! Event management routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::errors::AdmissionError;
use domain::models::{
    AddStaffRequest, AdmissionSummary, Attendee, ChangeEventStatusRequest, CreateEventRequest,
    Event, EventDetails, EventFilter, EventMember, EventStatus, Registration, UpdateEventRequest,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::TelegramAuth;

/// Query parameters for listing events.
#[derive(Debug, Default, Deserialize)]
pub struct ListEventsQuery {
    pub status: Option<EventStatus>,
    /// Only events the caller hosts or staffs.
    #[serde(default)]
    pub mine: bool,
}

#[derive(Debug, Serialize)]
pub struct ListEventsResponse {
    pub data: Vec<Event>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct AttendeesResponse {
    pub data: Vec<Attendee>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct PromotionResponse {
    pub promoted: Vec<Registration>,
    pub count: usize,
}

/// Create a new event.
///
/// POST /api/v1/events
///
/// The caller becomes the event host.
pub async fn create_event(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventDetails>), ApiError> {
    let details = state.events.create_event(&auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// List events.
///
/// GET /api/v1/events?status=published&mine=true
///
/// Drafts only show up in the caller's own listing.
pub async fn list_events(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<ListEventsResponse>, ApiError> {
    let filter = EventFilter {
        status: query.status,
        member: query.mine.then(|| auth.user_id.clone()),
    };
    let mut events = state.events.list_events(&filter).await?;
    if !query.mine {
        events.retain(|event| event.status != EventStatus::Draft);
    }
    let count = events.len();

    Ok(Json(ListEventsResponse {
        data: events,
        count,
    }))
}

/// Get an event with its questions by id or slug.
///
/// GET /api/v1/events/:id_or_slug
///
/// Drafts are only visible to their hosts and staff.
pub async fn get_event(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Path(id_or_slug): Path<String>,
) -> Result<Json<EventDetails>, ApiError> {
    let details = state.events.get_event(&id_or_slug).await?;

    if details.event.status == EventStatus::Draft {
        state
            .events
            .require_staff(details.event.id, &auth.user_id)
            .await
            .map_err(|err| match err {
                AdmissionError::Forbidden(_) => ApiError::NotFound("Event not found".to_string()),
                other => other.into(),
            })?;
    }

    Ok(Json(details))
}

/// Update event details and capacity.
///
/// PATCH /api/v1/events/:event_id
pub async fn update_event(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Path(event_id): Path<Uuid>,
    Json(request): Json<UpdateEventRequest>,
) -> Result<Json<Event>, ApiError> {
    let event = state
        .events
        .update_event(event_id, &auth.user_id, request)
        .await?;
    Ok(Json(event))
}

/// Delete an event with all its registrations and check-ins.
///
/// DELETE /api/v1/events/:event_id
pub async fn delete_event(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Path(event_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.events.delete_event(event_id, &auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move an event to another lifecycle status.
///
/// POST /api/v1/events/:event_id/status
pub async fn change_status(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Path(event_id): Path<Uuid>,
    Json(request): Json<ChangeEventStatusRequest>,
) -> Result<Json<Event>, ApiError> {
    let event = state
        .events
        .change_status(event_id, &auth.user_id, request.status)
        .await?;
    Ok(Json(event))
}

/// Grant a user the staff role.
///
/// POST /api/v1/events/:event_id/staff
pub async fn add_staff(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Path(event_id): Path<Uuid>,
    Json(request): Json<AddStaffRequest>,
) -> Result<(StatusCode, Json<EventMember>), ApiError> {
    request.validate().map_err(AdmissionError::from)?;

    let member = state
        .events
        .add_staff(event_id, &auth.user_id, &request.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Confirmed and waitlisted registrations with their check-ins.
///
/// GET /api/v1/events/:event_id/attendees
pub async fn attendees(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Path(event_id): Path<Uuid>,
) -> Result<Json<AttendeesResponse>, ApiError> {
    let attendees = state.events.attendees(event_id, &auth.user_id).await?;
    let count = attendees.len();
    Ok(Json(AttendeesResponse {
        data: attendees,
        count,
    }))
}

/// Admission summary.
///
/// GET /api/v1/events/:event_id/summary
pub async fn summary(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Path(event_id): Path<Uuid>,
) -> Result<Json<AdmissionSummary>, ApiError> {
    let summary = state.events.summary(event_id, &auth.user_id).await?;
    Ok(Json(summary))
}

/// Run a waitlist promotion pass.
///
/// POST /api/v1/events/:event_id/promote
pub async fn promote(
    State(state): State<AppState>,
    auth: TelegramAuth,
    Path(event_id): Path<Uuid>,
) -> Result<Json<PromotionResponse>, ApiError> {
    let promoted = state.events.promote(event_id, &auth.user_id).await?;
    let count = promoted.len();

    info!(
        event_id = %event_id,
        user_id = %auth.user_id,
        promoted = count,
        "Manual promotion requested"
    );

    Ok(Json(PromotionResponse { promoted, count }))
}
