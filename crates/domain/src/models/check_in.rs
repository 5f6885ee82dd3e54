//! Check-in domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record that a registrant arrived at the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckIn {
    pub id: Uuid,
    pub event_id: Uuid,
    pub registration_id: Uuid,
    /// Owner of the registration.
    pub user_id: String,
    /// Host or staff member who performed the check-in.
    pub checked_in_by: String,
    pub checked_in_at: DateTime<Utc>,
}

/// Request to check a registration in at the door.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckInRequest {
    pub registration_id: Uuid,
}

/// Result of a check-in attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckInOutcome {
    pub check_in: CheckIn,
    /// True when the registration had already been checked in.
    pub already_checked_in: bool,
}
