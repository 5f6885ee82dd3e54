//! Event domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Lifecycle status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Completed => "completed",
        }
    }

    /// Only published events accept registrations.
    pub fn accepts_registrations(&self) -> bool {
        matches!(self, EventStatus::Published)
    }

    /// Returns true if a host may move an event from `self` to `next`.
    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (EventStatus::Draft, EventStatus::Published)
                | (EventStatus::Draft, EventStatus::Cancelled)
                | (EventStatus::Published, EventStatus::Cancelled)
                | (EventStatus::Published, EventStatus::Completed)
        )
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(EventStatus::Draft),
            "published" => Ok(EventStatus::Published),
            "cancelled" => Ok(EventStatus::Cancelled),
            "completed" => Ok(EventStatus::Completed),
            _ => Err(format!("Invalid event status: {}", s)),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role a user holds on an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventRole {
    Host,
    Staff,
}

impl EventRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventRole::Host => "host",
            EventRole::Staff => "staff",
        }
    }

    /// Hosts edit, publish and delete events.
    pub fn can_manage_event(&self) -> bool {
        matches!(self, EventRole::Host)
    }

    /// Hosts and staff work the door and see attendees.
    pub fn can_check_in(&self) -> bool {
        true
    }
}

impl fmt::Display for EventRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of answer an event-defined question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    Email,
    Phone,
    Number,
    Select,
    MultipleChoice,
    Checkbox,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::Email => "email",
            QuestionType::Phone => "phone",
            QuestionType::Number => "number",
            QuestionType::Select => "select",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Checkbox => "checkbox",
        }
    }

    /// Choice questions carry a JSON array of options.
    pub fn requires_options(&self) -> bool {
        matches!(
            self,
            QuestionType::Select | QuestionType::MultipleChoice | QuestionType::Checkbox
        )
    }
}

/// An event guests can register for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Event {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    /// `None` means unlimited.
    pub capacity: Option<i32>,
    pub status: EventStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Question the host asks registrants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EventQuestion {
    pub id: Uuid,
    pub event_id: Uuid,
    pub question: String,
    pub question_type: QuestionType,
    pub is_required: bool,
    /// JSON array of strings, for choice questions.
    pub options: Option<String>,
    pub order: i32,
}

/// A user's role on an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EventMember {
    pub event_id: Uuid,
    pub user_id: String,
    pub role: EventRole,
    pub created_at: DateTime<Utc>,
}

/// Event together with its questions, as returned to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EventDetails {
    #[serde(flatten)]
    pub event: Event,
    pub questions: Vec<EventQuestion>,
}

/// Question definition inside a create request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateEventQuestionRequest {
    #[validate(length(min = 1, max = 500, message = "question must be 1-500 characters"))]
    pub question: String,

    pub question_type: QuestionType,

    #[serde(default)]
    pub is_required: bool,

    #[validate(custom(function = "shared::validation::validate_question_options"))]
    pub options: Option<String>,

    #[serde(default)]
    pub order: i32,
}

/// Request to create an event. The creator becomes its host.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
#[validate(schema(function = "validate_create_event"))]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "description must be at most 5000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 500, message = "location must be at most 500 characters"))]
    pub location: Option<String>,

    pub start_date: DateTime<Utc>,

    pub end_date: Option<DateTime<Utc>>,

    #[validate(range(min = 1, max = 100000, message = "capacity must be between 1 and 100000"))]
    pub capacity: Option<i32>,

    /// Create the event as a draft instead of publishing it right away.
    #[serde(default)]
    pub draft: bool,

    #[serde(default)]
    #[validate(length(max = 50, message = "at most 50 questions are allowed"), nested)]
    pub questions: Vec<CreateEventQuestionRequest>,
}

fn validate_create_event(request: &CreateEventRequest) -> Result<(), ValidationError> {
    if let Some(end) = request.end_date {
        if end < request.start_date {
            let mut err = ValidationError::new("end_before_start");
            err.message = Some("end_date must not be before start_date".into());
            return Err(err);
        }
    }
    for question in &request.questions {
        if question.question_type.requires_options() && question.options.is_none() {
            let mut err = ValidationError::new("options_required");
            err.message = Some("choice questions require options".into());
            return Err(err);
        }
    }
    Ok(())
}

/// Capacity change inside an update request.
///
/// Distinguishes "leave unchanged" (field absent) from "make unlimited"
/// (`null`) from "set to n".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapacityUpdate {
    #[default]
    Unchanged,
    Unlimited,
    Limited(i32),
}

impl<'de> Deserialize<'de> for CapacityUpdate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match Option::<i32>::deserialize(deserializer)? {
            Some(n) => CapacityUpdate::Limited(n),
            None => CapacityUpdate::Unlimited,
        })
    }
}

/// Request to update an event. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
#[validate(schema(function = "validate_update_event"))]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 5000, message = "description must be at most 5000 characters"))]
    pub description: Option<String>,

    #[validate(length(max = 500, message = "location must be at most 500 characters"))]
    pub location: Option<String>,

    pub start_date: Option<DateTime<Utc>>,

    pub end_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub capacity: CapacityUpdate,
}

fn validate_update_event(request: &UpdateEventRequest) -> Result<(), ValidationError> {
    if let CapacityUpdate::Limited(n) = request.capacity {
        if !(1..=100_000).contains(&n) {
            let mut err = ValidationError::new("capacity_range");
            err.message = Some("capacity must be between 1 and 100000".into());
            return Err(err);
        }
    }
    if let (Some(start), Some(end)) = (request.start_date, request.end_date) {
        if end < start {
            let mut err = ValidationError::new("end_before_start");
            err.message = Some("end_date must not be before start_date".into());
            return Err(err);
        }
    }
    Ok(())
}

/// Request to move an event to another status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChangeEventStatusRequest {
    pub status: EventStatus,
}

/// Request to grant a user the staff role.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct AddStaffRequest {
    #[validate(length(min = 1, max = 64, message = "user_id must be 1-64 characters"))]
    pub user_id: String,
}

/// Filters for listing events.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    /// Only events where this user is host or staff.
    pub member: Option<String>,
}
