//! Registration domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::check_in::CheckIn;

/// Admission status of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Confirmed,
    Waitlisted,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Waitlisted => "waitlisted",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }

    /// Confirmed and waitlisted registrations block a second registration.
    pub fn is_active(&self) -> bool {
        !matches!(self, RegistrationStatus::Cancelled)
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "confirmed" => Ok(RegistrationStatus::Confirmed),
            "waitlisted" => Ok(RegistrationStatus::Waitlisted),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            _ => Err(format!("Invalid registration status: {}", s)),
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Contact details a registrant leaves with the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ContactFields {
    #[validate(length(max = 200, message = "name must be at most 200 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(custom(function = "shared::validation::validate_phone"))]
    pub phone: Option<String>,
}

/// Answer to one of the event's questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RegistrationAnswer {
    pub question_id: Uuid,

    #[validate(length(max = 2000, message = "answer must be at most 2000 characters"))]
    pub answer: String,
}

/// A user's claim on an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: String,
    /// Seats requested: the registrant plus guests.
    pub guest_count: i32,
    pub status: RegistrationStatus,
    #[serde(flatten)]
    pub contact: ContactFields,
    pub consent_given: bool,
    pub notes: Option<String>,
    pub answers: Vec<RegistrationAnswer>,
    /// Waitlist ordering key, refreshed each time the user (re)registers.
    pub queued_at: DateTime<Utc>,
    #[serde(skip)]
    pub queue_seq: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Seats this registration holds against capacity.
    pub fn reserved_slots(&self) -> i64 {
        if self.status == RegistrationStatus::Confirmed {
            self.guest_count as i64
        } else {
            0
        }
    }

    /// FIFO ordering key for waitlist promotion.
    pub fn queue_key(&self) -> (DateTime<Utc>, i64) {
        (self.queued_at, self.queue_seq)
    }
}

fn default_guest_count() -> i32 {
    1
}

/// Request to register for an event.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RegisterRequest {
    #[serde(default = "default_guest_count")]
    #[validate(range(min = 1, max = 100, message = "guest_count must be between 1 and 100"))]
    pub guest_count: i32,

    #[serde(flatten)]
    #[validate(nested)]
    pub contact: ContactFields,

    #[serde(default)]
    pub consent_given: bool,

    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub notes: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub answers: Vec<RegistrationAnswer>,
}

impl Default for RegisterRequest {
    fn default() -> Self {
        Self {
            guest_count: default_guest_count(),
            contact: ContactFields::default(),
            consent_given: false,
            notes: None,
            answers: Vec::new(),
        }
    }
}

/// Registration as shown on the host's attendee list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Attendee {
    #[serde(flatten)]
    pub registration: Registration,
    pub check_in: Option<CheckIn>,
}
