//! Registration entity.

use chrono::{DateTime, Utc};
use domain::models::{ContactFields, Registration, RegistrationAnswer, RegistrationStatus};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for registration_status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "registration_status", rename_all = "lowercase")]
pub enum RegistrationStatusDb {
    Confirmed,
    Waitlisted,
    Cancelled,
}

impl From<RegistrationStatusDb> for RegistrationStatus {
    fn from(db: RegistrationStatusDb) -> Self {
        match db {
            RegistrationStatusDb::Confirmed => Self::Confirmed,
            RegistrationStatusDb::Waitlisted => Self::Waitlisted,
            RegistrationStatusDb::Cancelled => Self::Cancelled,
        }
    }
}

impl From<RegistrationStatus> for RegistrationStatusDb {
    fn from(status: RegistrationStatus) -> Self {
        match status {
            RegistrationStatus::Confirmed => Self::Confirmed,
            RegistrationStatus::Waitlisted => Self::Waitlisted,
            RegistrationStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// Database row mapping for the registrations table.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: String,
    pub guest_count: i32,
    pub status: RegistrationStatusDb,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub consent_given: bool,
    pub notes: Option<String>,
    pub answers: Json<Vec<RegistrationAnswer>>,
    pub queued_at: DateTime<Utc>,
    pub queue_seq: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RegistrationEntity> for Registration {
    fn from(entity: RegistrationEntity) -> Self {
        Self {
            id: entity.id,
            event_id: entity.event_id,
            user_id: entity.user_id,
            guest_count: entity.guest_count,
            status: entity.status.into(),
            contact: ContactFields {
                name: entity.name,
                email: entity.email,
                phone: entity.phone,
            },
            consent_given: entity.consent_given,
            notes: entity.notes,
            answers: entity.answers.0,
            queued_at: entity.queued_at,
            queue_seq: entity.queue_seq,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_status_conversion() {
        for status in [
            RegistrationStatus::Confirmed,
            RegistrationStatus::Waitlisted,
            RegistrationStatus::Cancelled,
        ] {
            assert_eq!(
                RegistrationStatus::from(RegistrationStatusDb::from(status)),
                status
            );
        }
    }

    #[test]
    fn test_entity_to_domain() {
        let now = Utc::now();
        let question_id = Uuid::new_v4();
        let entity = RegistrationEntity {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            user_id: "42".to_string(),
            guest_count: 2,
            status: RegistrationStatusDb::Waitlisted,
            name: Some("Jane".to_string()),
            email: None,
            phone: None,
            consent_given: true,
            notes: None,
            answers: Json(vec![RegistrationAnswer {
                question_id,
                answer: "Vegan".to_string(),
            }]),
            queued_at: now,
            queue_seq: 9,
            created_at: now,
            updated_at: now,
        };
        let registration: Registration = entity.into();
        assert_eq!(registration.status, RegistrationStatus::Waitlisted);
        assert_eq!(registration.contact.name.as_deref(), Some("Jane"));
        assert_eq!(registration.answers[0].question_id, question_id);
        assert_eq!(registration.queue_seq, 9);
    }
}
