//! Event, question and membership entities.

use chrono::{DateTime, Utc};
use domain::models::{Event, EventMember, EventQuestion, EventRole, EventStatus, QuestionType};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for event_status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "lowercase")]
pub enum EventStatusDb {
    Draft,
    Published,
    Cancelled,
    Completed,
}

impl From<EventStatusDb> for EventStatus {
    fn from(db: EventStatusDb) -> Self {
        match db {
            EventStatusDb::Draft => Self::Draft,
            EventStatusDb::Published => Self::Published,
            EventStatusDb::Cancelled => Self::Cancelled,
            EventStatusDb::Completed => Self::Completed,
        }
    }
}

impl From<EventStatus> for EventStatusDb {
    fn from(status: EventStatus) -> Self {
        match status {
            EventStatus::Draft => Self::Draft,
            EventStatus::Published => Self::Published,
            EventStatus::Cancelled => Self::Cancelled,
            EventStatus::Completed => Self::Completed,
        }
    }
}

/// Database enum for event_role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "event_role", rename_all = "lowercase")]
pub enum EventRoleDb {
    Host,
    Staff,
}

impl From<EventRoleDb> for EventRole {
    fn from(db: EventRoleDb) -> Self {
        match db {
            EventRoleDb::Host => Self::Host,
            EventRoleDb::Staff => Self::Staff,
        }
    }
}

impl From<EventRole> for EventRoleDb {
    fn from(role: EventRole) -> Self {
        match role {
            EventRole::Host => Self::Host,
            EventRole::Staff => Self::Staff,
        }
    }
}

/// Database enum for question_type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "question_type", rename_all = "snake_case")]
pub enum QuestionTypeDb {
    Text,
    Email,
    Phone,
    Number,
    Select,
    MultipleChoice,
    Checkbox,
}

impl From<QuestionTypeDb> for QuestionType {
    fn from(db: QuestionTypeDb) -> Self {
        match db {
            QuestionTypeDb::Text => Self::Text,
            QuestionTypeDb::Email => Self::Email,
            QuestionTypeDb::Phone => Self::Phone,
            QuestionTypeDb::Number => Self::Number,
            QuestionTypeDb::Select => Self::Select,
            QuestionTypeDb::MultipleChoice => Self::MultipleChoice,
            QuestionTypeDb::Checkbox => Self::Checkbox,
        }
    }
}

impl From<QuestionType> for QuestionTypeDb {
    fn from(kind: QuestionType) -> Self {
        match kind {
            QuestionType::Text => Self::Text,
            QuestionType::Email => Self::Email,
            QuestionType::Phone => Self::Phone,
            QuestionType::Number => Self::Number,
            QuestionType::Select => Self::Select,
            QuestionType::MultipleChoice => Self::MultipleChoice,
            QuestionType::Checkbox => Self::Checkbox,
        }
    }
}

/// Database row mapping for the events table.
#[derive(Debug, Clone, FromRow)]
pub struct EventEntity {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub status: EventStatusDb,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EventEntity> for Event {
    fn from(entity: EventEntity) -> Self {
        Self {
            id: entity.id,
            slug: entity.slug,
            title: entity.title,
            description: entity.description,
            location: entity.location,
            start_date: entity.start_date,
            end_date: entity.end_date,
            capacity: entity.capacity,
            status: entity.status.into(),
            created_by: entity.created_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the event_questions table.
#[derive(Debug, Clone, FromRow)]
pub struct EventQuestionEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub question: String,
    pub question_type: QuestionTypeDb,
    pub is_required: bool,
    pub options: Option<String>,
    pub sort_order: i32,
}

impl From<EventQuestionEntity> for EventQuestion {
    fn from(entity: EventQuestionEntity) -> Self {
        Self {
            id: entity.id,
            event_id: entity.event_id,
            question: entity.question,
            question_type: entity.question_type.into(),
            is_required: entity.is_required,
            options: entity.options,
            order: entity.sort_order,
        }
    }
}

/// Database row mapping for the event_members table.
#[derive(Debug, Clone, FromRow)]
pub struct EventMemberEntity {
    pub event_id: Uuid,
    pub user_id: String,
    pub role: EventRoleDb,
    pub created_at: DateTime<Utc>,
}

impl From<EventMemberEntity> for EventMember {
    fn from(entity: EventMemberEntity) -> Self {
        Self {
            event_id: entity.event_id,
            user_id: entity.user_id,
            role: entity.role.into(),
            created_at: entity.created_at,
        }
    }
}
