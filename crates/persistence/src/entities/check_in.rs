//! Check-in entity.

use chrono::{DateTime, Utc};
use domain::models::CheckIn;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the check_ins table.
#[derive(Debug, Clone, FromRow)]
pub struct CheckInEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub registration_id: Uuid,
    pub user_id: String,
    pub checked_in_by: String,
    pub checked_in_at: DateTime<Utc>,
}

impl From<CheckInEntity> for CheckIn {
    fn from(entity: CheckInEntity) -> Self {
        Self {
            id: entity.id,
            event_id: entity.event_id,
            registration_id: entity.registration_id,
            user_id: entity.user_id,
            checked_in_by: entity.checked_in_by,
            checked_in_at: entity.checked_in_at,
        }
    }
}
