//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod check_in;
pub mod event;
pub mod registration;

pub use check_in::CheckInEntity;
pub use event::{
    EventEntity, EventMemberEntity, EventQuestionEntity, EventRoleDb, EventStatusDb,
    QuestionTypeDb,
};
pub use registration::{RegistrationEntity, RegistrationStatusDb};
