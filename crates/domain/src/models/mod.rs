//! Domain models for event registration.

pub mod check_in;
pub mod event;
pub mod registration;
pub mod summary;

pub use check_in::{CheckIn, CheckInOutcome, CheckInRequest};
pub use event::{
    AddStaffRequest, CapacityUpdate, ChangeEventStatusRequest, CreateEventQuestionRequest,
    CreateEventRequest, Event, EventDetails, EventFilter, EventMember, EventQuestion, EventRole,
    EventStatus, QuestionType, UpdateEventRequest,
};
pub use registration::{
    Attendee, ContactFields, RegisterRequest, Registration, RegistrationAnswer,
    RegistrationStatus,
};
pub use summary::{AdmissionCounts, AdmissionSummary};
