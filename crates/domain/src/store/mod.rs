//! Storage ports for the admission engine.
//!
//! Every capacity-relevant read-decide-write runs inside an
//! [`EventTransaction`], which holds an exclusive lock on one event until it
//! is committed or dropped. Dropping a transaction without committing
//! discards its writes.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AdmissionCounts, CheckIn, Event, EventFilter, EventMember, EventQuestion, EventRole,
    Registration, RegistrationStatus,
};

pub use memory::InMemoryAdmissionStore;

/// Errors reported by a store backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Lock timeout, serialization failure or deadlock. Safe to retry.
    #[error("contention: {0}")]
    Contention(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Exclusive unit of work over a single event.
#[async_trait]
pub trait EventTransaction: Send {
    /// The event row as read under the lock.
    fn event(&self) -> &Event;

    async fn questions(&mut self) -> Result<Vec<EventQuestion>, StoreError>;

    /// Sum of `guest_count` over confirmed registrations.
    async fn reserved_slots(&mut self) -> Result<i64, StoreError>;

    async fn find_registration(&mut self, user_id: &str)
        -> Result<Option<Registration>, StoreError>;

    /// Waitlisted registrations ordered by `(queued_at, queue_seq)`.
    async fn waitlisted(&mut self) -> Result<Vec<Registration>, StoreError>;

    /// Next value of the store-wide queue sequence.
    async fn next_sequence(&mut self) -> Result<i64, StoreError>;

    /// Inserts or replaces a registration by id, answers included.
    async fn save_registration(&mut self, registration: &Registration) -> Result<(), StoreError>;

    /// A registration of this event by id.
    async fn registration_by_id(&mut self, id: Uuid) -> Result<Option<Registration>, StoreError>;

    async fn find_check_in(&mut self, registration_id: Uuid)
        -> Result<Option<CheckIn>, StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] if the registration is already checked in.
    async fn insert_check_in(&mut self, check_in: &CheckIn) -> Result<(), StoreError>;

    async fn update_event(&mut self, event: &Event) -> Result<(), StoreError>;

    /// Removes the event with its check-ins, registrations, questions and members.
    async fn delete_event_cascade(&mut self) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Persistence port used by the domain services.
#[async_trait]
pub trait AdmissionStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    /// Opens an exclusive transaction on the event, or `None` if it does not exist.
    ///
    /// Fails with [`StoreError::Contention`] when the lock cannot be acquired
    /// within the store's lock timeout.
    async fn lock_event(&self, event_id: Uuid)
        -> Result<Option<Box<dyn EventTransaction>>, StoreError>;

    /// Stores a new event with its questions and host membership.
    async fn insert_event(
        &self,
        event: &Event,
        questions: &[EventQuestion],
        host: &EventMember,
    ) -> Result<(), StoreError>;

    async fn find_event(&self, event_id: Uuid) -> Result<Option<Event>, StoreError>;

    async fn find_event_by_slug(&self, slug: &str) -> Result<Option<Event>, StoreError>;

    /// Events matching the filter ordered by start date.
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError>;

    async fn slug_exists(&self, slug: &str) -> Result<bool, StoreError>;

    /// Questions of an event ordered by `order`.
    async fn questions(&self, event_id: Uuid) -> Result<Vec<EventQuestion>, StoreError>;

    async fn member_role(&self, event_id: Uuid, user_id: &str)
        -> Result<Option<EventRole>, StoreError>;

    /// Adds a membership unless the user already holds a role; returns the stored one.
    async fn add_member(&self, member: &EventMember) -> Result<EventMember, StoreError>;

    async fn find_registration(
        &self,
        event_id: Uuid,
        user_id: &str,
    ) -> Result<Option<Registration>, StoreError>;

    async fn find_registration_by_id(&self, id: Uuid) -> Result<Option<Registration>, StoreError>;

    /// Registrations in the given statuses ordered by creation time.
    async fn list_registrations(
        &self,
        event_id: Uuid,
        statuses: &[RegistrationStatus],
    ) -> Result<Vec<Registration>, StoreError>;

    async fn list_check_ins(&self, event_id: Uuid) -> Result<Vec<CheckIn>, StoreError>;

    async fn admission_counts(&self, event_id: Uuid) -> Result<AdmissionCounts, StoreError>;

    /// Published events that currently have at least one waitlisted registration.
    async fn events_with_waitlist(&self) -> Result<Vec<Uuid>, StoreError>;
}
