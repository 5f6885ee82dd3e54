//! PostgreSQL implementation of the admission store.
//!
//! Event transactions take a `SELECT ... FOR UPDATE` row lock on the event
//! with `lock_timeout` bounded per transaction, so concurrent writers for the
//! same event serialize and a stuck lock surfaces as contention.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use domain::models::{
    AdmissionCounts, CheckIn, Event, EventFilter, EventMember, EventQuestion, EventRole,
    Registration, RegistrationStatus,
};
use domain::store::{AdmissionStore, EventTransaction, StoreError};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::entities::EventStatusDb;
use crate::error::store_error;
use crate::metrics::record_lock_wait;
use crate::repositories::{CheckInRepository, EventRepository, RegistrationRepository};

/// Admission store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgAdmissionStore {
    pool: PgPool,
    lock_timeout: Duration,
    events: EventRepository,
    registrations: RegistrationRepository,
    check_ins: CheckInRepository,
}

impl PgAdmissionStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self {
            events: EventRepository::new(pool.clone()),
            registrations: RegistrationRepository::new(pool.clone()),
            check_ins: CheckInRepository::new(pool.clone()),
            pool,
            lock_timeout,
        }
    }
}

#[async_trait]
impl AdmissionStore for PgAdmissionStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(store_error)
    }

    async fn lock_event(
        &self,
        event_id: Uuid,
    ) -> Result<Option<Box<dyn EventTransaction>>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        EventRepository::set_lock_timeout(&mut tx, self.lock_timeout.as_millis() as u64)
            .await
            .map_err(store_error)?;

        let started = Instant::now();
        let locked = EventRepository::lock_for_update(&mut tx, event_id)
            .await
            .map_err(store_error);
        record_lock_wait(
            started.elapsed().as_secs_f64(),
            !matches!(locked, Err(StoreError::Contention(_))),
        );

        let Some(entity) = locked? else {
            return Ok(None);
        };

        Ok(Some(Box::new(PgEventTransaction {
            tx,
            event: entity.into(),
        })))
    }

    async fn insert_event(
        &self,
        event: &Event,
        questions: &[EventQuestion],
        host: &EventMember,
    ) -> Result<(), StoreError> {
        self.events
            .insert_with_host(event, questions, host)
            .await
            .map_err(store_error)
    }

    async fn find_event(&self, event_id: Uuid) -> Result<Option<Event>, StoreError> {
        let entity = self.events.find_by_id(event_id).await.map_err(store_error)?;
        Ok(entity.map(Into::into))
    }

    async fn find_event_by_slug(&self, slug: &str) -> Result<Option<Event>, StoreError> {
        let entity = self.events.find_by_slug(slug).await.map_err(store_error)?;
        Ok(entity.map(Into::into))
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let entities = self
            .events
            .list(
                filter.status.map(EventStatusDb::from),
                filter.member.as_deref(),
            )
            .await
            .map_err(store_error)?;
        Ok(entities.into_iter().map(Into::into).collect())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, StoreError> {
        self.events.slug_exists(slug).await.map_err(store_error)
    }

    async fn questions(&self, event_id: Uuid) -> Result<Vec<EventQuestion>, StoreError> {
        let entities = self.events.questions(event_id).await.map_err(store_error)?;
        Ok(entities.into_iter().map(Into::into).collect())
    }

    async fn member_role(
        &self,
        event_id: Uuid,
        user_id: &str,
    ) -> Result<Option<EventRole>, StoreError> {
        let role = self
            .events
            .member_role(event_id, user_id)
            .await
            .map_err(store_error)?;
        Ok(role.map(Into::into))
    }

    async fn add_member(&self, member: &EventMember) -> Result<EventMember, StoreError> {
        let entity = self.events.add_member(member).await.map_err(store_error)?;
        Ok(entity.into())
    }

    async fn find_registration(
        &self,
        event_id: Uuid,
        user_id: &str,
    ) -> Result<Option<Registration>, StoreError> {
        let entity = self
            .registrations
            .find_by_event_user(event_id, user_id)
            .await
            .map_err(store_error)?;
        Ok(entity.map(Into::into))
    }

    async fn find_registration_by_id(&self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        let entity = self
            .registrations
            .find_by_id(id)
            .await
            .map_err(store_error)?;
        Ok(entity.map(Into::into))
    }

    async fn list_registrations(
        &self,
        event_id: Uuid,
        statuses: &[RegistrationStatus],
    ) -> Result<Vec<Registration>, StoreError> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let entities = self
            .registrations
            .list_by_statuses(event_id, &statuses)
            .await
            .map_err(store_error)?;
        Ok(entities.into_iter().map(Into::into).collect())
    }

    async fn list_check_ins(&self, event_id: Uuid) -> Result<Vec<CheckIn>, StoreError> {
        let entities = self
            .check_ins
            .list_by_event(event_id)
            .await
            .map_err(store_error)?;
        Ok(entities.into_iter().map(Into::into).collect())
    }

    async fn admission_counts(&self, event_id: Uuid) -> Result<AdmissionCounts, StoreError> {
        let (confirmed, waitlisted, reserved_slots, checked_in) = self
            .registrations
            .admission_counts(event_id)
            .await
            .map_err(store_error)?;
        Ok(AdmissionCounts {
            confirmed,
            waitlisted,
            checked_in,
            reserved_slots,
        })
    }

    async fn events_with_waitlist(&self) -> Result<Vec<Uuid>, StoreError> {
        self.events.with_waitlist().await.map_err(store_error)
    }
}

/// Database transaction holding the row lock of one event.
///
/// Dropping it without calling `commit` rolls back.
pub struct PgEventTransaction {
    tx: Transaction<'static, Postgres>,
    event: Event,
}

#[async_trait]
impl EventTransaction for PgEventTransaction {
    fn event(&self) -> &Event {
        &self.event
    }

    async fn questions(&mut self) -> Result<Vec<EventQuestion>, StoreError> {
        let entities = EventRepository::questions_with(&mut *self.tx, self.event.id)
            .await
            .map_err(store_error)?;
        Ok(entities.into_iter().map(Into::into).collect())
    }

    async fn reserved_slots(&mut self) -> Result<i64, StoreError> {
        RegistrationRepository::reserved_slots(&mut self.tx, self.event.id)
            .await
            .map_err(store_error)
    }

    async fn find_registration(
        &mut self,
        user_id: &str,
    ) -> Result<Option<Registration>, StoreError> {
        let entity =
            RegistrationRepository::find_by_event_user_with(&mut *self.tx, self.event.id, user_id)
                .await
                .map_err(store_error)?;
        Ok(entity.map(Into::into))
    }

    async fn waitlisted(&mut self) -> Result<Vec<Registration>, StoreError> {
        let entities = RegistrationRepository::waitlisted(&mut self.tx, self.event.id)
            .await
            .map_err(store_error)?;
        Ok(entities.into_iter().map(Into::into).collect())
    }

    async fn next_sequence(&mut self) -> Result<i64, StoreError> {
        RegistrationRepository::next_sequence(&mut self.tx)
            .await
            .map_err(store_error)
    }

    async fn save_registration(&mut self, registration: &Registration) -> Result<(), StoreError> {
        RegistrationRepository::upsert(&mut self.tx, registration)
            .await
            .map_err(store_error)
    }

    async fn registration_by_id(&mut self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        let entity = RegistrationRepository::find_in_event(&mut self.tx, self.event.id, id)
            .await
            .map_err(store_error)?;
        Ok(entity.map(Into::into))
    }

    async fn find_check_in(
        &mut self,
        registration_id: Uuid,
    ) -> Result<Option<CheckIn>, StoreError> {
        let entity = CheckInRepository::find_by_registration(&mut self.tx, registration_id)
            .await
            .map_err(store_error)?;
        Ok(entity.map(Into::into))
    }

    async fn insert_check_in(&mut self, check_in: &CheckIn) -> Result<(), StoreError> {
        CheckInRepository::insert(&mut self.tx, check_in)
            .await
            .map_err(store_error)
    }

    async fn update_event(&mut self, event: &Event) -> Result<(), StoreError> {
        EventRepository::update(&mut self.tx, event)
            .await
            .map_err(store_error)?;
        self.event = event.clone();
        Ok(())
    }

    async fn delete_event_cascade(&mut self) -> Result<(), StoreError> {
        EventRepository::delete_cascade(&mut self.tx, self.event.id)
            .await
            .map_err(store_error)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(store_error)
    }
}
