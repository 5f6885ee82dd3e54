//! Event management: lifecycle, capacity changes, staff and host views.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use shared::slug::{is_valid_slug, slugify, with_random_suffix};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::ledger::CapacityLedger;
use super::promoter::{promote_in, record_promotions, WaitlistPromoter};
use super::retry::RetryPolicy;
use crate::errors::AdmissionError;
use crate::models::{
    AdmissionSummary, Attendee, CapacityUpdate, CreateEventRequest, Event, EventDetails,
    EventFilter, EventMember, EventQuestion, EventRole, EventStatus, Registration,
    RegistrationStatus, UpdateEventRequest,
};
use crate::store::{AdmissionStore, StoreError};

/// Attempts at finding a free slug before giving up.
const SLUG_ATTEMPTS: usize = 5;

/// Event administration for hosts and staff.
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn AdmissionStore>,
    promoter: WaitlistPromoter,
    retry: RetryPolicy,
}

impl EventService {
    pub fn new(store: Arc<dyn AdmissionStore>, promoter: WaitlistPromoter, retry: RetryPolicy) -> Self {
        Self {
            store,
            promoter,
            retry,
        }
    }

    /// Creates an event; the creator becomes its host.
    pub async fn create_event(
        &self,
        host_user_id: &str,
        request: CreateEventRequest,
    ) -> Result<EventDetails, AdmissionError> {
        request.validate()?;

        let now = Utc::now();
        let base_slug = slugify(&request.title);
        let status = if request.draft {
            EventStatus::Draft
        } else {
            EventStatus::Published
        };

        let mut event = Event {
            id: Uuid::new_v4(),
            slug: base_slug.clone(),
            title: request.title.trim().to_string(),
            description: request.description.clone(),
            location: request.location.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            capacity: request.capacity,
            status,
            created_by: host_user_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        let mut questions: Vec<EventQuestion> = request
            .questions
            .iter()
            .map(|q| EventQuestion {
                id: Uuid::new_v4(),
                event_id: event.id,
                question: q.question.clone(),
                question_type: q.question_type,
                is_required: q.is_required,
                options: q.options.clone(),
                order: q.order,
            })
            .collect();
        questions.sort_by_key(|q| q.order);
        let host = EventMember {
            event_id: event.id,
            user_id: host_user_id.to_string(),
            role: EventRole::Host,
            created_at: now,
        };

        for attempt in 0..SLUG_ATTEMPTS {
            if attempt > 0 || self.store.slug_exists(&event.slug).await? {
                event.slug = with_random_suffix(&base_slug);
            }
            match self.store.insert_event(&event, &questions, &host).await {
                Ok(()) => {
                    info!(
                        event_id = %event.id,
                        slug = %event.slug,
                        user_id = %host_user_id,
                        status = %event.status,
                        "Event created"
                    );
                    return Ok(EventDetails { event, questions });
                }
                Err(StoreError::UniqueViolation(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(AdmissionError::Conflict(
            "Could not allocate a unique slug".to_string(),
        ))
    }

    /// Looks an event up by id or by slug.
    pub async fn get_event(&self, id_or_slug: &str) -> Result<EventDetails, AdmissionError> {
        let event = match Uuid::parse_str(id_or_slug) {
            Ok(id) => self.store.find_event(id).await?,
            Err(_) if is_valid_slug(id_or_slug) => self.store.find_event_by_slug(id_or_slug).await?,
            Err(_) => None,
        }
        .ok_or_else(|| AdmissionError::NotFound("Event not found".to_string()))?;

        let questions = self.store.questions(event.id).await?;
        Ok(EventDetails { event, questions })
    }

    pub async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, AdmissionError> {
        Ok(self.store.list_events(filter).await?)
    }

    /// Updates event details. Capacity changes are applied under the event
    /// lock; raising or removing the limit promotes waiters in the same
    /// unit of work.
    pub async fn update_event(
        &self,
        event_id: Uuid,
        actor: &str,
        request: UpdateEventRequest,
    ) -> Result<Event, AdmissionError> {
        request.validate()?;
        self.require_host(event_id, actor).await?;

        let (event, promoted) = self
            .retry
            .run("update_event", || self.try_update(event_id, &request))
            .await?;

        record_promotions(event_id, &promoted);
        info!(event_id = %event_id, user_id = %actor, capacity = ?event.capacity, "Event updated");
        Ok(event)
    }

    async fn try_update(
        &self,
        event_id: Uuid,
        request: &UpdateEventRequest,
    ) -> Result<(Event, Vec<Registration>), AdmissionError> {
        let mut tx = self
            .store
            .lock_event(event_id)
            .await?
            .ok_or_else(|| AdmissionError::NotFound("Event not found".to_string()))?;

        let mut event = tx.event().clone();
        if let Some(title) = &request.title {
            event.title = title.trim().to_string();
        }
        if let Some(description) = &request.description {
            event.description = Some(description.clone());
        }
        if let Some(location) = &request.location {
            event.location = Some(location.clone());
        }
        if let Some(start_date) = request.start_date {
            event.start_date = start_date;
        }
        if let Some(end_date) = request.end_date {
            event.end_date = Some(end_date);
        }
        if event.end_date.is_some_and(|end| end < event.start_date) {
            return Err(AdmissionError::Validation(
                "end_date must not be before start_date".to_string(),
            ));
        }

        let previous = event.capacity;
        match request.capacity {
            CapacityUpdate::Unchanged => {}
            CapacityUpdate::Unlimited => event.capacity = None,
            CapacityUpdate::Limited(n) => {
                let reserved = CapacityLedger::open(tx.as_mut()).await?.reserved_slots();
                if (n as i64) < reserved {
                    return Err(AdmissionError::InvalidState(format!(
                        "Capacity {} is below the {} seats already confirmed",
                        n, reserved
                    )));
                }
                event.capacity = Some(n);
            }
        }
        let grew = match (previous, event.capacity) {
            (Some(_), None) => true,
            (Some(old), Some(new)) => new > old,
            _ => false,
        };

        event.updated_at = Utc::now();
        tx.update_event(&event).await?;
        let promoted = if grew {
            promote_in(tx.as_mut()).await?
        } else {
            Vec::new()
        };
        tx.commit().await?;
        Ok((event, promoted))
    }

    /// Moves an event through its lifecycle.
    pub async fn change_status(
        &self,
        event_id: Uuid,
        actor: &str,
        status: EventStatus,
    ) -> Result<Event, AdmissionError> {
        self.require_host(event_id, actor).await?;

        let event = self
            .retry
            .run("change_status", || self.try_change_status(event_id, status))
            .await?;

        info!(event_id = %event_id, user_id = %actor, status = %status, "Event status changed");
        Ok(event)
    }

    async fn try_change_status(
        &self,
        event_id: Uuid,
        status: EventStatus,
    ) -> Result<Event, AdmissionError> {
        let mut tx = self
            .store
            .lock_event(event_id)
            .await?
            .ok_or_else(|| AdmissionError::NotFound("Event not found".to_string()))?;

        let mut event = tx.event().clone();
        if !event.status.can_transition_to(status) {
            return Err(AdmissionError::InvalidState(format!(
                "Cannot move event from {} to {}",
                event.status, status
            )));
        }
        event.status = status;
        event.updated_at = Utc::now();
        tx.update_event(&event).await?;
        tx.commit().await?;
        Ok(event)
    }

    /// Deletes the event and everything attached to it.
    pub async fn delete_event(&self, event_id: Uuid, actor: &str) -> Result<(), AdmissionError> {
        self.require_host(event_id, actor).await?;

        self.retry
            .run("delete_event", || self.try_delete(event_id))
            .await?;

        info!(event_id = %event_id, user_id = %actor, "Event deleted");
        Ok(())
    }

    async fn try_delete(&self, event_id: Uuid) -> Result<(), AdmissionError> {
        let mut tx = self
            .store
            .lock_event(event_id)
            .await?
            .ok_or_else(|| AdmissionError::NotFound("Event not found".to_string()))?;
        tx.delete_event_cascade().await?;
        tx.commit().await?;
        Ok(())
    }

    /// Grants `user_id` the staff role. Existing members keep their role.
    pub async fn add_staff(
        &self,
        event_id: Uuid,
        actor: &str,
        user_id: &str,
    ) -> Result<EventMember, AdmissionError> {
        self.require_host(event_id, actor).await?;

        let member = self
            .store
            .add_member(&EventMember {
                event_id,
                user_id: user_id.to_string(),
                role: EventRole::Staff,
                created_at: Utc::now(),
            })
            .await?;

        info!(event_id = %event_id, user_id = %user_id, role = %member.role, "Event member added");
        Ok(member)
    }

    /// Confirmed and waitlisted registrations with their check-ins.
    pub async fn attendees(&self, event_id: Uuid, actor: &str) -> Result<Vec<Attendee>, AdmissionError> {
        self.require_staff(event_id, actor).await?;

        let registrations = self
            .store
            .list_registrations(
                event_id,
                &[RegistrationStatus::Confirmed, RegistrationStatus::Waitlisted],
            )
            .await?;
        let mut check_ins: HashMap<Uuid, _> = self
            .store
            .list_check_ins(event_id)
            .await?
            .into_iter()
            .map(|c| (c.registration_id, c))
            .collect();

        Ok(registrations
            .into_iter()
            .map(|registration| Attendee {
                check_in: check_ins.remove(&registration.id),
                registration,
            })
            .collect())
    }

    /// Admission counts for hosts and staff.
    pub async fn summary(&self, event_id: Uuid, actor: &str) -> Result<AdmissionSummary, AdmissionError> {
        let event = self.require_staff(event_id, actor).await?;
        let counts = self.store.admission_counts(event_id).await?;
        Ok(AdmissionSummary::new(event_id, event.capacity, counts))
    }

    /// Runs a promotion pass on request of the host.
    pub async fn promote(&self, event_id: Uuid, actor: &str) -> Result<Vec<Registration>, AdmissionError> {
        self.require_host(event_id, actor).await?;
        self.promoter.promote(event_id).await
    }

    /// Requires the host role; returns the event.
    pub async fn require_host(&self, event_id: Uuid, user_id: &str) -> Result<Event, AdmissionError> {
        self.require_role(event_id, user_id, EventRole::can_manage_event)
            .await
    }

    /// Requires the host or staff role; returns the event.
    pub async fn require_staff(&self, event_id: Uuid, user_id: &str) -> Result<Event, AdmissionError> {
        self.require_role(event_id, user_id, EventRole::can_check_in)
            .await
    }

    async fn require_role(
        &self,
        event_id: Uuid,
        user_id: &str,
        allowed: fn(&EventRole) -> bool,
    ) -> Result<Event, AdmissionError> {
        let event = self
            .store
            .find_event(event_id)
            .await?
            .ok_or_else(|| AdmissionError::NotFound("Event not found".to_string()))?;

        match self.store.member_role(event_id, user_id).await? {
            Some(role) if allowed(&role) => Ok(event),
            _ => Err(AdmissionError::Forbidden(
                "You do not have permission to manage this event".to_string(),
            )),
        }
    }
}
