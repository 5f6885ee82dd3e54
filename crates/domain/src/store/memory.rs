//! In-memory store backed by a single arena.
//!
//! Per-event exclusivity uses a keyed `tokio::sync::Mutex`; transactions
//! buffer their writes and apply them to the arena on commit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use super::{AdmissionStore, EventTransaction, StoreError};
use crate::models::{
    AdmissionCounts, CheckIn, Event, EventFilter, EventMember, EventQuestion, EventRole,
    Registration, RegistrationStatus,
};

/// Default time to wait for an event lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Arena {
    events: HashMap<Uuid, Event>,
    slugs: HashMap<String, Uuid>,
    questions: HashMap<Uuid, Vec<EventQuestion>>,
    members: HashMap<(Uuid, String), EventMember>,
    registrations: HashMap<Uuid, Registration>,
    by_event_user: HashMap<(Uuid, String), Uuid>,
    by_event: HashMap<Uuid, Vec<Uuid>>,
    /// Keyed by registration id.
    check_ins: HashMap<Uuid, CheckIn>,
}

impl Arena {
    fn event_registrations(&self, event_id: Uuid) -> impl Iterator<Item = &Registration> {
        self.by_event
            .get(&event_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.registrations.get(id))
    }

    fn put_registration(&mut self, registration: Registration) {
        let key = (registration.event_id, registration.user_id.clone());
        if !self.by_event_user.contains_key(&key) {
            self.by_event
                .entry(registration.event_id)
                .or_default()
                .push(registration.id);
        }
        self.by_event_user.insert(key, registration.id);
        self.registrations.insert(registration.id, registration);
    }

    fn remove_event(&mut self, event_id: Uuid) {
        if let Some(ids) = self.by_event.remove(&event_id) {
            for id in ids {
                self.check_ins.remove(&id);
                if let Some(registration) = self.registrations.remove(&id) {
                    self.by_event_user.remove(&(event_id, registration.user_id));
                }
            }
        }
        self.questions.remove(&event_id);
        self.members.retain(|(id, _), _| *id != event_id);
        if let Some(event) = self.events.remove(&event_id) {
            self.slugs.remove(&event.slug);
        }
    }
}

struct Shared {
    arena: Mutex<Arena>,
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
    sequence: AtomicI64,
    lock_timeout: Duration,
}

impl Shared {
    fn arena(&self) -> Result<MutexGuard<'_, Arena>, StoreError> {
        self.arena
            .lock()
            .map_err(|_| StoreError::Backend("arena lock poisoned".to_string()))
    }
}

/// Store used for tests and single-process deployments.
#[derive(Clone)]
pub struct InMemoryAdmissionStore {
    inner: Arc<Shared>,
}

impl Default for InMemoryAdmissionStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl InMemoryAdmissionStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Shared {
                arena: Mutex::new(Arena::default()),
                locks: Mutex::new(HashMap::new()),
                sequence: AtomicI64::new(0),
                lock_timeout,
            }),
        }
    }

    fn event_mutex(&self, event_id: Uuid) -> Result<Arc<tokio::sync::Mutex<()>>, StoreError> {
        let mut locks = self
            .inner
            .locks
            .lock()
            .map_err(|_| StoreError::Backend("lock table poisoned".to_string()))?;
        Ok(locks.entry(event_id).or_default().clone())
    }

    #[cfg(test)]
    fn lock_table_len(&self) -> usize {
        self.inner.locks.lock().map(|locks| locks.len()).unwrap_or_default()
    }
}

impl Shared {
    /// Drops the lock entry of an event that no longer exists.
    fn forget_lock(&self, event_id: Uuid) {
        if let Ok(mut locks) = self.locks.lock() {
            locks.remove(&event_id);
        }
    }
}

#[async_trait]
impl AdmissionStore for InMemoryAdmissionStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.arena().map(|_| ())
    }

    async fn lock_event(
        &self,
        event_id: Uuid,
    ) -> Result<Option<Box<dyn EventTransaction>>, StoreError> {
        if !self.inner.arena()?.events.contains_key(&event_id) {
            return Ok(None);
        }

        let mutex = self.event_mutex(event_id)?;
        let guard = tokio::time::timeout(self.inner.lock_timeout, mutex.lock_owned())
            .await
            .map_err(|_| StoreError::Contention(format!("lock timeout on event {}", event_id)))?;

        // Deleted while we waited.
        let Some(event) = self.inner.arena()?.events.get(&event_id).cloned() else {
            self.inner.forget_lock(event_id);
            return Ok(None);
        };

        Ok(Some(Box::new(MemoryEventTransaction {
            shared: self.inner.clone(),
            _guard: guard,
            event,
            event_dirty: false,
            pending: HashMap::new(),
            pending_check_ins: HashMap::new(),
            deleted: false,
        })))
    }

    async fn insert_event(
        &self,
        event: &Event,
        questions: &[EventQuestion],
        host: &EventMember,
    ) -> Result<(), StoreError> {
        let mut arena = self.inner.arena()?;
        if arena.slugs.contains_key(&event.slug) {
            return Err(StoreError::UniqueViolation(format!("slug {}", event.slug)));
        }
        if arena.events.contains_key(&event.id) {
            return Err(StoreError::UniqueViolation(format!("event {}", event.id)));
        }
        let mut questions = questions.to_vec();
        questions.sort_by_key(|q| q.order);

        arena.slugs.insert(event.slug.clone(), event.id);
        arena.events.insert(event.id, event.clone());
        arena.questions.insert(event.id, questions);
        arena
            .members
            .insert((host.event_id, host.user_id.clone()), host.clone());
        Ok(())
    }

    async fn find_event(&self, event_id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.inner.arena()?.events.get(&event_id).cloned())
    }

    async fn find_event_by_slug(&self, slug: &str) -> Result<Option<Event>, StoreError> {
        let arena = self.inner.arena()?;
        Ok(arena
            .slugs
            .get(slug)
            .and_then(|id| arena.events.get(id))
            .cloned())
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let arena = self.inner.arena()?;
        let mut events: Vec<Event> = arena
            .events
            .values()
            .filter(|e| filter.status.map_or(true, |s| e.status == s))
            .filter(|e| {
                filter
                    .member
                    .as_ref()
                    .map_or(true, |user| arena.members.contains_key(&(e.id, user.clone())))
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.start_date, e.id));
        Ok(events)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, StoreError> {
        Ok(self.inner.arena()?.slugs.contains_key(slug))
    }

    async fn questions(&self, event_id: Uuid) -> Result<Vec<EventQuestion>, StoreError> {
        Ok(self
            .inner
            .arena()?
            .questions
            .get(&event_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn member_role(
        &self,
        event_id: Uuid,
        user_id: &str,
    ) -> Result<Option<EventRole>, StoreError> {
        Ok(self
            .inner
            .arena()?
            .members
            .get(&(event_id, user_id.to_string()))
            .map(|m| m.role))
    }

    async fn add_member(&self, member: &EventMember) -> Result<EventMember, StoreError> {
        let mut arena = self.inner.arena()?;
        if !arena.events.contains_key(&member.event_id) {
            return Err(StoreError::NotFound(format!("event {}", member.event_id)));
        }
        Ok(arena
            .members
            .entry((member.event_id, member.user_id.clone()))
            .or_insert_with(|| member.clone())
            .clone())
    }

    async fn find_registration(
        &self,
        event_id: Uuid,
        user_id: &str,
    ) -> Result<Option<Registration>, StoreError> {
        let arena = self.inner.arena()?;
        Ok(arena
            .by_event_user
            .get(&(event_id, user_id.to_string()))
            .and_then(|id| arena.registrations.get(id))
            .cloned())
    }

    async fn find_registration_by_id(&self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        Ok(self.inner.arena()?.registrations.get(&id).cloned())
    }

    async fn list_registrations(
        &self,
        event_id: Uuid,
        statuses: &[RegistrationStatus],
    ) -> Result<Vec<Registration>, StoreError> {
        let arena = self.inner.arena()?;
        let mut registrations: Vec<Registration> = arena
            .event_registrations(event_id)
            .filter(|r| statuses.contains(&r.status))
            .cloned()
            .collect();
        registrations.sort_by_key(|r| (r.created_at, r.id));
        Ok(registrations)
    }

    async fn list_check_ins(&self, event_id: Uuid) -> Result<Vec<CheckIn>, StoreError> {
        let arena = self.inner.arena()?;
        let mut check_ins: Vec<CheckIn> = arena
            .check_ins
            .values()
            .filter(|c| c.event_id == event_id)
            .cloned()
            .collect();
        check_ins.sort_by_key(|c| c.checked_in_at);
        Ok(check_ins)
    }

    async fn admission_counts(&self, event_id: Uuid) -> Result<AdmissionCounts, StoreError> {
        let arena = self.inner.arena()?;
        let mut counts = AdmissionCounts::default();
        for registration in arena.event_registrations(event_id) {
            match registration.status {
                RegistrationStatus::Confirmed => {
                    counts.confirmed += 1;
                    counts.reserved_slots += registration.guest_count as i64;
                }
                RegistrationStatus::Waitlisted => counts.waitlisted += 1,
                RegistrationStatus::Cancelled => {}
            }
        }
        counts.checked_in = arena
            .check_ins
            .values()
            .filter(|c| c.event_id == event_id)
            .count() as i64;
        Ok(counts)
    }

    async fn events_with_waitlist(&self) -> Result<Vec<Uuid>, StoreError> {
        let arena = self.inner.arena()?;
        let mut ids: Vec<Uuid> = arena
            .events
            .values()
            .filter(|e| e.status.accepts_registrations())
            .filter(|e| {
                arena
                    .event_registrations(e.id)
                    .any(|r| r.status == RegistrationStatus::Waitlisted)
            })
            .map(|e| e.id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

struct MemoryEventTransaction {
    shared: Arc<Shared>,
    _guard: OwnedMutexGuard<()>,
    event: Event,
    event_dirty: bool,
    /// Registrations written in this transaction, keyed by id.
    pending: HashMap<Uuid, Registration>,
    /// Check-ins written in this transaction, keyed by registration id.
    pending_check_ins: HashMap<Uuid, CheckIn>,
    deleted: bool,
}

impl MemoryEventTransaction {
    /// Committed registrations of the event overlaid with pending writes.
    fn registrations(&self) -> Result<Vec<Registration>, StoreError> {
        if self.deleted {
            return Ok(Vec::new());
        }
        let arena = self.shared.arena()?;
        let mut view: Vec<Registration> = arena
            .event_registrations(self.event.id)
            .map(|r| self.pending.get(&r.id).unwrap_or(r).clone())
            .collect();
        for registration in self.pending.values() {
            if !arena.registrations.contains_key(&registration.id) {
                view.push(registration.clone());
            }
        }
        Ok(view)
    }
}

#[async_trait]
impl EventTransaction for MemoryEventTransaction {
    fn event(&self) -> &Event {
        &self.event
    }

    async fn questions(&mut self) -> Result<Vec<EventQuestion>, StoreError> {
        Ok(self
            .shared
            .arena()?
            .questions
            .get(&self.event.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn reserved_slots(&mut self) -> Result<i64, StoreError> {
        Ok(self
            .registrations()?
            .iter()
            .map(Registration::reserved_slots)
            .sum())
    }

    async fn find_registration(
        &mut self,
        user_id: &str,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .registrations()?
            .into_iter()
            .find(|r| r.user_id == user_id))
    }

    async fn waitlisted(&mut self) -> Result<Vec<Registration>, StoreError> {
        let mut waitlisted: Vec<Registration> = self
            .registrations()?
            .into_iter()
            .filter(|r| r.status == RegistrationStatus::Waitlisted)
            .collect();
        waitlisted.sort_by_key(Registration::queue_key);
        Ok(waitlisted)
    }

    async fn next_sequence(&mut self) -> Result<i64, StoreError> {
        Ok(self.shared.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn save_registration(&mut self, registration: &Registration) -> Result<(), StoreError> {
        if registration.event_id != self.event.id {
            return Err(StoreError::Backend(format!(
                "registration {} belongs to another event",
                registration.id
            )));
        }
        let duplicate = self
            .registrations()?
            .iter()
            .any(|r| r.user_id == registration.user_id && r.id != registration.id);
        if duplicate {
            return Err(StoreError::UniqueViolation(format!(
                "registration for user {}",
                registration.user_id
            )));
        }
        self.pending.insert(registration.id, registration.clone());
        Ok(())
    }

    async fn registration_by_id(&mut self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        Ok(self.registrations()?.into_iter().find(|r| r.id == id))
    }

    async fn find_check_in(
        &mut self,
        registration_id: Uuid,
    ) -> Result<Option<CheckIn>, StoreError> {
        if self.deleted {
            return Ok(None);
        }
        if let Some(check_in) = self.pending_check_ins.get(&registration_id) {
            return Ok(Some(check_in.clone()));
        }
        Ok(self
            .shared
            .arena()?
            .check_ins
            .get(&registration_id)
            .filter(|c| c.event_id == self.event.id)
            .cloned())
    }

    async fn insert_check_in(&mut self, check_in: &CheckIn) -> Result<(), StoreError> {
        if self.registration_by_id(check_in.registration_id).await?.is_none() {
            return Err(StoreError::NotFound(format!(
                "registration {}",
                check_in.registration_id
            )));
        }
        if self.find_check_in(check_in.registration_id).await?.is_some() {
            return Err(StoreError::UniqueViolation(format!(
                "check-in for registration {}",
                check_in.registration_id
            )));
        }
        self.pending_check_ins
            .insert(check_in.registration_id, check_in.clone());
        Ok(())
    }

    async fn update_event(&mut self, event: &Event) -> Result<(), StoreError> {
        if event.id != self.event.id || event.slug != self.event.slug {
            return Err(StoreError::Backend("event identity cannot change".to_string()));
        }
        self.event = event.clone();
        self.event_dirty = true;
        Ok(())
    }

    async fn delete_event_cascade(&mut self) -> Result<(), StoreError> {
        self.pending.clear();
        self.pending_check_ins.clear();
        self.event_dirty = false;
        self.deleted = true;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let event_id = this.event.id;
        {
            let mut arena = this.shared.arena()?;
            if this.deleted {
                arena.remove_event(event_id);
            } else {
                if this.event_dirty {
                    arena.events.insert(event_id, this.event);
                }
                for (_, registration) in this.pending {
                    arena.put_registration(registration);
                }
                arena.check_ins.extend(this.pending_check_ins);
            }
        }
        if this.deleted {
            this.shared.forget_lock(event_id);
        }
        Ok(())
    }
}
