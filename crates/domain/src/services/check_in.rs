//! Door check-in tracking.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::retry::RetryPolicy;
use crate::errors::AdmissionError;
use crate::models::{CheckIn, CheckInOutcome, RegistrationStatus};
use crate::store::AdmissionStore;

/// Records arrivals. Checking in twice returns the first record.
///
/// The status check and the insert run under the event lock, so a
/// registration cancelled concurrently is never checked in.
#[derive(Clone)]
pub struct CheckInTracker {
    store: Arc<dyn AdmissionStore>,
    retry: RetryPolicy,
}

impl CheckInTracker {
    pub fn new(store: Arc<dyn AdmissionStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Checks a registration in on behalf of `acting_user_id`.
    ///
    /// Waitlisted registrations may be checked in; cancelled ones may not.
    pub async fn check_in(
        &self,
        event_id: Uuid,
        registration_id: Uuid,
        acting_user_id: &str,
    ) -> Result<CheckInOutcome, AdmissionError> {
        let outcome = self
            .retry
            .run("check_in", || {
                self.try_check_in(event_id, registration_id, acting_user_id)
            })
            .await?;

        if outcome.already_checked_in {
            metrics::counter!("check_ins_total", "outcome" => "duplicate").increment(1);
        } else {
            metrics::counter!("check_ins_total", "outcome" => "new").increment(1);
            info!(
                event_id = %event_id,
                registration_id = %registration_id,
                user_id = %outcome.check_in.user_id,
                checked_in_by = %acting_user_id,
                "Registration checked in"
            );
        }
        Ok(outcome)
    }

    async fn try_check_in(
        &self,
        event_id: Uuid,
        registration_id: Uuid,
        acting_user_id: &str,
    ) -> Result<CheckInOutcome, AdmissionError> {
        let not_found = || AdmissionError::NotFound("Registration not found".to_string());

        let mut tx = self.store.lock_event(event_id).await?.ok_or_else(not_found)?;
        let registration = tx
            .registration_by_id(registration_id)
            .await?
            .ok_or_else(not_found)?;

        if let Some(existing) = tx.find_check_in(registration_id).await? {
            return Ok(CheckInOutcome {
                check_in: existing,
                already_checked_in: true,
            });
        }

        if registration.status == RegistrationStatus::Cancelled {
            return Err(AdmissionError::InvalidState(
                "Cancelled registrations cannot be checked in".to_string(),
            ));
        }

        let check_in = CheckIn {
            id: Uuid::new_v4(),
            event_id,
            registration_id,
            user_id: registration.user_id,
            checked_in_by: acting_user_id.to_string(),
            checked_in_at: Utc::now(),
        };
        tx.insert_check_in(&check_in).await?;
        tx.commit().await?;

        Ok(CheckInOutcome {
            check_in,
            already_checked_in: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactFields, Event, EventMember, EventRole, EventStatus, Registration};
    use crate::store::InMemoryAdmissionStore;

    async fn seeded(status: RegistrationStatus) -> (InMemoryAdmissionStore, Event, Registration) {
        let store = InMemoryAdmissionStore::default();
        let now = Utc::now();
        let event_id = Uuid::new_v4();
        let event = Event {
            id: event_id,
            slug: format!("door-{}", event_id.simple()),
            title: "Door".to_string(),
            description: None,
            location: None,
            start_date: now,
            end_date: None,
            capacity: Some(10),
            status: EventStatus::Published,
            created_by: "host".to_string(),
            created_at: now,
            updated_at: now,
        };
        let host = EventMember {
            event_id,
            user_id: "host".to_string(),
            role: EventRole::Host,
            created_at: now,
        };
        store.insert_event(&event, &[], &host).await.unwrap();

        let registration = Registration {
            id: Uuid::new_v4(),
            event_id,
            user_id: "guest".to_string(),
            guest_count: 1,
            status,
            contact: ContactFields::default(),
            consent_given: false,
            notes: None,
            answers: vec![],
            queued_at: now,
            queue_seq: 1,
            created_at: now,
            updated_at: now,
        };
        let mut tx = store.lock_event(event_id).await.unwrap().unwrap();
        tx.save_registration(&registration).await.unwrap();
        tx.commit().await.unwrap();
        (store, event, registration)
    }

    fn tracker(store: &InMemoryAdmissionStore) -> CheckInTracker {
        CheckInTracker::new(Arc::new(store.clone()), RetryPolicy::new())
    }

    #[tokio::test]
    async fn test_check_in_records_actor() {
        let (store, event, registration) = seeded(RegistrationStatus::Confirmed).await;
        let outcome = tracker(&store)
            .check_in(event.id, registration.id, "staffer")
            .await
            .unwrap();

        assert!(!outcome.already_checked_in);
        assert_eq!(outcome.check_in.user_id, "guest");
        assert_eq!(outcome.check_in.checked_in_by, "staffer");
        assert_eq!(store.admission_counts(event.id).await.unwrap().checked_in, 1);
    }

    #[tokio::test]
    async fn test_check_in_is_idempotent() {
        let (store, event, registration) = seeded(RegistrationStatus::Confirmed).await;
        let tracker = tracker(&store);

        let first = tracker.check_in(event.id, registration.id, "host").await.unwrap();
        let second = tracker.check_in(event.id, registration.id, "staffer").await.unwrap();

        assert!(second.already_checked_in);
        assert_eq!(second.check_in, first.check_in);
        assert_eq!(store.list_check_ins(event.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_check_in_waitlisted_allowed() {
        let (store, event, registration) = seeded(RegistrationStatus::Waitlisted).await;
        let outcome = tracker(&store)
            .check_in(event.id, registration.id, "host")
            .await
            .unwrap();
        assert!(!outcome.already_checked_in);
    }

    #[tokio::test]
    async fn test_check_in_cancelled_rejected() {
        let (store, event, registration) = seeded(RegistrationStatus::Cancelled).await;
        let err = tracker(&store)
            .check_in(event.id, registration.id, "host")
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_check_in_wrong_event_is_not_found() {
        let (store, _, registration) = seeded(RegistrationStatus::Confirmed).await;
        let err = tracker(&store)
            .check_in(Uuid::new_v4(), registration.id, "host")
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_check_in_unknown_registration() {
        let (store, event, _) = seeded(RegistrationStatus::Confirmed).await;
        let err = tracker(&store)
            .check_in(event.id, Uuid::new_v4(), "host")
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_lock_blocks_check_in() {
        let (store, event, registration) = seeded(RegistrationStatus::Confirmed).await;
        let tracker = tracker(&store);

        let mut tx = store.lock_event(event.id).await.unwrap().unwrap();
        let pending = tokio::spawn({
            let (event_id, registration_id) = (event.id, registration.id);
            async move { tracker.check_in(event_id, registration_id, "staffer").await }
        });
        tokio::task::yield_now().await;

        let mut cancelled = registration.clone();
        cancelled.status = RegistrationStatus::Cancelled;
        tx.save_registration(&cancelled).await.unwrap();
        tx.commit().await.unwrap();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidState(_)));
        assert!(store.list_check_ins(event.id).await.unwrap().is_empty());
        assert_eq!(
            store
                .find_registration_by_id(registration.id)
                .await
                .unwrap()
                .unwrap()
                .status,
            RegistrationStatus::Cancelled
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_check_ins_produce_one_record() {
        let (store, event, registration) = seeded(RegistrationStatus::Confirmed).await;
        let tracker = tracker(&store);

        let mut handles = Vec::new();
        for i in 0..10 {
            let tracker = tracker.clone();
            let (event_id, registration_id) = (event.id, registration.id);
            handles.push(tokio::spawn(async move {
                tracker
                    .check_in(event_id, registration_id, &format!("staff-{}", i))
                    .await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().check_in.id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.list_check_ins(event.id).await.unwrap().len(), 1);
    }
}
