//! Waitlist promotion.
//!
//! Waiters are considered strictly in `(queued_at, queue_seq)` order. A
//! party that does not fit is skipped, not blocking: a smaller party
//! further back may still be confirmed.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::ledger::{CapacityLedger, Reservation};
use super::retry::RetryPolicy;
use crate::errors::AdmissionError;
use crate::models::{Registration, RegistrationStatus};
use crate::store::{AdmissionStore, EventTransaction, StoreError};

/// Promotes waitlisted registrations inside an already open transaction.
///
/// The caller commits. Events that are not published are left untouched.
pub async fn promote_in<T>(tx: &mut T) -> Result<Vec<Registration>, StoreError>
where
    T: EventTransaction + ?Sized,
{
    if !tx.event().status.accepts_registrations() {
        return Ok(Vec::new());
    }

    let mut ledger = CapacityLedger::open(&mut *tx).await?;
    if ledger.is_full() {
        return Ok(Vec::new());
    }

    let now = Utc::now();
    let mut promoted = Vec::new();
    for mut registration in tx.waitlisted().await? {
        if ledger.is_full() {
            break;
        }
        if ledger.try_reserve(registration.guest_count) == Reservation::Granted {
            registration.status = RegistrationStatus::Confirmed;
            registration.updated_at = now;
            tx.save_registration(&registration).await?;
            promoted.push(registration);
        }
    }
    Ok(promoted)
}

/// Logs and counts promotions once they are committed.
pub fn record_promotions(event_id: Uuid, promoted: &[Registration]) {
    if promoted.is_empty() {
        return;
    }
    metrics::counter!("waitlist_promotions_total").increment(promoted.len() as u64);
    for registration in promoted {
        info!(
            event_id = %event_id,
            registration_id = %registration.id,
            user_id = %registration.user_id,
            guest_count = registration.guest_count,
            "Waitlisted registration promoted"
        );
    }
}

/// Runs promotion passes as their own committed units of work.
#[derive(Clone)]
pub struct WaitlistPromoter {
    store: Arc<dyn AdmissionStore>,
    retry: RetryPolicy,
}

impl WaitlistPromoter {
    pub fn new(store: Arc<dyn AdmissionStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Confirms as many waiters as capacity allows, in queue order.
    pub async fn promote(&self, event_id: Uuid) -> Result<Vec<Registration>, AdmissionError> {
        let promoted = self
            .retry
            .run("promote", || self.try_promote(event_id))
            .await?;

        record_promotions(event_id, &promoted);
        Ok(promoted)
    }

    async fn try_promote(&self, event_id: Uuid) -> Result<Vec<Registration>, AdmissionError> {
        let mut tx = self
            .store
            .lock_event(event_id)
            .await?
            .ok_or_else(|| AdmissionError::NotFound(format!("Event {} not found", event_id)))?;
        let promoted = promote_in(tx.as_mut()).await?;
        if !promoted.is_empty() {
            tx.commit().await?;
        }
        Ok(promoted)
    }

    /// Promotion pass over every event with a waitlist.
    ///
    /// Failures on one event are logged and do not stop the sweep. Returns
    /// the number of registrations promoted.
    pub async fn sweep(&self) -> Result<usize, AdmissionError> {
        let mut total = 0;
        for event_id in self.store.events_with_waitlist().await? {
            match self.promote(event_id).await {
                Ok(promoted) => total += promoted.len(),
                // Deleted since the scan.
                Err(AdmissionError::NotFound(_)) => {}
                Err(err) => warn!(event_id = %event_id, error = %err, "Promotion sweep failed for event"),
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactFields, Event, EventMember, EventRole, EventStatus};
    use crate::store::InMemoryAdmissionStore;
    use chrono::Duration;

    fn event(capacity: Option<i32>, status: EventStatus) -> Event {
        let now = Utc::now();
        let id = Uuid::new_v4();
        Event {
            id,
            slug: format!("promo-{}", id.simple()),
            title: "Promo".to_string(),
            description: None,
            location: None,
            start_date: now,
            end_date: None,
            capacity,
            status,
            created_by: "host".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn seed(store: &InMemoryAdmissionStore, event: &Event, rows: &[(&str, i32, RegistrationStatus)]) {
        let host = EventMember {
            event_id: event.id,
            user_id: "host".to_string(),
            role: EventRole::Host,
            created_at: Utc::now(),
        };
        store.insert_event(event, &[], &host).await.unwrap();

        let base = Utc::now();
        let mut tx = store.lock_event(event.id).await.unwrap().unwrap();
        for (i, (user, guests, status)) in rows.iter().enumerate() {
            let queued_at = base + Duration::milliseconds(i as i64);
            tx.save_registration(&Registration {
                id: Uuid::new_v4(),
                event_id: event.id,
                user_id: user.to_string(),
                guest_count: *guests,
                status: *status,
                contact: ContactFields::default(),
                consent_given: false,
                notes: None,
                answers: vec![],
                queued_at,
                queue_seq: i as i64,
                created_at: queued_at,
                updated_at: queued_at,
            })
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();
    }

    fn promoter(store: &InMemoryAdmissionStore) -> WaitlistPromoter {
        WaitlistPromoter::new(Arc::new(store.clone()), RetryPolicy::new())
    }

    async fn status_of(store: &InMemoryAdmissionStore, event_id: Uuid, user: &str) -> RegistrationStatus {
        store
            .find_registration(event_id, user)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn test_promotes_in_fifo_order() {
        let store = InMemoryAdmissionStore::default();
        let event = event(Some(3), EventStatus::Published);
        seed(
            &store,
            &event,
            &[
                ("a", 1, RegistrationStatus::Confirmed),
                ("w1", 1, RegistrationStatus::Waitlisted),
                ("w2", 1, RegistrationStatus::Waitlisted),
                ("w3", 1, RegistrationStatus::Waitlisted),
            ],
        )
        .await;

        let promoted = promoter(&store).promote(event.id).await.unwrap();
        let users: Vec<&str> = promoted.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(users, vec!["w1", "w2"]);
        assert_eq!(status_of(&store, event.id, "w3").await, RegistrationStatus::Waitlisted);
    }

    #[tokio::test]
    async fn test_large_party_does_not_block_smaller_one() {
        let store = InMemoryAdmissionStore::default();
        let event = event(Some(4), EventStatus::Published);
        seed(
            &store,
            &event,
            &[
                ("a", 2, RegistrationStatus::Confirmed),
                ("big", 3, RegistrationStatus::Waitlisted),
                ("small", 2, RegistrationStatus::Waitlisted),
            ],
        )
        .await;

        let promoted = promoter(&store).promote(event.id).await.unwrap();
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].user_id, "small");
        assert_eq!(status_of(&store, event.id, "big").await, RegistrationStatus::Waitlisted);
    }

    #[tokio::test]
    async fn test_queue_seq_breaks_timestamp_ties() {
        let store = InMemoryAdmissionStore::default();
        let event = event(Some(1), EventStatus::Published);
        seed(&store, &event, &[]).await;

        let now = Utc::now();
        let mut tx = store.lock_event(event.id).await.unwrap().unwrap();
        for (user, seq) in [("second", 11), ("first", 10)] {
            tx.save_registration(&Registration {
                id: Uuid::new_v4(),
                event_id: event.id,
                user_id: user.to_string(),
                guest_count: 1,
                status: RegistrationStatus::Waitlisted,
                contact: ContactFields::default(),
                consent_given: false,
                notes: None,
                answers: vec![],
                queued_at: now,
                queue_seq: seq,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let promoted = promoter(&store).promote(event.id).await.unwrap();
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].user_id, "first");
    }

    #[tokio::test]
    async fn test_unlimited_capacity_promotes_everyone() {
        let store = InMemoryAdmissionStore::default();
        let event = event(None, EventStatus::Published);
        seed(
            &store,
            &event,
            &[
                ("w1", 5, RegistrationStatus::Waitlisted),
                ("w2", 7, RegistrationStatus::Waitlisted),
            ],
        )
        .await;

        let promoted = promoter(&store).promote(event.id).await.unwrap();
        assert_eq!(promoted.len(), 2);
    }

    #[tokio::test]
    async fn test_unpublished_event_is_not_promoted() {
        let store = InMemoryAdmissionStore::default();
        let event = event(Some(10), EventStatus::Cancelled);
        seed(&store, &event, &[("w1", 1, RegistrationStatus::Waitlisted)]).await;

        assert!(promoter(&store).promote(event.id).await.unwrap().is_empty());
        assert_eq!(status_of(&store, event.id, "w1").await, RegistrationStatus::Waitlisted);
    }

    #[tokio::test]
    async fn test_full_event_promotes_nothing() {
        let store = InMemoryAdmissionStore::default();
        let event = event(Some(1), EventStatus::Published);
        seed(
            &store,
            &event,
            &[
                ("a", 1, RegistrationStatus::Confirmed),
                ("w1", 1, RegistrationStatus::Waitlisted),
            ],
        )
        .await;

        assert!(promoter(&store).promote(event.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_promote_missing_event() {
        let store = InMemoryAdmissionStore::default();
        let err = promoter(&store).promote(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AdmissionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sweep_heals_every_event() {
        let store = InMemoryAdmissionStore::default();
        let a = event(Some(2), EventStatus::Published);
        let b = event(Some(1), EventStatus::Published);
        seed(&store, &a, &[("w1", 1, RegistrationStatus::Waitlisted), ("w2", 1, RegistrationStatus::Waitlisted)]).await;
        seed(&store, &b, &[("w3", 1, RegistrationStatus::Waitlisted)]).await;

        assert_eq!(promoter(&store).sweep().await.unwrap(), 3);
        assert!(store.events_with_waitlist().await.unwrap().is_empty());
    }
}
