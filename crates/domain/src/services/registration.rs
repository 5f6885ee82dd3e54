//! Registration state machine.
//!
//! ```text
//! (none)     -> CONFIRMED | WAITLISTED    register
//! CONFIRMED  -> CANCELLED                 cancel
//! WAITLISTED -> CANCELLED                 cancel
//! CANCELLED  -> CONFIRMED | WAITLISTED    register again
//! WAITLISTED -> CONFIRMED                 promoter only
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::{Validate, ValidateEmail};

use super::ledger::{CapacityLedger, Reservation};
use super::promoter::WaitlistPromoter;
use super::retry::RetryPolicy;
use crate::errors::AdmissionError;
use crate::models::{
    EventQuestion, QuestionType, RegisterRequest, Registration, RegistrationAnswer,
    RegistrationStatus,
};
use crate::store::AdmissionStore;

/// Checks answers against the event's questions.
///
/// Unknown or repeated question ids, blank answers to required questions and
/// answers of the wrong shape are rejected.
pub fn validate_answers(
    questions: &[EventQuestion],
    answers: &[RegistrationAnswer],
) -> Result<(), AdmissionError> {
    let by_id: HashMap<Uuid, &EventQuestion> = questions.iter().map(|q| (q.id, q)).collect();
    let mut seen = HashSet::new();

    for answer in answers {
        let question = by_id.get(&answer.question_id).ok_or_else(|| {
            AdmissionError::Validation(format!("Unknown question {}", answer.question_id))
        })?;
        if !seen.insert(answer.question_id) {
            return Err(AdmissionError::Validation(format!(
                "Question {} answered more than once",
                answer.question_id
            )));
        }

        let value = answer.answer.trim();
        if value.is_empty() {
            continue;
        }
        let well_formed = match question.question_type {
            QuestionType::Email => value.validate_email(),
            QuestionType::Phone => shared::validation::validate_phone(value).is_ok(),
            QuestionType::Number => value.parse::<f64>().is_ok(),
            QuestionType::Select => question
                .options
                .as_deref()
                .and_then(|o| serde_json::from_str::<Vec<String>>(o).ok())
                .map_or(true, |options| options.iter().any(|o| o == value)),
            QuestionType::Text | QuestionType::MultipleChoice | QuestionType::Checkbox => true,
        };
        if !well_formed {
            return Err(AdmissionError::Validation(format!(
                "Invalid answer to \"{}\"",
                question.question
            )));
        }
    }

    let answered: HashSet<Uuid> = answers
        .iter()
        .filter(|a| !a.answer.trim().is_empty())
        .map(|a| a.question_id)
        .collect();
    if let Some(missing) = questions
        .iter()
        .find(|q| q.is_required && !answered.contains(&q.id))
    {
        return Err(AdmissionError::Validation(format!(
            "Answer required for \"{}\"",
            missing.question
        )));
    }
    Ok(())
}

/// Register, cancel and look up registrations.
#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn AdmissionStore>,
    promoter: WaitlistPromoter,
    retry: RetryPolicy,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn AdmissionStore>, promoter: WaitlistPromoter, retry: RetryPolicy) -> Self {
        Self {
            store,
            promoter,
            retry,
        }
    }

    /// Registers `user_id` for the event, confirming or waitlisting by capacity.
    ///
    /// A previously cancelled registration is brought back under the same id
    /// and re-enters the queue at the back.
    pub async fn register(
        &self,
        event_id: Uuid,
        user_id: &str,
        request: RegisterRequest,
    ) -> Result<Registration, AdmissionError> {
        request.validate()?;

        let registration = self
            .retry
            .run("register", || self.try_register(event_id, user_id, &request))
            .await?;

        metrics::counter!("registrations_total", "status" => registration.status.as_str())
            .increment(1);
        info!(
            event_id = %event_id,
            registration_id = %registration.id,
            user_id = %user_id,
            status = %registration.status,
            guest_count = registration.guest_count,
            "Registration recorded"
        );
        Ok(registration)
    }

    async fn try_register(
        &self,
        event_id: Uuid,
        user_id: &str,
        request: &RegisterRequest,
    ) -> Result<Registration, AdmissionError> {
        let mut tx = self
            .store
            .lock_event(event_id)
            .await?
            .ok_or_else(|| AdmissionError::NotFound("Event not found".to_string()))?;

        if !tx.event().status.accepts_registrations() {
            return Err(AdmissionError::InvalidState(
                "Event is not published".to_string(),
            ));
        }

        let existing = tx.find_registration(user_id).await?;
        if existing.as_ref().is_some_and(|r| r.status.is_active()) {
            return Err(AdmissionError::Conflict(
                "You have already registered for this event".to_string(),
            ));
        }

        let questions = tx.questions().await?;
        validate_answers(&questions, &request.answers)?;

        let mut ledger = CapacityLedger::open(tx.as_mut()).await?;
        let status = match ledger.try_reserve(request.guest_count) {
            Reservation::Granted => RegistrationStatus::Confirmed,
            Reservation::Denied => RegistrationStatus::Waitlisted,
        };

        let now = Utc::now();
        let queue_seq = tx.next_sequence().await?;
        let (id, created_at) = existing
            .map(|r| (r.id, r.created_at))
            .unwrap_or_else(|| (Uuid::new_v4(), now));

        let registration = Registration {
            id,
            event_id,
            user_id: user_id.to_string(),
            guest_count: request.guest_count,
            status,
            contact: request.contact.clone(),
            consent_given: request.consent_given,
            notes: request.notes.clone(),
            answers: request.answers.clone(),
            queued_at: now,
            queue_seq,
            created_at,
            updated_at: now,
        };
        tx.save_registration(&registration).await?;
        tx.commit().await?;
        Ok(registration)
    }

    /// Cancels the user's registration. Cancelling twice is a no-op.
    ///
    /// Freed seats are offered to the waitlist in a separate unit of work;
    /// a failed promotion is logged and left to the periodic sweep.
    pub async fn cancel(&self, event_id: Uuid, user_id: &str) -> Result<Registration, AdmissionError> {
        let (registration, previous) = self
            .retry
            .run("cancel", || self.try_cancel(event_id, user_id))
            .await?;

        if previous == RegistrationStatus::Cancelled {
            return Ok(registration);
        }

        metrics::counter!("registration_cancellations_total").increment(1);
        info!(
            event_id = %event_id,
            registration_id = %registration.id,
            user_id = %user_id,
            previous_status = %previous,
            "Registration cancelled"
        );

        if previous == RegistrationStatus::Confirmed {
            if let Err(err) = self.promoter.promote(event_id).await {
                warn!(
                    event_id = %event_id,
                    error = %err,
                    "Waitlist promotion after cancellation failed"
                );
            }
        }
        Ok(registration)
    }

    async fn try_cancel(
        &self,
        event_id: Uuid,
        user_id: &str,
    ) -> Result<(Registration, RegistrationStatus), AdmissionError> {
        let mut tx = self
            .store
            .lock_event(event_id)
            .await?
            .ok_or_else(|| AdmissionError::NotFound("Registration not found".to_string()))?;

        let mut registration = tx
            .find_registration(user_id)
            .await?
            .ok_or_else(|| AdmissionError::NotFound("Registration not found".to_string()))?;

        let previous = registration.status;
        if previous == RegistrationStatus::Cancelled {
            return Ok((registration, previous));
        }

        registration.status = RegistrationStatus::Cancelled;
        registration.updated_at = Utc::now();
        tx.save_registration(&registration).await?;
        tx.commit().await?;
        Ok((registration, previous))
    }

    /// The caller's own registration in any status.
    pub async fn my_registration(
        &self,
        event_id: Uuid,
        user_id: &str,
    ) -> Result<Registration, AdmissionError> {
        self.store
            .find_registration(event_id, user_id)
            .await?
            .ok_or_else(|| AdmissionError::NotFound("Registration not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactFields, Event, EventMember, EventRole, EventStatus};
    use crate::store::InMemoryAdmissionStore;
    use std::time::Duration;

    struct Fixture {
        store: InMemoryAdmissionStore,
        service: RegistrationService,
    }

    fn fixture_with(store: InMemoryAdmissionStore, retry: RetryPolicy) -> Fixture {
        let shared: Arc<dyn AdmissionStore> = Arc::new(store.clone());
        let promoter = WaitlistPromoter::new(shared.clone(), retry);
        Fixture {
            store,
            service: RegistrationService::new(shared, promoter, retry),
        }
    }

    fn fixture() -> Fixture {
        fixture_with(InMemoryAdmissionStore::default(), RetryPolicy::new())
    }

    async fn create_event(
        store: &InMemoryAdmissionStore,
        capacity: Option<i32>,
        status: EventStatus,
        questions: Vec<EventQuestion>,
    ) -> Event {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let event = Event {
            id,
            slug: format!("event-{}", id.simple()),
            title: "Tech Meetup".to_string(),
            description: None,
            location: None,
            start_date: now,
            end_date: None,
            capacity,
            status,
            created_by: "host".to_string(),
            created_at: now,
            updated_at: now,
        };
        let questions: Vec<EventQuestion> = questions
            .into_iter()
            .map(|q| EventQuestion { event_id: id, ..q })
            .collect();
        let host = EventMember {
            event_id: id,
            user_id: "host".to_string(),
            role: EventRole::Host,
            created_at: now,
        };
        store.insert_event(&event, &questions, &host).await.unwrap();
        event
    }

    fn guests(n: i32) -> RegisterRequest {
        RegisterRequest {
            guest_count: n,
            ..Default::default()
        }
    }

    fn question(question_type: QuestionType, required: bool, options: Option<&str>) -> EventQuestion {
        EventQuestion {
            id: Uuid::new_v4(),
            event_id: Uuid::nil(),
            question: format!("{} question", question_type.as_str()),
            question_type,
            is_required: required,
            options: options.map(str::to_string),
            order: 0,
        }
    }

    fn answer(question: &EventQuestion, value: &str) -> RegistrationAnswer {
        RegistrationAnswer {
            question_id: question.id,
            answer: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_confirms_when_seats_available() {
        let f = fixture();
        let event = create_event(&f.store, Some(10), EventStatus::Published, vec![]).await;

        let registration = f.service.register(event.id, "u1", guests(3)).await.unwrap();
        assert_eq!(registration.status, RegistrationStatus::Confirmed);
        assert_eq!(registration.guest_count, 3);
        assert_eq!(f.store.admission_counts(event.id).await.unwrap().reserved_slots, 3);
    }

    #[tokio::test]
    async fn test_register_waitlists_when_full() {
        let f = fixture();
        let event = create_event(&f.store, Some(2), EventStatus::Published, vec![]).await;

        let a = f.service.register(event.id, "a", guests(1)).await.unwrap();
        let b = f.service.register(event.id, "b", guests(2)).await.unwrap();
        let c = f.service.register(event.id, "c", guests(1)).await.unwrap();

        assert_eq!(a.status, RegistrationStatus::Confirmed);
        assert_eq!(b.status, RegistrationStatus::Waitlisted);
        assert_eq!(c.status, RegistrationStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_register_unlimited_capacity() {
        let f = fixture();
        let event = create_event(&f.store, None, EventStatus::Published, vec![]).await;

        for i in 0..20 {
            let r = f
                .service
                .register(event.id, &format!("user-{}", i), guests(50))
                .await
                .unwrap();
            assert_eq!(r.status, RegistrationStatus::Confirmed);
        }
    }

    #[tokio::test]
    async fn test_register_missing_event() {
        let f = fixture();
        let err = f
            .service
            .register(Uuid::new_v4(), "u1", guests(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_register_requires_published_event() {
        let f = fixture();
        for status in [EventStatus::Draft, EventStatus::Cancelled, EventStatus::Completed] {
            let event = create_event(&f.store, Some(10), status, vec![]).await;
            let err = f.service.register(event.id, "u1", guests(1)).await.unwrap_err();
            assert!(matches!(err, AdmissionError::InvalidState(_)), "{:?}", status);
        }
    }

    #[tokio::test]
    async fn test_register_twice_is_conflict() {
        let f = fixture();
        let event = create_event(&f.store, Some(1), EventStatus::Published, vec![]).await;

        f.service.register(event.id, "u1", guests(1)).await.unwrap();
        let err = f.service.register(event.id, "u1", guests(1)).await.unwrap_err();
        assert!(matches!(err, AdmissionError::Conflict(_)));

        f.service.register(event.id, "u2", guests(1)).await.unwrap();
        let err = f.service.register(event.id, "u2", guests(1)).await.unwrap_err();
        assert!(matches!(err, AdmissionError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_rejects_zero_guests() {
        let f = fixture();
        let event = create_event(&f.store, Some(10), EventStatus::Published, vec![]).await;
        let err = f.service.register(event.id, "u1", guests(0)).await.unwrap_err();
        assert!(matches!(err, AdmissionError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reregistration_reuses_id_and_reevaluates() {
        let f = fixture();
        let event = create_event(&f.store, Some(2), EventStatus::Published, vec![]).await;

        let first = f.service.register(event.id, "u1", guests(2)).await.unwrap();
        f.service.cancel(event.id, "u1").await.unwrap();
        f.service.register(event.id, "u2", guests(1)).await.unwrap();

        let mut request = guests(2);
        request.notes = Some("back again".to_string());
        let again = f.service.register(event.id, "u1", request).await.unwrap();

        assert_eq!(again.id, first.id);
        assert_eq!(again.created_at, first.created_at);
        assert_eq!(again.status, RegistrationStatus::Waitlisted);
        assert!(again.queue_seq > first.queue_seq);
        assert_eq!(again.notes.as_deref(), Some("back again"));
    }

    #[tokio::test]
    async fn test_reregistration_replaces_answers() {
        let f = fixture();
        let q1 = question(QuestionType::Text, false, None);
        let q2 = question(QuestionType::Text, false, None);
        let event = create_event(
            &f.store,
            None,
            EventStatus::Published,
            vec![q1.clone(), q2.clone()],
        )
        .await;

        let mut request = guests(1);
        request.answers = vec![answer(&q1, "first"), answer(&q2, "second")];
        f.service.register(event.id, "u1", request).await.unwrap();
        f.service.cancel(event.id, "u1").await.unwrap();

        let mut request = guests(1);
        request.answers = vec![answer(&q2, "only")];
        let again = f.service.register(event.id, "u1", request).await.unwrap();
        assert_eq!(again.answers, vec![answer(&q2, "only")]);
    }

    #[tokio::test]
    async fn test_cancel_confirmed_promotes_waitlist_in_order() {
        let f = fixture();
        let event = create_event(&f.store, Some(1), EventStatus::Published, vec![]).await;

        f.service.register(event.id, "a", guests(1)).await.unwrap();
        let w1 = f.service.register(event.id, "w1", guests(1)).await.unwrap();
        let w2 = f.service.register(event.id, "w2", guests(1)).await.unwrap();
        assert_eq!(w1.status, RegistrationStatus::Waitlisted);
        assert_eq!(w2.status, RegistrationStatus::Waitlisted);

        let cancelled = f.service.cancel(event.id, "a").await.unwrap();
        assert_eq!(cancelled.status, RegistrationStatus::Cancelled);

        let w1 = f.service.my_registration(event.id, "w1").await.unwrap();
        let w2 = f.service.my_registration(event.id, "w2").await.unwrap();
        assert_eq!(w1.status, RegistrationStatus::Confirmed);
        assert_eq!(w2.status, RegistrationStatus::Waitlisted);
    }

    #[tokio::test]
    async fn test_cancel_frees_seats_for_smaller_party_behind_large_one() {
        let f = fixture();
        let event = create_event(&f.store, Some(2), EventStatus::Published, vec![]).await;

        f.service.register(event.id, "a", guests(1)).await.unwrap();
        f.service.register(event.id, "b", guests(1)).await.unwrap();
        f.service.register(event.id, "big", guests(3)).await.unwrap();
        f.service.register(event.id, "small", guests(1)).await.unwrap();

        f.service.cancel(event.id, "a").await.unwrap();

        let big = f.service.my_registration(event.id, "big").await.unwrap();
        let small = f.service.my_registration(event.id, "small").await.unwrap();
        assert_eq!(big.status, RegistrationStatus::Waitlisted);
        assert_eq!(small.status, RegistrationStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_cancel_waitlisted_does_not_promote() {
        let f = fixture();
        let event = create_event(&f.store, Some(1), EventStatus::Published, vec![]).await;

        f.service.register(event.id, "a", guests(1)).await.unwrap();
        f.service.register(event.id, "w1", guests(1)).await.unwrap();
        f.service.register(event.id, "w2", guests(1)).await.unwrap();

        f.service.cancel(event.id, "w1").await.unwrap();
        let w2 = f.service.my_registration(event.id, "w2").await.unwrap();
        assert_eq!(w2.status, RegistrationStatus::Waitlisted);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let f = fixture();
        let event = create_event(&f.store, Some(5), EventStatus::Published, vec![]).await;
        f.service.register(event.id, "u1", guests(1)).await.unwrap();

        let first = f.service.cancel(event.id, "u1").await.unwrap();
        let second = f.service.cancel(event.id, "u1").await.unwrap();
        assert_eq!(first.status, RegistrationStatus::Cancelled);
        assert_eq!(second.status, RegistrationStatus::Cancelled);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn test_cancel_without_registration() {
        let f = fixture();
        let event = create_event(&f.store, Some(5), EventStatus::Published, vec![]).await;
        let err = f.service.cancel(event.id, "nobody").await.unwrap_err();
        assert!(matches!(err, AdmissionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_my_registration_not_found() {
        let f = fixture();
        let event = create_event(&f.store, Some(5), EventStatus::Published, vec![]).await;
        let err = f.service.my_registration(event.id, "u1").await.unwrap_err();
        assert!(matches!(err, AdmissionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_contention_exhausts_into_unavailable() {
        let store = InMemoryAdmissionStore::new(Duration::from_millis(10));
        let retry = RetryPolicy::new()
            .with_max_attempts(2)
            .with_initial_delay(Duration::from_millis(1));
        let f = fixture_with(store, retry);
        let event = create_event(&f.store, Some(5), EventStatus::Published, vec![]).await;

        let held = f.store.lock_event(event.id).await.unwrap().unwrap();
        let err = f.service.register(event.id, "u1", guests(1)).await.unwrap_err();
        assert!(matches!(err, AdmissionError::Unavailable(_)));
        drop(held);

        let ok = f.service.register(event.id, "u1", guests(1)).await.unwrap();
        assert_eq!(ok.status, RegistrationStatus::Confirmed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_never_overbook() {
        let f = fixture();
        let event = create_event(&f.store, Some(10), EventStatus::Published, vec![]).await;

        let mut handles = Vec::new();
        for i in 0..40 {
            let service = f.service.clone();
            let event_id = event.id;
            handles.push(tokio::spawn(async move {
                service
                    .register(event_id, &format!("user-{}", i), guests(1 + i % 3))
                    .await
            }));
        }

        let mut confirmed_seats = 0;
        for handle in handles {
            let registration = handle.await.unwrap().unwrap();
            if registration.status == RegistrationStatus::Confirmed {
                confirmed_seats += registration.guest_count as i64;
            }
        }

        let counts = f.store.admission_counts(event.id).await.unwrap();
        assert!(counts.reserved_slots <= 10);
        assert_eq!(counts.reserved_slots, confirmed_seats);
        assert_eq!(counts.confirmed + counts.waitlisted, 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_registration_yields_one() {
        let f = fixture();
        let event = create_event(&f.store, Some(10), EventStatus::Published, vec![]).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = f.service.clone();
            let event_id = event.id;
            handles.push(tokio::spawn(async move {
                service.register(event_id, "same-user", guests(1)).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert!(matches!(err, AdmissionError::Conflict(_))),
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_required_question_must_be_answered() {
        let f = fixture();
        let q = question(QuestionType::Text, true, None);
        let event = create_event(&f.store, None, EventStatus::Published, vec![q.clone()]).await;

        let err = f.service.register(event.id, "u1", guests(1)).await.unwrap_err();
        assert!(matches!(err, AdmissionError::Validation(_)));

        let mut request = guests(1);
        request.answers = vec![answer(&q, "Vegan")];
        assert!(f.service.register(event.id, "u1", request).await.is_ok());
    }

    #[test]
    fn test_validate_answers_rejects_unknown_question() {
        let q = question(QuestionType::Text, false, None);
        let stray = RegistrationAnswer {
            question_id: Uuid::new_v4(),
            answer: "hi".to_string(),
        };
        assert!(validate_answers(&[q], &[stray]).is_err());
    }

    #[test]
    fn test_validate_answers_rejects_duplicates() {
        let q = question(QuestionType::Text, false, None);
        assert!(validate_answers(&[q.clone()], &[answer(&q, "a"), answer(&q, "b")]).is_err());
    }

    #[test]
    fn test_validate_answers_by_type() {
        let email = question(QuestionType::Email, false, None);
        let number = question(QuestionType::Number, false, None);
        let phone = question(QuestionType::Phone, false, None);
        let select = question(QuestionType::Select, false, Some(r#"["Vegan","None"]"#));
        let questions = vec![email.clone(), number.clone(), phone.clone(), select.clone()];

        assert!(validate_answers(
            &questions,
            &[
                answer(&email, "jane@example.com"),
                answer(&number, "3"),
                answer(&phone, "+1 555 0100"),
                answer(&select, "Vegan"),
            ]
        )
        .is_ok());
        assert!(validate_answers(&questions, &[answer(&email, "nope")]).is_err());
        assert!(validate_answers(&questions, &[answer(&number, "three")]).is_err());
        assert!(validate_answers(&questions, &[answer(&phone, "12")]).is_err());
        assert!(validate_answers(&questions, &[answer(&select, "Pescatarian")]).is_err());
    }

    #[test]
    fn test_validate_answers_blank_required_is_missing() {
        let q = question(QuestionType::Text, true, None);
        assert!(validate_answers(&[q.clone()], &[answer(&q, "   ")]).is_err());
    }

    #[tokio::test]
    async fn test_registration_keeps_contact_fields() {
        let f = fixture();
        let event = create_event(&f.store, Some(5), EventStatus::Published, vec![]).await;
        let request = RegisterRequest {
            contact: ContactFields {
                name: Some("Jane Smith".to_string()),
                email: Some("jane@example.com".to_string()),
                phone: None,
            },
            consent_given: true,
            ..Default::default()
        };
        let registration = f.service.register(event.id, "u1", request).await.unwrap();
        assert_eq!(registration.contact.name.as_deref(), Some("Jane Smith"));
        assert!(registration.consent_given);

        let stored = f.store.find_registration(event.id, "u1").await.unwrap().unwrap();
        assert_eq!(stored, registration);
    }
}
