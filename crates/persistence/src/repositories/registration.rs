//! Registration repository for database operations.

use domain::models::Registration;
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::entities::{RegistrationEntity, RegistrationStatusDb};
use crate::metrics::QueryTimer;

/// Per-event counts: confirmed, waitlisted, reserved seats, check-ins.
pub type AdmissionCountsRow = (i64, i64, i64, i64);

/// Repository for registration database operations.
#[derive(Clone)]
pub struct RegistrationRepository {
    pool: PgPool,
}

impl RegistrationRepository {
    /// Creates a new RegistrationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the registration of a user for an event.
    pub async fn find_by_event_user(
        &self,
        event_id: Uuid,
        user_id: &str,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        Self::find_by_event_user_with(&self.pool, event_id, user_id).await
    }

    pub async fn find_by_event_user_with<'e, E>(
        executor: E,
        event_id: Uuid,
        user_id: &str,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let timer = QueryTimer::new("find_registration_by_event_user");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT id, event_id, user_id, guest_count, status, name, email, phone,
                   consent_given, notes, answers, queued_at, queue_seq, created_at, updated_at
            FROM registrations
            WHERE event_id = $1 AND user_id = $2
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await;
        timer.record();
        result
    }

    /// Find a registration by id.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_registration_by_id");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT id, event_id, user_id, guest_count, status, name, email, phone,
                   consent_given, notes, answers, queued_at, queue_seq, created_at, updated_at
            FROM registrations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a registration of one event by id.
    pub async fn find_in_event(
        conn: &mut PgConnection,
        event_id: Uuid,
        id: Uuid,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_registration_in_event");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT id, event_id, user_id, guest_count, status, name, email, phone,
                   consent_given, notes, answers, queued_at, queue_seq, created_at, updated_at
            FROM registrations
            WHERE id = $1 AND event_id = $2
            "#,
        )
        .bind(id)
        .bind(event_id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Registrations of an event in the given statuses, oldest first.
    pub async fn list_by_statuses(
        &self,
        event_id: Uuid,
        statuses: &[&str],
    ) -> Result<Vec<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_registrations");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT id, event_id, user_id, guest_count, status, name, email, phone,
                   consent_given, notes, answers, queued_at, queue_seq, created_at, updated_at
            FROM registrations
            WHERE event_id = $1 AND status::text = ANY($2)
            ORDER BY created_at, id
            "#,
        )
        .bind(event_id)
        .bind(statuses)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Confirmed, waitlisted, reserved seats and check-ins of an event.
    pub async fn admission_counts(&self, event_id: Uuid) -> Result<AdmissionCountsRow, sqlx::Error> {
        let timer = QueryTimer::new("admission_counts");
        let result = sqlx::query_as::<_, AdmissionCountsRow>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'confirmed') AS confirmed,
                COUNT(*) FILTER (WHERE status = 'waitlisted') AS waitlisted,
                COALESCE(SUM(guest_count) FILTER (WHERE status = 'confirmed'), 0)::BIGINT
                    AS reserved_slots,
                (SELECT COUNT(*) FROM check_ins c WHERE c.event_id = $1) AS checked_in
            FROM registrations
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Sum of guest counts over confirmed registrations.
    pub async fn reserved_slots(conn: &mut PgConnection, event_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("reserved_slots");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(guest_count), 0)::BIGINT
            FROM registrations
            WHERE event_id = $1 AND status = 'confirmed'
            "#,
        )
        .bind(event_id)
        .fetch_one(conn)
        .await;
        timer.record();
        result
    }

    /// Waitlisted registrations in promotion order.
    pub async fn waitlisted(
        conn: &mut PgConnection,
        event_id: Uuid,
    ) -> Result<Vec<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("waitlisted_registrations");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT id, event_id, user_id, guest_count, status, name, email, phone,
                   consent_given, notes, answers, queued_at, queue_seq, created_at, updated_at
            FROM registrations
            WHERE event_id = $1 AND status = 'waitlisted'
            ORDER BY queued_at, queue_seq
            "#,
        )
        .bind(event_id)
        .fetch_all(conn)
        .await;
        timer.record();
        result
    }

    pub async fn next_sequence(conn: &mut PgConnection) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(r#"SELECT nextval('registration_queue_seq')"#)
            .fetch_one(conn)
            .await
    }

    /// Inserts or fully replaces a registration row by id.
    pub async fn upsert(conn: &mut PgConnection, registration: &Registration) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("upsert_registration");
        let result = sqlx::query(
            r#"
            INSERT INTO registrations (id, event_id, user_id, guest_count, status, name, email,
                                       phone, consent_given, notes, answers, queued_at,
                                       queue_seq, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                guest_count = EXCLUDED.guest_count,
                status = EXCLUDED.status,
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                consent_given = EXCLUDED.consent_given,
                notes = EXCLUDED.notes,
                answers = EXCLUDED.answers,
                queued_at = EXCLUDED.queued_at,
                queue_seq = EXCLUDED.queue_seq,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(registration.id)
        .bind(registration.event_id)
        .bind(&registration.user_id)
        .bind(registration.guest_count)
        .bind(RegistrationStatusDb::from(registration.status))
        .bind(&registration.contact.name)
        .bind(&registration.contact.email)
        .bind(&registration.contact.phone)
        .bind(registration.consent_given)
        .bind(&registration.notes)
        .bind(Json(&registration.answers))
        .bind(registration.queued_at)
        .bind(registration.queue_seq)
        .bind(registration.created_at)
        .bind(registration.updated_at)
        .execute(conn)
        .await;
        timer.record();
        result.map(|_| ())
    }
}
