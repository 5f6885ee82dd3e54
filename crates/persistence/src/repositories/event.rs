//! Event repository for database operations.

use domain::models::{Event, EventMember, EventQuestion};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::entities::{
    EventEntity, EventMemberEntity, EventQuestionEntity, EventRoleDb, EventStatusDb,
    QuestionTypeDb,
};
use crate::metrics::QueryTimer;

/// Repository for events, their questions and memberships.
#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    /// Creates a new EventRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts an event with its questions and host membership in one transaction.
    pub async fn insert_with_host(
        &self,
        event: &Event,
        questions: &[EventQuestion],
        host: &EventMember,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_event");
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO events (id, slug, title, description, location, start_date, end_date,
                                capacity, status, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(event.id)
        .bind(&event.slug)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(event.capacity)
        .bind(EventStatusDb::from(event.status))
        .bind(&event.created_by)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut *tx)
        .await?;

        for question in questions {
            sqlx::query(
                r#"
                INSERT INTO event_questions (id, event_id, question, question_type, is_required,
                                             options, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(question.id)
            .bind(event.id)
            .bind(&question.question)
            .bind(QuestionTypeDb::from(question.question_type))
            .bind(question.is_required)
            .bind(&question.options)
            .bind(question.order)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO event_members (event_id, user_id, role, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(host.event_id)
        .bind(&host.user_id)
        .bind(EventRoleDb::from(host.role))
        .bind(host.created_at)
        .execute(&mut *tx)
        .await?;

        let result = tx.commit().await;
        timer.record();
        result
    }

    /// Find an event by its id.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_event_by_id");
        let result = sqlx::query_as::<_, EventEntity>(
            r#"
            SELECT id, slug, title, description, location, start_date, end_date, capacity,
                   status, created_by, created_at, updated_at
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an event by its slug.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_event_by_slug");
        let result = sqlx::query_as::<_, EventEntity>(
            r#"
            SELECT id, slug, title, description, location, start_date, end_date, capacity,
                   status, created_by, created_at, updated_at
            FROM events
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List events, optionally by status and by member, ordered by start date.
    pub async fn list(
        &self,
        status: Option<EventStatusDb>,
        member: Option<&str>,
    ) -> Result<Vec<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_events");
        let result = sqlx::query_as::<_, EventEntity>(
            r#"
            SELECT e.id, e.slug, e.title, e.description, e.location, e.start_date, e.end_date,
                   e.capacity, e.status, e.created_by, e.created_at, e.updated_at
            FROM events e
            WHERE ($1::event_status IS NULL OR e.status = $1)
              AND ($2::text IS NULL OR EXISTS (
                    SELECT 1 FROM event_members m
                    WHERE m.event_id = e.id AND m.user_id = $2
                  ))
            ORDER BY e.start_date, e.id
            "#,
        )
        .bind(status)
        .bind(member)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Check whether a slug is taken.
    pub async fn slug_exists(&self, slug: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("event_slug_exists");
        let result = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (SELECT 1 FROM events WHERE slug = $1)"#,
        )
        .bind(slug)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Questions of an event ordered by sort order.
    pub async fn questions(&self, event_id: Uuid) -> Result<Vec<EventQuestionEntity>, sqlx::Error> {
        Self::questions_with(&self.pool, event_id).await
    }

    pub async fn questions_with<'e, E>(
        executor: E,
        event_id: Uuid,
    ) -> Result<Vec<EventQuestionEntity>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let timer = QueryTimer::new("event_questions");
        let result = sqlx::query_as::<_, EventQuestionEntity>(
            r#"
            SELECT id, event_id, question, question_type, is_required, options, sort_order
            FROM event_questions
            WHERE event_id = $1
            ORDER BY sort_order, id
            "#,
        )
        .bind(event_id)
        .fetch_all(executor)
        .await;
        timer.record();
        result
    }

    /// Role of a user on an event.
    pub async fn member_role(
        &self,
        event_id: Uuid,
        user_id: &str,
    ) -> Result<Option<EventRoleDb>, sqlx::Error> {
        let timer = QueryTimer::new("event_member_role");
        let result = sqlx::query_scalar::<_, EventRoleDb>(
            r#"SELECT role FROM event_members WHERE event_id = $1 AND user_id = $2"#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Adds a member unless one exists; returns the stored membership.
    pub async fn add_member(&self, member: &EventMember) -> Result<EventMemberEntity, sqlx::Error> {
        let timer = QueryTimer::new("add_event_member");
        let result = sqlx::query_as::<_, EventMemberEntity>(
            r#"
            WITH inserted AS (
                INSERT INTO event_members (event_id, user_id, role, created_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (event_id, user_id) DO NOTHING
                RETURNING event_id, user_id, role, created_at
            )
            SELECT event_id, user_id, role, created_at FROM inserted
            UNION ALL
            SELECT event_id, user_id, role, created_at FROM event_members
            WHERE event_id = $1 AND user_id = $2
            LIMIT 1
            "#,
        )
        .bind(member.event_id)
        .bind(&member.user_id)
        .bind(EventRoleDb::from(member.role))
        .bind(member.created_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Published events that have waitlisted registrations.
    pub async fn with_waitlist(&self) -> Result<Vec<Uuid>, sqlx::Error> {
        let timer = QueryTimer::new("events_with_waitlist");
        let result = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT e.id
            FROM events e
            JOIN registrations r ON r.event_id = e.id
            WHERE e.status = 'published' AND r.status = 'waitlisted'
            ORDER BY e.id
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Bounds how long the current transaction waits for row locks.
    pub async fn set_lock_timeout(conn: &mut PgConnection, millis: u64) -> Result<(), sqlx::Error> {
        // SET does not accept bind parameters.
        let statement = format!("SET LOCAL lock_timeout = '{}ms'", millis);
        sqlx::query(&statement).execute(conn).await?;
        Ok(())
    }

    /// Reads the event row and holds its lock until the transaction ends.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<EventEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_event");
        let result = sqlx::query_as::<_, EventEntity>(
            r#"
            SELECT id, slug, title, description, location, start_date, end_date, capacity,
                   status, created_by, created_at, updated_at
            FROM events
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Writes the mutable event columns.
    pub async fn update(conn: &mut PgConnection, event: &Event) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("update_event");
        let result = sqlx::query(
            r#"
            UPDATE events
            SET title = $2, description = $3, location = $4, start_date = $5, end_date = $6,
                capacity = $7, status = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(event.capacity)
        .bind(EventStatusDb::from(event.status))
        .bind(event.updated_at)
        .execute(conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Deletes an event after its check-ins, registrations, questions and members.
    pub async fn delete_cascade(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("delete_event_cascade");
        for statement in [
            "DELETE FROM check_ins WHERE event_id = $1",
            "DELETE FROM registrations WHERE event_id = $1",
            "DELETE FROM event_questions WHERE event_id = $1",
            "DELETE FROM event_members WHERE event_id = $1",
            "DELETE FROM events WHERE id = $1",
        ] {
            sqlx::query(statement).bind(id).execute(&mut *conn).await?;
        }
        timer.record();
        Ok(())
    }
}
