//! Check-in repository for database operations.

use domain::models::CheckIn;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::CheckInEntity;
use crate::metrics::QueryTimer;

/// Repository for check-in database operations.
#[derive(Clone)]
pub struct CheckInRepository {
    pool: PgPool,
}

impl CheckInRepository {
    /// Creates a new CheckInRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the check-in of a registration.
    pub async fn find_by_registration(
        conn: &mut PgConnection,
        registration_id: Uuid,
    ) -> Result<Option<CheckInEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_check_in");
        let result = sqlx::query_as::<_, CheckInEntity>(
            r#"
            SELECT id, event_id, registration_id, user_id, checked_in_by, checked_in_at
            FROM check_ins
            WHERE registration_id = $1
            "#,
        )
        .bind(registration_id)
        .fetch_optional(conn)
        .await;
        timer.record();
        result
    }

    /// Insert a check-in. A second check-in for the same registration
    /// violates `idx_check_ins_registration`.
    pub async fn insert(conn: &mut PgConnection, check_in: &CheckIn) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_check_in");
        let result = sqlx::query(
            r#"
            INSERT INTO check_ins (id, event_id, registration_id, user_id, checked_in_by,
                                   checked_in_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(check_in.id)
        .bind(check_in.event_id)
        .bind(check_in.registration_id)
        .bind(&check_in.user_id)
        .bind(&check_in.checked_in_by)
        .bind(check_in.checked_in_at)
        .execute(conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Check-ins of an event in arrival order.
    pub async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<CheckInEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_check_ins");
        let result = sqlx::query_as::<_, CheckInEntity>(
            r#"
            SELECT id, event_id, registration_id, user_id, checked_in_by, checked_in_at
            FROM check_ins
            WHERE event_id = $1
            ORDER BY checked_in_at
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
