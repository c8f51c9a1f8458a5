/// Event registrations
///
/// A registration links a student identity to an event. The pair
/// `(user_id, event_id)` is the primary key, so registering twice is a
/// no-op at the database level as well.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::event::Event;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRegistration {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub registered_at: DateTime<Utc>,
}

/// An event joined with the caller's registration time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RegisteredEvent {
    #[sqlx(flatten)]
    pub event: Event,

    pub registered_at: DateTime<Utc>,
}

impl EventRegistration {
    pub async fn exists(pool: &PgPool, user_id: Uuid, event_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM event_registrations WHERE user_id = $1 AND event_id = $2)",
        )
        .bind(user_id)
        .bind(event_id)
        .fetch_one(pool)
        .await
    }

    /// Inserts the pair; returns false if it was already there
    pub async fn insert(pool: &PgPool, user_id: Uuid, event_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO event_registrations (user_id, event_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, event_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Events a user registered for, soonest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<RegisteredEvent>, sqlx::Error> {
        sqlx::query_as::<_, RegisteredEvent>(
            r#"
            SELECT e.id, e.school_id, e.title, e.description, e.starts_at,
                   e.created_by, e.created_at, r.registered_at
            FROM event_registrations r
            JOIN events e ON e.id = r.event_id
            WHERE r.user_id = $1
            ORDER BY e.starts_at, e.id
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
