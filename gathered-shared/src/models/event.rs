/// Event model and database operations
///
/// Events belong to a school and are created by that school's
/// administrators. Students of the same school can register for them
/// (see [`super::event_registration`]).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE events (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     school_id UUID REFERENCES schools(id) ON DELETE CASCADE,
///     title VARCHAR(200) NOT NULL,
///     description TEXT NOT NULL,
///     starts_at TIMESTAMPTZ NOT NULL,
///     created_by UUID REFERENCES identities(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Scheduled school event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,

    /// Owning school
    pub school_id: Option<Uuid>,

    pub title: String,

    pub description: String,

    /// When the event takes place
    pub starts_at: DateTime<Utc>,

    /// Administrator who created the event
    pub created_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

/// Input for creating an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEvent {
    pub school_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl Event {
    pub async fn create(pool: &PgPool, data: CreateEvent) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (school_id, title, description, starts_at, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, school_id, title, description, starts_at, created_by, created_at
            "#,
        )
        .bind(data.school_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.starts_at)
        .bind(data.created_by)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            SELECT id, school_id, title, description, starts_at, created_by, created_at
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Events of a school, soonest first
    pub async fn list_by_school(
        pool: &PgPool,
        school_id: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            SELECT id, school_id, title, description, starts_at, created_by, created_at
            FROM events
            WHERE school_id IS NOT DISTINCT FROM $1
            ORDER BY starts_at, id
            "#,
        )
        .bind(school_id)
        .fetch_all(pool)
        .await
    }
}
