use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Feedback left by a student, optionally about one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feedback {
    pub id: Uuid,
    pub school_id: Option<Uuid>,
    pub user_id: Uuid,
    pub event_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFeedback {
    pub school_id: Option<Uuid>,
    pub user_id: Uuid,
    pub event_id: Option<Uuid>,
    pub content: String,
}

impl Feedback {
    pub async fn create(pool: &PgPool, data: CreateFeedback) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Feedback>(
            r#"
            INSERT INTO feedback (school_id, user_id, event_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, school_id, user_id, event_id, content, created_at
            "#,
        )
        .bind(data.school_id)
        .bind(data.user_id)
        .bind(data.event_id)
        .bind(data.content)
        .fetch_one(pool)
        .await
    }

    /// Feedback for a school, newest first
    pub async fn list_by_school(
        pool: &PgPool,
        school_id: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Feedback>(
            r#"
            SELECT id, school_id, user_id, event_id, content, created_at
            FROM feedback
            WHERE school_id IS NOT DISTINCT FROM $1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(school_id)
        .fetch_all(pool)
        .await
    }
}
