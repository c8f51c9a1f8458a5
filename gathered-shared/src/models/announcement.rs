use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// School-wide announcement posted by an administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Announcement {
    pub id: Uuid,
    pub school_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAnnouncement {
    pub school_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub created_by: Option<Uuid>,
}

impl Announcement {
    pub async fn create(pool: &PgPool, data: CreateAnnouncement) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Announcement>(
            r#"
            INSERT INTO announcements (school_id, title, content, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, school_id, title, content, created_by, created_at
            "#,
        )
        .bind(data.school_id)
        .bind(data.title)
        .bind(data.content)
        .bind(data.created_by)
        .fetch_one(pool)
        .await
    }

    /// Announcements of a school, newest first
    pub async fn list_by_school(
        pool: &PgPool,
        school_id: Option<Uuid>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Announcement>(
            r#"
            SELECT id, school_id, title, content, created_by, created_at
            FROM announcements
            WHERE school_id IS NOT DISTINCT FROM $1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(school_id)
        .fetch_all(pool)
        .await
    }
}
