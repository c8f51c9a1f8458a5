/// School (tenant) model
///
/// Every profile, event, announcement and feedback entry is scoped to one
/// school.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct School {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl School {
    pub async fn create(pool: &PgPool, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, School>(
            "INSERT INTO schools (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, School>("SELECT id, name, created_at FROM schools WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All schools, by name
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, School>("SELECT id, name, created_at FROM schools ORDER BY name, id")
            .fetch_all(pool)
            .await
    }
}
