/// Role profiles
///
/// A profile extends an identity with a display name, a school and an
/// optional institutional id. Profiles live in one of two tables, `admins`
/// and `students`, keyed by the identity id. Institutional ids are unique
/// across both tables through the shared `institutional_ids` table.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE students (
///     id UUID PRIMARY KEY REFERENCES identities(id) ON DELETE CASCADE,
///     name VARCHAR(100) NOT NULL,
///     school_id UUID REFERENCES schools(id) ON DELETE SET NULL,
///     institutional_id VARCHAR(15) UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE institutional_ids (
///     institutional_id VARCHAR(15) PRIMARY KEY,
///     identity_id UUID NOT NULL REFERENCES identities(id) ON DELETE CASCADE
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account role
///
/// Stored as lowercase text (`administrator`, `student`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// School administrator: manages events, announcements and feedback
    Administrator,

    /// Student: browses and registers for events
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Student => "student",
        }
    }

    /// Profile table holding this role
    pub fn table(&self) -> &'static str {
        match self {
            Role::Administrator => "admins",
            Role::Student => "students",
        }
    }

    /// Dashboard path for this role
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Administrator => "/admin/dashboard",
            Role::Student => "/student/dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown role name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "administrator" => Ok(Role::Administrator),
            "student" => Ok(Role::Student),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ParseRoleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Profile row (same shape in both tables)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    /// Identity id
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// School the profile belongs to
    pub school_id: Option<Uuid>,

    /// Institutional id, formatted `XX-XXXX-XXX`
    pub institutional_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Input for writing a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub name: String,
    pub school_id: Option<Uuid>,
    pub institutional_id: Option<String>,
}

/// Result of [`Profile::upsert`]
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    /// Profile inserted or refreshed
    Written(Profile),

    /// The institutional id belongs to another identity
    IdentifierTaken,
}

impl Profile {
    /// Inserts or refreshes the profile for `data.id`
    ///
    /// Writing the same identity twice updates the row in place, so a
    /// retried profile write never produces a second profile. Claiming the
    /// institutional id and writing the profile happen in one transaction.
    pub async fn upsert(
        pool: &PgPool,
        role: Role,
        data: &NewProfile,
    ) -> Result<UpsertOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if let Some(institutional_id) = &data.institutional_id {
            sqlx::query(
                r#"
                INSERT INTO institutional_ids (institutional_id, identity_id)
                VALUES ($1, $2)
                ON CONFLICT (institutional_id) DO NOTHING
                "#,
            )
            .bind(institutional_id)
            .bind(data.id)
            .execute(&mut *tx)
            .await?;

            let owner: Uuid = sqlx::query_scalar(
                "SELECT identity_id FROM institutional_ids WHERE institutional_id = $1",
            )
            .bind(institutional_id)
            .fetch_one(&mut *tx)
            .await?;

            if owner != data.id {
                tx.rollback().await?;
                return Ok(UpsertOutcome::IdentifierTaken);
            }
        }

        let query = format!(
            r#"
            INSERT INTO {table} (id, name, school_id, institutional_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                school_id = EXCLUDED.school_id,
                institutional_id = EXCLUDED.institutional_id
            RETURNING id, name, school_id, institutional_id, created_at
            "#,
            table = role.table()
        );

        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(data.id)
            .bind(&data.name)
            .bind(data.school_id)
            .bind(&data.institutional_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(UpsertOutcome::Written(profile))
    }

    /// Finds the profile for an identity in the given role's table
    pub async fn find(pool: &PgPool, role: Role, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT id, name, school_id, institutional_id, created_at FROM {} WHERE id = $1",
            role.table()
        );

        sqlx::query_as::<_, Profile>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, role: Role, id: Uuid) -> Result<bool, sqlx::Error> {
        let query = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            role.table()
        );

        sqlx::query_scalar(&query).bind(id).fetch_one(pool).await
    }

    /// Checks both profile tables for an institutional id
    pub async fn institutional_id_taken(
        pool: &PgPool,
        institutional_id: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(SELECT 1 FROM institutional_ids WHERE institutional_id = $1)
                OR EXISTS(SELECT 1 FROM admins WHERE institutional_id = $1)
                OR EXISTS(SELECT 1 FROM students WHERE institutional_id = $1)
            "#,
        )
        .bind(institutional_id)
        .fetch_one(pool)
        .await
    }
}
