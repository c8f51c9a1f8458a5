/// Identity model and database operations
///
/// An identity is the authentication record: email plus Argon2id password
/// hash. Role and school live on the profile, not here.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE identities (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     email_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// Emails are lowercased before they reach this module.
///
/// # Example
///
/// ```no_run
/// use gathered_shared::models::identity::Identity;
/// use gathered_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let identity = Identity::create(&pool, "ada@cit.edu", "$argon2id$...", true).await?;
/// let found = Identity::find_by_email(&pool, "ada@cit.edu").await?;
/// assert_eq!(found.map(|i| i.id), Some(identity.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Authentication record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Identity {
    pub id: Uuid,

    /// Lowercased email address, unique
    pub email: String,

    /// Argon2id password hash (PHC string)
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// False only for link-mode sign-ups that have not been confirmed
    pub email_verified: bool,

    pub created_at: DateTime<Utc>,

    pub last_login_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Inserts a new identity
    ///
    /// # Errors
    ///
    /// Fails with a unique violation if the email already exists.
    pub async fn create(
        pool: &PgPool,
        email: &str,
        password_hash: &str,
        email_verified: bool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Identity>(
            r#"
            INSERT INTO identities (email, password_hash, email_verified)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, email_verified, created_at, last_login_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(email_verified)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, email, password_hash, email_verified, created_at, last_login_at
            FROM identities
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, email, password_hash, email_verified, created_at, last_login_at
            FROM identities
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// True if a verified identity owns `email`
    pub async fn email_taken(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM identities WHERE email = $1 AND email_verified)",
        )
        .bind(email)
        .fetch_one(pool)
        .await
    }

    /// Replaces the password of an unverified identity (repeated link sign-up)
    pub async fn reset_unverified(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE identities SET password_hash = $2 WHERE id = $1 AND NOT email_verified",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn mark_verified(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE identities SET email_verified = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE identities SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
