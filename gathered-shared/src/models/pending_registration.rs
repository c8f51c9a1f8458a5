/// Pending registrations
///
/// A pending registration holds a validated sign-up form between the
/// moment it is submitted and the moment its profile is written. The record
/// carries an explicit stage:
///
/// ```text
/// awaiting_code ──verify──┐
///                         ├──> identity_created ──profile written──> (deleted)
/// awaiting_link ─confirm──┘
/// ```
///
/// Records in `awaiting_*` stages expire at `expires_at`. Records in
/// `identity_created` never expire: the identity already exists and the
/// profile write must eventually be completed by reconciliation.
///
/// The password is kept as its Argon2id hash and the one-time code as
/// `hex(sha256(id ":" code))`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::profile::{NewProfile, Role};

/// Progress of a pending registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStage {
    /// Code mailed, identity not yet created
    AwaitingCode,

    /// Unverified identity created, link mailed
    AwaitingLink,

    /// Identity verified, profile not yet written
    IdentityCreated,
}

impl PendingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingStage::AwaitingCode => "awaiting_code",
            PendingStage::AwaitingLink => "awaiting_link",
            PendingStage::IdentityCreated => "identity_created",
        }
    }
}

impl fmt::Display for PendingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid pending stage: {0}")]
pub struct ParseStageError(pub String);

impl FromStr for PendingStage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_code" => Ok(PendingStage::AwaitingCode),
            "awaiting_link" => Ok(PendingStage::AwaitingLink),
            "identity_created" => Ok(PendingStage::IdentityCreated),
            other => Err(ParseStageError(other.to_string())),
        }
    }
}

impl TryFrom<String> for PendingStage {
    type Error = ParseStageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Validated registration awaiting verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PendingRegistration {
    /// Record id (the identity id in link mode)
    pub id: Uuid,

    /// Lowercased email
    pub email: String,

    #[serde(skip_serializing)]
    pub password_hash: String,

    pub name: String,

    #[sqlx(try_from = "String")]
    pub role: Role,

    /// Existing school chosen on the form, or the school created for
    /// `new_school_name` once it exists
    pub school_id: Option<Uuid>,

    /// School to create for an administrator registering a new school
    pub new_school_name: Option<String>,

    /// Institutional id, already formatted `XX-XXXX-XXX`
    pub institutional_id: Option<String>,

    /// Hash of the mailed one-time code (code mode)
    #[serde(skip_serializing)]
    pub code_hash: Option<String>,

    #[sqlx(try_from = "String")]
    pub stage: PendingStage,

    /// Set once the identity exists
    pub identity_id: Option<Uuid>,

    pub expires_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl PendingRegistration {
    /// True once `now` is past the expiry of an unverified record
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.stage != PendingStage::IdentityCreated && now > self.expires_at
    }

    /// Profile to write for `identity_id` once the school is resolved
    pub fn profile_for(&self, identity_id: Uuid) -> NewProfile {
        NewProfile {
            id: identity_id,
            name: self.name.clone(),
            school_id: self.school_id,
            institutional_id: self.institutional_id.clone(),
        }
    }

    /// Inserts or replaces the record with the same id
    pub async fn save(pool: &PgPool, record: &PendingRegistration) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO pending_registrations (
                id, email, password_hash, name, role, school_id, new_school_name,
                institutional_id, code_hash, stage, identity_id, expires_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE
            SET email = EXCLUDED.email,
                password_hash = EXCLUDED.password_hash,
                name = EXCLUDED.name,
                role = EXCLUDED.role,
                school_id = EXCLUDED.school_id,
                new_school_name = EXCLUDED.new_school_name,
                institutional_id = EXCLUDED.institutional_id,
                code_hash = EXCLUDED.code_hash,
                stage = EXCLUDED.stage,
                identity_id = EXCLUDED.identity_id,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(record.id)
        .bind(&record.email)
        .bind(&record.password_hash)
        .bind(&record.name)
        .bind(record.role.as_str())
        .bind(record.school_id)
        .bind(&record.new_school_name)
        .bind(&record.institutional_id)
        .bind(&record.code_hash)
        .bind(record.stage.as_str())
        .bind(record.identity_id)
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PendingRegistration>(&select_where("id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_identity(
        pool: &PgPool,
        identity_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PendingRegistration>(&select_where("identity_id = $1"))
            .bind(identity_id)
            .fetch_optional(pool)
            .await
    }

    /// Records that the identity exists; the record no longer expires
    pub async fn mark_identity_created(
        pool: &PgPool,
        id: Uuid,
        identity_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE pending_registrations
            SET stage = 'identity_created', identity_id = $2, code_hash = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(identity_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn set_school(pool: &PgPool, id: Uuid, school_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE pending_registrations SET school_id = $2 WHERE id = $1")
            .bind(id)
            .bind(school_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Deletes the record; returns whether it existed
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM pending_registrations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records whose identity exists but whose profile was never written
    pub async fn list_identity_created(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PendingRegistration>(&format!(
            "{} ORDER BY created_at",
            select_where("stage = 'identity_created'")
        ))
        .fetch_all(pool)
        .await
    }

    /// Deletes unverified records that expired before `now`
    pub async fn purge_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM pending_registrations
            WHERE stage <> 'identity_created' AND expires_at < $1
            "#,
        )
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn select_where(condition: &str) -> String {
    format!(
        r#"
        SELECT id, email, password_hash, name, role, school_id, new_school_name,
               institutional_id, code_hash, stage, identity_id, expires_at, created_at
        FROM pending_registrations
        WHERE {condition}
        "#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(stage: PendingStage) -> PendingRegistration {
        let now = Utc::now();
        PendingRegistration {
            id: Uuid::new_v4(),
            email: "ada@cit.edu".to_string(),
            password_hash: "$argon2id$".to_string(),
            name: "Ada".to_string(),
            role: Role::Student,
            school_id: None,
            new_school_name: None,
            institutional_id: Some("12-3456-789".to_string()),
            code_hash: None,
            stage,
            identity_id: None,
            expires_at: now + Duration::minutes(10),
            created_at: now,
        }
    }

    #[test]
    fn test_stage_names() {
        for stage in [
            PendingStage::AwaitingCode,
            PendingStage::AwaitingLink,
            PendingStage::IdentityCreated,
        ] {
            assert_eq!(stage.as_str().parse::<PendingStage>().unwrap(), stage);
        }
        assert!("verified".parse::<PendingStage>().is_err());
    }

    #[test]
    fn test_expiry() {
        let pending = record(PendingStage::AwaitingCode);
        assert!(!pending.is_expired_at(pending.expires_at));
        assert!(pending.is_expired_at(pending.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn test_identity_created_never_expires() {
        let pending = record(PendingStage::IdentityCreated);
        assert!(!pending.is_expired_at(pending.expires_at + Duration::days(30)));
    }

    #[test]
    fn test_profile_for() {
        let pending = record(PendingStage::IdentityCreated);
        let id = Uuid::new_v4();
        let profile = pending.profile_for(id);

        assert_eq!(profile.id, id);
        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.institutional_id.as_deref(), Some("12-3456-789"));
    }
}
