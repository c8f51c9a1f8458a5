/// PostgreSQL store backend
///
/// Thin adapter from the store traits onto the model functions in
/// [`crate::models`]. Unique violations are translated by
/// `From<sqlx::Error> for StoreError`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    DomainStore, EventRegistrationOutcome, IdentityStore, PendingStore, ProfileStore, StoreError,
};
use crate::auth::confirmation::{ConfirmationError, ConfirmationLinks};
use crate::auth::jwt::JwtError;
use crate::auth::password::verify_password;
use crate::models::announcement::{Announcement, CreateAnnouncement};
use crate::models::event::{CreateEvent, Event};
use crate::models::event_registration::{EventRegistration, RegisteredEvent};
use crate::models::feedback::{CreateFeedback, Feedback};
use crate::models::identity::Identity;
use crate::models::pending_registration::PendingRegistration;
use crate::models::profile::{NewProfile, Profile, Role, UpsertOutcome};
use crate::models::school::School;

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    links: ConfirmationLinks,
}

impl PgStore {
    pub fn new(pool: PgPool, links: ConfirmationLinks) -> Self {
        Self { pool, links }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub(crate) fn token_error(err: JwtError) -> StoreError {
    match err {
        JwtError::Expired => StoreError::ExpiredToken,
        _ => StoreError::InvalidToken,
    }
}

pub(crate) fn confirmation_error(err: ConfirmationError) -> StoreError {
    match err {
        ConfirmationError::Token(e) => StoreError::Backend(e.to_string()),
        ConfirmationError::Mail(e) => StoreError::Delivery(e.to_string()),
    }
}

pub(crate) fn check_password(password: &str, hash: &str) -> Result<bool, StoreError> {
    verify_password(password, hash).map_err(|e| StoreError::Backend(e.to_string()))
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn email_taken(&self, email: &str) -> Result<bool, StoreError> {
        Ok(Identity::email_taken(&self.pool, email).await?)
    }

    async fn create_identity(&self, email: &str, password_hash: &str) -> Result<Uuid, StoreError> {
        let identity = Identity::create(&self.pool, email, password_hash, true).await?;
        info!(identity_id = %identity.id, "Identity created");
        Ok(identity.id)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Uuid, StoreError> {
        let identity = Identity::find_by_email(&self.pool, email)
            .await?
            .ok_or(StoreError::InvalidCredential)?;

        if !check_password(password, &identity.password_hash)? {
            return Err(StoreError::InvalidCredential);
        }
        if !identity.email_verified {
            return Err(StoreError::EmailNotConfirmed);
        }

        Ok(identity.id)
    }

    async fn sign_up_with_callback(
        &self,
        email: &str,
        password_hash: &str,
        callback_url: &str,
    ) -> Result<Uuid, StoreError> {
        let identity_id = match Identity::find_by_email(&self.pool, email).await? {
            Some(existing) if existing.email_verified => return Err(StoreError::DuplicateEmail),
            Some(existing) => {
                debug!(identity_id = %existing.id, "Re-issuing link for unverified identity");
                Identity::reset_unverified(&self.pool, existing.id, password_hash).await?;
                existing.id
            }
            None => Identity::create(&self.pool, email, password_hash, false).await?.id,
        };

        self.links
            .issue(identity_id, email, callback_url)
            .await
            .map_err(confirmation_error)?;

        Ok(identity_id)
    }

    async fn exchange_token(&self, token: &str) -> Result<Uuid, StoreError> {
        let identity_id = self.links.redeem(token).map_err(token_error)?;

        if Identity::find_by_id(&self.pool, identity_id).await?.is_none() {
            warn!(identity_id = %identity_id, "Confirmation token for unknown identity");
            return Err(StoreError::InvalidToken);
        }

        Identity::mark_verified(&self.pool, identity_id).await?;
        Ok(identity_id)
    }

    async fn record_login(&self, identity_id: Uuid) -> Result<(), StoreError> {
        Ok(Identity::update_last_login(&self.pool, identity_id).await?)
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn insert_profile(&self, role: Role, profile: NewProfile) -> Result<Profile, StoreError> {
        match Profile::upsert(&self.pool, role, &profile).await? {
            UpsertOutcome::Written(profile) => Ok(profile),
            UpsertOutcome::IdentifierTaken => Err(StoreError::DuplicateIdentifier),
        }
    }

    async fn profile_exists(&self, role: Role, id: Uuid) -> Result<bool, StoreError> {
        Ok(Profile::exists(&self.pool, role, id).await?)
    }

    async fn find_profile(&self, role: Role, id: Uuid) -> Result<Option<Profile>, StoreError> {
        Ok(Profile::find(&self.pool, role, id).await?)
    }

    async fn institutional_id_taken(&self, institutional_id: &str) -> Result<bool, StoreError> {
        Ok(Profile::institutional_id_taken(&self.pool, institutional_id).await?)
    }
}

#[async_trait]
impl PendingStore for PgStore {
    async fn save(&self, record: &PendingRegistration) -> Result<(), StoreError> {
        Ok(PendingRegistration::save(&self.pool, record).await?)
    }

    async fn find(&self, id: Uuid) -> Result<Option<PendingRegistration>, StoreError> {
        Ok(PendingRegistration::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_identity(
        &self,
        identity_id: Uuid,
    ) -> Result<Option<PendingRegistration>, StoreError> {
        Ok(PendingRegistration::find_by_identity(&self.pool, identity_id).await?)
    }

    async fn mark_identity_created(&self, id: Uuid, identity_id: Uuid) -> Result<(), StoreError> {
        Ok(PendingRegistration::mark_identity_created(&self.pool, id, identity_id).await?)
    }

    async fn set_school(&self, id: Uuid, school_id: Uuid) -> Result<(), StoreError> {
        Ok(PendingRegistration::set_school(&self.pool, id, school_id).await?)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(PendingRegistration::delete(&self.pool, id).await?)
    }

    async fn list_identity_created(&self) -> Result<Vec<PendingRegistration>, StoreError> {
        Ok(PendingRegistration::list_identity_created(&self.pool).await?)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(PendingRegistration::purge_expired(&self.pool, now).await?)
    }
}

#[async_trait]
impl DomainStore for PgStore {
    async fn create_school(&self, name: &str) -> Result<School, StoreError> {
        Ok(School::create(&self.pool, name).await?)
    }

    async fn find_school(&self, id: Uuid) -> Result<Option<School>, StoreError> {
        Ok(School::find_by_id(&self.pool, id).await?)
    }

    async fn list_schools(&self) -> Result<Vec<School>, StoreError> {
        Ok(School::list(&self.pool).await?)
    }

    async fn list_events(&self, school_id: Option<Uuid>) -> Result<Vec<Event>, StoreError> {
        Ok(Event::list_by_school(&self.pool, school_id).await?)
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(Event::find_by_id(&self.pool, id).await?)
    }

    async fn create_event(&self, data: CreateEvent) -> Result<Event, StoreError> {
        Ok(Event::create(&self.pool, data).await?)
    }

    async fn list_announcements(
        &self,
        school_id: Option<Uuid>,
    ) -> Result<Vec<Announcement>, StoreError> {
        Ok(Announcement::list_by_school(&self.pool, school_id).await?)
    }

    async fn create_announcement(
        &self,
        data: CreateAnnouncement,
    ) -> Result<Announcement, StoreError> {
        Ok(Announcement::create(&self.pool, data).await?)
    }

    async fn list_feedback(&self, school_id: Option<Uuid>) -> Result<Vec<Feedback>, StoreError> {
        Ok(Feedback::list_by_school(&self.pool, school_id).await?)
    }

    async fn create_feedback(&self, data: CreateFeedback) -> Result<Feedback, StoreError> {
        Ok(Feedback::create(&self.pool, data).await?)
    }

    async fn is_registered(&self, user_id: Uuid, event_id: Uuid) -> Result<bool, StoreError> {
        Ok(EventRegistration::exists(&self.pool, user_id, event_id).await?)
    }

    async fn register_for_event(
        &self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> Result<EventRegistrationOutcome, StoreError> {
        if EventRegistration::insert(&self.pool, user_id, event_id).await? {
            Ok(EventRegistrationOutcome::Registered)
        } else {
            Ok(EventRegistrationOutcome::AlreadyRegistered)
        }
    }

    async fn list_registered_events(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RegisteredEvent>, StoreError> {
        Ok(EventRegistration::list_for_user(&self.pool, user_id).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::db::pool::health_check(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
