/// Store traits
///
/// Every piece of persistent state is reached through one of these traits:
///
/// - [`IdentityStore`]: accounts, credentials and confirmation links
/// - [`ProfileStore`]: administrator and student profiles
/// - [`PendingStore`]: registrations awaiting verification
/// - [`DomainStore`]: schools, events, announcements, feedback and event
///   registrations
///
/// Two backends implement all four: [`PgStore`] (PostgreSQL, production) and
/// [`MemoryStore`] (in-process, tests and demos). [`Backend`] bundles the
/// four trait objects the web server needs.
///
/// Uniqueness (email, institutional id, event registration pair) is
/// enforced here. Callers may pre-check, but the store is authoritative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::confirmation::ConfirmationLinks;
use crate::models::announcement::{Announcement, CreateAnnouncement};
use crate::models::event::{CreateEvent, Event};
use crate::models::event_registration::RegisteredEvent;
use crate::models::feedback::{CreateFeedback, Feedback};
use crate::models::pending_registration::PendingRegistration;
use crate::models::profile::{NewProfile, Profile, Role};
use crate::models::school::School;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A verified identity already owns this email
    #[error("Email already registered")]
    DuplicateEmail,

    /// The institutional id belongs to another profile
    #[error("Institutional id already registered")]
    DuplicateIdentifier,

    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredential,

    /// Correct password, but the email was never confirmed
    #[error("Email not confirmed")]
    EmailNotConfirmed,

    /// Confirmation token is malformed, forged or unknown
    #[error("Invalid confirmation token")]
    InvalidToken,

    /// Confirmation token has expired
    #[error("Confirmation token expired")]
    ExpiredToken,

    #[error("Not found")]
    NotFound,

    /// Outbound email failed
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Database or other backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                let constraint = db.constraint().unwrap_or_default();
                if constraint.contains("email") {
                    return StoreError::DuplicateEmail;
                }
                if constraint.contains("institutional_id") {
                    return StoreError::DuplicateIdentifier;
                }
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// Outcome of registering a user for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRegistrationOutcome {
    Registered,
    AlreadyRegistered,
}

/// Accounts and credentials
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// True if a verified identity owns `email`
    async fn email_taken(&self, email: &str) -> Result<bool, StoreError>;

    /// Creates a verified identity
    ///
    /// Fails with [`StoreError::DuplicateEmail`] if the email exists.
    async fn create_identity(&self, email: &str, password_hash: &str) -> Result<Uuid, StoreError>;

    /// Checks credentials and returns the identity id
    async fn authenticate(&self, email: &str, password: &str) -> Result<Uuid, StoreError>;

    /// Creates (or refreshes) an unverified identity and mails it a
    /// confirmation link pointing at `callback_url`
    async fn sign_up_with_callback(
        &self,
        email: &str,
        password_hash: &str,
        callback_url: &str,
    ) -> Result<Uuid, StoreError>;

    /// Redeems a confirmation token, marking the identity verified
    async fn exchange_token(&self, token: &str) -> Result<Uuid, StoreError>;

    async fn record_login(&self, identity_id: Uuid) -> Result<(), StoreError>;
}

/// Administrator and student profiles
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Writes the profile for `profile.id`; idempotent on the id
    async fn insert_profile(&self, role: Role, profile: NewProfile) -> Result<Profile, StoreError>;

    async fn profile_exists(&self, role: Role, id: Uuid) -> Result<bool, StoreError>;

    async fn find_profile(&self, role: Role, id: Uuid) -> Result<Option<Profile>, StoreError>;

    /// True if either profile table holds `institutional_id`
    async fn institutional_id_taken(&self, institutional_id: &str) -> Result<bool, StoreError>;
}

/// Registrations awaiting verification
#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Inserts or replaces a record
    async fn save(&self, record: &PendingRegistration) -> Result<(), StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<PendingRegistration>, StoreError>;

    async fn find_by_identity(
        &self,
        identity_id: Uuid,
    ) -> Result<Option<PendingRegistration>, StoreError>;

    async fn mark_identity_created(&self, id: Uuid, identity_id: Uuid) -> Result<(), StoreError>;

    async fn set_school(&self, id: Uuid, school_id: Uuid) -> Result<(), StoreError>;

    /// Deletes a record; returns whether it existed
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn list_identity_created(&self) -> Result<Vec<PendingRegistration>, StoreError>;

    /// Deletes unverified records that expired before `now`
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Schools and school-scoped content
#[async_trait]
pub trait DomainStore: Send + Sync {
    async fn create_school(&self, name: &str) -> Result<School, StoreError>;

    async fn find_school(&self, id: Uuid) -> Result<Option<School>, StoreError>;

    async fn list_schools(&self) -> Result<Vec<School>, StoreError>;

    async fn list_events(&self, school_id: Option<Uuid>) -> Result<Vec<Event>, StoreError>;

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    async fn create_event(&self, data: CreateEvent) -> Result<Event, StoreError>;

    async fn list_announcements(
        &self,
        school_id: Option<Uuid>,
    ) -> Result<Vec<Announcement>, StoreError>;

    async fn create_announcement(
        &self,
        data: CreateAnnouncement,
    ) -> Result<Announcement, StoreError>;

    async fn list_feedback(&self, school_id: Option<Uuid>) -> Result<Vec<Feedback>, StoreError>;

    async fn create_feedback(&self, data: CreateFeedback) -> Result<Feedback, StoreError>;

    async fn is_registered(&self, user_id: Uuid, event_id: Uuid) -> Result<bool, StoreError>;

    /// Registers a user for an event; registering twice is not an error
    async fn register_for_event(
        &self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> Result<EventRegistrationOutcome, StoreError>;

    async fn list_registered_events(&self, user_id: Uuid)
        -> Result<Vec<RegisteredEvent>, StoreError>;

    /// Liveness check for `/health`
    async fn ping(&self) -> Result<(), StoreError>;
}

/// The store trait objects used by the application
#[derive(Clone)]
pub struct Backend {
    pub identities: Arc<dyn IdentityStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub pending: Arc<dyn PendingStore>,
    pub domain: Arc<dyn DomainStore>,
}

impl Backend {
    /// PostgreSQL backend
    pub fn postgres(pool: sqlx::PgPool, links: ConfirmationLinks) -> Self {
        Self::from_store(Arc::new(PgStore::new(pool, links)))
    }

    /// Fresh in-memory backend
    pub fn memory(links: ConfirmationLinks) -> Self {
        Self::from_store(Arc::new(MemoryStore::new(links)))
    }

    /// Uses one store for all four roles
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: IdentityStore + ProfileStore + PendingStore + DomainStore + 'static,
    {
        Self {
            identities: store.clone(),
            profiles: store.clone(),
            pending: store.clone(),
            domain: store,
        }
    }
}
