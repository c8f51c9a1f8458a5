/// In-memory store backend
///
/// Implements every store trait over a single mutex-guarded state, with the
/// same uniqueness rules as the PostgreSQL schema. Used by the test suites
/// and by `APP_BACKEND=memory` for local demos.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::postgres::{check_password, confirmation_error, token_error};
use super::{
    DomainStore, EventRegistrationOutcome, IdentityStore, PendingStore, ProfileStore, StoreError,
};
use crate::auth::confirmation::ConfirmationLinks;
use crate::models::announcement::{Announcement, CreateAnnouncement};
use crate::models::event::{CreateEvent, Event};
use crate::models::event_registration::RegisteredEvent;
use crate::models::feedback::{CreateFeedback, Feedback};
use crate::models::identity::Identity;
use crate::models::pending_registration::{PendingRegistration, PendingStage};
use crate::models::profile::{NewProfile, Profile, Role};
use crate::models::school::School;

#[derive(Default)]
struct State {
    identities: HashMap<Uuid, Identity>,
    admins: HashMap<Uuid, Profile>,
    students: HashMap<Uuid, Profile>,
    institutional_ids: HashMap<String, Uuid>,
    pending: HashMap<Uuid, PendingRegistration>,
    schools: HashMap<Uuid, School>,
    events: Vec<Event>,
    announcements: Vec<Announcement>,
    feedback: Vec<Feedback>,
    registrations: HashMap<(Uuid, Uuid), DateTime<Utc>>,
}

impl State {
    fn profiles(&self, role: Role) -> &HashMap<Uuid, Profile> {
        match role {
            Role::Administrator => &self.admins,
            Role::Student => &self.students,
        }
    }

    fn profiles_mut(&mut self, role: Role) -> &mut HashMap<Uuid, Profile> {
        match role {
            Role::Administrator => &mut self.admins,
            Role::Student => &mut self.students,
        }
    }

    fn identity_by_email(&self, email: &str) -> Option<&Identity> {
        self.identities.values().find(|i| i.email == email)
    }
}

/// Store kept entirely in process memory
pub struct MemoryStore {
    state: Mutex<State>,
    links: ConfirmationLinks,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new(links: ConfirmationLinks) -> Self {
        Self {
            state: Mutex::new(State::default()),
            links,
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Makes the domain listing reads fail, to exercise error paths
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated read failure".to_string()));
        }
        Ok(())
    }

    pub async fn identity_count(&self) -> usize {
        self.state.lock().await.identities.len()
    }

    pub async fn profile_count(&self, role: Role) -> usize {
        self.state.lock().await.profiles(role).len()
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn find_identity_by_email(&self, email: &str) -> Option<Identity> {
        self.state.lock().await.identity_by_email(email).cloned()
    }

    /// Moves every pending expiry `by` into the past
    pub async fn age_pending(&self, by: Duration) {
        for record in self.state.lock().await.pending.values_mut() {
            record.expires_at = record.expires_at - by;
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn email_taken(&self, email: &str) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .identity_by_email(email)
            .is_some_and(|identity| identity.email_verified))
    }

    async fn create_identity(&self, email: &str, password_hash: &str) -> Result<Uuid, StoreError> {
        let mut state = self.state.lock().await;
        if state.identity_by_email(email).is_some() {
            return Err(StoreError::DuplicateEmail);
        }

        let identity = new_identity(email, password_hash, true);
        let id = identity.id;
        state.identities.insert(id, identity);
        Ok(id)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Uuid, StoreError> {
        let identity = {
            let state = self.state.lock().await;
            state
                .identity_by_email(email)
                .cloned()
                .ok_or(StoreError::InvalidCredential)?
        };

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
        let identity_id = {
            let mut state = self.state.lock().await;
            let existing = state
                .identity_by_email(email)
                .map(|identity| (identity.id, identity.email_verified));

            match existing {
                Some((_, true)) => return Err(StoreError::DuplicateEmail),
                Some((id, false)) => {
                    if let Some(identity) = state.identities.get_mut(&id) {
                        identity.password_hash = password_hash.to_string();
                    }
                    id
                }
                None => {
                    let identity = new_identity(email, password_hash, false);
                    let id = identity.id;
                    state.identities.insert(id, identity);
                    id
                }
            }
        };

        self.links
            .issue(identity_id, email, callback_url)
            .await
            .map_err(confirmation_error)?;

        Ok(identity_id)
    }

    async fn exchange_token(&self, token: &str) -> Result<Uuid, StoreError> {
        let identity_id = self.links.redeem(token).map_err(token_error)?;

        let mut state = self.state.lock().await;
        let identity = state
            .identities
            .get_mut(&identity_id)
            .ok_or(StoreError::InvalidToken)?;
        identity.email_verified = true;

        Ok(identity_id)
    }

    async fn record_login(&self, identity_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(identity) = state.identities.get_mut(&identity_id) {
            identity.last_login_at = Some(Utc::now());
        }
        Ok(())
    }
}

fn new_identity(email: &str, password_hash: &str, email_verified: bool) -> Identity {
    Identity {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        email_verified,
        created_at: Utc::now(),
        last_login_at: None,
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn insert_profile(&self, role: Role, profile: NewProfile) -> Result<Profile, StoreError> {
        let mut state = self.state.lock().await;

        if let Some(institutional_id) = &profile.institutional_id {
            match state.institutional_ids.get(institutional_id) {
                Some(owner) if *owner != profile.id => return Err(StoreError::DuplicateIdentifier),
                _ => {
                    state
                        .institutional_ids
                        .insert(institutional_id.clone(), profile.id);
                }
            }
        }

        let table = state.profiles_mut(role);
        let created_at = table
            .get(&profile.id)
            .map(|existing| existing.created_at)
            .unwrap_or_else(Utc::now);

        let row = Profile {
            id: profile.id,
            name: profile.name,
            school_id: profile.school_id,
            institutional_id: profile.institutional_id,
            created_at,
        };
        table.insert(row.id, row.clone());

        Ok(row)
    }

    async fn profile_exists(&self, role: Role, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.profiles(role).contains_key(&id))
    }

    async fn find_profile(&self, role: Role, id: Uuid) -> Result<Option<Profile>, StoreError> {
        Ok(self.state.lock().await.profiles(role).get(&id).cloned())
    }

    async fn institutional_id_taken(&self, institutional_id: &str) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        let in_table = |role: Role| {
            state
                .profiles(role)
                .values()
                .any(|p| p.institutional_id.as_deref() == Some(institutional_id))
        };

        Ok(state.institutional_ids.contains_key(institutional_id)
            || in_table(Role::Administrator)
            || in_table(Role::Student))
    }
}

#[async_trait]
impl PendingStore for MemoryStore {
    async fn save(&self, record: &PendingRegistration) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .pending
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<PendingRegistration>, StoreError> {
        Ok(self.state.lock().await.pending.get(&id).cloned())
    }

    async fn find_by_identity(
        &self,
        identity_id: Uuid,
    ) -> Result<Option<PendingRegistration>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .pending
            .values()
            .find(|p| p.identity_id == Some(identity_id))
            .cloned())
    }

    async fn mark_identity_created(&self, id: Uuid, identity_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(record) = state.pending.get_mut(&id) {
            record.stage = PendingStage::IdentityCreated;
            record.identity_id = Some(identity_id);
            record.code_hash = None;
        }
        Ok(())
    }

    async fn set_school(&self, id: Uuid, school_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(record) = state.pending.get_mut(&id) {
            record.school_id = Some(school_id);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.pending.remove(&id).is_some())
    }

    async fn list_identity_created(&self) -> Result<Vec<PendingRegistration>, StoreError> {
        let state = self.state.lock().await;
        let mut records: Vec<_> = state
            .pending
            .values()
            .filter(|p| p.stage == PendingStage::IdentityCreated)
            .cloned()
            .collect();
        records.sort_by_key(|p| p.created_at);
        Ok(records)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.pending.len();
        state
            .pending
            .retain(|_, p| p.stage == PendingStage::IdentityCreated || p.expires_at >= now);
        Ok((before - state.pending.len()) as u64)
    }
}

#[async_trait]
impl DomainStore for MemoryStore {
    async fn create_school(&self, name: &str) -> Result<School, StoreError> {
        let school = School {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.state
            .lock()
            .await
            .schools
            .insert(school.id, school.clone());
        Ok(school)
    }

    async fn find_school(&self, id: Uuid) -> Result<Option<School>, StoreError> {
        Ok(self.state.lock().await.schools.get(&id).cloned())
    }

    async fn list_schools(&self) -> Result<Vec<School>, StoreError> {
        self.check_reads()?;
        let mut schools: Vec<_> = self.state.lock().await.schools.values().cloned().collect();
        schools.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(schools)
    }

    async fn list_events(&self, school_id: Option<Uuid>) -> Result<Vec<Event>, StoreError> {
        self.check_reads()?;
        let state = self.state.lock().await;
        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| e.school_id == school_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.events.iter().find(|e| e.id == id).cloned())
    }

    async fn create_event(&self, data: CreateEvent) -> Result<Event, StoreError> {
        let event = Event {
            id: Uuid::new_v4(),
            school_id: data.school_id,
            title: data.title,
            description: data.description,
            starts_at: data.starts_at,
            created_by: data.created_by,
            created_at: Utc::now(),
        };
        self.state.lock().await.events.push(event.clone());
        Ok(event)
    }

    async fn list_announcements(
        &self,
        school_id: Option<Uuid>,
    ) -> Result<Vec<Announcement>, StoreError> {
        self.check_reads()?;
        let state = self.state.lock().await;
        // insertion order is creation order; newest first
        Ok(state
            .announcements
            .iter()
            .rev()
            .filter(|a| a.school_id == school_id)
            .cloned()
            .collect())
    }

    async fn create_announcement(
        &self,
        data: CreateAnnouncement,
    ) -> Result<Announcement, StoreError> {
        let announcement = Announcement {
            id: Uuid::new_v4(),
            school_id: data.school_id,
            title: data.title,
            content: data.content,
            created_by: data.created_by,
            created_at: Utc::now(),
        };
        self.state
            .lock()
            .await
            .announcements
            .push(announcement.clone());
        Ok(announcement)
    }

    async fn list_feedback(&self, school_id: Option<Uuid>) -> Result<Vec<Feedback>, StoreError> {
        self.check_reads()?;
        let state = self.state.lock().await;
        Ok(state
            .feedback
            .iter()
            .rev()
            .filter(|f| f.school_id == school_id)
            .cloned()
            .collect())
    }

    async fn create_feedback(&self, data: CreateFeedback) -> Result<Feedback, StoreError> {
        let feedback = Feedback {
            id: Uuid::new_v4(),
            school_id: data.school_id,
            user_id: data.user_id,
            event_id: data.event_id,
            content: data.content,
            created_at: Utc::now(),
        };
        self.state.lock().await.feedback.push(feedback.clone());
        Ok(feedback)
    }

    async fn is_registered(&self, user_id: Uuid, event_id: Uuid) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state.registrations.contains_key(&(user_id, event_id)))
    }

    async fn register_for_event(
        &self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> Result<EventRegistrationOutcome, StoreError> {
        let mut state = self.state.lock().await;
        if !state.events.iter().any(|e| e.id == event_id) {
            return Err(StoreError::NotFound);
        }
        if state.registrations.contains_key(&(user_id, event_id)) {
            return Ok(EventRegistrationOutcome::AlreadyRegistered);
        }

        state.registrations.insert((user_id, event_id), Utc::now());
        Ok(EventRegistrationOutcome::Registered)
    }

    async fn list_registered_events(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RegisteredEvent>, StoreError> {
        self.check_reads()?;
        let state = self.state.lock().await;
        let mut events: Vec<_> = state
            .events
            .iter()
            .filter_map(|event| {
                state
                    .registrations
                    .get(&(user_id, event.id))
                    .map(|registered_at| RegisteredEvent {
                        event: event.clone(),
                        registered_at: *registered_at,
                    })
            })
            .collect();
        events.sort_by(|a, b| {
            a.event
                .starts_at
                .cmp(&b.event.starts_at)
                .then(a.event.id.cmp(&b.event.id))
        });
        Ok(events)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
