/// Registration and confirmation flow
///
/// Drives a sign-up from form submission to a complete account (identity
/// plus exactly one profile).
///
/// # Code mode
///
/// ```text
/// submit ──> PendingRegistration(awaiting_code) + mailed code
/// verify_code:
///   no record / no stored code ........ SessionExpired   (record dropped)
///   past expires_at ................... ExpiredChallenge (record dropped)
///   wrong code ........................ InvalidChallenge (record kept)
///   right code ──> create identity ──> identity_created ──> profile ──> done
///   email taken meanwhile ............. DuplicateEmail   (record kept to expire)
/// ```
///
/// # Link mode
///
/// ```text
/// submit ──> unverified identity + PendingRegistration(awaiting_link) + mailed link
/// confirm_link(token) ──> identity verified ──> identity_created ──> profile ──> done
/// ```
///
/// The profile write is idempotent on the identity id. A crash between the
/// identity and the profile write leaves the record in `identity_created`;
/// [`RegistrationFlow::reconcile_all`] and [`RegistrationFlow::reconcile_identity`]
/// finish those. Every submission also purges expired registrations that
/// never got past their challenge.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

use super::policy::{normalize_institutional_id, RegistrationPolicy, VerificationMode};
use crate::auth::otp;
use crate::auth::password::hash_password;
use crate::mail::{messages, Mailer};
use crate::models::pending_registration::{PendingRegistration, PendingStage};
use crate::models::profile::{NewProfile, Role};
use crate::store::{Backend, DomainStore, IdentityStore, PendingStore, ProfileStore, StoreError};

/// Error type for the registration flow
///
/// The `Display` text of every variant is safe to show to the user.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// Bad or missing input
    #[error("{0}")]
    Validation(String),

    #[error("A user with this email already exists.")]
    DuplicateEmail,

    #[error("This ID is already registered.")]
    DuplicateIdentifier,

    /// No usable pending registration
    #[error("Session expired or invalid. Please register again.")]
    SessionExpired,

    /// Code or link used after its expiry
    #[error("Verification has expired. Please register again.")]
    ExpiredChallenge,

    /// Wrong code or unusable link
    #[error("Invalid verification code. Please try again.")]
    InvalidChallenge,

    /// A store or the mailer failed; the detail is for logs only
    #[error("Registration failed. Please try again later.")]
    Upstream(String),
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => RegistrationError::DuplicateEmail,
            StoreError::DuplicateIdentifier => RegistrationError::DuplicateIdentifier,
            StoreError::ExpiredToken => RegistrationError::ExpiredChallenge,
            StoreError::InvalidToken => RegistrationError::InvalidChallenge,
            other => RegistrationError::Upstream(other.to_string()),
        }
    }
}

/// Registration form as submitted
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegistrationForm {
    #[serde(default)]
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub confirm_password: String,

    #[serde(default)]
    #[validate(length(max = 100, message = "Name must be at most 100 characters."))]
    pub name: String,

    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub school_id: Option<String>,

    #[serde(default)]
    #[validate(length(max = 100, message = "School name must be at most 100 characters."))]
    pub new_school_name: Option<String>,

    #[serde(default)]
    pub institutional_id: Option<String>,
}

impl RegistrationForm {
    /// Trims every field, lowercases the email and turns blank optionals
    /// into `None`. Passwords are left untouched.
    fn normalized(&self) -> Self {
        fn optional(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        Self {
            email: self.email.trim().to_lowercase(),
            password: self.password.clone(),
            confirm_password: self.confirm_password.clone(),
            name: self.name.trim().to_string(),
            role: self.role.trim().to_lowercase(),
            school_id: optional(&self.school_id),
            new_school_name: optional(&self.new_school_name),
            institutional_id: optional(&self.institutional_id),
        }
    }
}

/// A form that passed the checks that need no store
#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    pub school_id: Option<String>,
    pub new_school_name: Option<String>,
    /// Formatted `XX-XXXX-XXX`
    pub institutional_id: Option<String>,
}

/// What `submit` dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A code was mailed; the browser keeps `pending_id`
    CodeSent {
        pending_id: Uuid,
        expires_at: DateTime<Utc>,
    },

    /// A confirmation link was mailed
    LinkSent { identity_id: Uuid },
}

/// A finished registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    pub identity_id: Uuid,
    pub role: Role,
    pub school_id: Option<Uuid>,
}

/// Counts from one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub completed: usize,
    pub failed: usize,
    pub purged: u64,
}

/// Registration/confirmation orchestration over the store traits
#[derive(Clone)]
pub struct RegistrationFlow {
    identities: Arc<dyn IdentityStore>,
    profiles: Arc<dyn ProfileStore>,
    pending: Arc<dyn PendingStore>,
    domain: Arc<dyn DomainStore>,
    mailer: Arc<dyn Mailer>,
    policy: RegistrationPolicy,
}

impl RegistrationFlow {
    pub fn new(backend: &Backend, mailer: Arc<dyn Mailer>, policy: RegistrationPolicy) -> Self {
        Self {
            identities: backend.identities.clone(),
            profiles: backend.profiles.clone(),
            pending: backend.pending.clone(),
            domain: backend.domain.clone(),
            mailer,
            policy,
        }
    }

    pub fn policy(&self) -> &RegistrationPolicy {
        &self.policy
    }

    /// Checks that need no store: required fields, formats, password
    /// confirmation, email domain and institutional id shape
    pub fn validate(&self, form: &RegistrationForm) -> Result<ValidRegistration, RegistrationError> {
        let form = form.normalized();

        let missing_id = self.policy.require_institutional_id && form.institutional_id.is_none();
        if form.email.is_empty()
            || form.password.is_empty()
            || form.confirm_password.is_empty()
            || form.name.is_empty()
            || form.role.is_empty()
            || missing_id
        {
            return Err(RegistrationError::Validation(
                "All fields are required.".to_string(),
            ));
        }

        let role: Role = form
            .role
            .parse()
            .map_err(|_| RegistrationError::Validation("Choose a valid role.".to_string()))?;

        form.validate().map_err(|e| {
            let message = e
                .field_errors()
                .values()
                .flat_map(|errors| errors.iter())
                .filter_map(|error| error.message.as_ref().map(|m| m.to_string()))
                .next()
                .unwrap_or_else(|| "Invalid registration details.".to_string());
            RegistrationError::Validation(message)
        })?;

        if form.password != form.confirm_password {
            return Err(RegistrationError::Validation(
                "Passwords do not match.".to_string(),
            ));
        }

        if !self.policy.email_allowed(&form.email) {
            let domain = self.policy.email_domain.as_deref().unwrap_or_default();
            return Err(RegistrationError::Validation(format!(
                "Registration is limited to @{} email addresses only.",
                domain.trim_start_matches('@')
            )));
        }

        let institutional_id = if self.policy.require_institutional_id {
            let raw = form.institutional_id.as_deref().unwrap_or_default();
            Some(normalize_institutional_id(raw).ok_or_else(|| {
                RegistrationError::Validation("The ID must be exactly 9 digits long.".to_string())
            })?)
        } else {
            None
        };

        Ok(ValidRegistration {
            email: form.email,
            password: form.password,
            name: form.name,
            role,
            school_id: form.school_id,
            new_school_name: form.new_school_name,
            institutional_id,
        })
    }

    /// Validates a registration and dispatches its challenge
    pub async fn submit(&self, form: &RegistrationForm) -> Result<SubmitOutcome, RegistrationError> {
        let valid = self.validate(form)?;

        if self.identities.email_taken(&valid.email).await? {
            return Err(RegistrationError::DuplicateEmail);
        }

        if let Some(institutional_id) = &valid.institutional_id {
            if self.profiles.institutional_id_taken(institutional_id).await? {
                return Err(RegistrationError::DuplicateIdentifier);
            }
        }

        let (school_id, new_school_name) = self.resolve_school(&valid).await?;

        let password_hash =
            hash_password(&valid.password).map_err(|e| RegistrationError::Upstream(e.to_string()))?;

        let now = Utc::now();
        self.purge_abandoned(now).await;

        let mut record = PendingRegistration {
            id: Uuid::new_v4(),
            email: valid.email,
            password_hash,
            name: valid.name,
            role: valid.role,
            school_id,
            new_school_name,
            institutional_id: valid.institutional_id,
            code_hash: None,
            stage: PendingStage::AwaitingCode,
            identity_id: None,
            expires_at: now,
            created_at: now,
        };

        match self.policy.verification {
            VerificationMode::Code => self.dispatch_code(record, now).await,
            VerificationMode::Link => {
                let identity_id = self
                    .identities
                    .sign_up_with_callback(
                        &record.email,
                        &record.password_hash,
                        &self.policy.callback_url,
                    )
                    .await?;

                record.id = identity_id;
                record.identity_id = Some(identity_id);
                record.stage = PendingStage::AwaitingLink;
                record.expires_at = now + self.policy.link_ttl;
                self.pending.save(&record).await?;

                info!(identity_id = %identity_id, role = %record.role, "Confirmation link sent");
                Ok(SubmitOutcome::LinkSent { identity_id })
            }
        }
    }

    /// Drops expired, never-verified registrations; failures only log
    async fn purge_abandoned(&self, now: DateTime<Utc>) {
        match self.pending.purge_expired(now).await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "Abandoned registrations purged"),
            Err(e) => warn!(error = %e, "Failed to purge abandoned registrations"),
        }
    }

    async fn dispatch_code(
        &self,
        mut record: PendingRegistration,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, RegistrationError> {
        let code = otp::generate_code();
        record.code_hash = Some(otp::hash_code(record.id, &code));
        record.expires_at = now + self.policy.code_ttl;

        self.pending.save(&record).await?;

        let email = messages::verification_code(
            &record.email,
            &record.name,
            &code,
            self.policy.code_ttl.num_minutes(),
        );

        if let Err(e) = self.mailer.send(email).await {
            warn!(pending_id = %record.id, error = %e, "Verification code not delivered");
            if let Err(cleanup) = self.pending.delete(record.id).await {
                error!(pending_id = %record.id, error = %cleanup, "Failed to drop undeliverable registration");
            }
            return Err(RegistrationError::Upstream(e.to_string()));
        }

        info!(pending_id = %record.id, role = %record.role, "Verification code sent");
        Ok(SubmitOutcome::CodeSent {
            pending_id: record.id,
            expires_at: record.expires_at,
        })
    }

    /// Role-specific school requirement
    ///
    /// Returns the existing school id, or the new school name an
    /// administrator asked for.
    async fn resolve_school(
        &self,
        valid: &ValidRegistration,
    ) -> Result<(Option<Uuid>, Option<String>), RegistrationError> {
        match (&valid.school_id, valid.role) {
            (Some(raw), _) => {
                let id = Uuid::parse_str(raw).map_err(|_| {
                    RegistrationError::Validation("Selected school does not exist.".to_string())
                })?;
                if self.domain.find_school(id).await?.is_none() {
                    return Err(RegistrationError::Validation(
                        "Selected school does not exist.".to_string(),
                    ));
                }
                Ok((Some(id), None))
            }
            (None, Role::Student) => Err(RegistrationError::Validation(
                "Students must select a school.".to_string(),
            )),
            (None, Role::Administrator) => match &valid.new_school_name {
                Some(name) => Ok((None, Some(name.clone()))),
                None => Err(RegistrationError::Validation(
                    "Select a school or enter a new school name.".to_string(),
                )),
            },
        }
    }

    /// Looks up a pending registration
    pub async fn pending(&self, id: Uuid) -> Result<Option<PendingRegistration>, RegistrationError> {
        Ok(self.pending.find(id).await?)
    }

    /// Checks a submitted code (code mode)
    pub async fn verify_code(
        &self,
        pending_id: Uuid,
        code: &str,
    ) -> Result<Completed, RegistrationError> {
        self.verify_code_at(pending_id, code, Utc::now()).await
    }

    /// [`verify_code`](Self::verify_code) with an explicit clock
    pub async fn verify_code_at(
        &self,
        pending_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Completed, RegistrationError> {
        let record = self
            .pending
            .find(pending_id)
            .await?
            .ok_or(RegistrationError::SessionExpired)?;

        if record.stage == PendingStage::IdentityCreated {
            if let Some(identity_id) = record.identity_id {
                debug!(pending_id = %pending_id, "Resuming registration after identity creation");
                return self.complete_profile(record, identity_id).await;
            }
        }

        let code_hash = match (&record.stage, record.code_hash.as_deref()) {
            (PendingStage::AwaitingCode, Some(hash)) if !hash.is_empty() => hash.to_string(),
            _ => {
                self.pending.delete(pending_id).await?;
                return Err(RegistrationError::SessionExpired);
            }
        };

        if record.is_expired_at(now) {
            self.pending.delete(pending_id).await?;
            info!(pending_id = %pending_id, "Verification code expired");
            return Err(RegistrationError::ExpiredChallenge);
        }

        if !otp::code_matches(pending_id, code, &code_hash) {
            debug!(pending_id = %pending_id, "Verification code mismatch");
            return Err(RegistrationError::InvalidChallenge);
        }

        let identity_id = match self
            .identities
            .create_identity(&record.email, &record.password_hash)
            .await
        {
            Ok(id) => id,
            Err(StoreError::DuplicateEmail) => {
                // A double submit of this same code may have won the race
                if let Some(current) = self.pending.find(pending_id).await? {
                    if let (PendingStage::IdentityCreated, Some(identity_id)) =
                        (current.stage, current.identity_id)
                    {
                        debug!(pending_id = %pending_id, "Identity created by a parallel verification");
                        return self.complete_profile(current, identity_id).await;
                    }
                }
                warn!(pending_id = %pending_id, "Email registered by another account");
                return Err(RegistrationError::DuplicateEmail);
            }
            Err(e) => return Err(e.into()),
        };

        self.pending
            .mark_identity_created(pending_id, identity_id)
            .await?;

        self.complete_profile(record, identity_id).await
    }

    /// Completes a registration from its emailed link (link mode)
    pub async fn confirm_link(&self, token: &str) -> Result<Completed, RegistrationError> {
        let identity_id = self.identities.exchange_token(token).await?;

        let Some(record) = self.pending.find_by_identity(identity_id).await? else {
            for role in [Role::Administrator, Role::Student] {
                if let Some(profile) = self.profiles.find_profile(role, identity_id).await? {
                    debug!(identity_id = %identity_id, "Link already confirmed");
                    return Ok(Completed {
                        identity_id,
                        role,
                        school_id: profile.school_id,
                    });
                }
            }
            return Err(RegistrationError::SessionExpired);
        };

        if record.stage != PendingStage::IdentityCreated {
            self.pending
                .mark_identity_created(record.id, identity_id)
                .await?;
        }

        self.complete_profile(record, identity_id).await
    }

    /// Writes the profile for a verified identity, then drops the record
    async fn complete_profile(
        &self,
        record: PendingRegistration,
        identity_id: Uuid,
    ) -> Result<Completed, RegistrationError> {
        let mut school_id = record.school_id;

        if school_id.is_none() {
            if let Some(name) = &record.new_school_name {
                let school = self.domain.create_school(name).await?;
                self.pending.set_school(record.id, school.id).await?;
                info!(school_id = %school.id, "School created during registration");
                school_id = Some(school.id);
            }
        }

        let profile = NewProfile {
            school_id,
            ..record.profile_for(identity_id)
        };

        self.profiles
            .insert_profile(record.role, profile)
            .await
            .map_err(|e| {
                error!(identity_id = %identity_id, error = %e, "Profile write failed");
                RegistrationError::from(e)
            })?;

        self.pending.delete(record.id).await?;

        info!(identity_id = %identity_id, role = %record.role, "Registration completed");
        Ok(Completed {
            identity_id,
            role: record.role,
            school_id,
        })
    }

    /// Finishes a stalled registration for one identity
    ///
    /// Returns `None` when there is nothing to finish.
    pub async fn reconcile_identity(
        &self,
        identity_id: Uuid,
    ) -> Result<Option<Completed>, RegistrationError> {
        match self.pending.find_by_identity(identity_id).await? {
            Some(record) if record.stage == PendingStage::IdentityCreated => {
                warn!(identity_id = %identity_id, "Reconciling identity without profile");
                self.complete_profile(record, identity_id).await.map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Finishes every stalled registration and purges expired ones
    pub async fn reconcile_all(&self) -> Result<ReconcileReport, RegistrationError> {
        let mut report = ReconcileReport::default();

        for record in self.pending.list_identity_created().await? {
            let Some(identity_id) = record.identity_id else {
                continue;
            };
            match self.complete_profile(record, identity_id).await {
                Ok(_) => report.completed += 1,
                Err(e) => {
                    error!(identity_id = %identity_id, error = ?e, "Reconciliation failed");
                    report.failed += 1;
                }
            }
        }

        report.purged = self.pending.purge_expired(Utc::now()).await?;

        info!(
            completed = report.completed,
            failed = report.failed,
            purged = report.purged,
            "Pending registrations reconciled"
        );
        Ok(report)
    }
}
