/// Session/role routing
///
/// After login or confirmation the caller's role is found by probing the
/// profile tables: administrators first, then students. The first hit wins,
/// so an id present in both tables is treated as an administrator.
///
/// The result is stored in the session token, so later requests read the
/// role from the session instead of probing again.

use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::profile::Role;
use crate::store::{ProfileStore, StoreError};

/// Probe order
pub const PROBE_ORDER: [Role; 2] = [Role::Administrator, Role::Student];

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// Identity exists but neither table has a profile for it
    #[error("User profile not found. Contact support.")]
    ProfileNotFound,

    #[error("Error checking user profile: {0}")]
    Store(#[from] StoreError),
}

/// Role and school resolved for an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRole {
    pub role: Role,
    pub school_id: Option<Uuid>,
    pub name: String,
}

impl ResolvedRole {
    pub fn dashboard_path(&self) -> &'static str {
        self.role.dashboard_path()
    }
}

#[derive(Clone)]
pub struct RoleRouter {
    profiles: Arc<dyn ProfileStore>,
}

impl RoleRouter {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }

    /// Finds the caller's role by probing the profile tables in order
    pub async fn resolve_role(&self, identity_id: Uuid) -> Result<ResolvedRole, RouteError> {
        for role in PROBE_ORDER {
            if let Some(profile) = self.profiles.find_profile(role, identity_id).await? {
                debug!(identity_id = %identity_id, role = %role, "Role resolved");
                return Ok(ResolvedRole {
                    role,
                    school_id: profile.school_id,
                    name: profile.name,
                });
            }
        }

        warn!(identity_id = %identity_id, "Authenticated identity has no profile");
        Err(RouteError::ProfileNotFound)
    }
}
