/// Account flows
///
/// - [`registration`]: sign-up, code or link verification, profile creation
///   and reconciliation of stalled registrations
/// - [`router`]: resolving the role of an authenticated identity
/// - [`policy`]: deployment switches for registration

pub mod policy;
pub mod registration;
pub mod router;

pub use policy::{RegistrationPolicy, VerificationMode};
pub use registration::{
    Completed, ReconcileReport, RegistrationError, RegistrationFlow, RegistrationForm,
    SubmitOutcome,
};
pub use router::{ResolvedRole, RoleRouter, RouteError};
