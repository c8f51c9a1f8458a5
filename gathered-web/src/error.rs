/// Error handling for the web server
///
/// Every handler returns `Result<Response, WebError>`. A `WebError` never
/// renders an error page: it becomes a flash message plus a `303 See Other`
/// redirect to a page that can show it. Internal details are logged, never
/// shown to the user.
///
/// # Example
///
/// ```
/// use gathered_web::error::{WebError, WebResult};
///
/// fn check(title: &str) -> WebResult<()> {
///     if title.is_empty() {
///         return Err(WebError::invalid("All event fields are required.", "/events/new"));
///     }
///     Ok(())
/// }
/// ```

use axum::response::{IntoResponse, Response};
use gathered_shared::auth::jwt::JwtError;
use gathered_shared::flow::RegistrationError;
use std::fmt;

use crate::flash::{self, Flash};

/// Web result type alias
pub type WebResult<T> = Result<T, WebError>;

/// Unified web error type
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Bad input or a refused action; `message` is shown as-is
    #[error("Invalid: {message}")]
    Invalid { message: String, to: String },

    /// No valid session
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Logged in, but the page belongs to another role
    #[error("Access denied (redirect to {to})")]
    AccessDenied { to: String },

    /// A store or the mailer failed; `detail` is logged only
    #[error("{message} ({detail})")]
    Failed {
        message: String,
        to: String,
        detail: String,
    },

    /// Anything else; logged, shown as a generic message
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WebError {
    pub fn invalid(message: impl Into<String>, to: impl Into<String>) -> Self {
        WebError::Invalid {
            message: message.into(),
            to: to.into(),
        }
    }

    pub fn failed(
        message: impl Into<String>,
        to: impl Into<String>,
        detail: impl fmt::Display,
    ) -> Self {
        WebError::Failed {
            message: message.into(),
            to: to.into(),
            detail: detail.to_string(),
        }
    }

    /// "Failed to load {what}." and back to the home page
    pub fn load_failed(what: &str, detail: impl fmt::Display) -> Self {
        Self::failed(format!("Failed to load {what}."), "/", detail)
    }

    /// Maps a registration error onto a redirect target
    pub fn registration(err: RegistrationError, to: &str) -> Self {
        match err {
            RegistrationError::Upstream(detail) => Self::failed(
                RegistrationError::Upstream(String::new()).to_string(),
                to,
                detail,
            ),
            other => Self::invalid(other.to_string(), to),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (to, flash) = match self {
            WebError::Invalid { message, to } => (to, Flash::error(message)),
            WebError::Unauthenticated => {
                ("/login".to_string(), Flash::error("Please log in to continue."))
            }
            WebError::AccessDenied { to } => (to, Flash::error("Access denied.")),
            WebError::Failed {
                message,
                to,
                detail,
            } => {
                tracing::error!(error = %detail, "{}", message);
                (to, Flash::error(message))
            }
            WebError::Internal(msg) => {
                // Log internal errors but don't expose details to users
                tracing::error!("Internal error: {}", msg);
                ("/".to_string(), Flash::error("An internal error occurred."))
            }
        };

        flash::redirect(&to, flash)
    }
}

/// Token errors on request paths mean the session is unusable
impl From<JwtError> for WebError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => WebError::Internal(format!("Token creation failed: {}", msg)),
            _ => WebError::Unauthenticated,
        }
    }
}
