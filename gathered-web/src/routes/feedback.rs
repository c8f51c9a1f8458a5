/// Feedback
///
/// `POST /feedback` records a student's feedback, optionally about one
/// event of their school. Administrators review it on their dashboard.

use axum::{extract::State, response::Response, Form};
use gathered_shared::models::feedback::CreateFeedback;
use gathered_shared::models::profile::Role;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    app::AppState,
    error::{WebError, WebResult},
    flash::{self, Flash},
    session::CurrentUser,
};

#[derive(Debug, Deserialize)]
pub struct FeedbackForm {
    #[serde(default)]
    pub content: String,

    /// Blank means general feedback
    #[serde(default)]
    pub event_id: Option<String>,
}

/// `POST /feedback`
pub async fn submit_feedback(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<FeedbackForm>,
) -> WebResult<Response> {
    user.require(Role::Student)?;

    const BACK: &str = "/student/dashboard";

    let content = form.content.trim();
    if content.is_empty() {
        return Err(WebError::invalid("Feedback cannot be empty.", BACK));
    }

    let event_id = match form.event_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let id = Uuid::parse_str(raw).map_err(|_| WebError::invalid("Event not found.", BACK))?;
            let event = state
                .backend
                .domain
                .find_event(id)
                .await
                .map_err(|e| WebError::failed("Failed to send feedback.", BACK, e))?;

            match event {
                Some(event) if event.school_id == user.school_id => Some(id),
                _ => return Err(WebError::invalid("Event not found.", BACK)),
            }
        }
    };

    let feedback = state
        .backend
        .domain
        .create_feedback(CreateFeedback {
            school_id: user.school_id,
            user_id: user.identity_id,
            event_id,
            content: content.to_string(),
        })
        .await
        .map_err(|e| WebError::failed("Failed to send feedback.", BACK, e))?;

    info!(feedback_id = %feedback.id, "Feedback submitted");

    Ok(flash::redirect(BACK, Flash::success("Thank you for your feedback!")))
}
