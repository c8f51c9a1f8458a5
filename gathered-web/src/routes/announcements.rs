/// Announcements
///
/// `POST /announcements` posts an announcement to the administrator's
/// school; students see it on their dashboard.

use axum::{extract::State, response::Response, Form};
use gathered_shared::models::announcement::CreateAnnouncement;
use gathered_shared::models::profile::Role;
use serde::Deserialize;
use tracing::info;

use crate::{
    app::AppState,
    error::{WebError, WebResult},
    flash::{self, Flash},
    session::CurrentUser,
};

#[derive(Debug, Deserialize)]
pub struct AnnouncementForm {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub content: String,
}

/// `POST /announcements`
pub async fn create_announcement(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<AnnouncementForm>,
) -> WebResult<Response> {
    user.require(Role::Administrator)?;

    let title = form.title.trim();
    let content = form.content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(WebError::invalid(
            "Title and content are required.",
            "/admin/dashboard",
        ));
    }

    let announcement = state
        .backend
        .domain
        .create_announcement(CreateAnnouncement {
            school_id: user.school_id,
            title: title.to_string(),
            content: content.to_string(),
            created_by: Some(user.identity_id),
        })
        .await
        .map_err(|e| WebError::failed("Failed to post announcement.", "/admin/dashboard", e))?;

    info!(announcement_id = %announcement.id, "Announcement posted");

    Ok(flash::redirect(
        "/admin/dashboard",
        Flash::success("Announcement posted!"),
    ))
}
