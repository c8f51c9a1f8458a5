/// Dashboards
///
/// # Endpoints
///
/// - `GET /dashboard` - Redirect to the caller's own dashboard
/// - `GET /student/dashboard` - Events and announcements for the student's
///   school, plus the student's registrations
/// - `GET /admin/dashboard` - Events, announcements and feedback for the
///   administrator's school, plus the school list
///
/// Any fetch failure redirects to `/` with "Failed to load ...".

use axum::{
    extract::State,
    response::{Redirect, Response},
};
use gathered_shared::models::profile::Role;
use gathered_shared::store::StoreError;
use tracing::debug;

use crate::{
    app::AppState,
    error::{WebError, WebResult},
    flash::IncomingFlash,
    session::CurrentUser,
    views,
};

/// `GET /dashboard`
pub async fn dashboard(user: CurrentUser) -> Redirect {
    Redirect::to(user.role.dashboard_path())
}

/// `GET /student/dashboard`
pub async fn student_dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
    IncomingFlash(flash): IncomingFlash,
) -> WebResult<Response> {
    user.require(Role::Student)?;

    let failed = |e: StoreError| WebError::load_failed("student dashboard", e);
    let domain = &state.backend.domain;

    let events = domain.list_events(user.school_id).await.map_err(failed)?;
    let announcements = domain.list_announcements(user.school_id).await.map_err(failed)?;
    let registered = domain
        .list_registered_events(user.identity_id)
        .await
        .map_err(failed)?;

    debug!(
        identity_id = %user.identity_id,
        events = events.len(),
        registrations = registered.len(),
        "Rendering student dashboard"
    );

    Ok(views::render(
        "Student Dashboard",
        flash.as_ref(),
        Some(&user),
        &views::student_dashboard(&events, &announcements, &registered),
    ))
}

/// `GET /admin/dashboard`
pub async fn admin_dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
    IncomingFlash(flash): IncomingFlash,
) -> WebResult<Response> {
    user.require(Role::Administrator)?;

    let failed = |e: StoreError| WebError::load_failed("admin dashboard", e);
    let domain = &state.backend.domain;

    let events = domain.list_events(user.school_id).await.map_err(failed)?;
    let announcements = domain.list_announcements(user.school_id).await.map_err(failed)?;
    let feedback = domain.list_feedback(user.school_id).await.map_err(failed)?;
    let schools = domain.list_schools().await.map_err(failed)?;

    Ok(views::render(
        "Admin Dashboard",
        flash.as_ref(),
        Some(&user),
        &views::admin_dashboard(&events, &announcements, &feedback, &schools),
    ))
}
