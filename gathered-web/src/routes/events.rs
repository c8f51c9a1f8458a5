/// Event endpoints
///
/// # Endpoints
///
/// - `GET  /events` - Events of the caller's school
/// - `POST /events/:id/register` - Register the calling student
/// - `GET  /events/new` - Event form (administrators)
/// - `POST /events/new` - Create an event for the administrator's school

use axum::{
    extract::{Path, State},
    response::Response,
    Form,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use gathered_shared::models::event::CreateEvent;
use gathered_shared::models::profile::Role;
use gathered_shared::store::{EventRegistrationOutcome, StoreError};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use crate::{
    app::AppState,
    error::{WebError, WebResult},
    flash::{self, Flash, IncomingFlash},
    session::CurrentUser,
    views,
};

/// Event creation form
#[derive(Debug, Deserialize)]
pub struct NewEventForm {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// `YYYY-MM-DDTHH:MM` (browser `datetime-local`, read as UTC),
    /// RFC 3339, or a bare `YYYY-MM-DD`
    #[serde(default)]
    pub date: String,
}

/// Parses the event date field
pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// `GET /events`
pub async fn list_events(
    State(state): State<AppState>,
    user: CurrentUser,
    IncomingFlash(flash): IncomingFlash,
) -> WebResult<Response> {
    let failed = |e: StoreError| WebError::load_failed("events", e);
    let domain = &state.backend.domain;

    let events = domain.list_events(user.school_id).await.map_err(failed)?;

    let registered: HashSet<Uuid> = if user.role == Role::Student {
        domain
            .list_registered_events(user.identity_id)
            .await
            .map_err(failed)?
            .into_iter()
            .map(|entry| entry.event.id)
            .collect()
    } else {
        HashSet::new()
    };

    Ok(views::render(
        "Events",
        flash.as_ref(),
        Some(&user),
        &views::event_listing(&events, user.role, &registered),
    ))
}

/// `POST /events/:id/register`
///
/// Registering twice is reported, not treated as an error. Events of
/// another school are reported as not found.
pub async fn register_for_event(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(event_id): Path<String>,
) -> WebResult<Response> {
    user.require(Role::Student)?;

    let not_found = || WebError::invalid("Event not found.", "/events");
    let event_id = Uuid::parse_str(event_id.trim()).map_err(|_| not_found())?;

    let event = state
        .backend
        .domain
        .find_event(event_id)
        .await
        .map_err(|e| WebError::failed("Event registration failed.", "/events", e))?;

    match event {
        Some(event) if event.school_id == user.school_id => {}
        _ => return Err(not_found()),
    }

    match state
        .backend
        .domain
        .register_for_event(user.identity_id, event_id)
        .await
    {
        Ok(EventRegistrationOutcome::Registered) => {
            info!(identity_id = %user.identity_id, event_id = %event_id, "Registered for event");
            Ok(flash::redirect(
                "/student/dashboard",
                Flash::success("Registered successfully!"),
            ))
        }
        Ok(EventRegistrationOutcome::AlreadyRegistered) => Ok(flash::redirect(
            "/student/dashboard",
            Flash::info("You are already registered."),
        )),
        Err(StoreError::NotFound) => Err(not_found()),
        Err(e) => Err(WebError::failed("Event registration failed.", "/events", e)),
    }
}

/// `GET /events/new`
pub async fn new_event_page(
    user: CurrentUser,
    IncomingFlash(flash): IncomingFlash,
) -> WebResult<Response> {
    user.require(Role::Administrator)?;

    Ok(views::render(
        "Create Event",
        flash.as_ref(),
        Some(&user),
        &views::new_event_form(),
    ))
}

/// `POST /events/new`
pub async fn create_event(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<NewEventForm>,
) -> WebResult<Response> {
    user.require(Role::Administrator)?;

    let title = form.title.trim();
    let description = form.description.trim();
    let date = form.date.trim();

    if title.is_empty() || description.is_empty() || date.is_empty() {
        return Err(WebError::invalid("All event fields are required.", "/events/new"));
    }

    let starts_at = parse_event_date(date)
        .ok_or_else(|| WebError::invalid("Enter a valid event date.", "/events/new"))?;

    let event = state
        .backend
        .domain
        .create_event(CreateEvent {
            school_id: user.school_id,
            title: title.to_string(),
            description: description.to_string(),
            starts_at,
            created_by: Some(user.identity_id),
        })
        .await
        .map_err(|e| WebError::failed("Failed to create event.", "/events/new", e))?;

    info!(event_id = %event.id, created_by = %user.identity_id, "Event created");

    Ok(flash::redirect(
        "/admin/dashboard",
        Flash::success("Event created successfully!"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_date_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 11, 5, 14, 30, 0).unwrap();

        assert_eq!(parse_event_date("2026-11-05T14:30"), Some(expected));
        assert_eq!(parse_event_date("2026-11-05T14:30:00Z"), Some(expected));
        assert_eq!(parse_event_date("2026-11-05T22:30:00+08:00"), Some(expected));
        assert_eq!(
            parse_event_date("2026-11-05"),
            Some(Utc.with_ymd_and_hms(2026, 11, 5, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_event_date_rejects_garbage() {
        assert_eq!(parse_event_date("next tuesday"), None);
        assert_eq!(parse_event_date("2026-13-40"), None);
    }
}
