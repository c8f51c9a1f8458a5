/// Server-rendered HTML pages
///
/// Pages are plain strings built with `format!`; every interpolated value
/// goes through [`escape`].

use axum::response::{Html, IntoResponse, Response};
use chrono::{DateTime, Utc};
use gathered_shared::flow::{RegistrationPolicy, VerificationMode};
use gathered_shared::models::announcement::Announcement;
use gathered_shared::models::event::Event;
use gathered_shared::models::event_registration::RegisteredEvent;
use gathered_shared::models::feedback::Feedback;
use gathered_shared::models::profile::Role;
use gathered_shared::models::school::School;
use std::collections::HashSet;
use std::fmt::Write as _;
use uuid::Uuid;

use crate::flash::{Flash, FlashShown};
use crate::session::CurrentUser;

/// HTML-escapes text and attribute values
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn date(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Wraps `body` in the site layout
///
/// A displayed flash message is consumed: the response is marked so its
/// cookie gets cleared.
pub fn render(title: &str, flash: Option<&Flash>, user: Option<&CurrentUser>, body: &str) -> Response {
    let nav = match user {
        Some(user) => format!(
            r#"<a href="{}">Dashboard</a> <a href="/events">Events</a> <form method="post" action="/logout" class="inline"><button type="submit">Log out</button></form>"#,
            user.role.dashboard_path()
        ),
        None => r#"<a href="/login">Log in</a> <a href="/register">Register</a>"#.to_string(),
    };

    let notice = flash
        .map(|flash| {
            format!(
                r#"<div class="flash flash-{}">{}</div>"#,
                flash.level.as_str(),
                escape(&flash.message)
            )
        })
        .unwrap_or_default();

    let page = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | GatherEd</title>
</head>
<body>
<header><a href="/" class="brand">GatherEd</a> <nav>{nav}</nav></header>
<main>
{notice}
<h1>{title}</h1>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
    );

    let mut response = Html(page).into_response();
    if flash.is_some() {
        response.extensions_mut().insert(FlashShown);
    }
    response
}

pub fn home(user: Option<&CurrentUser>) -> String {
    let actions = match user {
        Some(user) => format!(
            r#"<p><a href="{}">Go to your dashboard</a></p>"#,
            user.role.dashboard_path()
        ),
        None => r#"<p><a href="/register">Create an account</a> or <a href="/login">log in</a>.</p>"#
            .to_string(),
    };

    format!(
        "<p>Events, announcements and feedback for your school, in one place.</p>\n{actions}"
    )
}

fn school_options(schools: &[School]) -> String {
    let mut options = String::from(r#"<option value="">Select a school</option>"#);
    for school in schools {
        let _ = write!(
            options,
            r#"<option value="{}">{}</option>"#,
            school.id,
            escape(&school.name)
        );
    }
    options
}

pub fn register_form(schools: &[School], policy: &RegistrationPolicy) -> String {
    let email_hint = policy
        .email_domain
        .as_deref()
        .map(|domain| format!(r#"<small>Use your @{} address.</small>"#, escape(domain)))
        .unwrap_or_default();

    let id_field = if policy.require_institutional_id {
        r#"<label>ID number <input name="institutional_id" required placeholder="12-3456-789"></label>"#
    } else {
        r#"<label>ID number (optional) <input name="institutional_id" placeholder="12-3456-789"></label>"#
    };

    format!(
        r#"<form method="post" action="/register">
<label>Name <input name="name" required></label>
<label>Email <input type="email" name="email" required></label>
{email_hint}
<label>Password <input type="password" name="password" required></label>
<label>Confirm password <input type="password" name="confirm_password" required></label>
<label>Role <select name="role" required>
<option value="student">Student</option>
<option value="administrator">Administrator</option>
</select></label>
<label>School <select name="school_id">{options}</select></label>
<label>New school (administrators) <input name="new_school_name"></label>
{id_field}
<button type="submit">Register</button>
</form>
<p>Already registered? <a href="/login">Log in</a></p>"#,
        options = school_options(schools),
    )
}

pub fn verify_form(email: &str, expires_at: &DateTime<Utc>) -> String {
    format!(
        r#"<p>We sent a 6-digit code to <strong>{}</strong>. It expires at {}.</p>
<form method="post" action="/register/verify">
<label>Code <input name="code" inputmode="numeric" maxlength="6" required autocomplete="one-time-code"></label>
<button type="submit">Confirm</button>
</form>"#,
        escape(email),
        date(expires_at)
    )
}

pub fn confirmation_sent(mode: VerificationMode) -> String {
    match mode {
        VerificationMode::Link => {
            "<p>We sent you a confirmation link. Open it to activate your account.</p>".to_string()
        }
        VerificationMode::Code => {
            r#"<p>Check your email for your code, then <a href="/register/verify">enter it here</a>.</p>"#
                .to_string()
        }
    }
}

pub fn login_form() -> String {
    r#"<form method="post" action="/login">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Log in</button>
</form>
<p>No account yet? <a href="/register">Register</a></p>"#
        .to_string()
}

fn event_rows(events: &[Event], registered: Option<&HashSet<Uuid>>) -> String {
    if events.is_empty() {
        return "<p>No events yet.</p>".to_string();
    }

    let mut rows = String::from("<ul class=\"events\">");
    for event in events {
        let action = match registered {
            Some(registered) if registered.contains(&event.id) => {
                "<span class=\"badge\">Registered</span>".to_string()
            }
            Some(_) => format!(
                r#"<form method="post" action="/events/{}/register" class="inline"><button type="submit">Register</button></form>"#,
                event.id
            ),
            None => String::new(),
        };
        let _ = write!(
            rows,
            "<li><strong>{}</strong> <time>{}</time><p>{}</p>{}</li>",
            escape(&event.title),
            date(&event.starts_at),
            escape(&event.description),
            action
        );
    }
    rows.push_str("</ul>");
    rows
}

fn announcement_rows(announcements: &[Announcement]) -> String {
    if announcements.is_empty() {
        return "<p>No announcements.</p>".to_string();
    }

    let mut rows = String::from("<ul class=\"announcements\">");
    for announcement in announcements {
        let _ = write!(
            rows,
            "<li><strong>{}</strong> <time>{}</time><p>{}</p></li>",
            escape(&announcement.title),
            date(&announcement.created_at),
            escape(&announcement.content)
        );
    }
    rows.push_str("</ul>");
    rows
}

/// Student dashboard: school events, announcements, own registrations
pub fn student_dashboard(
    events: &[Event],
    announcements: &[Announcement],
    registered: &[RegisteredEvent],
) -> String {
    let registered_ids: HashSet<Uuid> = registered.iter().map(|r| r.event.id).collect();

    let mut mine = String::new();
    if registered.is_empty() {
        mine.push_str("<p>You have not registered for any events.</p>");
    } else {
        mine.push_str("<ul class=\"registrations\">");
        for entry in registered {
            let _ = write!(
                mine,
                "<li><strong>{}</strong> <time>{}</time> <small>registered {}</small></li>",
                escape(&entry.event.title),
                date(&entry.event.starts_at),
                date(&entry.registered_at)
            );
        }
        mine.push_str("</ul>");
    }

    let mut feedback_events = String::from(r#"<option value="">General</option>"#);
    for event in events {
        let _ = write!(
            feedback_events,
            r#"<option value="{}">{}</option>"#,
            event.id,
            escape(&event.title)
        );
    }

    format!(
        r#"<section><h2>Upcoming events</h2>{events}</section>
<section><h2>My registrations</h2>{mine}</section>
<section><h2>Announcements</h2>{announcements}</section>
<section><h2>Send feedback</h2>
<form method="post" action="/feedback">
<label>Event <select name="event_id">{feedback_events}</select></label>
<label>Feedback <textarea name="content" required></textarea></label>
<button type="submit">Send</button>
</form></section>"#,
        events = event_rows(events, Some(&registered_ids)),
        announcements = announcement_rows(announcements),
    )
}

/// Admin dashboard: school events, announcements, feedback and schools
pub fn admin_dashboard(
    events: &[Event],
    announcements: &[Announcement],
    feedback: &[Feedback],
    schools: &[School],
) -> String {
    let mut feedback_rows = String::new();
    if feedback.is_empty() {
        feedback_rows.push_str("<p>No feedback yet.</p>");
    } else {
        feedback_rows.push_str("<ul class=\"feedback\">");
        for entry in feedback {
            let about = entry
                .event_id
                .and_then(|id| events.iter().find(|event| event.id == id))
                .map(|event| format!(" <small>on {}</small>", escape(&event.title)))
                .unwrap_or_default();
            let _ = write!(
                feedback_rows,
                "<li><time>{}</time>{}<p>{}</p></li>",
                date(&entry.created_at),
                about,
                escape(&entry.content)
            );
        }
        feedback_rows.push_str("</ul>");
    }

    let mut school_rows = String::from("<ul class=\"schools\">");
    for school in schools {
        let _ = write!(school_rows, "<li>{}</li>", escape(&school.name));
    }
    school_rows.push_str("</ul>");

    format!(
        r#"<p><a href="/events/new">Create event</a></p>
<section><h2>Events</h2>{events}</section>
<section><h2>Announcements</h2>{announcements}
<form method="post" action="/announcements">
<label>Title <input name="title" required></label>
<label>Content <textarea name="content" required></textarea></label>
<button type="submit">Post announcement</button>
</form></section>
<section><h2>Feedback</h2>{feedback_rows}</section>
<section><h2>Schools</h2>{school_rows}</section>"#,
        events = event_rows(events, None),
        announcements = announcement_rows(announcements),
    )
}

pub fn event_listing(events: &[Event], role: Role, registered: &HashSet<Uuid>) -> String {
    match role {
        Role::Student => event_rows(events, Some(registered)),
        Role::Administrator => format!(
            r#"<p><a href="/events/new">Create event</a></p>{}"#,
            event_rows(events, None)
        ),
    }
}

pub fn new_event_form() -> String {
    r#"<form method="post" action="/events/new">
<label>Title <input name="title" required></label>
<label>Description <textarea name="description" required></textarea></label>
<label>Date <input type="datetime-local" name="date" required></label>
<button type="submit">Create event</button>
</form>"#
        .to_string()
}
