/// Registration endpoints
///
/// # Endpoints
///
/// - `GET  /register` - Registration form
/// - `POST /register` - Validate, then mail a code or a confirmation link
/// - `GET  /register/verify` - Code entry form
/// - `POST /register/verify` - Check the code, create identity and profile
/// - `GET  /register/confirmation-sent` - "Check your email" (link mode)
/// - `GET  /auth/callback?token=` - Redeem a confirmation link
///
/// In code mode the browser holds a signed pointer to its pending
/// registration in the `gathered_pending` cookie; the record itself
/// (password hash, code digest, expiry) stays server-side.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use gathered_shared::flow::{RegistrationError, RegistrationForm, SubmitOutcome};
use gathered_shared::models::pending_registration::PendingStage;
use serde::Deserialize;
use tracing::info;

use crate::{
    app::AppState,
    error::{WebError, WebResult},
    flash::{self, Flash, IncomingFlash},
    session::{self, MaybeUser},
    views,
};

/// Code entry form
#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    #[serde(default)]
    pub code: String,
}

/// Confirmation link query
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub token: Option<String>,
}

/// Back to `/register` with `err`, forgetting the pending cookie
fn restart(jar: CookieJar, err: RegistrationError) -> Response {
    (
        session::clear_pending(jar),
        flash::redirect("/register", Flash::error(err.to_string())),
    )
        .into_response()
}

/// `GET /register`
pub async fn register_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
) -> WebResult<Response> {
    let schools = state
        .backend
        .domain
        .list_schools()
        .await
        .map_err(|e| WebError::load_failed("registration form", e))?;

    Ok(views::render(
        "Register",
        flash.as_ref(),
        user.as_ref(),
        &views::register_form(&schools, state.registration.policy()),
    ))
}

/// `POST /register`
///
/// # Errors
///
/// Every validation or uniqueness failure redirects back to `/register`
/// with the message.
pub async fn register_submit(
    State(state): State<AppState>,
    Form(form): Form<RegistrationForm>,
) -> WebResult<Response> {
    let outcome = state
        .registration
        .submit(&form)
        .await
        .map_err(|e| WebError::registration(e, "/register"))?;

    match outcome {
        SubmitOutcome::CodeSent { pending_id, .. } => {
            let cookie =
                session::pending_cookie(&state, pending_id, state.registration.policy().link_ttl)?;

            Ok((
                CookieJar::new().add(cookie),
                flash::redirect(
                    "/register/verify",
                    Flash::success(format!(
                        "Registration successful! A 6-digit code has been sent to {}. Enter it to confirm.",
                        form.email.trim()
                    )),
                ),
            )
                .into_response())
        }
        SubmitOutcome::LinkSent { .. } => Ok(flash::redirect(
            "/register/confirmation-sent",
            Flash::success("Registration successful! Check your email for a confirmation link."),
        )),
    }
}

/// `GET /register/verify`
pub async fn verify_page(
    State(state): State<AppState>,
    jar: CookieJar,
    IncomingFlash(flash): IncomingFlash,
) -> WebResult<Response> {
    let Some(pending_id) = session::pending_id(&jar, &state) else {
        return Ok(restart(jar, RegistrationError::SessionExpired));
    };

    let record = state
        .registration
        .pending(pending_id)
        .await
        .map_err(|e| WebError::registration(e, "/register"))?;

    match record {
        Some(record) if record.stage != PendingStage::AwaitingLink => Ok(views::render(
            "Confirm your email",
            flash.as_ref(),
            None,
            &views::verify_form(&record.email, &record.expires_at),
        )),
        _ => Ok(restart(jar, RegistrationError::SessionExpired)),
    }
}

/// `POST /register/verify`
///
/// The code is compared exactly as submitted. A wrong code keeps the
/// pending registration so the user can retry; an expired or missing one
/// sends them back to `/register`.
pub async fn verify_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<VerifyForm>,
) -> WebResult<Response> {
    let Some(pending_id) = session::pending_id(&jar, &state) else {
        return Ok(restart(jar, RegistrationError::SessionExpired));
    };

    match state.registration.verify_code(pending_id, &form.code).await {
        Ok(completed) => {
            info!(
                identity_id = %completed.identity_id,
                role = %completed.role,
                "Registration confirmed"
            );

            Ok((
                session::clear_pending(jar),
                flash::redirect(
                    "/login",
                    Flash::success("Account confirmed and profile created! You can now log in."),
                ),
            )
                .into_response())
        }
        Err(
            err @ (RegistrationError::SessionExpired
            | RegistrationError::ExpiredChallenge
            | RegistrationError::DuplicateEmail
            | RegistrationError::DuplicateIdentifier),
        ) => Ok(restart(jar, err)),
        Err(err) => Err(WebError::registration(err, "/register/verify")),
    }
}

/// `GET /register/confirmation-sent`
pub async fn confirmation_sent(
    State(state): State<AppState>,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    views::render(
        "Check your email",
        flash.as_ref(),
        None,
        &views::confirmation_sent(state.registration.policy().verification),
    )
}

/// `GET /auth/callback?token=`
pub async fn auth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> WebResult<Response> {
    let token = query.token.unwrap_or_default();
    if token.trim().is_empty() {
        return Err(WebError::invalid(
            "Confirmation failed: the link is missing its token.",
            "/register",
        ));
    }

    match state.registration.confirm_link(token.trim()).await {
        Ok(completed) => {
            info!(
                identity_id = %completed.identity_id,
                role = %completed.role,
                "Email confirmed through link"
            );

            Ok(flash::redirect(
                "/login",
                Flash::success("Account confirmed and profile created! You can now log in."),
            ))
        }
        Err(err) => {
            let message = format!("Confirmation failed: {err}");
            Err(match err {
                RegistrationError::Upstream(detail) => {
                    WebError::failed(message, "/register", detail)
                }
                _ => WebError::invalid(message, "/register"),
            })
        }
    }
}
