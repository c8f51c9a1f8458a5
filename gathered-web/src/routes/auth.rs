/// Login and logout
///
/// # Endpoints
///
/// - `GET  /login` - Login form
/// - `POST /login` - Check credentials, resolve the role, start a session
/// - `GET|POST /logout` - End the session
///
/// The role is resolved once, at login, and stored in the session token.
/// An identity whose profile write never happened is reconciled before
/// login gives up with "profile not found".

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use gathered_shared::flow::{ResolvedRole, RouteError};
use gathered_shared::store::StoreError;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::{WebError, WebResult},
    flash::{self, Flash, IncomingFlash},
    session::{self, MaybeUser},
    views,
};

/// Login form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

fn route_error(err: RouteError) -> WebError {
    match err {
        RouteError::ProfileNotFound => {
            WebError::invalid(RouteError::ProfileNotFound.to_string(), "/login")
        }
        RouteError::Store(e) => WebError::failed("Error checking user profile.", "/login", e),
    }
}

/// Resolves the role, reconciling a stalled registration once
async fn resolve(state: &AppState, identity_id: Uuid) -> WebResult<ResolvedRole> {
    match state.router.resolve_role(identity_id).await {
        Ok(resolved) => Ok(resolved),
        Err(RouteError::ProfileNotFound) => {
            match state.registration.reconcile_identity(identity_id).await {
                Ok(Some(_)) => state.router.resolve_role(identity_id).await.map_err(route_error),
                Ok(None) => Err(route_error(RouteError::ProfileNotFound)),
                Err(e) => {
                    warn!(identity_id = %identity_id, error = %e, "Reconciliation at login failed");
                    Err(route_error(RouteError::ProfileNotFound))
                }
            }
        }
        Err(e) => Err(route_error(e)),
    }
}

/// `GET /login`
pub async fn login_page(
    MaybeUser(user): MaybeUser,
    IncomingFlash(flash): IncomingFlash,
) -> Response {
    if let Some(user) = user {
        return Redirect::to(user.role.dashboard_path()).into_response();
    }

    views::render("Log in", flash.as_ref(), None, &views::login_form())
}

/// `POST /login`
///
/// # Errors
///
/// - missing fields: "Email and password are required."
/// - unknown email or wrong password: "Invalid email or password."
/// - no profile in either table: "User profile not found. Contact support."
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> WebResult<Response> {
    let email = form.email.trim().to_lowercase();
    if email.is_empty() || form.password.is_empty() {
        return Err(WebError::invalid("Email and password are required.", "/login"));
    }

    let identity_id = match state.backend.identities.authenticate(&email, &form.password).await {
        Ok(id) => id,
        Err(StoreError::InvalidCredential) => {
            return Err(WebError::invalid("Invalid email or password.", "/login"));
        }
        Err(StoreError::EmailNotConfirmed) => {
            return Err(WebError::invalid(
                "Please confirm your email address before logging in.",
                "/login",
            ));
        }
        Err(e) => {
            return Err(WebError::failed(
                "Login failed. Please try again later.",
                "/login",
                e,
            ));
        }
    };

    let resolved = resolve(&state, identity_id).await?;

    if let Err(e) = state.backend.identities.record_login(identity_id).await {
        warn!(identity_id = %identity_id, error = %e, "Failed to record login time");
    }

    let cookie = session::session_cookie(&state, identity_id, resolved.role, resolved.school_id)?;

    info!(identity_id = %identity_id, role = %resolved.role, "User logged in");

    Ok((CookieJar::new().add(cookie), Redirect::to(resolved.dashboard_path())).into_response())
}

/// `GET|POST /logout`
pub async fn logout(MaybeUser(user): MaybeUser, jar: CookieJar) -> Response {
    if let Some(user) = user {
        info!(identity_id = %user.identity_id, "User logged out");
    }

    (
        session::clear_session(jar),
        flash::redirect("/", Flash::success("You have been logged out.")),
    )
        .into_response()
}
