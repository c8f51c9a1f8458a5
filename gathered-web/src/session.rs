/// Browser sessions
///
/// Two cookies carry signed tokens between requests:
///
/// - `gathered_session`: a session token holding the identity id, its
///   resolved role and school. Set at login, cleared at logout.
/// - `gathered_pending`: a pending token pointing at the caller's pending
///   registration while they enter their code.
///
/// [`CurrentUser`] reads the session cookie and rejects the request with a
/// redirect to `/login` when it is missing or invalid. [`MaybeUser`] is the
/// same lookup for pages that work either way.
///
/// All cookies are `HttpOnly; SameSite=Lax; Path=/`, plus `Secure` in
/// production.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Duration;
use gathered_shared::auth::jwt::{create_token, validate_token, Claims, JwtError, TokenType};
use gathered_shared::models::profile::Role;
use std::convert::Infallible;
use tracing::debug;
use uuid::Uuid;

use crate::{app::AppState, error::WebError};

pub const SESSION_COOKIE: &str = "gathered_session";
pub const PENDING_COOKIE: &str = "gathered_pending";

/// The logged-in caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub identity_id: Uuid,
    pub role: Role,
    pub school_id: Option<Uuid>,
}

impl CurrentUser {
    /// Fails with `AccessDenied` (back to the caller's own dashboard)
    /// unless the caller has `role`
    pub fn require(&self, role: Role) -> Result<(), WebError> {
        if self.role == role {
            Ok(())
        } else {
            debug!(identity_id = %self.identity_id, role = %self.role, required = %role, "Access denied");
            Err(WebError::AccessDenied {
                to: self.role.dashboard_path().to_string(),
            })
        }
    }

    fn from_jar(jar: &CookieJar, secret: &str) -> Result<Self, WebError> {
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value())
            .filter(|token| !token.is_empty())
            .ok_or(WebError::Unauthenticated)?;

        let claims = validate_token(token, secret, TokenType::Session)?;
        let role = claims.role.ok_or(WebError::Unauthenticated)?;

        Ok(Self {
            identity_id: claims.sub,
            role,
            school_id: claims.school_id,
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Self::from_jar(&CookieJar::from_headers(&parts.headers), &state.config.session.secret)
    }
}

/// The caller, if logged in
#[derive(Debug, Clone, Default)]
pub struct MaybeUser(pub Option<CurrentUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            CurrentUser::from_jar(
                &CookieJar::from_headers(&parts.headers),
                &state.config.session.secret,
            )
            .ok(),
        ))
    }
}

/// Site cookie living for `max_age`
pub(crate) fn site_cookie(
    name: &'static str,
    value: String,
    max_age: Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build()
}

/// Cookie for a fresh session
pub fn session_cookie(
    state: &AppState,
    identity_id: Uuid,
    role: Role,
    school_id: Option<Uuid>,
) -> Result<Cookie<'static>, JwtError> {
    let ttl = state.config.session_ttl();
    let claims = Claims::session(identity_id, role, school_id, ttl);
    let token = create_token(&claims, &state.config.session.secret)?;

    Ok(site_cookie(SESSION_COOKIE, token, ttl, state.config.server.production))
}

/// Cookie pointing the browser at a pending registration
pub fn pending_cookie(
    state: &AppState,
    pending_id: Uuid,
    ttl: Duration,
) -> Result<Cookie<'static>, JwtError> {
    let claims = Claims::pending(pending_id, ttl);
    let token = create_token(&claims, &state.config.session.secret)?;

    Ok(site_cookie(PENDING_COOKIE, token, ttl, state.config.server.production))
}

/// Pending registration id from the request, if the cookie is valid
pub fn pending_id(jar: &CookieJar, state: &AppState) -> Option<Uuid> {
    let token = jar.get(PENDING_COOKIE).map(|cookie| cookie.value())?;
    validate_token(token, &state.config.session.secret, TokenType::Pending)
        .map(|claims| claims.sub)
        .ok()
}

pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

pub fn clear_pending(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(PENDING_COOKIE).path("/"))
}
