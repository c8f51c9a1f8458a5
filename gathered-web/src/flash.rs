/// One-shot flash messages
///
/// A flash message rides along a redirect in the signed `gathered_flash`
/// cookie (hex-encoded JSON) and is cleared by the page that displays it.
///
/// Handlers and errors never touch the cookie themselves: [`redirect`] and
/// [`crate::views::render`] leave a marker in the response extensions and
/// [`flash_cookies`] turns it into `Set-Cookie` with the signing key.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, Key, SignedCookieJar};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::{app::AppState, session};

pub const FLASH_COOKIE: &str = "gathered_flash";

/// Flash lifetime; long enough to survive one redirect
const FLASH_MAX_AGE_SECONDS: i64 = 60;

/// Response marker: the page displayed the incoming flash
#[derive(Debug, Clone, Copy)]
pub struct FlashShown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Info => "info",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }

    pub fn encode(&self) -> String {
        hex::encode(serde_json::to_vec(self).unwrap_or_default())
    }

    pub fn decode(value: &str) -> Option<Self> {
        let bytes = hex::decode(value).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Cookie carrying this message; signed when added to the jar
    pub fn cookie(&self, secure: bool) -> Cookie<'static> {
        session::site_cookie(
            FLASH_COOKIE,
            self.encode(),
            Duration::seconds(FLASH_MAX_AGE_SECONDS),
            secure,
        )
    }

    /// Verifies and decodes the flash cookie in `jar`
    pub fn from_jar(jar: &SignedCookieJar) -> Option<Self> {
        jar.get(FLASH_COOKIE)
            .filter(|cookie| !cookie.value().is_empty())
            .and_then(|cookie| Flash::decode(cookie.value()))
    }
}

/// `303 See Other` to `to`, carrying a flash message
pub fn redirect(to: &str, flash: Flash) -> Response {
    let mut response = Redirect::to(to).into_response();
    response.extensions_mut().insert(flash);
    response
}

/// Writes an outgoing flash as a signed cookie, or clears one a page showed
pub async fn flash_cookies(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    if let Some(flash) = response.extensions_mut().remove::<Flash>() {
        let jar = jar.add(flash.cookie(state.config.server.production));
        return (jar, response).into_response();
    }

    if response.extensions_mut().remove::<FlashShown>().is_some() {
        let jar = jar.remove(Cookie::build(FLASH_COOKIE).path("/"));
        return (jar, response).into_response();
    }

    response
}

/// Flash message sent by the browser, if its signature checks out
#[derive(Debug, Clone, Default)]
pub struct IncomingFlash(pub Option<Flash>);

#[async_trait]
impl<S> FromRequestParts<S> for IncomingFlash
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::from_headers(&parts.headers, Key::from_ref(state));
        Ok(IncomingFlash(Flash::from_jar(&jar)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

    #[test]
    fn test_encode_decode() {
        let flash = Flash::info("You are already registered.");
        assert_eq!(Flash::decode(&flash.encode()), Some(flash));
        assert_eq!(Flash::decode("zz"), None);
    }

    #[test]
    fn test_redirect_carries_flash() {
        let response = redirect("/login", Flash::error("Invalid email or password."));

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
        assert_eq!(
            response.extensions().get::<Flash>(),
            Some(&Flash::error("Invalid email or password."))
        );
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[test]
    fn test_signed_flash_rejects_tampering() {
        let key = Key::derive_from(b"flash-test-secret-at-least-32-bytes");
        let flash = Flash::success("Announcement posted!");

        let jar = SignedCookieJar::new(key.clone()).add(flash.cookie(true));
        assert_eq!(Flash::from_jar(&jar), Some(flash.clone()));

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{FLASH_COOKIE}={}", flash.encode())).unwrap(),
        );
        let forged = SignedCookieJar::from_headers(&headers, key);
        assert_eq!(Flash::from_jar(&forged), None);
    }

    #[test]
    fn test_flash_cookie_secure_in_production() {
        let flash = Flash::info("You are already registered.");
        assert_eq!(flash.cookie(true).secure(), Some(true));
        assert_eq!(flash.cookie(false).secure(), Some(false));
        assert_eq!(flash.cookie(false).max_age(), Some(time::Duration::seconds(60)));
    }
}
