//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - An application wired to the in-memory store and mailer
//! - A cookie-keeping client that drives the router directly
//! - Helpers to seed schools and accounts and to read mailed codes

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::Response;
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use gathered_shared::auth::confirmation::ConfirmationLinks;
use gathered_shared::auth::password::hash_password;
use gathered_shared::mail::{Mailer, MemoryMailer};
use gathered_shared::models::profile::{NewProfile, Role};
use gathered_shared::models::school::School;
use gathered_shared::store::{Backend, DomainStore, IdentityStore, MemoryStore, ProfileStore};
use gathered_web::app::{build_router, cookie_key, AppState};
use gathered_web::config::Config;
use gathered_web::flash::{Flash, FLASH_COOKIE};
use std::collections::HashMap;
use std::sync::Arc;
use tower::Service as _;
use uuid::Uuid;

pub const SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const PASSWORD: &str = "correct horse battery staple";

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub store: Arc<MemoryStore>,
    pub mailer: MemoryMailer,
    pub config: Config,
}

impl TestContext {
    /// Code-mode application limited to `@cit.edu`
    pub fn new() -> Self {
        Self::with_env(&[])
    }

    /// Application with extra configuration variables
    pub fn with_env(overrides: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = [
            ("APP_BACKEND", "memory"),
            ("SESSION_SECRET", SECRET),
            ("REGISTRATION_EMAIL_DOMAIN", "cit.edu"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in overrides {
            vars.insert(k.to_string(), v.to_string());
        }

        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

        let mailer = MemoryMailer::new();
        let shared_mailer: Arc<dyn Mailer> = Arc::new(mailer.clone());
        let links = ConfirmationLinks::new(SECRET, shared_mailer.clone(), config.confirmation_ttl());
        let store = Arc::new(MemoryStore::new(links));

        let state = AppState::new(Backend::from_store(store.clone()), shared_mailer, config.clone());

        Self {
            app: build_router(state),
            store,
            mailer,
            config,
        }
    }

    pub fn client(&self) -> Client {
        Client {
            app: self.app.clone(),
            key: cookie_key(&self.config.session.secret),
            cookies: HashMap::new(),
        }
    }

    pub async fn seed_school(&self, name: &str) -> School {
        self.store.create_school(name).await.unwrap()
    }

    /// Creates a verified identity with a profile, bypassing registration
    pub async fn seed_account(&self, email: &str, role: Role, school_id: Option<Uuid>) -> Uuid {
        let hash = hash_password(PASSWORD).unwrap();
        let id = self.store.create_identity(email, &hash).await.unwrap();
        self.store
            .insert_profile(
                role,
                NewProfile {
                    id,
                    name: email.split('@').next().unwrap_or_default().to_string(),
                    school_id,
                    institutional_id: None,
                },
            )
            .await
            .unwrap();
        id
    }

    /// Six-digit code from the last verification email to `email`
    pub async fn mailed_code(&self, email: &str) -> String {
        let message = self.mailer.last_to(email).await.expect("no email sent");
        let (_, rest) = message
            .text
            .split_once("confirmation code is ")
            .expect("no code in email");
        rest.chars().take_while(|c| c.is_ascii_digit()).collect()
    }

    /// Path and query of the last confirmation link mailed to `email`
    pub async fn mailed_link(&self, email: &str) -> String {
        let message = self.mailer.last_to(email).await.expect("no email sent");
        let link = message
            .text
            .lines()
            .find(|line| line.starts_with("http"))
            .expect("no link in email")
            .trim()
            .to_string();
        let start = link.find("/auth/callback").expect("unexpected link");
        link[start..].to_string()
    }
}

/// What a test needs from a response
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub flash: Option<Flash>,
    pub content_type: Option<String>,
    pub set_cookies: Vec<String>,
    pub body: String,
}

impl TestResponse {
    /// Asserts a `303` redirect to `to` and returns its flash message
    pub fn assert_redirect(&self, to: &str) -> Option<&Flash> {
        assert_eq!(self.status, StatusCode::SEE_OTHER, "body: {}", self.body);
        assert_eq!(self.location.as_deref(), Some(to));
        self.flash.as_ref()
    }

    pub fn flash_message(&self) -> &str {
        self.flash.as_ref().map(|f| f.message.as_str()).unwrap_or_default()
    }
}

/// Browser stand-in that keeps cookies between requests
pub struct Client {
    app: axum::Router,
    key: Key,
    pub cookies: HashMap<String, String>,
}

impl Client {
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = self.request("GET", uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let request = self
            .request("POST", uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Logs in and returns the login response
    pub async fn login(&mut self, email: &str, password: &str) -> TestResponse {
        self.post_form("/login", &[("email", email), ("password", password)]).await
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie);
        }
        builder
    }

    async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response: Response = self.app.clone().call(request).await.unwrap();

        let mut flash = None;
        let mut set_cookies = Vec::new();
        for value in response.headers().get_all(header::SET_COOKIE) {
            let value = value.to_str().unwrap();
            set_cookies.push(value.to_string());
            let pair = value.split(';').next().unwrap_or_default();
            let Some((name, cookie)) = pair.split_once('=') else {
                continue;
            };

            if name == FLASH_COOKIE && !cookie.is_empty() {
                flash = self.verify_flash(pair);
            }

            if value.contains("Max-Age=0") {
                self.cookies.remove(name);
            } else if name != FLASH_COOKIE {
                self.cookies.insert(name.to_string(), cookie.to_string());
            }
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            location,
            flash,
            content_type,
            set_cookies,
            body: String::from_utf8_lossy(&body).to_string(),
        }
    }
}

impl Client {
    /// Checks the flash signature the way the next request would
    fn verify_flash(&self, pair: &str) -> Option<Flash> {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(pair).ok()?);
        Flash::from_jar(&SignedCookieJar::from_headers(&headers, self.key.clone()))
    }
}

/// `application/x-www-form-urlencoded` value encoding
fn encode(value: &str) -> String {
    let mut out = String::new();
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
