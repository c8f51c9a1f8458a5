/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use gathered_shared::auth::confirmation::ConfirmationLinks;
/// use gathered_shared::mail::{LogMailer, Mailer};
/// use gathered_shared::store::Backend;
/// use gathered_web::{app::{build_router, AppState}, config::Config};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let mailer: Arc<dyn Mailer> = Arc::new(LogMailer::new());
/// let links = ConfirmationLinks::new(
///     config.session.secret.clone(),
///     mailer.clone(),
///     config.confirmation_ttl(),
/// );
/// let state = AppState::new(Backend::memory(links), mailer, config);
///
/// let app = build_router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, flash, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::FromRef,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::Key;
use gathered_shared::flow::{RegistrationFlow, RoleRouter};
use gathered_shared::mail::Mailer;
use gathered_shared::store::Backend;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Store trait objects
    pub backend: Backend,

    /// Registration and confirmation flow
    pub registration: RegistrationFlow,

    /// Role resolution after login
    pub router: RoleRouter,

    /// Signs the flash cookie; derived from the session secret
    pub cookie_key: Key,

    /// Application configuration
    pub config: Arc<Config>,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Cookie signing key for `secret`
///
/// `Config` guarantees the secret is at least 32 bytes, which key
/// derivation requires.
pub fn cookie_key(secret: &str) -> Key {
    Key::derive_from(secret.as_bytes())
}

impl AppState {
    /// Creates new application state
    pub fn new(backend: Backend, mailer: Arc<dyn Mailer>, config: Config) -> Self {
        let registration = RegistrationFlow::new(&backend, mailer, config.registration_policy());
        let router = RoleRouter::new(backend.profiles.clone());

        Self {
            backend,
            registration,
            router,
            cookie_key: cookie_key(&config.session.secret),
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET        /                           # Landing page
/// ├── GET        /health                     # Health check (JSON)
/// ├── GET|POST   /register                   # Registration form
/// ├── GET|POST   /register/verify            # Code entry
/// ├── GET        /register/confirmation-sent # Link mode notice
/// ├── GET        /auth/callback?token=       # Link mode confirmation
/// ├── GET|POST   /login
/// ├── GET|POST   /logout
/// ├── GET        /dashboard                  # Redirect by role
/// ├── GET        /student/dashboard          # Students
/// ├── GET        /admin/dashboard            # Administrators
/// ├── GET        /events
/// ├── POST       /events/:id/register        # Students
/// ├── GET|POST   /events/new                 # Administrators
/// ├── POST       /announcements              # Administrators
/// └── POST       /feedback                   # Students
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Flash cookies (signed with the state's key)
/// 2. Logging (tower-http TraceLayer)
/// 3. Response compression
/// 4. Security headers
///
/// Authentication is per handler through the `CurrentUser` extractor.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/", get(routes::pages::home))
        .route("/health", get(routes::health::health_check));

    let registration_routes = Router::new()
        .route(
            "/register",
            get(routes::register::register_page).post(routes::register::register_submit),
        )
        .route(
            "/register/verify",
            get(routes::register::verify_page).post(routes::register::verify_submit),
        )
        .route(
            "/register/confirmation-sent",
            get(routes::register::confirmation_sent),
        )
        .route("/auth/callback", get(routes::register::auth_callback));

    let auth_routes = Router::new()
        .route(
            "/login",
            get(routes::auth::login_page).post(routes::auth::login),
        )
        .route(
            "/logout",
            get(routes::auth::logout).post(routes::auth::logout),
        );

    let dashboard_routes = Router::new()
        .route("/dashboard", get(routes::dashboard::dashboard))
        .route("/student/dashboard", get(routes::dashboard::student_dashboard))
        .route("/admin/dashboard", get(routes::dashboard::admin_dashboard))
        .route("/events", get(routes::events::list_events))
        .route(
            "/events/new",
            get(routes::events::new_event_page).post(routes::events::create_event),
        )
        .route("/events/:id/register", post(routes::events::register_for_event))
        .route(
            "/announcements",
            post(routes::announcements::create_announcement),
        )
        .route("/feedback", post(routes::feedback::submit_feedback));

    // Combine all routes with middleware stack
    Router::new()
        .merge(public_routes)
        .merge(registration_routes)
        .merge(auth_routes)
        .merge(dashboard_routes)
        .layer(from_fn_with_state(state.clone(), flash::flash_cookies))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(SecurityHeadersLayer::new(state.config.server.production))
        .with_state(state)
}
