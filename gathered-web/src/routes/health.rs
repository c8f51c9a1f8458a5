/// Health check endpoint
///
/// Reports whether the server is up and its store answers.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "backend": "postgres",
///   "store": "connected"
/// }
/// ```

use crate::{app::AppState, config::StorageBackend};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Configured store backend
    pub backend: String,

    /// Store status
    pub store: String,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_status = match state.backend.domain.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            warn!(error = %e, "Health check: store unreachable");
            "disconnected"
        }
    };

    let backend = match state.config.database.backend {
        StorageBackend::Postgres => "postgres",
        StorageBackend::Memory => "memory",
    };

    Json(HealthResponse {
        status: if store_status == "connected" {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: backend.to_string(),
        store: store_status.to_string(),
    })
}
