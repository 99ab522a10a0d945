//! REST API handlers.
//!
//! Each handler goes through the `Watchdog` so registry changes and watch
//! loops stay in step, and returns JSON responses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use pterowatch_core::ServerEntry;
use pterowatch_state::*;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

fn state_error(e: StateError) -> Response {
    let status = match e {
        StateError::NotFound(_) => StatusCode::NOT_FOUND,
        StateError::EmptyId | StateError::InvalidPolicy { .. } => StatusCode::BAD_REQUEST,
        StateError::Stale(_) => StatusCode::CONFLICT,
    };
    error_response(&e.to_string(), status)
}

async fn status_response(state: &ApiState, id: &str) -> Response {
    match state.watchdog.status(id).await {
        Ok(status) => ApiResponse::ok(status).into_response(),
        Err(e) => state_error(e),
    }
}

// ── Servers ────────────────────────────────────────────────────

/// GET /api/v1/servers
pub async fn list_servers(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.watchdog.statuses().await)
}

/// GET /api/v1/servers/{id}
pub async fn get_server(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    status_response(&state, &id).await
}

/// POST /api/v1/servers
///
/// Accepts the same keys as a `[[servers]]` entry in `pterowatch.toml`.
pub async fn upsert_server(
    State(state): State<ApiState>,
    Json(entry): Json<ServerEntry>,
) -> Response {
    let spec = match ServerSpec::from_entry(&entry, &state.defaults) {
        Ok(spec) => spec,
        Err(e) => return error_response(&e.to_string(), StatusCode::BAD_REQUEST),
    };

    match state.watchdog.add_server(spec).await {
        Ok(created) => {
            let code = if created { StatusCode::CREATED } else { StatusCode::OK };
            match state.watchdog.status(&entry.id).await {
                Ok(status) => (code, ApiResponse::ok(status)).into_response(),
                Err(e) => state_error(e),
            }
        }
        Err(e) => state_error(e),
    }
}

/// DELETE /api/v1/servers/{id}
pub async fn delete_server(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.watchdog.remove_server(&id).await {
        Ok(_) => ApiResponse::ok("deleted").into_response(),
        Err(e) => state_error(e),
    }
}

// ── Watch control ──────────────────────────────────────────────

/// POST /api/v1/servers/{id}/enable
pub async fn enable_server(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.watchdog.set_enabled(&id, true).await {
        Ok(()) => status_response(&state, &id).await,
        Err(e) => state_error(e),
    }
}

/// POST /api/v1/servers/{id}/disable
pub async fn disable_server(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.watchdog.set_enabled(&id, false).await {
        Ok(()) => status_response(&state, &id).await,
        Err(e) => state_error(e),
    }
}

/// POST /api/v1/servers/{id}/reset
pub async fn reset_server(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.watchdog.reset_server(&id).await {
        Ok(()) => status_response(&state, &id).await,
        Err(e) => state_error(e),
    }
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
