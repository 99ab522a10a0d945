//! pterowatch-api: REST API for operating the watcher.
//!
//! Provides axum route handlers over the [`Watchdog`]: status queries for
//! operator visibility, and registry mutations (add, enable, disable,
//! remove, reset).
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/servers` | List server statuses |
//! | POST | `/api/v1/servers` | Add or update a server |
//! | GET | `/api/v1/servers/{id}` | Get one server's status |
//! | DELETE | `/api/v1/servers/{id}` | Stop watching and remove a server |
//! | POST | `/api/v1/servers/{id}/enable` | Resume watching |
//! | POST | `/api/v1/servers/{id}/disable` | Pause watching |
//! | POST | `/api/v1/servers/{id}/reset` | Clear counters and lockout |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use pterowatch_core::Policy;
use pterowatch_health::Watchdog;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub watchdog: Watchdog,
    /// Policy applied to keys a POSTed server leaves unset.
    pub defaults: Policy,
}

/// Build the complete API router.
pub fn build_router(watchdog: Watchdog, defaults: Policy) -> Router {
    let api_state = ApiState { watchdog, defaults };

    let api_routes = Router::new()
        .route("/servers", get(handlers::list_servers).post(handlers::upsert_server))
        .route("/servers/{id}", get(handlers::get_server).delete(handlers::delete_server))
        .route("/servers/{id}/enable", post(handlers::enable_server))
        .route("/servers/{id}/disable", post(handlers::disable_server))
        .route("/servers/{id}/reset", post(handlers::reset_server))
        .with_state(api_state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
