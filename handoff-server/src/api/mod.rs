//! HTTP API handlers for handoff-server

pub mod auth;
pub mod error;
pub mod events;
pub mod health;
pub mod ws;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub use error::ApiError;
pub use health::health_routes;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/auth/request-code", post(auth::request_code))
        .route("/api/auth/verify", post(auth::verify_code))
        .route("/api/events", post(events::post_event))
        .route("/ws", get(ws::ws_upgrade));

    Router::new()
        .merge(api)
        .merge(health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
