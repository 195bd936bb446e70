//! Event ingestion endpoint
//!
//! Called by the upload and completion handlers, once per domain occurrence,
//! after their own persistence step has succeeded. Events are not
//! deduplicated.

use axum::{extract::State, http::StatusCode, Json};
use handoff_common::DomainEvent;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub matched: usize,
    pub delivered: usize,
}

/// POST /api/events
pub async fn post_event(
    State(state): State<AppState>,
    Json(event): Json<DomainEvent>,
) -> (StatusCode, Json<DispatchResponse>) {
    let report = state.dispatcher.dispatch(&event);

    (
        StatusCode::ACCEPTED,
        Json(DispatchResponse {
            matched: report.matched,
            delivered: report.delivered,
        }),
    )
}
