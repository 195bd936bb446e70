//! Login code endpoints
//!
//! - `POST /api/auth/request-code` issues a code and hands it to delivery
//! - `POST /api/auth/verify` consumes a code

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use handoff_common::Identity;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use crate::otc::ProfileFields;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCodeBody {
    pub identity: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCodeResponse {
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub identity: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub identity: Identity,
    pub display_name: Option<String>,
}

/// POST /api/auth/request-code
pub async fn request_code(
    State(state): State<AppState>,
    Json(body): Json<RequestCodeBody>,
) -> Result<(StatusCode, Json<RequestCodeResponse>), ApiError> {
    let identity = Identity::parse(&body.identity)?;
    let profile = ProfileFields {
        display_name: body
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
    };

    let issued = state.login.request_code(identity, profile).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RequestCodeResponse {
            identity: issued.identity,
            expires_at: issued.expires_at,
        }),
    ))
}

/// POST /api/auth/verify
pub async fn verify_code(
    State(state): State<AppState>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let identity = Identity::parse(&body.identity)?;
    let auth = state.login.verify(&identity, &body.code).await?;

    Ok(Json(VerifyResponse {
        identity: auth.identity,
        display_name: auth.profile.display_name,
    }))
}
