//! Integration tests for handoff-server HTTP endpoints
//!
//! Tests cover:
//! - Health endpoint
//! - Code request and verification, including every failure mapping
//! - Event ingestion reporting matched and delivered connections

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use handoff_common::config::PortalConfig;
use handoff_common::{Identity, Role};
use handoff_server::otc::{
    CodeDelivery, DeliveryError, MemorySessionStore, OtcSession, ProfileFields, SessionStore,
    StoreError,
};
use handoff_server::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method

/// Captures issued codes instead of mailing them
#[derive(Default)]
struct CapturedCodes {
    sent: Mutex<Vec<(Identity, String)>>,
}

impl CapturedCodes {
    fn last_for(&self, identity: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| id.as_str() == identity)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl CodeDelivery for CapturedCodes {
    async fn deliver(
        &self,
        identity: &Identity,
        code: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((identity.clone(), code.to_string()));
        Ok(())
    }
}

/// Session store whose backend is down
struct UnavailableStore;

fn backend_down<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("connection refused".to_string()))
}

#[async_trait]
impl SessionStore for UnavailableStore {
    async fn put_session(&self, _: &OtcSession) -> Result<(), StoreError> {
        backend_down()
    }

    async fn get(&self, _: &Identity) -> Result<Option<OtcSession>, StoreError> {
        backend_down()
    }

    async fn delete(&self, _: &Identity) -> Result<(), StoreError> {
        backend_down()
    }

    async fn consume(&self, _: &Identity, _: &str) -> Result<Option<OtcSession>, StoreError> {
        backend_down()
    }

    async fn discard(&self, _: &OtcSession) -> Result<bool, StoreError> {
        backend_down()
    }
}

struct TestApp {
    state: AppState,
    store: Arc<MemorySessionStore>,
    codes: Arc<CapturedCodes>,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemorySessionStore::new());
        let codes = Arc::new(CapturedCodes::default());
        let state = AppState::new(store.clone(), codes.clone(), &PortalConfig::default());
        Self { state, store, codes }
    }

    fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "handoff-server");
    assert!(body["version"].is_string());
    assert_eq!(body["connections"], 0);
}

// =============================================================================
// Login codes
// =============================================================================

#[tokio::test]
async fn test_request_then_verify_code() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/api/auth/request-code",
            json!({ "identity": "a@x.com", "displayName": "Ann" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["identity"], "a@x.com");
    assert!(body["expiresAt"].is_string());
    assert!(body.get("code").is_none(), "code must only travel via delivery");

    let code = app.codes.last_for("a@x.com").expect("code delivered");
    assert_eq!(code.len(), 6);

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/api/auth/verify",
            json!({ "identity": "a@x.com", "code": code }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["identity"], "a@x.com");
    assert_eq!(body["displayName"], "Ann");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_code_cannot_be_used_twice() {
    let app = TestApp::new();

    app.router()
        .oneshot(json_request("POST", "/api/auth/request-code", json!({ "identity": "b@x.com" })))
        .await
        .unwrap();
    let code = app.codes.last_for("b@x.com").unwrap();

    let first = app
        .router()
        .oneshot(json_request("POST", "/api/auth/verify", json!({ "identity": "b@x.com", "code": code })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .router()
        .oneshot(json_request("POST", "/api/auth/verify", json!({ "identity": "b@x.com", "code": code })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
    let body = extract_json(second.into_body()).await;
    assert_eq!(body["error"], "no_session");
}

#[tokio::test]
async fn test_verify_without_session_is_not_found() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/api/auth/verify",
            json!({ "identity": "nobody@x.com", "code": "123456" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "no_session");
}

#[tokio::test]
async fn test_verify_expired_code_is_gone() {
    let app = TestApp::new();
    let identity = Identity::parse("c@x.com").unwrap();
    let issued_at = Utc::now() - ChronoDuration::minutes(20);
    let session = OtcSession::issue(
        identity.clone(),
        ProfileFields::default(),
        "111111".to_string(),
        Duration::from_secs(600),
        issued_at,
    );
    app.store.put_session(&session).await.unwrap();

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/api/auth/verify",
            json!({ "identity": "c@x.com", "code": "111111" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GONE);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "expired");
    assert!(app.store.get(&identity).await.unwrap().is_none());
}

#[tokio::test]
async fn test_wrong_code_is_unauthorized_and_retryable() {
    let app = TestApp::new();

    app.router()
        .oneshot(json_request("POST", "/api/auth/request-code", json!({ "identity": "d@x.com" })))
        .await
        .unwrap();
    let code = app.codes.last_for("d@x.com").unwrap();
    let wrong = if code == "999999" { "100000" } else { "999999" };

    let response = app
        .router()
        .oneshot(json_request("POST", "/api/auth/verify", json!({ "identity": "d@x.com", "code": wrong })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "invalid_code");

    let response = app
        .router()
        .oneshot(json_request("POST", "/api/auth/verify", json!({ "identity": "d@x.com", "code": code })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_blank_identity_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(json_request("POST", "/api/auth/request-code", json!({ "identity": "   " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "bad_request");
    assert!(app.codes.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_store_outage_is_service_unavailable() {
    let codes = Arc::new(CapturedCodes::default());
    let state = AppState::new(Arc::new(UnavailableStore), codes.clone(), &PortalConfig::default());

    let request = build_router(state.clone())
        .oneshot(json_request("POST", "/api/auth/request-code", json!({ "identity": "a@x.com" })))
        .await
        .unwrap();
    assert_eq!(request.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = extract_json(request.into_body()).await;
    assert_eq!(body["error"], "storage_unavailable");
    assert!(codes.sent.lock().unwrap().is_empty());

    let verify = build_router(state)
        .oneshot(json_request(
            "POST",
            "/api/auth/verify",
            json!({ "identity": "a@x.com", "code": "123456" }),
        ))
        .await
        .unwrap();
    assert_eq!(verify.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = extract_json(verify.into_body()).await;
    assert_eq!(body["error"], "storage_unavailable");
    assert!(!body["message"].as_str().unwrap().contains("connection refused"));
}

// =============================================================================
// Event ingestion
// =============================================================================

#[tokio::test]
async fn test_created_event_reaches_reviewers_only() {
    let app = TestApp::new();
    let registry = &app.state.registry;

    let (reviewer, mut reviewer_rx) = registry.add();
    registry.register(reviewer, Identity::parse("rev@x.com").unwrap(), Role::Reviewer);
    let (submitter, mut submitter_rx) = registry.add();
    registry.register(submitter, Identity::parse("a@x.com").unwrap(), Role::Submitter);

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/api/events",
            json!({
                "kind": "submission_created",
                "submissionId": "42",
                "submitterIdentity": "a@x.com",
                "metadata": { "fileName": "scan.png" }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["matched"], 1);
    assert_eq!(body["delivered"], 1);

    let frame = reviewer_rx.try_recv().expect("reviewer notified");
    let frame: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(frame["type"], "new_image_upload");
    assert_eq!(frame["data"]["id"], "42");
    assert_eq!(frame["data"]["userId"], "a@x.com");
    assert_eq!(frame["data"]["fileName"], "scan.png");
    assert!(submitter_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_completed_event_with_no_listener_matches_nothing() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(json_request(
            "POST",
            "/api/events",
            json!({
                "kind": "submission_completed",
                "submissionId": "42",
                "submitterIdentity": "gone@x.com"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["matched"], 0);
    assert_eq!(body["delivered"], 0);
}

#[tokio::test]
async fn test_malformed_event_is_rejected() {
    let app = TestApp::new();

    let response = app
        .router()
        .oneshot(json_request("POST", "/api/events", json!({ "kind": "submission_exploded" })))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
