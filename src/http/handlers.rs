//! API route handlers.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::fingerprint::{NewSession, UserFootprint};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::auth::bearer_token;
use crate::security::client_ip;
use crate::security::events::{self, SecurityEventKind};

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Echo the client IP as the gateway resolved it.
pub async fn ip(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<Value> {
    let ip = client_ip(&headers, addr, state.config.security.trust_forwarded_for);
    Json(json!({ "ip": ip }))
}

/// Derive the verified subject from the request's bearer credential.
/// Records a security event on failure.
fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    addr: SocketAddr,
    endpoint: &str,
) -> Result<String, ApiError> {
    bearer_token(headers)
        .and_then(|token| state.verifier.verify(token))
        .ok_or_else(|| {
            let ip = client_ip(headers, addr, state.config.security.trust_forwarded_for);
            events::record(
                SecurityEventKind::AuthFailure,
                &ip,
                endpoint,
                "missing or invalid bearer credential",
            );
            ApiError::Auth("authentication required".to_string())
        })
}

/// Issue a CSRF token for the authenticated subject.
pub async fn issue_csrf_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let subject = authenticate(&state, &headers, addr, "/api/csrf-token")?;
    let token = state.csrf.issue(&subject);
    Ok(Json(json!({
        "token": token.value,
        "expires_at_ms": token.expires_at_ms,
    })))
}

/// Invalidate all CSRF tokens for the authenticated subject (logout).
pub async fn revoke_csrf_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let subject = authenticate(&state, &headers, addr, "/api/csrf-token")?;
    state.csrf.invalidate(&subject);
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct SubmitMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Representative state-changing endpoint. The CSRF middleware has
/// already validated the token by the time this runs.
pub async fn submit_message(
    State(_state): State<AppState>,
    Json(body): Json<SubmitMessage>,
) -> Result<Json<Value>, ApiError> {
    let content = body
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("missing required field: content".to_string()))?;
    let message_id = Uuid::new_v4();
    tracing::debug!(message_id = %message_id, bytes = content.len(), "Message accepted");
    Ok(Json(json!({ "success": true, "message_id": message_id })))
}

/// Record a new device session.
pub async fn start_session(
    State(state): State<AppState>,
    Json(body): Json<NewSession>,
) -> Result<Json<Value>, ApiError> {
    let started = state
        .registry
        .start_session(body)
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    Ok(Json(json!({
        "success": true,
        "session_id": started.session_id,
        "device_fingerprint": started.device_fingerprint,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SessionEvent {
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// Activity ping for an existing session.
pub async fn record_activity(
    State(state): State<AppState>,
    Json(body): Json<SessionEvent>,
) -> Result<Json<Value>, ApiError> {
    let session_id = body
        .session_id
        .ok_or_else(|| ApiError::Validation("missing required field: session_id".to_string()))?;
    state.registry.record_activity(session_id);
    Ok(Json(json!({ "success": true })))
}

/// Mark a session ended.
pub async fn end_session(
    State(state): State<AppState>,
    Json(body): Json<SessionEvent>,
) -> Result<Json<Value>, ApiError> {
    let session_id = body
        .session_id
        .ok_or_else(|| ApiError::Validation("missing required field: session_id".to_string()))?;
    state.registry.end_session(session_id);
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct CheckReturning {
    #[serde(default)]
    pub fingerprint: Option<String>,
}

/// Whether a fingerprint has been seen before, for any user.
pub async fn check_returning(
    State(state): State<AppState>,
    Json(body): Json<CheckReturning>,
) -> Result<Json<Value>, ApiError> {
    let fingerprint = body
        .fingerprint
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::Validation("missing required field: fingerprint".to_string()))?;
    Ok(Json(json!({
        "is_returning": state.registry.is_returning_device(&fingerprint),
    })))
}

/// Aggregate footprint for a user. Unknown users get the empty
/// footprint rather than an error.
pub async fn footprint(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<UserFootprint> {
    Json(state.registry.footprint(&user_id))
}

/// Store sizes and uptime, for the management CLI.
pub async fn admin_status(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    if !state.config.admin.enabled {
        return Err(ApiError::NotFound("admin endpoint disabled".to_string()));
    }
    let authorized = bearer_token(&headers)
        .map(|token| token == state.config.admin.api_key)
        .unwrap_or(false);
    if !authorized {
        let ip = client_ip(&headers, addr, state.config.security.trust_forwarded_for);
        events::record(
            SecurityEventKind::AuthFailure,
            &ip,
            "/admin/status",
            "invalid admin credential",
        );
        return Err(ApiError::Auth("authentication required".to_string()));
    }

    Ok(Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "rate_windows": state.limiter.window_count(),
        "csrf_subjects": state.csrf.subject_count(),
        "sessions": state.registry.session_count(),
    })))
}
