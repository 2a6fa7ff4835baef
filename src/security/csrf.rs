//! CSRF token issuance and validation.
//!
//! Tokens are opaque random values bound to a server-verified subject.
//! The guard is fail-closed: every uncertain validation path returns
//! false, and the middleware answers 403 without performing the
//! requested mutation. The subject is always derived from verified
//! credentials, never from a header the client controls.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use rand::RngCore;

use crate::clock::now_epoch_ms;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::auth::bearer_token;
use crate::security::client_ip;
use crate::security::events::{self, SecurityEventKind};

/// An anti-forgery token bound to a subject.
#[derive(Debug, Clone)]
pub struct CsrfToken {
    /// Opaque random value, 32 bytes hex-encoded (256 bits entropy).
    pub value: String,
    pub subject_user_id: String,
    pub issued_at_ms: u64,
    pub expires_at_ms: u64,
}

impl CsrfToken {
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Mints and validates subject-bound anti-forgery tokens.
pub struct CsrfGuard {
    tokens: DashMap<String, Vec<CsrfToken>>,
    ttl_ms: u64,
}

impl CsrfGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tokens: DashMap::new(),
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    /// Issue a token for an already-verified subject.
    ///
    /// The subject's most recent still-valid token is reused so a cached
    /// client-side copy stays usable; expired tokens for the subject are
    /// purged on the way. Issue and invalidate for one subject serialize
    /// on the map's entry lock.
    pub fn issue(&self, subject_user_id: &str) -> CsrfToken {
        self.issue_at(subject_user_id, now_epoch_ms())
    }

    fn issue_at(&self, subject_user_id: &str, now_ms: u64) -> CsrfToken {
        let mut entry = self.tokens.entry(subject_user_id.to_string()).or_default();
        entry.retain(|t| !t.is_expired_at(now_ms));
        if let Some(existing) = entry.last() {
            return existing.clone();
        }

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = CsrfToken {
            value: hex::encode(bytes),
            subject_user_id: subject_user_id.to_string(),
            issued_at_ms: now_ms,
            expires_at_ms: now_ms + self.ttl_ms,
        };
        entry.push(token.clone());
        token
    }

    /// Validate a presented token against a server-verified subject.
    ///
    /// True iff a stored token for that subject matches byte-for-byte
    /// and is unexpired. Never panics; missing, expired, and mismatched
    /// tokens all return false.
    pub fn validate(&self, presented: &str, subject_user_id: &str) -> bool {
        self.validate_at(presented, subject_user_id, now_epoch_ms())
    }

    fn validate_at(&self, presented: &str, subject_user_id: &str, now_ms: u64) -> bool {
        self.tokens
            .get(subject_user_id)
            .map(|tokens| {
                tokens
                    .iter()
                    .any(|t| t.value == presented && !t.is_expired_at(now_ms))
            })
            .unwrap_or(false)
    }

    /// Remove all tokens for a subject (logout).
    pub fn invalidate(&self, subject_user_id: &str) {
        self.tokens.remove(subject_user_id);
    }

    /// Drop expired tokens and empty subjects.
    pub fn purge_expired(&self) {
        let now = now_epoch_ms();
        self.tokens.retain(|_, tokens| {
            tokens.retain(|t| !t.is_expired_at(now));
            !tokens.is_empty()
        });
    }

    /// Subjects currently holding tokens, for the admin status endpoint.
    pub fn subject_count(&self) -> usize {
        self.tokens.len()
    }
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Middleware validating CSRF tokens on state-changing requests.
///
/// Exempt paths and read-only methods pass through. Everything else
/// needs a verified bearer credential (the subject) and a matching
/// token in the configured header: 401 without the credential, 403
/// without a valid token.
pub async fn csrf_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let config = &state.config.csrf;
    let path = request.uri().path();
    if !config.enabled
        || !is_state_changing(request.method())
        || config.exempt_paths.iter().any(|p| path.starts_with(p.as_str()))
    {
        return next.run(request).await;
    }

    let endpoint = path.to_string();
    let ip = client_ip(
        request.headers(),
        addr,
        state.config.security.trust_forwarded_for,
    );

    let subject = bearer_token(request.headers())
        .and_then(|token| state.verifier.verify(token));
    let subject = match subject {
        Some(s) => s,
        None => {
            events::record(
                SecurityEventKind::AuthFailure,
                &ip,
                &endpoint,
                "missing or invalid bearer credential",
            );
            return ApiError::Auth("authentication required".to_string()).into_response();
        }
    };

    let presented = request
        .headers()
        .get(config.header_name.as_str())
        .and_then(|v| v.to_str().ok());
    let valid = match presented {
        Some(token) => state.csrf.validate(token, &subject),
        None => false,
    };
    if !valid {
        let reason = if presented.is_some() {
            "invalid or expired CSRF token"
        } else {
            "missing CSRF token"
        };
        metrics::record_csrf_rejected();
        events::record(SecurityEventKind::CsrfRejected, &ip, &endpoint, reason);
        return ApiError::Forbidden("CSRF validation failed".to_string()).into_response();
    }

    next.run(request).await
}
