//! Bearer-credential verification.
//!
//! The verifier turns a presented bearer token into a verified subject
//! user id. It sits behind a trait so production deployments can plug
//! in real session verification without touching the call sites.

use std::collections::HashMap;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use crate::config::AuthConfig;

/// Maps a bearer token to the subject it authenticates.
pub trait SubjectVerifier: Send + Sync {
    /// Returns the verified subject user id, or `None` when the
    /// credential is unknown.
    fn verify(&self, bearer_token: &str) -> Option<String>;
}

/// Verifier backed by the static credential table in config.
pub struct StaticTokenVerifier {
    credentials: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            credentials: config
                .credentials
                .iter()
                .map(|c| (c.token.clone(), c.user_id.clone()))
                .collect(),
        }
    }
}

impl SubjectVerifier for StaticTokenVerifier {
    fn verify(&self, bearer_token: &str) -> Option<String> {
        self.credentials.get(bearer_token).cloned()
    }
}

/// Extract the bearer token from an Authorization header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}
