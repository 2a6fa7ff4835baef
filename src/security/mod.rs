//! Request defense components: rate limiting, CSRF protection, bearer
//! verification, security headers, and security-event records.

pub mod auth;
pub mod csrf;
pub mod events;
pub mod headers;
pub mod rate_limit;

use std::net::SocketAddr;

use axum::http::HeaderMap;

pub use auth::{bearer_token, StaticTokenVerifier, SubjectVerifier};
pub use csrf::{CsrfGuard, CsrfToken};
pub use rate_limit::{RateDecision, RateLimiter, RatePolicySet};

/// Resolve the client IP for keying and audit.
///
/// The socket peer address is authoritative. The first X-Forwarded-For
/// entry is used only when the deployment has opted in, since any client
/// can set the header.
pub fn client_ip(headers: &HeaderMap, addr: SocketAddr, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(forwarded) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return forwarded.to_string();
        }
    }
    addr.ip().to_string()
}
