//! Structured security-event records.
//!
//! Security-relevant rejections are recorded with structured fields for
//! later audit, independent of the HTTP response returned to the caller.

use crate::observability::metrics;

/// Classification of a security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEventKind {
    /// Missing or invalid credential.
    AuthFailure,
    /// State-changing request without a valid CSRF token.
    CsrfRejected,
    /// Client exceeded a rate policy.
    RateLimited,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::AuthFailure => "auth_failure",
            SecurityEventKind::CsrfRejected => "csrf_rejected",
            SecurityEventKind::RateLimited => "rate_limited",
        }
    }
}

/// Record a security event with the requester's IP, the endpoint, and a
/// short reason.
pub fn record(kind: SecurityEventKind, ip: &str, endpoint: &str, details: &str) {
    tracing::warn!(
        event_type = kind.as_str(),
        ip = %ip,
        endpoint = %endpoint,
        details = %details,
        "Security event"
    );
    metrics::record_security_event(kind.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_stable_names() {
        assert_eq!(SecurityEventKind::AuthFailure.as_str(), "auth_failure");
        assert_eq!(SecurityEventKind::CsrfRejected.as_str(), "csrf_rejected");
        assert_eq!(SecurityEventKind::RateLimited.as_str(), "rate_limited");
    }
}
