//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_rate_checks_total` (counter): rate decisions by policy, outcome
//! - `gateway_csrf_rejected_total` (counter): CSRF validation failures
//! - `gateway_security_events_total` (counter): security events by type
//! - `gateway_sessions_started_total` (counter): device sessions recorded
//! - `gateway_store_entries` (gauge): live entries by store

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::error!(error = %e, "Failed to install metrics exporter");
    } else {
        tracing::info!(address = %addr, "Metrics exporter listening");
    }
}

/// Record a rate-limit decision for a policy.
pub fn record_rate_check(policy: &str, allowed: bool) {
    let outcome = if allowed { "allowed" } else { "limited" };
    counter!(
        "gateway_rate_checks_total",
        "policy" => policy.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a rejected CSRF validation.
pub fn record_csrf_rejected() {
    counter!("gateway_csrf_rejected_total").increment(1);
}

/// Record a security event by type.
pub fn record_security_event(event_type: &'static str) {
    counter!("gateway_security_events_total", "type" => event_type).increment(1);
}

/// Record a newly started device session.
pub fn record_session_started() {
    counter!("gateway_sessions_started_total").increment(1);
}

/// Publish live entry counts for the in-memory stores.
pub fn record_store_sizes(rate_windows: usize, csrf_subjects: usize, sessions: usize) {
    gauge!("gateway_store_entries", "store" => "rate_windows").set(rate_windows as f64);
    gauge!("gateway_store_entries", "store" => "csrf_subjects").set(csrf_subjects as f64);
    gauge!("gateway_store_entries", "store" => "sessions").set(sessions as f64);
}
