//! Fixed-window rate limiting.
//!
//! Counts requests in discrete, non-overlapping windows per client key.
//! Each named policy owns an independent keyspace, so the same client
//! under two policies never shares a counter. The limiter is best-effort
//! by contract and fails open: a check never errors, and a backing store
//! that cannot be read would allow the request.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::clock::now_epoch_ms;
use crate::config::{RateLimitConfig, RatePolicyConfig};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::events::{self, SecurityEventKind};
use crate::security::client_ip;

/// One live counting window for a namespaced key.
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    reset_at_ms: u64,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at_ms: u64,
}

impl RateDecision {
    /// Seconds until the window resets, rounded up, at least 1.
    /// Suitable for a `Retry-After` header.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        let remaining_ms = self.reset_at_ms.saturating_sub(now_ms);
        remaining_ms.div_ceil(1000).max(1)
    }
}

/// In-memory fixed-window limiter over namespaced client keys.
pub struct RateLimiter {
    windows: DashMap<String, RateWindow>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Check and consume one request slot for `key` under `policy`.
    ///
    /// The read-modify-write runs under the map's entry lock, so
    /// concurrent requests for the same key cannot grossly undercount.
    /// A window whose reset time has passed is replaced, never
    /// incremented; remaining never goes negative.
    pub fn check_and_consume(&self, policy: &RatePolicyConfig, key: &str) -> RateDecision {
        self.check_at(policy, key, now_epoch_ms())
    }

    fn check_at(&self, policy: &RatePolicyConfig, key: &str, now_ms: u64) -> RateDecision {
        let map_key = format!("{}:{}", policy.name, key);
        let mut entry = self.windows.entry(map_key).or_insert(RateWindow {
            count: 0,
            reset_at_ms: 0,
        });
        let window = entry.value_mut();

        if now_ms >= window.reset_at_ms {
            window.count = 1;
            window.reset_at_ms = now_ms + policy.window_ms;
            return RateDecision {
                allowed: true,
                remaining: policy.max_requests.saturating_sub(1),
                reset_at_ms: window.reset_at_ms,
            };
        }

        if window.count < policy.max_requests {
            window.count += 1;
            RateDecision {
                allowed: true,
                remaining: policy.max_requests - window.count,
                reset_at_ms: window.reset_at_ms,
            }
        } else {
            RateDecision {
                allowed: false,
                remaining: 0,
                reset_at_ms: window.reset_at_ms,
            }
        }
    }

    /// Drop windows whose reset time has passed. Bounds memory between
    /// touches of cold keys.
    pub fn purge_expired(&self) {
        let now = now_epoch_ms();
        self.windows.retain(|_, window| window.reset_at_ms > now);
    }

    /// Live window count, for the admin status endpoint.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved policy table: named policies plus route overrides.
pub struct RatePolicySet {
    enabled: bool,
    policies: HashMap<String, RatePolicyConfig>,
    /// Route overrides, longest prefix first.
    routes: Vec<(String, String)>,
    fallback: String,
    exempt_paths: Vec<String>,
}

impl RatePolicySet {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let policies = config
            .policies
            .iter()
            .map(|p| (p.name.clone(), p.clone()))
            .collect();
        let mut routes: Vec<(String, String)> = config
            .routes
            .iter()
            .map(|r| (r.path_prefix.clone(), r.policy.clone()))
            .collect();
        routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self {
            enabled: config.enabled,
            policies,
            routes,
            fallback: config.fallback_policy.clone(),
            exempt_paths: config.exempt_paths.clone(),
        }
    }

    /// Look up a policy by name.
    pub fn get(&self, name: &str) -> Option<&RatePolicyConfig> {
        self.policies.get(name)
    }

    /// Resolve the policy governing a request path. `None` means the
    /// path is exempt or limiting is disabled.
    pub fn for_path(&self, path: &str) -> Option<&RatePolicyConfig> {
        if !self.enabled || self.exempt_paths.iter().any(|p| path.starts_with(p.as_str())) {
            return None;
        }
        let name = self
            .routes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, policy)| policy.as_str())
            .unwrap_or(self.fallback.as_str());
        self.policies.get(name)
    }
}

/// Middleware enforcing the per-route rate policy, keyed by client IP.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    let policy = match state.policies.for_path(path) {
        Some(p) => p.clone(),
        None => return next.run(request).await,
    };

    let ip = client_ip(
        request.headers(),
        addr,
        state.config.security.trust_forwarded_for,
    );
    let now = now_epoch_ms();
    let decision = state.limiter.check_and_consume(&policy, &ip);

    if decision.allowed {
        metrics::record_rate_check(&policy.name, true);
        let mut response = next.run(request).await;
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
            headers.insert("x-ratelimit-remaining", value);
        }
        if let Ok(value) = HeaderValue::from_str(&decision.reset_at_ms.to_string()) {
            headers.insert("x-ratelimit-reset", value);
        }
        response
    } else {
        let endpoint = path.to_string();
        tracing::warn!(client = %ip, policy = %policy.name, endpoint = %endpoint, "Rate limit exceeded");
        metrics::record_rate_check(&policy.name, false);
        events::record(
            SecurityEventKind::RateLimited,
            &ip,
            &endpoint,
            &format!("policy {}", policy.name),
        );
        ApiError::RateLimited {
            retry_after_secs: decision.retry_after_secs(now),
            reset_at_ms: decision.reset_at_ms,
        }
        .into_response()
    }
}
