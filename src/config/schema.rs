//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the request defense gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting policies.
    pub rate_limit: RateLimitConfig,

    /// CSRF protection settings.
    pub csrf: CsrfConfig,

    /// Bearer credentials accepted for authenticated endpoints.
    pub auth: AuthConfig,

    /// Device fingerprinting and session tracking settings.
    pub fingerprint: FingerprintConfig,

    /// Security response header settings.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin status endpoint settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// A named fixed-window rate policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RatePolicyConfig {
    /// Policy identifier; also namespaces the counter keyspace.
    pub name: String,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests allowed per key within one window.
    pub max_requests: u32,
}

/// Maps a path prefix to a named policy, overriding the fallback.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteRatePolicy {
    /// Path prefix to match.
    pub path_prefix: String,

    /// Policy name applied to matching requests.
    pub policy: String,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Named policies. Each policy owns an independent keyspace.
    pub policies: Vec<RatePolicyConfig>,

    /// Per-route policy overrides (longest matching prefix wins).
    pub routes: Vec<RouteRatePolicy>,

    /// Policy applied when no route override matches.
    pub fallback_policy: String,

    /// Path prefixes that bypass rate limiting entirely.
    pub exempt_paths: Vec<String>,

    /// Interval for the background expired-window sweep in seconds.
    /// 0 disables the sweep; expired entries are still replaced when touched.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policies: vec![
                RatePolicyConfig {
                    name: "auth".to_string(),
                    window_ms: 900_000,
                    max_requests: 5,
                },
                RatePolicyConfig {
                    name: "general".to_string(),
                    window_ms: 60_000,
                    max_requests: 30,
                },
                RatePolicyConfig {
                    name: "messages".to_string(),
                    window_ms: 60_000,
                    max_requests: 20,
                },
                RatePolicyConfig {
                    name: "ip-api".to_string(),
                    window_ms: 60_000,
                    max_requests: 30,
                },
            ],
            routes: vec![
                RouteRatePolicy {
                    path_prefix: "/api/ip".to_string(),
                    policy: "ip-api".to_string(),
                },
                RouteRatePolicy {
                    path_prefix: "/api/messages".to_string(),
                    policy: "messages".to_string(),
                },
            ],
            fallback_policy: "general".to_string(),
            exempt_paths: vec!["/health".to_string()],
            sweep_interval_secs: 60,
        }
    }
}

/// CSRF protection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Enable CSRF validation on state-changing requests.
    pub enabled: bool,

    /// Token lifetime in seconds. One canonical TTL, applied everywhere.
    pub token_ttl_secs: u64,

    /// Request header carrying the token.
    pub header_name: String,

    /// Path prefixes exempt from CSRF validation.
    pub exempt_paths: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_ttl_secs: 3600,
            header_name: "x-csrf-token".to_string(),
            exempt_paths: vec![
                "/api/csrf-token".to_string(),
                "/api/device-tracking/".to_string(),
                "/health".to_string(),
                "/admin/".to_string(),
            ],
        }
    }
}

/// A bearer credential mapped to a verified subject.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiCredential {
    /// Opaque bearer token presented by the client.
    pub token: String,

    /// The subject user id this credential authenticates.
    pub user_id: String,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Static bearer credentials. Production deployments swap the
    /// verifier implementation for real session verification.
    pub credentials: Vec<ApiCredential>,
}

/// Device fingerprinting and session tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Maximum sessions returned in a footprint's recent list.
    pub recent_sessions_limit: usize,

    /// Session count at or below which a user is "occasional".
    pub engagement_low_max: usize,

    /// Session count at or below which a user is "regular".
    pub engagement_regular_max: usize,

    /// Optional JSON snapshot path for the session store.
    pub persistence_path: Option<String>,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            recent_sessions_limit: 10,
            engagement_low_max: 5,
            engagement_regular_max: 20,
            persistence_path: None,
        }
    }
}

/// Security response header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security response headers.
    pub enable_headers: bool,

    /// Content-Security-Policy header value.
    pub content_security_policy: String,

    /// Referrer-Policy header value.
    pub referrer_policy: String,

    /// Strict-Transport-Security max-age; sent only when TLS is active.
    pub hsts_max_age_secs: u64,

    /// Trust the first X-Forwarded-For entry as the client IP.
    /// Only enable behind a proxy that sets the header itself.
    pub trust_forwarded_for: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            content_security_policy: "default-src 'none'; frame-ancestors 'none'".to_string(),
            referrer_policy: "no-referrer".to_string(),
            hsts_max_age_secs: 31_536_000,
            trust_forwarded_for: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON-formatted logs instead of the pretty format.
    pub log_json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin status endpoint.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
