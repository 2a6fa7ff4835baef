//! Configuration validation.
//!
//! Semantic validation on top of serde's syntactic checks. Returns all
//! violations, not just the first, so an operator can fix a config file
//! in one pass.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic violation in a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate a parsed configuration.
///
/// Pure function: collects every violation it can find and returns them
/// all together.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(err(
            "listener.bind_address",
            format!("not a valid socket address: {:?}", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(err("listener.max_connections", "must be greater than zero"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(err("timeouts.request_secs", "must be greater than zero"));
    }

    let mut policy_names = HashSet::new();
    for (i, policy) in config.rate_limit.policies.iter().enumerate() {
        let field = format!("rate_limit.policies[{}]", i);
        if policy.name.is_empty() {
            errors.push(err(&field, "policy name must not be empty"));
        } else if !policy_names.insert(policy.name.as_str()) {
            errors.push(err(&field, format!("duplicate policy name {:?}", policy.name)));
        }
        if policy.window_ms == 0 {
            errors.push(err(&field, "window_ms must be greater than zero"));
        }
        if policy.max_requests == 0 {
            errors.push(err(&field, "max_requests must be greater than zero"));
        }
    }
    if config.rate_limit.enabled && !policy_names.contains(config.rate_limit.fallback_policy.as_str()) {
        errors.push(err(
            "rate_limit.fallback_policy",
            format!("references unknown policy {:?}", config.rate_limit.fallback_policy),
        ));
    }
    for (i, route) in config.rate_limit.routes.iter().enumerate() {
        let field = format!("rate_limit.routes[{}]", i);
        if route.path_prefix.is_empty() {
            errors.push(err(&field, "path_prefix must not be empty"));
        }
        if !policy_names.contains(route.policy.as_str()) {
            errors.push(err(&field, format!("references unknown policy {:?}", route.policy)));
        }
    }

    if config.csrf.token_ttl_secs == 0 {
        errors.push(err("csrf.token_ttl_secs", "must be greater than zero"));
    }
    if config.csrf.header_name.is_empty() {
        errors.push(err("csrf.header_name", "must not be empty"));
    }

    if config.fingerprint.recent_sessions_limit == 0 {
        errors.push(err("fingerprint.recent_sessions_limit", "must be greater than zero"));
    }
    if config.fingerprint.engagement_low_max >= config.fingerprint.engagement_regular_max {
        errors.push(err(
            "fingerprint.engagement_low_max",
            "must be below engagement_regular_max",
        ));
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(err("admin.api_key", "must not be empty when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RatePolicyConfig, RouteRatePolicy};

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors_not_just_first() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        config.timeouts.request_secs = 0;
        config.csrf.token_ttl_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "listener.bind_address"));
        assert!(errors.iter().any(|e| e.field == "timeouts.request_secs"));
        assert!(errors.iter().any(|e| e.field == "csrf.token_ttl_secs"));
    }

    #[test]
    fn rejects_duplicate_policy_names() {
        let mut config = GatewayConfig::default();
        config.rate_limit.policies.push(RatePolicyConfig {
            name: "general".to_string(),
            window_ms: 1000,
            max_requests: 1,
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("duplicate")));
    }

    #[test]
    fn rejects_route_referencing_unknown_policy() {
        let mut config = GatewayConfig::default();
        config.rate_limit.routes.push(RouteRatePolicy {
            path_prefix: "/api/other".to_string(),
            policy: "nope".to_string(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("nope")));
    }

    #[test]
    fn rejects_zero_window_policy() {
        let mut config = GatewayConfig::default();
        config.rate_limit.policies[0].window_ms = 0;
        config.rate_limit.policies[0].max_requests = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn rejects_inverted_engagement_thresholds() {
        let mut config = GatewayConfig::default();
        config.fingerprint.engagement_low_max = 30;
        config.fingerprint.engagement_regular_max = 20;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "fingerprint.engagement_low_max"));
    }
}
