//! Session lifecycle and footprint aggregation.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::now_epoch_ms;
use crate::config::FingerprintConfig;
use crate::fingerprint::store::{DeviceSession, SessionStore};
use crate::fingerprint::{compute_fingerprint, DeviceInfo, LocationInfo};
use crate::observability::metrics;

/// Errors surfaced by the registry. Missing required input is a client
/// error; the store itself is infallible in the in-memory deployment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// A session-start request, as reported by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSession {
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_info: Option<DeviceInfo>,
    pub location_info: Option<LocationInfo>,
}

/// Result of starting a session.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StartedSession {
    pub session_id: Uuid,
    pub device_fingerprint: String,
}

/// Aggregate view of a user's historical sessions, devices, and
/// locations; derived entirely from stored sessions, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct UserFootprint {
    pub total_sessions: usize,
    pub unique_device_count: usize,
    pub unique_ip_count: usize,
    pub unique_country_count: usize,
    pub engagement_level: String,
    pub recent_sessions: Vec<DeviceSession>,
    pub unique_devices: Vec<String>,
}

/// Computes device fingerprints, records session lifecycle events, and
/// aggregates per-user footprints.
pub struct FingerprintRegistry {
    store: Arc<dyn SessionStore>,
    config: FingerprintConfig,
}

impl FingerprintRegistry {
    pub fn new(store: Arc<dyn SessionStore>, config: FingerprintConfig) -> Self {
        Self { store, config }
    }

    /// Validate a session-start request and persist the session.
    ///
    /// `user_id`, `ip_address`, and `device_info` are required; a missing
    /// field is a client error, not a server failure.
    pub fn start_session(&self, request: NewSession) -> Result<StartedSession, RegistryError> {
        let user_id = non_empty(request.user_id).ok_or(RegistryError::MissingField("user_id"))?;
        let ip_address =
            non_empty(request.ip_address).ok_or(RegistryError::MissingField("ip_address"))?;
        let device_info = request
            .device_info
            .ok_or(RegistryError::MissingField("device_info"))?;

        let user_agent = request.user_agent.unwrap_or_default();
        let fingerprint = compute_fingerprint(&device_info, &user_agent);
        let now = now_epoch_ms();

        let session = DeviceSession {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            ip_address,
            user_agent,
            device_fingerprint: fingerprint.clone(),
            device_info,
            location_info: request.location_info,
            created_at_ms: now,
            last_activity_at_ms: now,
            ended_at_ms: None,
        };
        let session_id = session.id;
        self.store.insert(session);

        metrics::record_session_started();
        tracing::debug!(
            user_id = %user_id,
            session_id = %session_id,
            fingerprint = %fingerprint,
            "Device session started"
        );

        Ok(StartedSession {
            session_id,
            device_fingerprint: fingerprint,
        })
    }

    /// Bump a session's last-activity timestamp. An unknown id is logged
    /// and ignored so activity pings never fail the calling feature.
    pub fn record_activity(&self, session_id: Uuid) {
        if !self.store.touch(session_id, now_epoch_ms()) {
            tracing::debug!(session_id = %session_id, "Activity ping for unknown session");
        }
    }

    /// Mark a session ended. Idempotent: the first end timestamp wins,
    /// and ending an unknown session is ignored.
    pub fn end_session(&self, session_id: Uuid) {
        if !self.store.end(session_id, now_epoch_ms()) {
            tracing::debug!(session_id = %session_id, "End event for unknown session");
        }
    }

    /// Whether any recorded session, for any user, carries this
    /// fingerprint.
    pub fn is_returning_device(&self, fingerprint: &str) -> bool {
        self.store.fingerprint_seen(fingerprint)
    }

    /// Aggregate a user's footprint. A user with no sessions gets the
    /// empty footprint, not an error.
    pub fn footprint(&self, user_id: &str) -> UserFootprint {
        let mut sessions = self.store.sessions_for_user(user_id);
        sessions.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));

        let total_sessions = sessions.len();
        let mut devices: Vec<String> = Vec::new();
        let mut seen_devices = HashSet::new();
        let mut ips = HashSet::new();
        let mut countries = HashSet::new();
        for session in &sessions {
            if seen_devices.insert(session.device_fingerprint.clone()) {
                devices.push(session.device_fingerprint.clone());
            }
            ips.insert(session.ip_address.clone());
            if let Some(country) = session
                .location_info
                .as_ref()
                .and_then(|l| l.country.as_deref())
            {
                countries.insert(country.to_string());
            }
        }

        let engagement_level = self.engagement_level(total_sessions).to_string();
        let recent_sessions: Vec<DeviceSession> = sessions
            .into_iter()
            .take(self.config.recent_sessions_limit)
            .collect();

        UserFootprint {
            total_sessions,
            unique_device_count: devices.len(),
            unique_ip_count: ips.len(),
            unique_country_count: countries.len(),
            engagement_level,
            recent_sessions,
            unique_devices: devices,
        }
    }

    /// Total stored sessions, for the admin status endpoint.
    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    /// Flush the underlying store, when it persists anything.
    pub fn persist(&self) -> std::io::Result<()> {
        self.store.persist()
    }

    fn engagement_level(&self, total_sessions: usize) -> &'static str {
        if total_sessions <= 1 {
            "new"
        } else if total_sessions <= self.config.engagement_low_max {
            "occasional"
        } else if total_sessions <= self.config.engagement_regular_max {
            "regular"
        } else {
            "power"
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::store::InMemorySessionStore;

    fn registry() -> FingerprintRegistry {
        FingerprintRegistry::new(
            Arc::new(InMemorySessionStore::new(None)),
            FingerprintConfig::default(),
        )
    }

    fn sample_request(user_id: &str) -> NewSession {
        NewSession {
            user_id: Some(user_id.to_string()),
            ip_address: Some("1.2.3.4".to_string()),
            user_agent: Some("test-agent".to_string()),
            device_info: Some(DeviceInfo {
                browser: "Firefox".to_string(),
                screen_resolution: "2560x1440".to_string(),
                ..DeviceInfo::default()
            }),
            location_info: None,
        }
    }

    #[test]
    fn start_session_requires_user_id() {
        let mut request = sample_request("u1");
        request.user_id = None;
        assert_eq!(
            registry().start_session(request),
            Err(RegistryError::MissingField("user_id"))
        );
    }

    #[test]
    fn start_session_rejects_empty_ip() {
        let mut request = sample_request("u1");
        request.ip_address = Some(String::new());
        assert_eq!(
            registry().start_session(request),
            Err(RegistryError::MissingField("ip_address"))
        );
    }

    #[test]
    fn start_session_requires_device_info() {
        let mut request = sample_request("u1");
        request.device_info = None;
        assert_eq!(
            registry().start_session(request),
            Err(RegistryError::MissingField("device_info"))
        );
    }

    #[test]
    fn returning_device_after_first_session() {
        let registry = registry();
        let started = registry.start_session(sample_request("u1")).unwrap();

        assert!(registry.is_returning_device(&started.device_fingerprint));
        assert!(!registry.is_returning_device("never-seen"));
    }

    #[test]
    fn returning_device_is_scoped_globally() {
        let registry = registry();
        let started = registry.start_session(sample_request("u1")).unwrap();

        // Same device reported by a different user still counts.
        let other = registry.start_session(sample_request("u2")).unwrap();
        assert_eq!(started.device_fingerprint, other.device_fingerprint);
        assert!(registry.is_returning_device(&started.device_fingerprint));
    }

    #[test]
    fn end_session_is_idempotent() {
        let registry = registry();
        let started = registry.start_session(sample_request("u1")).unwrap();
        registry.end_session(started.session_id);
        registry.end_session(started.session_id);
        // Unknown ids are ignored too.
        registry.end_session(Uuid::new_v4());
        registry.record_activity(Uuid::new_v4());
    }

    #[test]
    fn footprint_of_unknown_user_is_empty() {
        let footprint = registry().footprint("nobody");
        assert_eq!(footprint.total_sessions, 0);
        assert_eq!(footprint.unique_device_count, 0);
        assert_eq!(footprint.unique_ip_count, 0);
        assert_eq!(footprint.unique_country_count, 0);
        assert_eq!(footprint.engagement_level, "new");
        assert!(footprint.recent_sessions.is_empty());
    }

    #[test]
    fn footprint_counts_distinct_devices_ips_and_countries() {
        let registry = registry();

        let mut first = sample_request("u1");
        first.location_info = Some(LocationInfo {
            country: Some("DE".to_string()),
            ..LocationInfo::default()
        });
        registry.start_session(first).unwrap();

        let mut second = sample_request("u1");
        second.ip_address = Some("5.6.7.8".to_string());
        second.device_info = Some(DeviceInfo {
            browser: "Chromium".to_string(),
            ..DeviceInfo::default()
        });
        second.location_info = Some(LocationInfo {
            country: Some("FR".to_string()),
            ..LocationInfo::default()
        });
        registry.start_session(second).unwrap();

        // Same device as the first session, same IP, same country.
        let mut third = sample_request("u1");
        third.location_info = Some(LocationInfo {
            country: Some("DE".to_string()),
            ..LocationInfo::default()
        });
        registry.start_session(third).unwrap();

        let footprint = registry.footprint("u1");
        assert_eq!(footprint.total_sessions, 3);
        assert_eq!(footprint.unique_device_count, 2);
        assert_eq!(footprint.unique_ip_count, 2);
        assert_eq!(footprint.unique_country_count, 2);
        assert_eq!(footprint.unique_devices.len(), 2);
    }

    #[test]
    fn footprint_excludes_other_users() {
        let registry = registry();
        registry.start_session(sample_request("u1")).unwrap();
        registry.start_session(sample_request("u2")).unwrap();

        assert_eq!(registry.footprint("u1").total_sessions, 1);
    }

    #[test]
    fn recent_sessions_are_capped() {
        let config = FingerprintConfig {
            recent_sessions_limit: 3,
            ..FingerprintConfig::default()
        };
        let registry =
            FingerprintRegistry::new(Arc::new(InMemorySessionStore::new(None)), config);
        for _ in 0..5 {
            registry.start_session(sample_request("u1")).unwrap();
        }

        let footprint = registry.footprint("u1");
        assert_eq!(footprint.total_sessions, 5);
        assert_eq!(footprint.recent_sessions.len(), 3);
    }

    #[test]
    fn engagement_levels_bucket_by_session_count() {
        let registry = registry();
        assert_eq!(registry.engagement_level(0), "new");
        assert_eq!(registry.engagement_level(1), "new");
        assert_eq!(registry.engagement_level(2), "occasional");
        assert_eq!(registry.engagement_level(5), "occasional");
        assert_eq!(registry.engagement_level(6), "regular");
        assert_eq!(registry.engagement_level(20), "regular");
        assert_eq!(registry.engagement_level(21), "power");
    }
}
