//! Session storage.
//!
//! The store is injected into the registry so tests run against an
//! isolated in-memory instance and deployments can swap in shared
//! storage without touching call sites.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::{DeviceInfo, LocationInfo};

/// A recorded device session. Distinct from an auth session: this is the
/// fraud/engagement tracking record, never deleted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSession {
    pub id: Uuid,
    pub user_id: String,
    pub ip_address: String,
    pub user_agent: String,
    pub device_fingerprint: String,
    pub device_info: DeviceInfo,
    pub location_info: Option<LocationInfo>,
    pub created_at_ms: u64,
    pub last_activity_at_ms: u64,
    pub ended_at_ms: Option<u64>,
}

/// Storage abstraction for device sessions.
pub trait SessionStore: Send + Sync {
    /// Persist a new session record.
    fn insert(&self, session: DeviceSession);

    /// Fetch a session by id.
    fn get(&self, id: Uuid) -> Option<DeviceSession>;

    /// Bump a session's last-activity timestamp. Returns false when the
    /// id is unknown.
    fn touch(&self, id: Uuid, at_ms: u64) -> bool;

    /// Mark a session ended. The first end timestamp wins; repeated
    /// calls are no-ops. Returns false when the id is unknown.
    fn end(&self, id: Uuid, at_ms: u64) -> bool;

    /// All sessions recorded for a user.
    fn sessions_for_user(&self, user_id: &str) -> Vec<DeviceSession>;

    /// Whether any session, for any user, carries this fingerprint.
    fn fingerprint_seen(&self, fingerprint: &str) -> bool;

    /// Total stored sessions.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush to durable storage, when the implementation has any.
    fn persist(&self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A thread-safe in-memory session store with optional JSON snapshots.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<Uuid, DeviceSession>>,
    persistence_path: Option<String>,
}

impl InMemorySessionStore {
    /// Create a new empty store.
    pub fn new(persistence_path: Option<String>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            persistence_path,
        }
    }

    /// Load from a snapshot file if it exists.
    pub fn load_from_file(path: &str) -> std::io::Result<Self> {
        let store = Self::new(Some(path.to_string()));
        if Path::new(path).exists() {
            let file = File::open(path)?;
            let reader = BufReader::new(file);
            let map: HashMap<Uuid, DeviceSession> = serde_json::from_reader(reader)?;
            for (k, v) in map {
                store.sessions.insert(k, v);
            }
            tracing::info!(sessions = store.sessions.len(), "Loaded session snapshot");
        }
        Ok(store)
    }

    /// Write a snapshot to the configured path.
    pub fn save_to_file(&self) -> std::io::Result<()> {
        if let Some(path) = &self.persistence_path {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            let map: HashMap<Uuid, DeviceSession> = self
                .sessions
                .iter()
                .map(|r| (*r.key(), r.value().clone()))
                .collect();
            serde_json::to_writer(writer, &map)?;
            tracing::info!(sessions = map.len(), "Saved session snapshot");
        }
        Ok(())
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, session: DeviceSession) {
        self.sessions.insert(session.id, session);
    }

    fn get(&self, id: Uuid) -> Option<DeviceSession> {
        self.sessions.get(&id).map(|r| r.value().clone())
    }

    fn touch(&self, id: Uuid, at_ms: u64) -> bool {
        match self.sessions.get_mut(&id) {
            Some(mut session) => {
                session.last_activity_at_ms = at_ms;
                true
            }
            None => false,
        }
    }

    fn end(&self, id: Uuid, at_ms: u64) -> bool {
        match self.sessions.get_mut(&id) {
            Some(mut session) => {
                if session.ended_at_ms.is_none() {
                    session.ended_at_ms = Some(at_ms);
                }
                true
            }
            None => false,
        }
    }

    fn sessions_for_user(&self, user_id: &str) -> Vec<DeviceSession> {
        self.sessions
            .iter()
            .filter(|r| r.value().user_id == user_id)
            .map(|r| r.value().clone())
            .collect()
    }

    fn fingerprint_seen(&self, fingerprint: &str) -> bool {
        self.sessions
            .iter()
            .any(|r| r.value().device_fingerprint == fingerprint)
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }

    fn persist(&self) -> std::io::Result<()> {
        self.save_to_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session(user_id: &str, fingerprint: &str) -> DeviceSession {
        DeviceSession {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            ip_address: "1.2.3.4".to_string(),
            user_agent: "test-agent".to_string(),
            device_fingerprint: fingerprint.to_string(),
            device_info: DeviceInfo::default(),
            location_info: None,
            created_at_ms: 1_000,
            last_activity_at_ms: 1_000,
            ended_at_ms: None,
        }
    }

    #[test]
    fn insert_and_get() {
        let store = InMemorySessionStore::new(None);
        let session = sample_session("u1", "fp1");
        let id = session.id;
        store.insert(session);

        let fetched = store.get(id).unwrap();
        assert_eq!(fetched.user_id, "u1");
        assert!(store.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn touch_bumps_last_activity() {
        let store = InMemorySessionStore::new(None);
        let session = sample_session("u1", "fp1");
        let id = session.id;
        store.insert(session);

        assert!(store.touch(id, 5_000));
        assert_eq!(store.get(id).unwrap().last_activity_at_ms, 5_000);
        assert!(!store.touch(Uuid::new_v4(), 5_000));
    }

    #[test]
    fn end_keeps_first_timestamp() {
        let store = InMemorySessionStore::new(None);
        let session = sample_session("u1", "fp1");
        let id = session.id;
        store.insert(session);

        assert!(store.end(id, 2_000));
        assert!(store.end(id, 9_000));
        assert_eq!(store.get(id).unwrap().ended_at_ms, Some(2_000));
    }

    #[test]
    fn fingerprint_seen_is_global_across_users() {
        let store = InMemorySessionStore::new(None);
        store.insert(sample_session("u1", "fp1"));

        assert!(store.fingerprint_seen("fp1"));
        assert!(!store.fingerprint_seen("fp2"));
    }

    #[test]
    fn sessions_for_user_filters() {
        let store = InMemorySessionStore::new(None);
        store.insert(sample_session("u1", "fp1"));
        store.insert(sample_session("u1", "fp2"));
        store.insert(sample_session("u2", "fp3"));

        assert_eq!(store.sessions_for_user("u1").len(), 2);
        assert_eq!(store.sessions_for_user("u2").len(), 1);
        assert!(store.sessions_for_user("u3").is_empty());
    }

    #[test]
    fn snapshot_round_trip() {
        let path = std::env::temp_dir().join("gateguard_test_sessions.json");
        let path = path.to_str().unwrap().to_string();

        let store = InMemorySessionStore::new(Some(path.clone()));
        let session = sample_session("u1", "fp1");
        let id = session.id;
        store.insert(session);
        store.save_to_file().unwrap();

        let loaded = InMemorySessionStore::load_from_file(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(id).unwrap().device_fingerprint, "fp1");

        std::fs::remove_file(&path).unwrap_or_default();
    }
}
