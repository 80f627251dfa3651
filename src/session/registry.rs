//! Bookkeeping for live terminal sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::Serialize;

use super::{BridgeState, SessionId};
use crate::error::RelayError;
use crate::Result;

/// Registry entry for one terminal session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Unique identifier.
    pub id: SessionId,
    /// Current lifecycle state.
    pub state: BridgeState,
    /// Shell process ID, once spawned.
    pub pid: Option<u32>,
    /// Time when the channel was accepted.
    pub created_at: Instant,
}

impl SessionRecord {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            state: BridgeState::Idle,
            pid: None,
            created_at: Instant::now(),
        }
    }

    /// Time since the session was registered.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

/// Serializable view of a registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub state: BridgeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub age_seconds: f64,
}

impl From<&SessionRecord> for SessionSnapshot {
    fn from(record: &SessionRecord) -> Self {
        Self {
            session_id: record.id,
            state: record.state,
            pid: record.pid,
            age_seconds: record.age().as_secs_f64(),
        }
    }
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
}

/// Thread-safe registry of terminal sessions.
///
/// Constructed once by the hosting process and shared by handle. Cloning is
/// cheap and every clone sees the same entries. Nothing in a session's
/// lifecycle depends on the registry succeeding.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session in the `Idle` state and return its ID.
    pub fn register(&self) -> SessionId {
        let id = SessionId::from_raw(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        match self.inner.sessions.write() {
            Ok(mut sessions) => {
                sessions.insert(id, SessionRecord::new(id));
            }
            Err(_) => tracing::warn!(session = %id, "session registry lock poisoned"),
        }
        id
    }

    /// Get a clone of the record with the given ID.
    pub fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        let sessions = self
            .inner
            .sessions
            .read()
            .map_err(|_| RelayError::LockPoisoned)?;
        Ok(sessions.get(id).cloned())
    }

    /// Update a record using a closure.
    ///
    /// Returns an error if the session doesn't exist.
    pub fn update<F>(&self, id: &SessionId, f: F) -> Result<()>
    where
        F: FnOnce(&mut SessionRecord),
    {
        let mut sessions = self
            .inner
            .sessions
            .write()
            .map_err(|_| RelayError::LockPoisoned)?;

        let record = sessions
            .get_mut(id)
            .ok_or_else(|| RelayError::SessionNotFound(id.to_string()))?;

        f(record);
        Ok(())
    }

    /// Record a state change. Failures are logged, never returned.
    pub fn set_state(&self, id: &SessionId, state: BridgeState) {
        if let Err(e) = self.update(id, |r| r.state = state) {
            tracing::debug!(session = %id, "registry update skipped: {}", e);
        }
    }

    /// Remove a record from the registry.
    pub fn remove(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        let mut sessions = self
            .inner
            .sessions
            .write()
            .map_err(|_| RelayError::LockPoisoned)?;
        Ok(sessions.remove(id))
    }

    /// Number of registered sessions.
    pub fn count(&self) -> usize {
        self.inner.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Snapshot of all sessions, ordered by ID.
    pub fn snapshot(&self) -> Result<Vec<SessionSnapshot>> {
        let sessions = self
            .inner
            .sessions
            .read()
            .map_err(|_| RelayError::LockPoisoned)?;
        let mut list: Vec<SessionSnapshot> = sessions.values().map(SessionSnapshot::from).collect();
        list.sort_by_key(|s| s.session_id);
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_assigns_unique_ids() {
        let registry = SessionRegistry::new();
        let a = registry.register();
        let b = registry.register();

        assert_ne!(a, b);
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.get(&a).unwrap().unwrap().state, BridgeState::Idle);
    }

    #[test]
    fn test_clones_share_entries() {
        let registry = SessionRegistry::new();
        let handle = registry.clone();
        let id = registry.register();

        assert!(handle.get(&id).unwrap().is_some());
    }

    #[test]
    fn test_update_and_set_state() {
        let registry = SessionRegistry::new();
        let id = registry.register();

        registry.update(&id, |r| r.pid = Some(42)).unwrap();
        registry.set_state(&id, BridgeState::Active);

        let record = registry.get(&id).unwrap().unwrap();
        assert_eq!(record.pid, Some(42));
        assert_eq!(record.state, BridgeState::Active);
    }

    #[test]
    fn test_update_unknown_session() {
        let registry = SessionRegistry::new();
        let result = registry.update(&SessionId::from_raw(999), |_| {});
        assert!(matches!(result, Err(RelayError::SessionNotFound(_))));

        // set_state swallows the same failure
        registry.set_state(&SessionId::from_raw(999), BridgeState::Active);
    }

    #[test]
    fn test_remove() {
        let registry = SessionRegistry::new();
        let id = registry.register();

        assert!(registry.remove(&id).unwrap().is_some());
        assert!(registry.remove(&id).unwrap().is_none());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_snapshot_sorted() {
        let registry = SessionRegistry::new();
        let first = registry.register();
        let second = registry.register();

        let snapshot = registry.snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].session_id, first);
        assert_eq!(snapshot[1].session_id, second);

        let json = serde_json::to_value(&snapshot[0]).unwrap();
        assert_eq!(json["state"], "idle");
        assert!(json.get("pid").is_none());
    }
}
