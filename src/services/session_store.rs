// src/services/session_store.rs
//! In-memory store for pending protocol sessions.
//!
//! The store is the only shared mutable resource in the service: a
//! mutex-guarded map gives per-request-id atomicity, and the background
//! sweep takes the same lock as foreground operations. Expiry is enforced
//! twice: the sweep deletes stale entries every tick, and `get` also
//! rejects expired-but-unswept entries so a session is never usable past
//! its TTL regardless of sweep timing.

use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::models::session::SessionEntry;

/// Sessions live this long from creation.
pub const SESSION_TTL: Duration = Duration::from_secs(5 * 60);

/// The sweep wakes up this often.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Mutex-guarded session map with TTL expiry.
pub struct SessionStore<T> {
    entries: Arc<Mutex<HashMap<String, T>>>,
    ttl: Duration,
}

impl<T> Clone for SessionStore<T> {
    fn clone(&self) -> Self {
        SessionStore {
            entries: Arc::clone(&self.entries),
            ttl: self.ttl,
        }
    }
}

impl<T: SessionEntry> SessionStore<T> {
    /// Creates a store with the standard 5 minute TTL.
    pub fn new() -> Self {
        Self::with_ttl(SESSION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        SessionStore {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Inserts a session under its request id.
    pub fn insert(&self, request_id: String, session: T) {
        self.entries.lock().unwrap().insert(request_id, session);
    }

    /// Returns a live session, or `None` when it is absent or expired.
    ///
    /// Expired entries are rejected here even before the sweep removes
    /// them, so TTL enforcement does not depend on sweep timing.
    pub fn get(&self, request_id: &str) -> Option<T> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(request_id)
            .filter(|session| session.created_at().elapsed() <= self.ttl)
            .cloned()
    }

    /// Deletes a session. Idempotent: deleting a missing id is a no-op.
    pub fn consume(&self, request_id: &str) {
        self.entries.lock().unwrap().remove(request_id);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Spawns the periodic sweep that deletes sessions older than the TTL.
    ///
    /// Must be called from within a tokio runtime. The returned handle can
    /// be dropped; the task runs for the lifetime of the runtime.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let entries = Arc::clone(&self.entries);
        let ttl = self.ttl;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(SWEEP_INTERVAL);
            tick.tick().await; // first tick completes immediately
            loop {
                tick.tick().await;
                let now = Instant::now();
                let mut entries = entries.lock().unwrap();
                let before = entries.len();
                entries.retain(|_, session| now - session.created_at() <= ttl);
                let swept = before - entries.len();
                if swept > 0 {
                    debug!("swept {} expired session(s)", swept);
                }
            }
        })
    }
}
