//! Session manager: TTL- and capacity-bounded registry of per-session memory.
//!
//! Sessions are created on first access through the injected
//! [`MemoryFactory`]. Cleanup runs in two stages: sessions idle for longer
//! than the TTL are expired, then the least recently accessed sessions are
//! evicted until the registry fits `max_sessions`.
//!
//! Cleanup runs lazily from [`SessionManager::get_session_memory`] once the
//! cleanup interval has elapsed, and optionally on a timer via
//! [`SessionManager::spawn_cleanup_task`].
//!
//! The registry lock is a plain mutex held only for map updates; nothing
//! awaits while holding it. Memory handles are returned as `Arc`s so callers
//! do their (slow) memory work outside it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use contextkeeper_config::SessionConfig;
use contextkeeper_core::clock::{Clock, SystemClock};
use contextkeeper_core::memory::{ConversationMemory, MemoryFactory};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

struct SessionEntry {
    memory: Arc<dyn ConversationMemory>,
    created: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
    /// Monotonic access counter; breaks `last_accessed` ties for LRU.
    touch: u64,
}

struct Registry {
    sessions: HashMap<String, SessionEntry>,
    last_cleanup: DateTime<Utc>,
    next_touch: u64,
}

impl Registry {
    fn next_touch(&mut self) -> u64 {
        self.next_touch += 1;
        self.next_touch
    }
}

/// Diagnostic view of one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub created: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub idle_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub max_sessions: usize,
    pub oldest_created: Option<DateTime<Utc>>,
    pub newest_created: Option<DateTime<Utc>>,
    pub last_cleanup: DateTime<Utc>,
    pub next_cleanup: DateTime<Utc>,
    /// Zero once the next cleanup is due.
    pub time_until_next_cleanup_ms: i64,
}

/// What a cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub expired: usize,
    pub evicted: usize,
}

pub struct SessionManager {
    max_sessions: usize,
    ttl: Duration,
    cleanup_interval: Duration,
    factory: Arc<dyn MemoryFactory>,
    clock: Arc<dyn Clock>,
    registry: Mutex<Registry>,
}

impl SessionManager {
    pub fn new(config: &SessionConfig, factory: Arc<dyn MemoryFactory>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let now = clock.now();
        Self {
            max_sessions: config.max_sessions,
            ttl: config.ttl(),
            cleanup_interval: config.cleanup_interval(),
            factory,
            clock,
            registry: Mutex::new(Registry {
                sessions: HashMap::new(),
                last_cleanup: now,
                next_touch: 0,
            }),
        }
    }

    /// Replace the clock. Resets the last-cleanup mark to the new clock's now.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        self.clock = clock;
        self.registry
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .last_cleanup = now;
        self
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Memory for `session_id`, created on first access.
    ///
    /// Touches the session. Runs a cleanup pass first when the cleanup
    /// interval has elapsed.
    pub fn get_session_memory(&self, session_id: &str) -> Arc<dyn ConversationMemory> {
        let now = self.clock.now();
        let mut registry = self.registry();

        if now - registry.last_cleanup > self.cleanup_interval {
            self.cleanup_locked(&mut registry, now);
        }

        let touch = registry.next_touch();
        if let Some(entry) = registry.sessions.get_mut(session_id) {
            entry.last_accessed = now.max(entry.created);
            entry.touch = touch;
            return entry.memory.clone();
        }

        let memory = self.factory.create(session_id);
        registry.sessions.insert(
            session_id.to_string(),
            SessionEntry {
                memory: memory.clone(),
                created: now,
                last_accessed: now,
                touch,
            },
        );
        debug!(
            session_id,
            total = registry.sessions.len(),
            "Created session"
        );
        memory
    }

    /// Remove a session. Absent ids are ignored.
    pub fn clear_session(&self, session_id: &str) {
        if self.registry().sessions.remove(session_id).is_some() {
            debug!(session_id, "Cleared session");
        }
    }

    /// Expire idle sessions, then evict LRU sessions down to capacity.
    pub fn cleanup_sessions(&self) -> CleanupReport {
        let now = self.clock.now();
        let mut registry = self.registry();
        self.cleanup_locked(&mut registry, now)
    }

    fn cleanup_locked(&self, registry: &mut Registry, now: DateTime<Utc>) -> CleanupReport {
        let before = registry.sessions.len();
        let ttl = self.ttl;
        registry
            .sessions
            .retain(|_, entry| now - entry.last_accessed <= ttl);
        let expired = before - registry.sessions.len();

        let mut evicted = 0;
        if registry.sessions.len() > self.max_sessions {
            let mut by_age: Vec<(DateTime<Utc>, u64, String)> = registry
                .sessions
                .iter()
                .map(|(id, e)| (e.last_accessed, e.touch, id.clone()))
                .collect();
            by_age.sort();
            let excess = registry.sessions.len() - self.max_sessions;
            for (_, _, id) in by_age.into_iter().take(excess) {
                registry.sessions.remove(&id);
                evicted += 1;
            }
        }

        registry.last_cleanup = now;
        if expired > 0 || evicted > 0 {
            info!(
                expired,
                evicted,
                remaining = registry.sessions.len(),
                "Session cleanup"
            );
        } else {
            debug!(remaining = registry.sessions.len(), "Session cleanup, nothing removed");
        }
        CleanupReport { expired, evicted }
    }

    /// Snapshot of all sessions, oldest first. Does not touch them.
    pub fn get_all_sessions(&self) -> Vec<SessionInfo> {
        let now = self.clock.now();
        let registry = self.registry();
        let mut sessions: Vec<SessionInfo> = registry
            .sessions
            .iter()
            .map(|(id, e)| SessionInfo {
                session_id: id.clone(),
                created: e.created,
                last_accessed: e.last_accessed,
                idle_ms: (now - e.last_accessed).num_milliseconds().max(0),
            })
            .collect();
        sessions.sort_by(|a, b| {
            a.created
                .cmp(&b.created)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        sessions
    }

    pub fn get_session_stats(&self) -> SessionStats {
        let now = self.clock.now();
        let registry = self.registry();
        let created = registry.sessions.values().map(|e| e.created);
        let oldest_created = created.clone().min();
        let newest_created = created.max();
        let next_cleanup = registry
            .last_cleanup
            .checked_add_signed(self.cleanup_interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        SessionStats {
            total_sessions: registry.sessions.len(),
            max_sessions: self.max_sessions,
            oldest_created,
            newest_created,
            last_cleanup: registry.last_cleanup,
            next_cleanup,
            time_until_next_cleanup_ms: (next_cleanup - now).num_milliseconds().max(0),
        }
    }

    pub fn session_count(&self) -> usize {
        self.registry().sessions.len()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.registry().sessions.contains_key(session_id)
    }

    /// Run `cleanup_sessions` every cleanup interval.
    ///
    /// The task holds a weak reference and stops once the manager is dropped.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> JoinHandle<()> {
        let period = self
            .cleanup_interval
            .to_std()
            .unwrap_or_default()
            .max(std::time::Duration::from_millis(1));
        let manager = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    debug!("Session manager dropped, stopping cleanup task");
                    break;
                };
                manager.cleanup_sessions();
            }
        })
    }
}
