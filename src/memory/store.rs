//! Session and agent memory store
//!
//! Owns every message window plus the per-session activity records.
//! Windows are created lazily on first access and live until a session
//! clear, an agent clear, or the reaper removes them.
//!
//! All state for one session lives in a single map entry, so clearing a
//! session is one removal: other callers observe it either fully present
//! or fully gone.

use crate::config::MemoryConfig;
use crate::memory::clock::{Clock, SystemClock};
use crate::memory::window::MessageWindow;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Reserved separator between the session and agent parts of a key.
pub const KEY_SEPARATOR: char = ':';

/// Identifies one window in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemoryKey {
    /// Session-independent window shared by every caller of an agent kind
    Agent(String),
    /// Session-wide window
    Session(String),
    /// Window owned by one agent kind inside one session
    SessionAgent { session_id: String, agent_kind: String },
}

impl MemoryKey {
    pub fn agent(agent_kind: &str) -> Self {
        Self::Agent(agent_kind.to_string())
    }

    pub fn session(session_id: &str) -> Self {
        Self::Session(session_id.to_string())
    }

    pub fn session_agent(session_id: &str, agent_kind: &str) -> Self {
        Self::SessionAgent {
            session_id: session_id.to_string(),
            agent_kind: agent_kind.to_string(),
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Agent(_) => None,
            Self::Session(session_id) | Self::SessionAgent { session_id, .. } => Some(session_id),
        }
    }
}

impl fmt::Display for MemoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent(kind) => write!(f, "{}", kind),
            Self::Session(session_id) => write!(f, "{}", session_id),
            Self::SessionAgent {
                session_id,
                agent_kind,
            } => write!(f, "{}{}{}", session_id, KEY_SEPARATOR, agent_kind),
        }
    }
}

/// True if `id` can be used as a key component.
pub fn is_valid_key_component(id: &str) -> bool {
    !id.trim().is_empty() && !id.contains(KEY_SEPARATOR)
}

/// Activity record plus every window stored under one session id.
#[derive(Debug)]
struct SessionEntry {
    last_active: DateTime<Utc>,
    shared: Option<Arc<MessageWindow>>,
    agents: HashMap<String, Arc<MessageWindow>>,
}

impl SessionEntry {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_active: now,
            shared: None,
            agents: HashMap::new(),
        }
    }

    fn has_windows(&self) -> bool {
        self.shared.is_some() || !self.agents.is_empty()
    }
}

/// Concurrent, bounded, time-expiring store of message windows.
pub struct MemoryStore {
    config: MemoryConfig,
    clock: Arc<dyn Clock>,
    sessions: DashMap<String, SessionEntry>,
    agents: DashMap<String, Arc<MessageWindow>>,
}

impl MemoryStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: MemoryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            sessions: DashMap::new(),
            agents: DashMap::new(),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =============================
    // Get-or-create
    // =============================

    /// Agent-level window for `agent_kind`, capacity N_a.
    pub fn get_agent_memory(&self, agent_kind: &str) -> Arc<MessageWindow> {
        self.agents
            .entry(agent_kind.to_string())
            .or_insert_with(|| {
                debug!(key = %MemoryKey::agent(agent_kind), "Creating agent window");
                Arc::new(MessageWindow::new(self.config.agent_max_messages))
            })
            .value()
            .clone()
    }

    /// Session-wide window, capacity N_s. Touches activity.
    pub fn get_session_memory(&self, session_id: &str) -> Arc<MessageWindow> {
        let mut entry = self.touch(session_id);
        entry
            .shared
            .get_or_insert_with(|| {
                debug!(key = %MemoryKey::session(session_id), "Creating session window");
                Arc::new(MessageWindow::new(self.config.session_max_messages))
            })
            .clone()
    }

    /// Window for `(session_id, agent_kind)`, capacity N_d. Touches activity.
    pub fn get_memory(&self, session_id: &str, agent_kind: &str) -> Arc<MessageWindow> {
        let mut entry = self.touch(session_id);
        entry
            .agents
            .entry(agent_kind.to_string())
            .or_insert_with(|| {
                debug!(
                    key = %MemoryKey::session_agent(session_id, agent_kind),
                    "Creating session agent window"
                );
                Arc::new(MessageWindow::new(self.config.default_max_messages))
            })
            .clone()
    }

    /// Replace whatever sits at `(session_id, agent_kind)` with an empty
    /// window of `capacity`. Touches activity.
    pub fn create_memory(
        &self,
        session_id: &str,
        agent_kind: &str,
        capacity: usize,
    ) -> Arc<MessageWindow> {
        let window = Arc::new(MessageWindow::new(capacity));
        let mut entry = self.touch(session_id);
        entry.agents.insert(agent_kind.to_string(), window.clone());
        window
    }

    /// Copy the messages of `(source, agent_kind)` into a fresh window at
    /// `(target, agent_kind)`. Returns false when the source does not exist.
    pub fn copy_memory(&self, source_session: &str, target_session: &str, agent_kind: &str) -> bool {
        let Some(source) = self.peek(&MemoryKey::session_agent(source_session, agent_kind)) else {
            return false;
        };

        let target = Arc::new(MessageWindow::new(self.config.default_max_messages));
        for message in source.messages() {
            target.append(message);
        }

        let mut entry = self.touch(target_session);
        entry.agents.insert(agent_kind.to_string(), target);
        true
    }

    /// Look up a window without creating it or touching activity.
    pub fn peek(&self, key: &MemoryKey) -> Option<Arc<MessageWindow>> {
        match key {
            MemoryKey::Agent(kind) => self.agents.get(kind).map(|w| w.value().clone()),
            MemoryKey::Session(session_id) => self
                .sessions
                .get(session_id)
                .and_then(|entry| entry.shared.clone()),
            MemoryKey::SessionAgent {
                session_id,
                agent_kind,
            } => self
                .sessions
                .get(session_id)
                .and_then(|entry| entry.agents.get(agent_kind).cloned()),
        }
    }

    fn touch(&self, session_id: &str) -> dashmap::mapref::one::RefMut<'_, String, SessionEntry> {
        let now = self.clock.now();
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry::new(now));
        entry.last_active = now;
        entry
    }

    // =============================
    // Clearing
    // =============================

    /// Drop every window under `session_id` along with its activity record.
    /// Returns whether anything was stored for the session.
    pub fn clear_session(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            debug!(session_id, "Cleared session memory");
        }
        removed
    }

    /// Drop the agent-level window for `agent_kind` and its windows in
    /// every session. Activity records are kept.
    pub fn clear_agent(&self, agent_kind: &str) {
        self.agents.remove(agent_kind);
        for mut entry in self.sessions.iter_mut() {
            entry.agents.remove(agent_kind);
        }
        debug!(agent_kind, "Cleared agent memory");
    }

    /// Drop every window. Activity records are left for the reaper.
    pub fn clear_all(&self) {
        self.agents.clear();
        for mut entry in self.sessions.iter_mut() {
            entry.shared = None;
            entry.agents.clear();
        }
    }

    /// Remove `session_id` only if it has been idle since before
    /// `threshold`. A request that touched it in the meantime wins.
    pub fn clear_session_if_idle(&self, session_id: &str, threshold: DateTime<Utc>) -> bool {
        self.sessions
            .remove_if(session_id, |_, entry| entry.last_active < threshold)
            .is_some()
    }

    // =============================
    // Reads
    // =============================

    /// Distinct session ids that currently own at least one window.
    pub fn active_session_count(&self) -> usize {
        self.sessions.iter().filter(|entry| entry.has_windows()).count()
    }

    /// Distinct agent kinds with a window in `session_id`.
    pub fn session_agent_count(&self, session_id: &str) -> usize {
        self.sessions
            .get(session_id)
            .map(|entry| entry.agents.len())
            .unwrap_or(0)
    }

    pub fn session_exists(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn last_active_time(&self, session_id: &str) -> Option<DateTime<Utc>> {
        self.sessions.get(session_id).map(|entry| entry.last_active)
    }

    /// Sessions without a record count as expired. A `ttl` reaching past
    /// the representable date range expires nothing that exists.
    pub fn is_expired(&self, session_id: &str, ttl: Duration) -> bool {
        let Some(last_active) = self.last_active_time(session_id) else {
            return true;
        };
        match self.clock.now().checked_sub_signed(ttl) {
            Some(threshold) => last_active < threshold,
            None => false,
        }
    }

    /// `(session_id, last_active)` for every activity record.
    pub fn activity_snapshot(&self) -> Vec<(String, DateTime<Utc>)> {
        self.sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.last_active))
            .collect()
    }

    /// Like `activity_snapshot`, limited to sessions that still hold a window.
    pub fn active_activity_snapshot(&self) -> Vec<(String, DateTime<Utc>)> {
        self.sessions
            .iter()
            .filter(|entry| entry.has_windows())
            .map(|entry| (entry.key().clone(), entry.last_active))
            .collect()
    }
}
