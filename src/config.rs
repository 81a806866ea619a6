//! Runtime configuration
//!
//! Values come from environment variables (a `.env` file is loaded by the
//! binaries). Every option has a default so an empty environment is valid.

use crate::error::AgentError;
use crate::Result;
use chrono::Duration;
use std::str::FromStr;
use tracing::warn;

/// Upper bound for the timeout and cleanup interval: one year.
pub const MAX_PERIOD_MINUTES: i64 = 365 * 24 * 60;

/// Conversation memory settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Capacity of session-scoped agent windows
    pub default_max_messages: usize,
    /// Capacity of the session-wide window
    pub session_max_messages: usize,
    /// Capacity of agent-level (session-less) windows
    pub agent_max_messages: usize,
    /// Forward the router's earlier user turns on handoff
    pub enable_cross_agent_context: bool,
    pub session_timeout_minutes: i64,
    /// Recognized but unused: there is no durable backing store
    pub enable_session_persistence: bool,
    pub cleanup_interval_minutes: u64,
    pub max_active_sessions: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            default_max_messages: 20,
            session_max_messages: 50,
            agent_max_messages: 20,
            enable_cross_agent_context: true,
            session_timeout_minutes: 30,
            enable_session_persistence: false,
            cleanup_interval_minutes: 60,
            max_active_sessions: 1000,
        }
    }
}

impl MemoryConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            default_max_messages: parse_or(
                &lookup,
                "CHAT_MEMORY_DEFAULT_MAX_MESSAGES",
                defaults.default_max_messages,
            )?,
            session_max_messages: parse_or(
                &lookup,
                "CHAT_MEMORY_SESSION_MAX_MESSAGES",
                defaults.session_max_messages,
            )?,
            agent_max_messages: parse_or(
                &lookup,
                "CHAT_MEMORY_AGENT_MAX_MESSAGES",
                defaults.agent_max_messages,
            )?,
            enable_cross_agent_context: parse_flag_or(
                &lookup,
                "CHAT_MEMORY_CROSS_AGENT_CONTEXT",
                defaults.enable_cross_agent_context,
            )?,
            session_timeout_minutes: parse_or(
                &lookup,
                "CHAT_MEMORY_SESSION_TIMEOUT_MINUTES",
                defaults.session_timeout_minutes,
            )?,
            enable_session_persistence: parse_flag_or(
                &lookup,
                "CHAT_MEMORY_SESSION_PERSISTENCE",
                defaults.enable_session_persistence,
            )?,
            cleanup_interval_minutes: parse_or(
                &lookup,
                "CHAT_MEMORY_CLEANUP_INTERVAL_MINUTES",
                defaults.cleanup_interval_minutes,
            )?,
            max_active_sessions: parse_or(
                &lookup,
                "CHAT_MEMORY_MAX_ACTIVE_SESSIONS",
                defaults.max_active_sessions,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let capacities = [
            ("default_max_messages", self.default_max_messages),
            ("session_max_messages", self.session_max_messages),
            ("agent_max_messages", self.agent_max_messages),
            ("max_active_sessions", self.max_active_sessions),
        ];
        for (name, value) in capacities {
            if value == 0 {
                return Err(AgentError::Config(format!("{} must be greater than 0", name)));
            }
        }

        if self.session_timeout_minutes <= 0 || self.session_timeout_minutes > MAX_PERIOD_MINUTES {
            return Err(AgentError::Config(format!(
                "session_timeout_minutes must be between 1 and {}",
                MAX_PERIOD_MINUTES
            )));
        }
        if self.cleanup_interval_minutes == 0
            || self.cleanup_interval_minutes > MAX_PERIOD_MINUTES as u64
        {
            return Err(AgentError::Config(format!(
                "cleanup_interval_minutes must be between 1 and {}",
                MAX_PERIOD_MINUTES
            )));
        }

        if self.enable_session_persistence {
            warn!("Session persistence requested but no durable store exists; memory stays in-process");
        }

        Ok(())
    }

    /// Clamped to `1..=MAX_PERIOD_MINUTES` for configs built without `validate`.
    pub fn session_timeout(&self) -> Duration {
        Duration::minutes(self.session_timeout_minutes.clamp(1, MAX_PERIOD_MINUTES))
    }

    pub fn cleanup_interval(&self) -> std::time::Duration {
        let minutes = self.cleanup_interval_minutes.clamp(1, MAX_PERIOD_MINUTES as u64);
        std::time::Duration::from_secs(minutes * 60)
    }

    /// Session count the capacity sweep evicts down to (80% of the ceiling).
    pub fn eviction_target(&self) -> usize {
        self.max_active_sessions * 80 / 100
    }
}

/// Process-level settings for the binaries.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub memory: MemoryConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT").or_else(|| lookup("API_PORT")) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| AgentError::Config(format!("Invalid PORT '{}': {}", raw, e)))?,
            None => 8080,
        };

        let gemini_api_key = lookup("GEMINI_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty() && key != "your_gemini_api_key_here");

        let gemini_model = lookup("GEMINI_MODEL")
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| "gemini-2.0-flash".to_string());

        Ok(Self {
            port,
            gemini_api_key,
            gemini_model,
            memory: MemoryConfig::from_lookup(&lookup)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AgentError::Config(format!("Invalid {} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

fn parse_flag_or<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(AgentError::Config(format!("Invalid {} '{}': expected a boolean", key, raw))),
    }
}
