//! Handoff context builder
//!
//! When the router forwards a turn to a specialized handler, the handler
//! must see what the user already told the router in earlier turns. The
//! builder folds the router's user-authored messages into one string.

use crate::memory::store::MemoryStore;
use crate::memory::window::{Message, Role};
use std::sync::Arc;
use tracing::debug;

/// Forwarded turn for a target handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    pub message: String,
    /// Lets the target open its own session-scoped window
    pub session_id: Option<String>,
}

pub struct HandoffContextBuilder {
    store: Arc<MemoryStore>,
    cross_agent_context: bool,
}

impl HandoffContextBuilder {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        let cross_agent_context = store.config().enable_cross_agent_context;
        Self {
            store,
            cross_agent_context,
        }
    }

    /// Build the forwarded message from `source_kind`'s window.
    ///
    /// `current_message` is used when sharing is disabled or the source
    /// window turns out to be empty.
    pub fn build(
        &self,
        session_id: Option<&str>,
        source_kind: &str,
        current_message: &str,
    ) -> Handoff {
        let message = if !self.cross_agent_context {
            current_message.to_string()
        } else {
            let forwarded = match session_id {
                Some(session_id) => {
                    let history = self.store.get_memory(session_id, source_kind).messages();
                    aggregate_user_messages(&history).or_else(|| last_text(&history))
                }
                // Agent-level windows are shared by every caller: never aggregate them.
                None => last_text(&self.store.get_agent_memory(source_kind).messages()),
            };
            forwarded.unwrap_or_else(|| current_message.to_string())
        };

        debug!(
            session_id = session_id.unwrap_or("-"),
            source = source_kind,
            chars = message.len(),
            "Built handoff context"
        );

        Handoff {
            message,
            session_id: session_id.map(str::to_string),
        }
    }
}

/// User-authored texts in order, joined by single spaces. `None` if the
/// history holds no user message.
pub fn aggregate_user_messages(messages: &[Message]) -> Option<String> {
    let joined = messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn last_text(messages: &[Message]) -> Option<String> {
    messages.last().map(|m| m.text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;

    fn builder(cross_agent_context: bool) -> (HandoffContextBuilder, Arc<MemoryStore>) {
        let config = MemoryConfig {
            enable_cross_agent_context: cross_agent_context,
            ..MemoryConfig::default()
        };
        let store = Arc::new(MemoryStore::new(config));
        (HandoffContextBuilder::new(store.clone()), store)
    }

    #[test]
    fn test_aggregates_user_turns_in_order() {
        let history = vec![
            Message::user("A"),
            Message::assistant("B"),
            Message::user("C"),
        ];
        assert_eq!(aggregate_user_messages(&history), Some("A C".to_string()));
    }

    #[test]
    fn test_no_user_turns_aggregates_to_none() {
        let history = vec![Message::system("rules"), Message::assistant("last")];
        assert_eq!(aggregate_user_messages(&history), None);
        assert_eq!(aggregate_user_messages(&[]), None);
    }

    #[test]
    fn test_build_from_session_window() {
        let (builder, store) = builder(true);
        let window = store.get_memory("s1", "TRIAGE");
        window.append(Message::user("buy 5 headsets"));
        window.append(Message::assistant("who is buying?"));
        window.append(Message::user("my name is Zhang"));

        let handoff = builder.build(Some("s1"), "TRIAGE", "my name is Zhang");

        assert_eq!(handoff.message, "buy 5 headsets my name is Zhang");
        assert_eq!(handoff.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_falls_back_to_last_message_without_user_turns() {
        let (builder, store) = builder(true);
        let window = store.get_memory("s1", "TRIAGE");
        window.append(Message::system("boot"));
        window.append(Message::tool_result("latest order: 1a2b3c4d"));

        let handoff = builder.build(Some("s1"), "TRIAGE", "ignored");
        assert_eq!(handoff.message, "latest order: 1a2b3c4d");
    }

    #[test]
    fn test_sessionless_uses_last_agent_message() {
        let (builder, store) = builder(true);
        let window = store.get_agent_memory("TRIAGE");
        window.append(Message::user("someone else's turn"));
        window.append(Message::user("cancel my order"));

        let handoff = builder.build(None, "TRIAGE", "cancel my order");
        assert_eq!(handoff.message, "cancel my order");
        assert!(handoff.session_id.is_none());
    }

    #[test]
    fn test_other_sessions_do_not_leak() {
        let (builder, store) = builder(true);
        store.get_memory("other", "TRIAGE").append(Message::user("secret"));
        store.get_memory("s1", "TRIAGE").append(Message::user("mine"));

        assert_eq!(builder.build(Some("s1"), "TRIAGE", "mine").message, "mine");
    }

    #[test]
    fn test_sharing_disabled_forwards_current_turn() {
        let (builder, store) = builder(false);
        let window = store.get_memory("s1", "TRIAGE");
        window.append(Message::user("first"));
        window.append(Message::user("second"));

        assert_eq!(builder.build(Some("s1"), "TRIAGE", "second").message, "second");
    }

    #[test]
    fn test_empty_window_uses_current_message() {
        let (builder, _store) = builder(true);
        assert_eq!(builder.build(Some("new"), "TRIAGE", "hello").message, "hello");
    }
}
