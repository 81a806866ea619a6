//! Router
//!
//! Appends each inbound message to its own TRIAGE window, asks the
//! classifier for a target and either hands the aggregated context to that
//! handler or answers with a clarification itself.

use crate::agents::OrderAgent;
use crate::classifier::{Intent, IntentClassifier};
use crate::error::AgentError;
use crate::llm::ChatModel;
use crate::memory::{HandoffContextBuilder, Message, MemoryStore, MessageWindow};
use crate::models::AgentKind;
use crate::orders::OrderStore;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// How a turn was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Dispatched { target: AgentKind, reply: String },
    Clarified { reply: String },
}

impl RouteOutcome {
    pub fn reply(&self) -> &str {
        match self {
            RouteOutcome::Dispatched { reply, .. } | RouteOutcome::Clarified { reply } => reply,
        }
    }

    pub fn target(&self) -> Option<AgentKind> {
        match self {
            RouteOutcome::Dispatched { target, .. } => Some(*target),
            RouteOutcome::Clarified { .. } => None,
        }
    }

    pub fn into_reply(self) -> String {
        match self {
            RouteOutcome::Dispatched { reply, .. } | RouteOutcome::Clarified { reply } => reply,
        }
    }
}

pub struct TriageAgent {
    memory: Arc<MemoryStore>,
    classifier: Arc<dyn IntentClassifier>,
    handoff: HandoffContextBuilder,
    handlers: HashMap<AgentKind, Arc<OrderAgent>>,
}

impl TriageAgent {
    /// Router with one handler per order operation, all sharing `model`
    /// and `orders`.
    pub fn new(
        memory: Arc<MemoryStore>,
        classifier: Arc<dyn IntentClassifier>,
        model: Arc<dyn ChatModel>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        let handlers = AgentKind::HANDLERS
            .into_iter()
            .map(|kind| {
                let handler = OrderAgent::new(kind, memory.clone(), model.clone(), orders.clone());
                (kind, Arc::new(handler))
            })
            .collect();

        Self {
            handoff: HandoffContextBuilder::new(memory.clone()),
            memory,
            classifier,
            handlers,
        }
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn handler(&self, kind: AgentKind) -> Option<&Arc<OrderAgent>> {
        self.handlers.get(&kind)
    }

    fn window(&self, session_id: Option<&str>) -> Arc<MessageWindow> {
        let kind = AgentKind::Triage.as_str();
        match session_id {
            Some(session_id) => self.memory.get_memory(session_id, kind),
            None => self.memory.get_agent_memory(kind),
        }
    }

    /// Route one user message.
    pub async fn process(&self, message: &str, session_id: Option<&str>) -> Result<RouteOutcome> {
        let window = self.window(session_id);
        window.append(Message::user(message));

        let intent = self.classifier.classify(&window.messages()).await?;

        let outcome = match intent {
            Intent::Clarify(reply) => {
                debug!(session_id = session_id.unwrap_or("-"), "No handler selected, clarifying");
                RouteOutcome::Clarified { reply }
            }
            Intent::Handoff(target) => {
                let handler = self
                    .handlers
                    .get(&target)
                    .ok_or_else(|| AgentError::Config(format!("No handler registered for {}", target)))?;

                let handoff = self
                    .handoff
                    .build(session_id, AgentKind::Triage.as_str(), message);

                info!(
                    session_id = session_id.unwrap_or("-"),
                    target = %target,
                    "Handing off to handler"
                );

                let reply = handler
                    .process(&handoff.message, handoff.session_id.as_deref())
                    .await?;

                RouteOutcome::Dispatched { target, reply }
            }
        };

        window.append(Message::assistant(outcome.reply()));
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::prompts::CLARIFICATION;
    use crate::classifier::{KeywordIntentClassifier, ModelIntentClassifier};
    use crate::config::MemoryConfig;
    use crate::llm::ScriptedModel;
    use crate::memory::Role;
    use crate::orders::InMemoryOrderStore;

    fn router(config: MemoryConfig, model: Arc<ScriptedModel>) -> TriageAgent {
        TriageAgent::new(
            Arc::new(MemoryStore::new(config)),
            Arc::new(KeywordIntentClassifier),
            model,
            Arc::new(InMemoryOrderStore::new()),
        )
    }

    #[tokio::test]
    async fn test_ambiguous_message_is_clarified_without_handoff() {
        let model = Arc::new(ScriptedModel::new("unused"));
        let triage = router(MemoryConfig::default(), model.clone());

        let outcome = triage.process("about my order...", Some("s1")).await.unwrap();

        assert_eq!(
            outcome,
            RouteOutcome::Clarified {
                reply: CLARIFICATION.to_string()
            }
        );
        assert!(model.calls().is_empty());
        assert_eq!(triage.memory().session_agent_count("s1"), 1);

        let window = triage.memory().get_memory("s1", "TRIAGE");
        assert_eq!(window.last().map(|m| m.role), Some(Role::Assistant));
    }

    #[tokio::test]
    async fn test_follow_up_carries_earlier_turns() {
        let model = Arc::new(ScriptedModel::new("noted").with_replies(["May I have your name?"]));
        let triage = router(MemoryConfig::default(), model.clone());

        let first = triage.process("buy 5 headsets", Some("s1")).await.unwrap();
        assert_eq!(first.target(), Some(AgentKind::CreateOrder));
        assert_eq!(first.reply(), "May I have your name?");

        triage.process("my name is Zhang", Some("s1")).await.unwrap();

        let handler_window = triage.memory().get_memory("s1", "CREATE_ORDER");
        let user_turns: Vec<String> = handler_window
            .messages()
            .into_iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.text)
            .collect();
        assert_eq!(
            user_turns,
            vec!["buy 5 headsets", "buy 5 headsets my name is Zhang"]
        );

        // router window keeps its own turns, separate from the handler's
        let triage_window = triage.memory().get_memory("s1", "TRIAGE");
        assert_eq!(triage_window.len(), 4);
        assert_eq!(
            triage_window.messages()[1],
            Message::assistant("May I have your name?")
        );
    }

    #[tokio::test]
    async fn test_cross_agent_context_disabled_forwards_current_message() {
        let config = MemoryConfig {
            enable_cross_agent_context: false,
            ..MemoryConfig::default()
        };
        let model = Arc::new(ScriptedModel::new("ok"));
        let triage = router(config, model);

        triage.process("buy 5 headsets", Some("s1")).await.unwrap();
        triage.process("my name is Zhang", Some("s1")).await.unwrap();

        let last_user = triage
            .memory()
            .get_memory("s1", "CREATE_ORDER")
            .messages()
            .into_iter()
            .filter(|m| m.role == Role::User)
            .last()
            .map(|m| m.text);
        assert_eq!(last_user.as_deref(), Some("my name is Zhang"));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let model = Arc::new(ScriptedModel::new("ok"));
        let triage = router(MemoryConfig::default(), model);

        triage.process("buy a phone", Some("a")).await.unwrap();
        triage.process("cancel order 1a2b3c4d", Some("b")).await.unwrap();

        assert!(triage
            .memory()
            .peek(&crate::memory::MemoryKey::session_agent("a", "CANCEL_ORDER"))
            .is_none());
        assert!(triage
            .memory()
            .peek(&crate::memory::MemoryKey::session_agent("b", "CREATE_ORDER"))
            .is_none());
        assert_eq!(
            triage.memory().get_memory("b", "CANCEL_ORDER").messages()[0].text,
            "cancel order 1a2b3c4d"
        );
    }

    #[tokio::test]
    async fn test_handler_failure_keeps_router_user_message() {
        let model = Arc::new(ScriptedModel::new("unused"));
        model.push_error(AgentError::Llm("model unavailable".to_string()));
        let triage = router(MemoryConfig::default(), model);

        let result = triage.process("buy a laptop", Some("s1")).await;
        assert!(result.is_err());

        let window = triage.memory().get_memory("s1", "TRIAGE");
        assert_eq!(window.messages(), vec![Message::user("buy a laptop")]);
    }

    #[tokio::test]
    async fn test_model_classifier_routes_on_handoff_reply() {
        let model = Arc::new(
            ScriptedModel::new("unused").with_replies(["HANDOFF: QUERY_ORDER", "No orders found."]),
        );
        let triage = TriageAgent::new(
            Arc::new(MemoryStore::new(MemoryConfig::default())),
            Arc::new(ModelIntentClassifier::new(model.clone())),
            model.clone(),
            Arc::new(InMemoryOrderStore::new()),
        );

        let outcome = triage.process("anything for Zhang?", Some("s1")).await.unwrap();

        assert_eq!(
            outcome,
            RouteOutcome::Dispatched {
                target: AgentKind::QueryOrder,
                reply: "No orders found.".to_string()
            }
        );
        assert_eq!(model.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_without_session_uses_agent_level_windows() {
        let model = Arc::new(ScriptedModel::new("ok"));
        let triage = router(MemoryConfig::default(), model);

        triage.process("buy a phone", None).await.unwrap();

        assert_eq!(triage.memory().active_session_count(), 0);
        assert_eq!(triage.memory().get_agent_memory("TRIAGE").len(), 2);
        assert_eq!(
            triage.memory().get_agent_memory("CREATE_ORDER").messages()[0].text,
            "buy a phone"
        );
    }
}
