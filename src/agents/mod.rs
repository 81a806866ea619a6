//! Specialized order handlers
//!
//! Each handler owns a window per session (or one agent-level window when
//! called without a session) and runs a short tool loop against the model:
//! USER → MODEL → TOOL? → MODEL → ... → REPLY

pub mod prompts;
pub mod triage;

pub use triage::{RouteOutcome, TriageAgent};

use crate::llm::ChatModel;
use crate::memory::{Message, MemoryStore, MessageWindow};
use crate::models::AgentKind;
use crate::orders::OrderStore;
use crate::tools::{parse_tool_call, render_tool_result, ToolRegistry};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tool calls a handler may make for one user turn
pub const MAX_TOOL_ROUNDS: usize = 4;

pub struct OrderAgent {
    kind: AgentKind,
    memory: Arc<MemoryStore>,
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    preamble: String,
}

impl OrderAgent {
    pub fn new(
        kind: AgentKind,
        memory: Arc<MemoryStore>,
        model: Arc<dyn ChatModel>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        let tools = ToolRegistry::for_kind(kind, orders);
        let preamble = prompts::handler_preamble(kind, &tools.catalogue());

        Self {
            kind,
            memory,
            model,
            tools,
            preamble,
        }
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Looked up on every turn so eviction is always observed.
    fn window(&self, session_id: Option<&str>) -> Arc<MessageWindow> {
        match session_id {
            Some(session_id) => self.memory.get_memory(session_id, self.kind.as_str()),
            None => self.memory.get_agent_memory(self.kind.as_str()),
        }
    }

    /// Handle one user turn and return the reply.
    ///
    /// The user message stays in the window even when the model call fails.
    pub async fn process(&self, message: &str, session_id: Option<&str>) -> Result<String> {
        let window = self.window(session_id);
        window.append(Message::user(message));

        info!(
            agent = %self.kind,
            session_id = session_id.unwrap_or("-"),
            history = window.len(),
            "Handler processing message"
        );

        let mut last_tool_result = None;

        for round in 1..=MAX_TOOL_ROUNDS {
            let reply = self.model.complete(&self.preamble, &window.messages()).await?;

            let Some(call) = parse_tool_call(&reply) else {
                window.append(Message::assistant(reply.clone()));
                return Ok(reply);
            };

            debug!(agent = %self.kind, tool = %call.tool, round, "Model requested tool");
            window.append(Message::assistant(reply));

            let result = self.tools.execute(&call).await;
            if let Err(e) = &result {
                warn!(agent = %self.kind, tool = %call.tool, "Tool failed: {}", e);
            }

            let rendered = render_tool_result(&call.tool, &result);
            window.append(Message::tool_result(rendered.clone()));
            last_tool_result = Some(rendered);
        }

        warn!(
            agent = %self.kind,
            max_rounds = MAX_TOOL_ROUNDS,
            "Tool round limit reached, returning last tool result"
        );

        let reply = last_tool_result.unwrap_or_default();
        window.append(Message::assistant(reply.clone()));
        Ok(reply)
    }
}
