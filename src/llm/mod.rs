//! Model collaborator
//!
//! Handlers hand the model a fixed preamble plus their full window and get
//! one reply back. Understanding and wording live entirely on the model
//! side.

use crate::memory::Message;
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

pub mod gemini;
pub use gemini::GeminiClient;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce the next reply for `messages` under `preamble`.
    async fn complete(&self, preamble: &str, messages: &[Message]) -> Result<String>;
}

/// Canned model for development & testing
///
/// Replies are served in order; once the queue is empty every call gets
/// the fallback reply. Each call's input is recorded.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
    fallback: String,
    calls: Mutex<Vec<ModelCall>>,
}

/// One recorded `complete` invocation
#[derive(Debug, Clone)]
pub struct ModelCall {
    pub preamble: String,
    pub messages: Vec<Message>,
}

impl ScriptedModel {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: fallback.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies
            .lock()
            .extend(replies.into_iter().map(|r| Ok(r.into())));
        self
    }

    /// Queue a failure for the next unanswered call.
    pub fn push_error(&self, error: crate::error::AgentError) {
        self.replies.lock().push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, preamble: &str, messages: &[Message]) -> Result<String> {
        self.calls.lock().push(ModelCall {
            preamble: preamble.to_string(),
            messages: messages.to_vec(),
        });

        match self.replies.lock().pop_front() {
            Some(reply) => reply,
            None => Ok(self.fallback.clone()),
        }
    }
}
