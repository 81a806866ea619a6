//! Intent classifier
//!
//! Decides which specialized handler should take a turn, or that the
//! router has to ask the user for clarification first:
//! - Model-backed: the triage preamble asks the model for `HANDOFF: <KIND>`
//! - Keyword-backed: offline scoring over the user's messages

use crate::agents::prompts::{CLARIFICATION, TRIAGE_PREAMBLE};
use crate::llm::ChatModel;
use crate::memory::{Message, Role};
use crate::models::AgentKind;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Forward to a specialized handler
    Handoff(AgentKind),
    /// No concrete target; reply to the user directly
    Clarify(String),
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classify the router's window, newest message last.
    async fn classify(&self, messages: &[Message]) -> Result<Intent>;
}

/// Asks the model collaborator to pick a handler.
pub struct ModelIntentClassifier {
    model: Arc<dyn ChatModel>,
}

impl ModelIntentClassifier {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl IntentClassifier for ModelIntentClassifier {
    async fn classify(&self, messages: &[Message]) -> Result<Intent> {
        let reply = self.model.complete(TRIAGE_PREAMBLE, messages).await?;
        Ok(parse_intent(&reply))
    }
}

/// Parse a triage reply. `HANDOFF: <KIND>` selects a handler, anything
/// else is a clarification for the user.
pub fn parse_intent(reply: &str) -> Intent {
    let trimmed = reply.trim().trim_matches('`').trim();
    if trimmed.is_empty() {
        return Intent::Clarify(CLARIFICATION.to_string());
    }

    let upper = trimmed.to_uppercase();
    let Some(rest) = upper.strip_prefix("HANDOFF") else {
        return Intent::Clarify(trimmed.to_string());
    };

    let label = rest
        .trim_start_matches(|c: char| c == ':' || c == '=' || c.is_whitespace())
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default();

    match AgentKind::parse(label) {
        Some(kind) if kind != AgentKind::Triage => Intent::Handoff(kind),
        _ => Intent::Clarify(CLARIFICATION.to_string()),
    }
}

// Static keyword lists, matched as lowercase substrings
const CREATE_KEYWORDS: &[&str] = &[
    "buy", "purchase", "new order", "place an order", "create", "order some", "get me",
];

const QUERY_KEYWORDS: &[&str] = &[
    "query", "check", "status", "look up", "lookup", "find", "show", "list", "my orders",
    "where is", "track",
];

const UPDATE_KEYWORDS: &[&str] = &[
    "change", "update", "modify", "adjust", "switch", "edit", "replace",
];

const CANCEL_KEYWORDS: &[&str] = &[
    "cancel", "refund", "don't want", "do not want", "void", "revoke", "call off",
];

/// Keyword scorer used when no model is configured.
pub struct KeywordIntentClassifier;

impl KeywordIntentClassifier {
    /// Classify one utterance. Highest keyword score wins; ties go to the
    /// earlier of create, query, update, cancel.
    pub fn classify_text(text: &str) -> Intent {
        let text = text.to_lowercase();

        let score = |keywords: &[&str]| keywords.iter().filter(|kw| text.contains(**kw)).count();

        let scored = [
            (AgentKind::CreateOrder, score(CREATE_KEYWORDS)),
            (AgentKind::QueryOrder, score(QUERY_KEYWORDS)),
            (AgentKind::UpdateOrder, score(UPDATE_KEYWORDS)),
            (AgentKind::CancelOrder, score(CANCEL_KEYWORDS)),
        ];

        let mut best: Option<(AgentKind, usize)> = None;
        for (kind, hits) in scored {
            if hits == 0 {
                continue;
            }
            match best {
                Some((_, top)) if top >= hits => {}
                _ => best = Some((kind, hits)),
            }
        }

        match best {
            Some((kind, _)) => Intent::Handoff(kind),
            None => Intent::Clarify(CLARIFICATION.to_string()),
        }
    }
}

#[async_trait]
impl IntentClassifier for KeywordIntentClassifier {
    /// Newest user message with a recognizable intent wins, so a follow-up
    /// like "my name is Zhang" stays with the request it completes.
    async fn classify(&self, messages: &[Message]) -> Result<Intent> {
        let intent = messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::User)
            .map(|m| Self::classify_text(&m.text))
            .find(|intent| matches!(intent, Intent::Handoff(_)))
            .unwrap_or_else(|| Intent::Clarify(CLARIFICATION.to_string()));

        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;

    #[test]
    fn test_keyword_intents() {
        let cases = vec![
            ("buy 5 headsets", AgentKind::CreateOrder),
            ("I'd like to purchase a laptop", AgentKind::CreateOrder),
            ("check order 1a2b3c4d", AgentKind::QueryOrder),
            ("show my orders", AgentKind::QueryOrder),
            ("change the quantity to 3", AgentKind::UpdateOrder),
            ("cancel my order", AgentKind::CancelOrder),
            ("I don't want it anymore, refund please", AgentKind::CancelOrder),
        ];

        for (text, expected) in cases {
            assert_eq!(
                KeywordIntentClassifier::classify_text(text),
                Intent::Handoff(expected),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_keyword_ties_follow_priority() {
        assert_eq!(
            KeywordIntentClassifier::classify_text("update it or cancel it"),
            Intent::Handoff(AgentKind::UpdateOrder)
        );
    }

    #[test]
    fn test_keyword_ambiguous_asks_for_clarification() {
        for text in ["about my order...", "my name is Zhang", ""] {
            assert_eq!(
                KeywordIntentClassifier::classify_text(text),
                Intent::Clarify(CLARIFICATION.to_string())
            );
        }
    }

    #[tokio::test]
    async fn test_keyword_classifier_reads_latest_user_turn() {
        let history = vec![
            Message::user("buy a phone"),
            Message::assistant("sure"),
            Message::user("actually cancel that"),
        ];
        let intent = KeywordIntentClassifier.classify(&history).await.unwrap();
        assert_eq!(intent, Intent::Handoff(AgentKind::CancelOrder));
    }

    #[tokio::test]
    async fn test_keyword_classifier_follow_up_keeps_intent() {
        let history = vec![
            Message::user("buy 5 headsets"),
            Message::assistant("May I have your name?"),
            Message::user("my name is Zhang"),
        ];
        let intent = KeywordIntentClassifier.classify(&history).await.unwrap();
        assert_eq!(intent, Intent::Handoff(AgentKind::CreateOrder));

        let intent = KeywordIntentClassifier
            .classify(&[Message::user("hello there")])
            .await
            .unwrap();
        assert_eq!(intent, Intent::Clarify(CLARIFICATION.to_string()));
    }

    #[test]
    fn test_parse_intent() {
        assert_eq!(
            parse_intent("HANDOFF: CREATE_ORDER"),
            Intent::Handoff(AgentKind::CreateOrder)
        );
        assert_eq!(
            parse_intent("  `handoff: query_order.`  "),
            Intent::Handoff(AgentKind::QueryOrder)
        );
        assert_eq!(
            parse_intent("HANDOFF CANCEL_ORDER"),
            Intent::Handoff(AgentKind::CancelOrder)
        );
        assert_eq!(
            parse_intent("HANDOFF: TRIAGE"),
            Intent::Clarify(CLARIFICATION.to_string())
        );
        assert_eq!(
            parse_intent("Do you want to create or query an order?"),
            Intent::Clarify("Do you want to create or query an order?".to_string())
        );
        assert_eq!(parse_intent("   "), Intent::Clarify(CLARIFICATION.to_string()));
    }

    #[tokio::test]
    async fn test_model_classifier_uses_triage_preamble() {
        let model = Arc::new(ScriptedModel::new("HANDOFF: UPDATE_ORDER"));
        let classifier = ModelIntentClassifier::new(model.clone());

        let intent = classifier
            .classify(&[Message::user("make it 3 units")])
            .await
            .unwrap();

        assert_eq!(intent, Intent::Handoff(AgentKind::UpdateOrder));
        assert_eq!(model.calls()[0].preamble, TRIAGE_PREAMBLE);
    }
}
