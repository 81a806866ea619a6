//! Gemini API client
//!
//! Sends a handler's whole window as a multi-turn `generateContent` request
//! with the handler preamble as the system instruction.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::AgentError;
use crate::llm::ChatModel;
use crate::memory::{Message, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent?key={}", BASE_URL, self.model, self.api_key)
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn complete(&self, preamble: &str, messages: &[Message]) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(AgentError::Llm("GEMINI_API_KEY not configured".to_string()));
        }

        let request = build_request(preamble, messages);

        debug!(model = %self.model, turns = request.contents.len(), "Calling Gemini API");

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AgentError::Llm(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response ({}): {}", status, error_text);
            return Err(AgentError::Llm(format!("Gemini API error {}: {}", status, error_text)));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AgentError::Llm(format!("Gemini parse error: {}", e))
        })?;

        extract_text(gemini_response)
    }
}

fn build_request(preamble: &str, messages: &[Message]) -> GeminiRequest {
    GeminiRequest {
        contents: messages.iter().map(to_content).collect(),
        generation_config: GenerationConfig {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 1024,
        },
        system_instruction: SystemInstruction {
            parts: vec![Part {
                text: preamble.to_string(),
            }],
        },
    }
}

/// Gemini only knows `user` and `model` turns.
fn to_content(message: &Message) -> Content {
    let (role, text) = match message.role {
        Role::User => ("user", message.text.clone()),
        Role::Assistant => ("model", message.text.clone()),
        Role::System => ("user", format!("[system] {}", message.text)),
        Role::ToolResult => ("user", format!("[tool result] {}", message.text)),
    };

    Content {
        role: Some(role.to_string()),
        parts: vec![Part { text }],
    }
}

fn extract_text(response: GeminiResponse) -> crate::Result<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::Llm("No response from Gemini API".to_string()))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        debug!(finish_reason = reason, "Gemini response received");
    }

    let text = candidate
        .content
        .parts
        .into_iter()
        .map(|p| p.text)
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(AgentError::Llm("Empty response from Gemini".to_string()));
    }

    Ok(text)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_maps_roles() {
        let request = build_request(
            "You route orders",
            &[
                Message::user("buy 5 headsets"),
                Message::assistant("your name?"),
                Message::tool_result("order 1a2b3c4d created"),
            ],
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(
            json["contents"][2]["parts"][0]["text"],
            "[tool result] order 1a2b3c4d created"
        );
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "You route orders");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello "},{"text":"Zhang"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();

        assert_eq!(extract_text(response).unwrap(), "Hello Zhang");
    }

    #[test]
    fn test_extract_text_empty_is_error() {
        let response: GeminiResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(extract_text(response).is_err());
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = GeminiClient::new(String::new(), "gemini-2.0-flash".to_string()).unwrap();
        let result = client.complete("p", &[Message::user("hi")]).await;

        let error_msg = result.unwrap_err().to_string();
        assert!(error_msg.contains("GEMINI_API_KEY"));
    }
}
