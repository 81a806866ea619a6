//! REST API server for the order assistant
//!
//! Thin HTTP surface over the router. Every chat turn runs under a
//! session id; a new one is generated when the client does not send one.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::agents::TriageAgent;
use crate::memory::{is_valid_key_component, KEY_SEPARATOR};
use crate::models::AgentKind;

pub const SERVICE_NAME: &str = "Order Agent Chat Service";

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================
// Request / Response Models
// =============================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub session_id: Option<String>,
    /// Handler that produced the reply; absent for clarifications
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub handled_by: Option<AgentKind>,
    pub timestamp: i64,
}

impl ChatResponse {
    pub fn reply(response: String, session_id: String, handled_by: Option<AgentKind>) -> Self {
        Self {
            success: true,
            response: Some(response),
            message: None,
            session_id: Some(session_id),
            handled_by,
            timestamp: now_millis(),
        }
    }

    pub fn error(message: String, session_id: Option<String>) -> Self {
        Self {
            success: false,
            response: None,
            message: Some(message),
            session_id,
            handled_by: None,
            timestamp: now_millis(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    pub status: String,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearSessionResponse {
    pub success: bool,
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: i64,
}

// =============================
// API State
// =============================

#[derive(Clone)]
pub struct ApiState {
    pub triage: Arc<TriageAgent>,
}

// =============================
// Health Endpoint
// =============================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
        service: SERVICE_NAME.to_string(),
        timestamp: now_millis(),
    })
}

// =============================
// Chat Endpoints
// =============================

async fn send_message(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ChatResponse>) {
    let session_id = Uuid::new_v4().to_string();
    process_message(&state, session_id, req).await
}

async fn send_message_with_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ChatResponse>) {
    process_message(&state, session_id, req).await
}

async fn process_message(
    state: &ApiState,
    session_id: String,
    req: ChatRequest,
) -> (StatusCode, Json<ChatResponse>) {
    let message = req.message.unwrap_or_default();

    if message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ChatResponse::error("Message cannot be empty".into(), None)),
        );
    }

    if !is_valid_key_component(&session_id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ChatResponse::error(
                format!("Session id must not contain '{}'", KEY_SEPARATOR),
                None,
            )),
        );
    }

    info!(session_id = %session_id, "Received chat message");

    match state.triage.process(&message, Some(&session_id)).await {
        Ok(outcome) => {
            let handled_by = outcome.target();
            (
                StatusCode::OK,
                Json(ChatResponse::reply(outcome.into_reply(), session_id, handled_by)),
            )
        }
        Err(e) => {
            error!(session_id = %session_id, "Message processing failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse::error(
                    format!("Error processing message: {}", e),
                    Some(session_id),
                )),
            )
        }
    }
}

// =============================
// Session Endpoints
// =============================

/// Always reports `active`; expiry is the reaper's business.
async fn session_status(Path(session_id): Path<String>) -> Json<SessionStatus> {
    Json(SessionStatus {
        session_id,
        status: "active".to_string(),
        timestamp: now_millis(),
    })
}

async fn clear_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Json<ClearSessionResponse> {
    let existed = state.triage.memory().clear_session(&session_id);
    info!(session_id = %session_id, existed, "Session cleared via API");

    Json(ClearSessionResponse {
        success: true,
        message: "Session cleared successfully".to_string(),
        session_id,
    })
}

// =============================
// Router
// =============================

pub fn create_router(triage: Arc<TriageAgent>) -> Router {
    let state = ApiState { triage };

    Router::new()
        .route("/api/chat/health", get(health))
        .route("/api/chat/message", post(send_message))
        .route("/api/chat/message/:session_id", post(send_message_with_session))
        .route("/api/chat/session/:session_id/status", get(session_status))
        .route("/api/chat/session/:session_id", delete(clear_session))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// =============================
// Server Startup
// =============================

/// Serve until `shutdown` is cancelled.
pub async fn start_server(
    triage: Arc<TriageAgent>,
    port: u16,
    shutdown: CancellationToken,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(triage);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("API Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::KeywordIntentClassifier;
    use crate::config::MemoryConfig;
    use crate::error::AgentError;
    use crate::llm::ScriptedModel;
    use crate::memory::{MemoryStore, Role};
    use crate::orders::InMemoryOrderStore;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn triage(model: Arc<ScriptedModel>) -> Arc<TriageAgent> {
        Arc::new(TriageAgent::new(
            Arc::new(MemoryStore::new(MemoryConfig::default())),
            Arc::new(KeywordIntentClassifier),
            model,
            Arc::new(InMemoryOrderStore::new()),
        ))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(triage(Arc::new(ScriptedModel::new("ok"))));
        let request = Request::builder()
            .uri("/api/chat/health")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "UP");
        assert_eq!(body["service"], SERVICE_NAME);
        assert!(body["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_conversation_persists_across_calls() {
        let model = Arc::new(
            ScriptedModel::new("Thanks Zhang, what unit price?").with_replies(["May I have your name?"]),
        );
        let triage = triage(model);
        let app = create_router(triage.clone());

        let (status, first) = send(
            app.clone(),
            post_json("/api/chat/message", r#"{"message":"buy 5 headsets"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["success"], true);
        assert_eq!(first["response"], "May I have your name?");
        assert_eq!(first["handledBy"], "CREATE_ORDER");
        let session_id = first["sessionId"].as_str().unwrap().to_string();

        let (status, second) = send(
            app,
            post_json(
                &format!("/api/chat/message/{}", session_id),
                r#"{"message":"my name is Zhang"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["sessionId"], session_id.as_str());

        let window = triage.memory().get_memory(&session_id, "CREATE_ORDER");
        let user_text: Vec<String> = window
            .messages()
            .into_iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.text)
            .collect();
        assert!(user_text.iter().any(|t| t == "buy 5 headsets"));
        assert!(user_text.iter().any(|t| t.contains("my name is Zhang")));
        assert_eq!(window.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let triage = triage(Arc::new(ScriptedModel::new("ok")));
        let app = create_router(triage.clone());

        for body in [r#"{"message":"   "}"#, r#"{}"#] {
            let (status, json) = send(app.clone(), post_json("/api/chat/message/s1", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["success"], false);
            assert_eq!(json["message"], "Message cannot be empty");
        }

        assert!(!triage.memory().session_exists("s1"));
    }

    #[tokio::test]
    async fn test_session_id_with_separator_rejected() {
        let triage = triage(Arc::new(ScriptedModel::new("ok")));
        let app = create_router(triage.clone());

        let (status, json) = send(
            app,
            post_json("/api/chat/message/a:b", r#"{"message":"buy a phone"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(triage.memory().active_session_count(), 0);
    }

    #[tokio::test]
    async fn test_processing_failure_is_500() {
        let model = Arc::new(ScriptedModel::new("unused"));
        model.push_error(AgentError::Llm("quota exceeded".to_string()));
        let app = create_router(triage(model));

        let (status, json) = send(
            app,
            post_json("/api/chat/message/s1", r#"{"message":"buy a phone"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["success"], false);
        assert_eq!(json["sessionId"], "s1");
        assert!(json["message"]
            .as_str()
            .unwrap()
            .starts_with("Error processing message"));
    }

    #[tokio::test]
    async fn test_session_status_is_always_active() {
        let app = create_router(triage(Arc::new(ScriptedModel::new("ok"))));
        let request = Request::builder()
            .uri("/api/chat/session/unknown/status")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessionId"], "unknown");
        assert_eq!(body["status"], "active");
    }

    #[tokio::test]
    async fn test_delete_clears_session_and_is_idempotent() {
        let triage = triage(Arc::new(ScriptedModel::new("ok")));
        let app = create_router(triage.clone());

        send(
            app.clone(),
            post_json("/api/chat/message/s1", r#"{"message":"buy a phone"}"#),
        )
        .await;
        assert!(triage.memory().session_exists("s1"));

        for _ in 0..2 {
            let request = Request::builder()
                .method("DELETE")
                .uri("/api/chat/session/s1")
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(app.clone(), request).await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert_eq!(body["sessionId"], "s1");
        }

        assert!(!triage.memory().session_exists("s1"));
    }
}
