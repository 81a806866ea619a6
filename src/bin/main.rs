use order_agent::{
    classifier::{IntentClassifier, KeywordIntentClassifier, ModelIntentClassifier},
    config::AppConfig,
    llm::{ChatModel, GeminiClient},
    memory::{MemoryStore, Reaper},
    orders::{InMemoryOrderStore, OrderStore},
    RouteOutcome, TriageAgent,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Logs go to stderr so they do not interleave with the conversation
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env()?;

    let model: Arc<dyn ChatModel> = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone().unwrap_or_default(),
        config.gemini_model.clone(),
    )?);

    let classifier: Arc<dyn IntentClassifier> = match config.gemini_api_key {
        Some(_) => Arc::new(ModelIntentClassifier::new(model.clone())),
        None => {
            warn!("GEMINI_API_KEY not set: keyword routing only, handler replies will fail");
            Arc::new(KeywordIntentClassifier)
        }
    };

    let memory = Arc::new(MemoryStore::new(config.memory.clone()));
    let orders: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
    let triage = TriageAgent::new(memory.clone(), classifier, model, orders);

    let shutdown = CancellationToken::new();
    let reaper = Reaper::new(memory).spawn(shutdown.clone());

    let session_id = Uuid::new_v4().to_string();
    info!(session_id = %session_id, "Assistant session started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Order assistant ready. Type 'exit' to quit, 'clear' to start over.\n")
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "exit" | "quit" => break,
            "clear" => {
                triage.memory().clear_session(&session_id);
                stdout.write_all(b"(conversation cleared)\n").await?;
                continue;
            }
            _ => {}
        }

        let text = match triage.process(line, Some(&session_id)).await {
            Ok(RouteOutcome::Dispatched { target, reply }) => format!("[{}] {}\n", target, reply),
            Ok(RouteOutcome::Clarified { reply }) => format!("{}\n", reply),
            Err(e) => format!("Error processing message: {}\n", e),
        };
        stdout.write_all(text.as_bytes()).await?;
    }

    shutdown.cancel();
    reaper.await?;

    Ok(())
}
