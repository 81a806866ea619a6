use order_agent::{
    api::start_server,
    classifier::{IntentClassifier, KeywordIntentClassifier, ModelIntentClassifier},
    config::AppConfig,
    llm::{ChatModel, GeminiClient},
    memory::{MemoryStore, Reaper},
    orders::{InMemoryOrderStore, OrderStore},
    TriageAgent,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    info!("Order Agent Assistant - API Server");
    info!("Port: {}", config.port);

    let model: Arc<dyn ChatModel> = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone().unwrap_or_default(),
        config.gemini_model.clone(),
    )?);

    let classifier: Arc<dyn IntentClassifier> = if config.gemini_api_key.is_some() {
        info!(model = %config.gemini_model, "Using model intent classifier");
        Arc::new(ModelIntentClassifier::new(model.clone()))
    } else {
        warn!("GEMINI_API_KEY not set: keyword routing only, handler replies will fail");
        Arc::new(KeywordIntentClassifier)
    };

    // Create components
    let memory = Arc::new(MemoryStore::new(config.memory.clone()));
    let orders: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
    let triage = Arc::new(TriageAgent::new(memory.clone(), classifier, model, orders));

    let shutdown = CancellationToken::new();
    let reaper = Reaper::new(memory).spawn(shutdown.clone());

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
            shutdown.cancel();
        });
    }

    info!("Router initialized, starting API server");

    let served = start_server(triage, config.port, shutdown.clone()).await;

    shutdown.cancel();
    reaper.await?;

    served
}
