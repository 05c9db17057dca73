use std::sync::Arc;

use cheqledger::{
    assistant::{AiAssistant, AnthropicAssistant, MockAssistant, OpenAiAssistant},
    config::AppConfig,
    db::{Database, InMemoryDb, SupabaseDb},
    http::{self, AppState},
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;

    let db = build_database(&config).await;
    let assistant = build_assistant(&config, db.clone()).await;

    let app = http::router(AppState { assistant, db });
    let listener = TcpListener::bind(config.http_bind).await?;
    info!("CheqLedger HTTP API listening on {}", config.http_bind);

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .init();
}

async fn build_database(config: &AppConfig) -> Arc<dyn Database> {
    if config.supabase.is_valid() {
        let db = SupabaseDb::new();
        if db
            .initialize(&config.supabase.api_url, &config.supabase.api_key)
            .await
        {
            info!("Connected to Supabase backing store");
            return Arc::new(db);
        }
        warn!("Supabase probe failed; falling back to in-memory store");
    } else {
        warn!("SUPABASE_URL/SUPABASE_KEY not set; using in-memory store");
    }
    Arc::new(InMemoryDb::default())
}

async fn build_assistant(config: &AppConfig, db: Arc<dyn Database>) -> Arc<dyn AiAssistant> {
    let provider = config.ai_provider.to_lowercase();

    if matches!(provider.as_str(), "anthropic" | "auto") && config.anthropic.is_valid() {
        let assistant = AnthropicAssistant::new(config.anthropic.clone(), db.clone());
        if assistant
            .initialize(&config.anthropic.api_key, &config.anthropic.model)
            .await
        {
            return Arc::new(assistant);
        }
        warn!("Anthropic assistant failed to initialize");
    }

    if matches!(provider.as_str(), "openai" | "auto") && config.openai.is_valid() {
        let assistant = OpenAiAssistant::new(config.openai.clone(), db);
        if assistant
            .initialize(&config.openai.api_key, &config.openai.model)
            .await
        {
            return Arc::new(assistant);
        }
        warn!("OpenAI assistant failed to initialize");
    }

    warn!("no AI provider configured; using mock assistant");
    let mock = MockAssistant::default();
    mock.initialize("", "").await;
    Arc::new(mock)
}
