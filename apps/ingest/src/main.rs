mod categories;
mod config;
mod db;
mod errors;
mod ingest;
mod llm_client;
mod models;
mod resumes;
mod routes;
mod state;
mod storage;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::ingest::pipeline::IngestPipeline;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::S3ObjectStore;
use crate::store::{CategoryStore, MemoryResumeStore, PgResumeStore, ResumeStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume ingest v{}", env!("CARGO_PKG_VERSION"));

    // Record store: PostgreSQL when configured, otherwise process-local
    let (store, categories): (Arc<dyn ResumeStore>, Arc<dyn CategoryStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = create_pool(url).await?;
                info!("PostgreSQL record store initialized");
                let pg = Arc::new(PgResumeStore::new(pool));
                (pg.clone() as Arc<dyn ResumeStore>, pg as Arc<dyn CategoryStore>)
            }
            None => {
                warn!("DATABASE_URL not set; records are kept in memory and lost on restart");
                let memory = Arc::new(MemoryResumeStore::new());
                (
                    memory.clone() as Arc<dyn ResumeStore>,
                    memory as Arc<dyn CategoryStore>,
                )
            }
        };

    // Initialize S3 / MinIO
    let storage = Arc::new(S3ObjectStore::from_config(&config).await);
    info!("S3 client initialized");

    // Initialize LLM client
    let llm = LlmClient::new(
        config.openai_api_key.clone(),
        &config.openai_base_url,
        config.openai_model.clone(),
        Duration::from_secs(config.llm_timeout_secs),
    )?;
    info!("LLM client initialized (model: {})", llm.model());

    let settings = config.pipeline_settings();
    info!(
        "Pipeline: {} retrieval attempt(s), {}s timeout, suggestions {}",
        settings.retrieval_attempts,
        settings.timeout.as_secs(),
        if settings.request_suggestions { "on" } else { "off" }
    );
    let pipeline = IngestPipeline::new(storage, Arc::new(llm), store.clone(), settings);

    // Build app state
    let state = AppState {
        pipeline: Arc::new(pipeline),
        store,
        categories,
        webhook_token: config.webhook_token.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
