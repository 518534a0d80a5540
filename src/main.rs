use std::sync::Arc;

use anyhow::Context;

use clarity_os::advisor::{AppState, PhaseController, ResponseSynthesizer, SessionScribe, router};
use clarity_os::config::AppConfig;
use clarity_os::document::FsDocumentWriter;
use clarity_os::extract::TextExtractor;
use clarity_os::llm::{LlmConfig, create_provider};
use clarity_os::mentors::{MentorCatalog, MentorScorer};
use clarity_os::store::{KnowledgeStore, LibSqlStore, ingest_catalog};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    eprintln!("🧭 ClarityOS v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Chat API: http://0.0.0.0:{}/chat/message", config.port);

    let llm = create_provider(&LlmConfig {
        base_url: config.base_url.clone(),
        api_key: config.api_key.clone(),
        model: config.model.clone(),
    })?;

    let catalog = Arc::new(MentorCatalog::load(&config.catalog_path).await);
    eprintln!("   Mentors: {}", catalog.len());

    // ── Knowledge store ─────────────────────────────────────────────────
    let store: Option<Arc<dyn KnowledgeStore>> = match &config.db_path {
        Some(path) => match LibSqlStore::new_local(path).await {
            Ok(store) => {
                let store: Arc<dyn KnowledgeStore> = Arc::new(store);
                ingest_catalog(store.as_ref(), &catalog).await;
                eprintln!("   Database: {}", path.display());
                Some(store)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Running without knowledge store");
                None
            }
        },
        None => None,
    };

    // ── Advisor ─────────────────────────────────────────────────────────
    let writer = FsDocumentWriter::new(config.documents_dir.clone());
    eprintln!("   Documents: {}", writer.dir().display());
    let controller = PhaseController::new(Arc::clone(&llm), config.advisor.clone());
    let synthesizer = ResponseSynthesizer::new(
        controller,
        MentorScorer::new(Arc::clone(&catalog)),
        Arc::new(writer),
    );
    let state = AppState {
        synthesizer: Arc::new(synthesizer),
        scribe: Arc::new(SessionScribe::new(llm, config.advisor.llm_timeout)),
        extractor: Arc::new(TextExtractor),
        store,
        uploads_dir: config.uploads_dir.clone(),
    };

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "ClarityOS server started");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
