//! Mentor matching HTTP server binary

use mentormatch::config::Config;
use mentormatch::{
    server, CandidateSource, CompatibilityScorer, Embedder, EmbeddingTable, EngineSettings,
    MatchEngine, MockScorer, OpenAiEmbedder, OpenAiScorer, OpenAiSettings, StaticCandidateSource,
    SupabaseCandidateSource,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    info!("mentormatch v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    config.validate()?;

    // Check for --mock flag
    let use_mock = std::env::args().any(|arg| arg == "--mock");

    let openai = config.openai_api_key.as_ref().map(|key| OpenAiSettings {
        api_key: key.clone(),
        base_url: config.openai_base_url.clone(),
        timeout: config.request_timeout,
    });

    let scorer: Box<dyn CompatibilityScorer> = match (&openai, use_mock) {
        (Some(settings), false) => {
            info!("Scoring with {} via {}", config.scoring_model, config.openai_base_url);
            Box::new(OpenAiScorer::new(settings, config.scoring_model.clone())?)
        }
        (None, false) => {
            anyhow::bail!("OPENAI_API_KEY is not set (use --mock to run without a scoring model)");
        }
        (_, true) => {
            info!("Mode: MOCK keyword-overlap scorer");
            Box::new(MockScorer::new())
        }
    };

    // Prefilter needs both the table and an embedder
    let (embedder, embeddings): (Option<Box<dyn Embedder>>, EmbeddingTable) =
        match (&config.embeddings_path, &openai) {
            (Some(path), Some(settings)) if !use_mock => {
                let table = EmbeddingTable::load(path)?;
                let embedder: Box<dyn Embedder> =
                    Box::new(OpenAiEmbedder::new(settings, config.embedding_model.clone())?);
                (Some(embedder), table)
            }
            (Some(path), _) => {
                warn!("Embeddings at {} ignored: no embedding service available", path.display());
                (None, EmbeddingTable::default())
            }
            _ => (None, EmbeddingTable::default()),
        };

    let source: Box<dyn CandidateSource> = match (&config.supabase_url, &config.supabase_key) {
        (Some(url), Some(key)) => {
            info!("Candidate store: Supabase table '{}'", config.candidate_table);
            Box::new(SupabaseCandidateSource::new(
                url.clone(),
                config.candidate_table.clone(),
                key.clone(),
            ))
        }
        _ => {
            info!("Candidate store not configured, using sample candidates");
            Box::new(StaticCandidateSource::sample())
        }
    };

    let engine = MatchEngine::new(
        scorer,
        embedder,
        Arc::new(embeddings),
        Some(source),
        EngineSettings {
            concurrency: config.concurrency,
            prefilter_keep: config.prefilter_keep,
            exact_match: config.exact_match,
        },
    );

    info!("Match engine initialized (concurrency {})", config.concurrency);

    server::run_server(engine, SocketAddr::new(config.bind_addr, config.port)).await?;

    Ok(())
}
