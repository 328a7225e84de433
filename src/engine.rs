//! MatchEngine: request validation through ranked response

use crate::assembler::into_response;
use crate::error::MatchError;
use crate::limiter::{CancelHandle, ConcurrencyLimiter};
use crate::normalizer::Normalizer;
use crate::orchestrator::{new_request_id, BatchScorer, ExactMatchPolicy, LogProgress};
use crate::prefilter::{prefilter, Embedder, EmbeddingTable, DEFAULT_KEEP};
use crate::scorer::CompatibilityScorer;
use crate::source::CandidateSource;
use crate::types::*;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-batch knobs
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub concurrency: usize,
    pub prefilter_keep: usize,
    pub exact_match: ExactMatchPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            concurrency: 25,
            prefilter_keep: DEFAULT_KEEP,
            exact_match: ExactMatchPolicy::Shortcut,
        }
    }
}

/// Main matching engine (thread-safe via Arc)
pub struct MatchEngine {
    pub scorer: Box<dyn CompatibilityScorer>,
    pub embedder: Option<Box<dyn Embedder>>,
    pub embeddings: Arc<EmbeddingTable>,
    pub source: Option<Box<dyn CandidateSource>>,
    pub settings: EngineSettings,
}

pub type SharedMatchEngine = Arc<MatchEngine>;

impl MatchEngine {
    pub fn new(
        scorer: Box<dyn CompatibilityScorer>,
        embedder: Option<Box<dyn Embedder>>,
        embeddings: Arc<EmbeddingTable>,
        source: Option<Box<dyn CandidateSource>>,
        settings: EngineSettings,
    ) -> SharedMatchEngine {
        Arc::new(Self {
            scorer,
            embedder,
            embeddings,
            source,
            settings,
        })
    }

    /// Engine with only a scorer: no prefilter, no candidate store
    pub fn new_simple(
        scorer: Box<dyn CompatibilityScorer>,
        settings: EngineSettings,
    ) -> SharedMatchEngine {
        Self::new(scorer, None, Arc::new(EmbeddingTable::default()), None, settings)
    }

    /// Main entry point: score the request's candidates against its seeker
    pub async fn run_match(&self, req: MatchRequest) -> Result<MatchResponse, MatchError> {
        self.run_match_with(req, |_| {}).await
    }

    /// Like [`run_match`](Self::run_match), but hands the batch's cancel
    /// handle to `on_start` before scoring begins
    pub async fn run_match_with<F>(
        &self,
        req: MatchRequest,
        on_start: F,
    ) -> Result<MatchResponse, MatchError>
    where
        F: FnOnce(CancelHandle) + Send,
    {
        let request_id = new_request_id();

        // Step 0: Validate
        let seeker = req
            .seeker
            .ok_or_else(|| MatchError::validation("missing seeker"))?;
        if seeker.goal_text.trim().is_empty() {
            return Err(MatchError::validation("seeker goal text is required"));
        }
        let limiter = ConcurrencyLimiter::new(self.settings.concurrency)?;

        // Step 1: Resolve candidates, from the request or the configured store
        let raws = self.resolve_candidates(req.candidates).await?;
        if raws.is_empty() {
            return Err(MatchError::validation("candidate list is empty"));
        }

        info!(
            "[{}] Match request for {}: {} candidates, model={:?}",
            request_id,
            seeker.display_name,
            raws.len(),
            req.model_selector
        );

        // Step 2: Normalize
        let candidates = Normalizer::for_batch().normalize_all(&raws);
        drop(raws);
        let pool_size = candidates.len();

        // Step 3: Prefilter
        let candidates = prefilter(
            &seeker.goal_text,
            candidates,
            &self.embeddings,
            self.embedder.as_deref(),
            self.settings.prefilter_keep,
        )
        .await;
        if candidates.len() < pool_size {
            info!(
                "[{}] Prefilter kept {} of {} candidates",
                request_id,
                candidates.len(),
                pool_size
            );
        }

        // Step 4: Score
        on_start(limiter.cancel_handle());
        let progress = LogProgress::new(request_id.clone());
        let outcome = BatchScorer::new(self.scorer.as_ref())
            .with_request_id(request_id)
            .with_policy(self.settings.exact_match)
            .with_model(req.model_selector.as_deref())
            .with_progress(&progress)
            .score(&seeker, candidates, limiter)
            .await?;

        // Step 5: Assemble
        Ok(into_response(outcome, pool_size))
    }

    async fn resolve_candidates(
        &self,
        candidates: Option<Value>,
    ) -> Result<Vec<RawCandidate>, MatchError> {
        match candidates {
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(MatchError::validation(format!(
                        "candidate #{} is not an object: {}",
                        idx + 1,
                        other
                    ))),
                })
                .collect(),
            Some(Value::Null) | None => {
                let source = self.source.as_ref().ok_or_else(|| {
                    MatchError::validation(
                        "no candidates supplied and no candidate store configured",
                    )
                })?;
                debug!("No candidates in request, fetching from {}", source.name());
                source.fetch().await.map_err(MatchError::CandidateSource)
            }
            Some(_) => Err(MatchError::validation("candidates must be an array")),
        }
    }
}
