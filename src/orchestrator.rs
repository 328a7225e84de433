//! Bounded-concurrency batch scoring
//!
//! One future per candidate, all driven from the calling task and gated by a
//! per-batch [`ConcurrencyLimiter`]. Each future resolves to its own slot
//! outcome; counts are derived from the collected outcomes, so no state is
//! shared between in-flight calls.

use crate::assembler::{assemble, BatchLedger};
use crate::error::{Canceled, MatchError};
use crate::limiter::ConcurrencyLimiter;
use crate::scorer::{
    exact_match_assessment, is_exact_match, validate_assessment, CompatibilityScorer,
};
use crate::types::*;
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Emit a progress snapshot after this many completions
pub const PROGRESS_EVERY: usize = 5;

/// Whether a bio that restates the goal verbatim skips the scoring call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExactMatchPolicy {
    Shortcut,
    Disabled,
}

impl Default for ExactMatchPolicy {
    fn default() -> Self {
        Self::Shortcut
    }
}

/// Receives advisory progress snapshots
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: Progress);
}

/// Writes progress to the log
#[derive(Debug, Clone)]
pub struct LogProgress {
    request_id: String,
}

impl LogProgress {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }
}

impl ProgressSink for LogProgress {
    fn report(&self, p: Progress) {
        info!(
            "[{}] Progress: {}/{} ({} succeeded, {} failed)",
            self.request_id, p.processed, p.total, p.succeeded, p.failed
        );
    }
}

impl ProgressSink for tokio::sync::mpsc::UnboundedSender<Progress> {
    fn report(&self, progress: Progress) {
        // Receiver gone just means nobody is watching
        let _ = self.send(progress);
    }
}

enum SlotOutcome {
    Scored(ScoreResult),
    Failed(CandidateFailure),
    Canceled,
}

/// Drives one batch of scoring calls through a limiter
pub struct BatchScorer<'a> {
    scorer: &'a dyn CompatibilityScorer,
    policy: ExactMatchPolicy,
    model: Option<&'a str>,
    progress: Option<&'a dyn ProgressSink>,
    request_id: String,
}

impl<'a> BatchScorer<'a> {
    pub fn new(scorer: &'a dyn CompatibilityScorer) -> Self {
        Self {
            scorer,
            policy: ExactMatchPolicy::default(),
            model: None,
            progress: None,
            request_id: new_request_id(),
        }
    }

    pub fn with_policy(mut self, policy: ExactMatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_model(mut self, model: Option<&'a str>) -> Self {
        self.model = model;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Score every candidate and return the ranked outcome.
    ///
    /// Individual scoring failures are recorded, never returned. The only
    /// error is an empty candidate list. Cancel through
    /// [`ConcurrencyLimiter::cancel_handle`] to get a partial outcome with
    /// status `Canceled`.
    pub async fn score(
        &self,
        seeker: &Seeker,
        candidates: Vec<NormalizedCandidate>,
        limiter: ConcurrencyLimiter,
    ) -> Result<BatchOutcome, MatchError> {
        if candidates.is_empty() {
            return Err(MatchError::validation("no candidates to score"));
        }

        let start = Instant::now();
        let total = candidates.len();
        info!(
            "[{}] Scoring {} candidates for {} with {} (concurrency {})",
            self.request_id,
            total,
            seeker.display_name,
            self.scorer.name(),
            limiter.max_concurrency()
        );

        let mut ledger = BatchLedger::with_capacity(total);
        ledger
            .considered_candidate_ids
            .extend(candidates.iter().map(|c| c.id.clone()));

        let gate = &limiter;
        let mut pending: FuturesUnordered<_> = candidates
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| self.evaluate(index, seeker, candidate, gate))
            .collect();

        let mut progress = Progress {
            processed: 0,
            total,
            succeeded: 0,
            failed: 0,
        };

        while let Some((index, outcome)) = pending.next().await {
            let mut failed_now = false;
            match outcome {
                SlotOutcome::Scored(result) => {
                    ledger.slots[index] = Some(result);
                    progress.succeeded += 1;
                }
                SlotOutcome::Failed(failure) => {
                    ledger.failures.push((index, failure));
                    progress.failed += 1;
                    failed_now = true;
                }
                SlotOutcome::Canceled => {
                    ledger.canceled += 1;
                    continue;
                }
            }
            progress.processed += 1;

            if failed_now
                || progress.processed % PROGRESS_EVERY == 0
                || progress.processed == total
            {
                self.report(progress);
            }
        }

        if ledger.canceled > 0 {
            warn!(
                "[{}] Batch canceled: {} candidates abandoned",
                self.request_id, ledger.canceled
            );
            self.report(progress);
        }

        let outcome = assemble(ledger, start.elapsed());
        let stats = &outcome.stats;
        info!(
            "[{}] Summary: total {:.2}s, avg {:.2}s per candidate, processed {}/{}, \
             {} succeeded, {} failed, {} matches",
            self.request_id,
            stats.total_elapsed_seconds,
            stats.avg_seconds_per_candidate,
            stats.succeeded + stats.failed,
            stats.total_candidates,
            stats.succeeded,
            stats.failed,
            outcome.matches.len()
        );

        Ok(outcome)
    }

    fn report(&self, progress: Progress) {
        if let Some(sink) = self.progress {
            sink.report(progress);
        }
    }

    async fn evaluate(
        &self,
        index: usize,
        seeker: &Seeker,
        candidate: NormalizedCandidate,
        limiter: &ConcurrencyLimiter,
    ) -> (usize, SlotOutcome) {
        if self.policy == ExactMatchPolicy::Shortcut && is_exact_match(seeker, &candidate) {
            debug!(
                "[{}] Candidate #{} ({}) matches goal verbatim, skipping scorer",
                self.request_id,
                index + 1,
                candidate.name
            );
            let result = ScoreResult::from_assessment(candidate, exact_match_assessment());
            return (index, SlotOutcome::Scored(result));
        }

        let started = Instant::now();
        let scorer = self.scorer;
        let model = self.model;
        let target = &candidate;

        let attempt = limiter
            .run(move || async move {
                let assessment = scorer.score(seeker, target, model).await?;
                validate_assessment(&assessment)?;
                Ok::<_, anyhow::Error>(assessment)
            })
            .await;

        let outcome = match attempt {
            Ok(Ok(assessment)) => {
                info!(
                    "[{}] Candidate #{} ({}) scored {} in {:.2}s",
                    self.request_id,
                    index + 1,
                    candidate.name,
                    assessment.score,
                    started.elapsed().as_secs_f64()
                );
                SlotOutcome::Scored(ScoreResult::from_assessment(candidate, assessment))
            }
            Ok(Err(e)) => {
                warn!(
                    "[{}] Candidate #{} ({}) failed: {:#}",
                    self.request_id,
                    index + 1,
                    candidate.name,
                    e
                );
                SlotOutcome::Failed(CandidateFailure {
                    candidate_id: candidate.id,
                    name: candidate.name,
                    error: format!("{:#}", e),
                })
            }
            Err(Canceled) => SlotOutcome::Canceled,
        };

        (index, outcome)
    }
}

/// Score a batch with a fresh limiter of `concurrency` slots
pub async fn score_batch(
    seeker: &Seeker,
    candidates: Vec<NormalizedCandidate>,
    scorer: &dyn CompatibilityScorer,
    concurrency: usize,
) -> Result<BatchOutcome, MatchError> {
    let limiter = ConcurrencyLimiter::new(concurrency)?;
    BatchScorer::new(scorer).score(seeker, candidates, limiter).await
}

/// Short id used to correlate the log lines of one batch
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
