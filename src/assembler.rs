//! Turns per-slot scoring results into the ranked, accounted outcome

use crate::types::*;
use std::time::Duration;

/// Everything the orchestrator collected for one batch, indexed by
/// submission position
#[derive(Debug, Default)]
pub struct BatchLedger {
    pub slots: Vec<Option<ScoreResult>>,
    pub failures: Vec<(usize, CandidateFailure)>,
    pub canceled: usize,
    pub considered_candidate_ids: Vec<String>,
}

impl BatchLedger {
    pub fn with_capacity(total: usize) -> Self {
        Self {
            slots: vec![None; total],
            failures: Vec::new(),
            canceled: 0,
            considered_candidate_ids: Vec::with_capacity(total),
        }
    }
}

/// Ranks by score descending; equal scores keep submission order
pub fn rank(slots: Vec<Option<ScoreResult>>) -> Vec<ScoreResult> {
    let mut matches: Vec<ScoreResult> = slots.into_iter().flatten().collect();
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches
}

pub fn assemble(ledger: BatchLedger, elapsed: Duration) -> BatchOutcome {
    let BatchLedger {
        slots,
        mut failures,
        canceled,
        considered_candidate_ids,
    } = ledger;

    let total_candidates = slots.len();
    let matches = rank(slots);

    failures.sort_by_key(|(idx, _)| *idx);
    let failures: Vec<CandidateFailure> = failures.into_iter().map(|(_, f)| f).collect();

    let total_elapsed_seconds = elapsed.as_secs_f64();
    let avg_seconds_per_candidate = if total_candidates == 0 {
        0.0
    } else {
        total_elapsed_seconds / total_candidates as f64
    };

    let stats = BatchStats {
        total_candidates,
        succeeded: matches.len(),
        failed: failures.len(),
        canceled,
        total_elapsed_seconds,
        avg_seconds_per_candidate,
    };

    BatchOutcome {
        status: if canceled > 0 {
            BatchStatus::Canceled
        } else {
            BatchStatus::Completed
        },
        matches,
        stats,
        failures,
        considered_candidate_ids,
    }
}

/// Wire shape handed back to the caller
pub fn into_response(outcome: BatchOutcome, pool_size: usize) -> MatchResponse {
    MatchResponse {
        status: outcome.status,
        matches: outcome.matches,
        stats: outcome.stats,
        failures: outcome.failures,
        selected_candidate_ids: outcome.considered_candidate_ids,
        pool_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, score: f64) -> ScoreResult {
        ScoreResult {
            candidate: NormalizedCandidate {
                id: id.to_string(),
                name: id.to_string(),
                title: String::new(),
                company: String::new(),
                bio: String::new(),
                available: None,
            },
            score,
            explanation: None,
            components: None,
        }
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let slots = vec![
            Some(result("a", 50.0)),
            None,
            Some(result("b", 80.0)),
            Some(result("c", 50.0)),
            Some(result("d", 80.0)),
        ];
        let ranked: Vec<String> = rank(slots).into_iter().map(|r| r.candidate.id).collect();
        assert_eq!(ranked, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_assemble_accounts_for_every_slot() {
        let ledger = BatchLedger {
            slots: vec![Some(result("a", 10.0)), None, None, Some(result("d", 90.0))],
            failures: vec![(
                2,
                CandidateFailure {
                    candidate_id: "c".to_string(),
                    name: "c".to_string(),
                    error: "timeout".to_string(),
                },
            )],
            canceled: 1,
            considered_candidate_ids: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        };

        let outcome = assemble(ledger, Duration::from_secs(2));

        assert_eq!(outcome.status, BatchStatus::Canceled);
        assert_eq!(outcome.stats.total_candidates, 4);
        assert_eq!(outcome.stats.succeeded, 2);
        assert_eq!(outcome.stats.failed, 1);
        assert_eq!(outcome.stats.canceled, 1);
        assert!((outcome.stats.avg_seconds_per_candidate - 0.5).abs() < 1e-9);
        assert_eq!(outcome.matches[0].candidate.id, "d");

        let response = into_response(outcome, 10);
        assert_eq!(response.pool_size, 10);
        assert_eq!(response.selected_candidate_ids.len(), 4);
    }
}
