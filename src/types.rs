//! Core type definitions for mentor matching

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Untyped candidate record exactly as it arrived from upstream
pub type RawCandidate = serde_json::Map<String, serde_json::Value>;

/// The party requesting a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seeker {
    #[serde(alias = "name", default)]
    pub display_name: String,
    #[serde(alias = "lookingFor", alias = "goal_text", default)]
    pub goal_text: String,
}

impl Seeker {
    pub fn new(display_name: impl Into<String>, goal_text: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            goal_text: goal_text.into(),
        }
    }
}

/// Candidate in canonical shape, produced by the normalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCandidate {
    pub id: String,
    pub name: String,
    pub title: String,
    pub company: String,
    pub bio: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub available: Option<bool>,
}

impl NormalizedCandidate {
    /// Back to an untyped record, keyed with the canonical field names
    pub fn to_raw(&self) -> RawCandidate {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => RawCandidate::new(),
        }
    }
}

/// What a scoring function says about one (seeker, candidate) pair
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Assessment {
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub components: Option<BTreeMap<String, f64>>,
}

impl Assessment {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            ..Default::default()
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }
}

/// A successfully scored candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub candidate: NormalizedCandidate,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<BTreeMap<String, f64>>,
}

impl ScoreResult {
    pub fn from_assessment(candidate: NormalizedCandidate, assessment: Assessment) -> Self {
        Self {
            candidate,
            score: assessment.score,
            explanation: assessment.explanation,
            components: assessment.components,
        }
    }
}

/// A candidate whose scoring call failed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFailure {
    pub candidate_id: String,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Completed,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub total_candidates: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub canceled: usize,
    pub total_elapsed_seconds: f64,
    pub avg_seconds_per_candidate: f64,
}

/// Fully accounted result of scoring one batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub status: BatchStatus,
    pub matches: Vec<ScoreResult>,
    pub stats: BatchStats,
    pub failures: Vec<CandidateFailure>,
    /// Ids that passed the prefilter and were evaluated, in submission order
    pub considered_candidate_ids: Vec<String>,
}

/// Progress snapshot emitted while a batch is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Inbound match request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    #[serde(alias = "mentee")]
    pub seeker: Option<Seeker>,
    #[serde(alias = "mentors", default)]
    pub candidates: Option<serde_json::Value>,
    #[serde(alias = "model", default)]
    pub model_selector: Option<String>,
}

/// Outbound match response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub status: BatchStatus,
    pub matches: Vec<ScoreResult>,
    pub stats: BatchStats,
    pub failures: Vec<CandidateFailure>,
    pub selected_candidate_ids: Vec<String>,
    pub pool_size: usize,
}
