//! Scoring functions for (seeker, candidate) pairs

use crate::types::*;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;

pub const MAX_SCORE: f64 = 100.0;

/// Sub-scores may drift from the total by this much before the payload is rejected
const COMPONENT_SUM_TOLERANCE: f64 = 1.0;

/// Trait for pluggable compatibility judges
#[async_trait]
pub trait CompatibilityScorer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rate one candidate for the seeker. `model` overrides the scorer's
    /// default model when the scorer has one.
    async fn score(
        &self,
        seeker: &Seeker,
        candidate: &NormalizedCandidate,
        model: Option<&str>,
    ) -> Result<Assessment>;
}

/// Reject assessments a caller could not sensibly rank
pub fn validate_assessment(assessment: &Assessment) -> Result<()> {
    let score = assessment.score;
    if !score.is_finite() {
        bail!("score is not a finite number");
    }
    if !(0.0..=MAX_SCORE).contains(&score) {
        bail!("score {} outside 0-100", score);
    }

    if let Some(ref components) = assessment.components {
        if components.values().any(|v| !v.is_finite()) {
            bail!("component score is not a finite number");
        }
        let sum: f64 = components.values().sum();
        if !components.is_empty() && (sum - score).abs() > COMPONENT_SUM_TOLERANCE {
            bail!("components sum to {} but score is {}", sum, score);
        }
    }

    Ok(())
}

/// Trimmed, case-folded text used for the exact-match comparison
pub fn fold_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// True when the candidate bio restates the seeker goal verbatim
pub fn is_exact_match(seeker: &Seeker, candidate: &NormalizedCandidate) -> bool {
    let goal = fold_text(&seeker.goal_text);
    !goal.is_empty() && goal == fold_text(&candidate.bio)
}

pub fn exact_match_assessment() -> Assessment {
    Assessment::new(MAX_SCORE)
        .with_explanation("Candidate bio matches the stated goal exactly")
}

/// Offline scorer ranking by word overlap between goal and profile.
///
/// Deterministic and network free; used for `--mock` runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MockScorer;

impl MockScorer {
    pub fn new() -> Self {
        Self
    }

    fn words(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .map(|s| s.to_lowercase())
            .filter(|s| s.chars().count() > 3)
            .collect()
    }
}

#[async_trait]
impl CompatibilityScorer for MockScorer {
    fn name(&self) -> &'static str {
        "mock_overlap"
    }

    async fn score(
        &self,
        seeker: &Seeker,
        candidate: &NormalizedCandidate,
        _model: Option<&str>,
    ) -> Result<Assessment> {
        let goal = Self::words(&seeker.goal_text);
        if goal.is_empty() {
            return Ok(Assessment::new(0.0).with_explanation("No goal keywords"));
        }

        let profile = Self::words(&format!(
            "{} {} {}",
            candidate.title, candidate.company, candidate.bio
        ));
        let shared: Vec<&String> = goal.intersection(&profile).collect();
        let score = (shared.len() as f64 / goal.len() as f64 * MAX_SCORE).round();

        let mut shared: Vec<&str> = shared.into_iter().map(String::as_str).collect();
        shared.sort_unstable();
        let explanation = if shared.is_empty() {
            "No shared keywords".to_string()
        } else {
            format!("Shared keywords: {}", shared.join(", "))
        };

        Ok(Assessment::new(score).with_explanation(explanation))
    }
}
