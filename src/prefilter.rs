//! Embedding-similarity prefilter applied before the expensive scoring stage

use crate::types::NormalizedCandidate;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Default pool size handed to the scorer after prefiltering
pub const DEFAULT_KEEP: usize = 200;

/// Rank given to candidates with no stored vector
const MISSING_VECTOR_SIMILARITY: f32 = -1.0;

/// Turns free text into a vector in the same space as the stored table
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Candidate id to embedding vector. Loaded once, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingTable {
    vectors: HashMap<String, Vec<f32>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TableFile {
    Map(HashMap<String, Vec<f32>>),
    Records(Vec<TableRecord>),
}

#[derive(Deserialize)]
struct TableRecord {
    id: serde_json::Value,
    embedding: Vec<f32>,
}

impl EmbeddingTable {
    pub fn new(vectors: HashMap<String, Vec<f32>>) -> Self {
        Self { vectors }
    }

    /// Accepts either `{"id": [..]}` or `[{"id": .., "embedding": [..]}]`
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: TableFile =
            serde_json::from_str(json).context("Failed to parse embedding table")?;

        let vectors = match parsed {
            TableFile::Map(map) => map,
            TableFile::Records(records) => records
                .into_iter()
                .map(|r| {
                    let id = match r.id {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (id, r.embedding)
                })
                .collect(),
        };

        Ok(Self { vectors })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read embedding table {}", path.display()))?;
        let table = Self::from_json(&json)?;
        info!("Loaded {} candidate embeddings from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.vectors.get(id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Cosine similarity. `None` for zero vectors or mismatched dimensions.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        None
    } else {
        Some(dot / (norm_a * norm_b))
    }
}

/// Keep the `keep` candidates most similar to the goal text.
///
/// Fails open: an empty table, an empty goal, a missing embedder or an
/// embedding error all return the input unchanged.
pub async fn prefilter(
    goal_text: &str,
    candidates: Vec<NormalizedCandidate>,
    table: &EmbeddingTable,
    embedder: Option<&dyn Embedder>,
    keep: usize,
) -> Vec<NormalizedCandidate> {
    let embedder = match embedder {
        Some(e) if !table.is_empty() && !goal_text.trim().is_empty() => e,
        _ => return candidates,
    };

    let goal_vector = match embedder.embed(goal_text).await {
        Ok(v) => v,
        Err(e) => {
            warn!("Goal embedding failed, scoring unfiltered pool: {:#}", e);
            return candidates;
        }
    };

    let pool = candidates.len();
    let mut ranked: Vec<(f32, NormalizedCandidate)> = candidates
        .into_iter()
        .map(|c| {
            let sim = match table.get(&c.id) {
                Some(v) => cosine_similarity(&goal_vector, v).unwrap_or(f32::NEG_INFINITY),
                None => MISSING_VECTOR_SIMILARITY,
            };
            (sim, c)
        })
        .collect();

    // Stable, so equal similarities keep input order
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    ranked.truncate(keep);

    debug!("Prefilter kept {} of {} candidates", ranked.len(), pool);

    ranked.into_iter().map(|(_, c)| c).collect()
}
