//! mentormatch - Mentor/mentee compatibility ranking
//!
//! Scores one seeker against a pool of candidates with:
//! - Declarative normalization of heterogeneous candidate records
//! - Optional embedding-similarity prefilter (fails open)
//! - Bounded-concurrency scoring with per-candidate failure isolation
//! - Deterministic ranking and full accounting of every candidate

pub mod types;
pub mod error;
pub mod config;
pub mod normalizer;
pub mod prefilter;
pub mod limiter;
pub mod scorer;
pub mod openai;
pub mod orchestrator;
pub mod assembler;
pub mod source;
pub mod engine;
pub mod server;

pub use types::*;
pub use error::{Canceled, MatchError};
pub use engine::{EngineSettings, MatchEngine, SharedMatchEngine};
pub use limiter::{CancelHandle, ConcurrencyLimiter};
pub use normalizer::Normalizer;
pub use orchestrator::{score_batch, BatchScorer, ExactMatchPolicy, LogProgress, ProgressSink};
pub use prefilter::{prefilter, Embedder, EmbeddingTable};
pub use scorer::{CompatibilityScorer, MockScorer};
pub use openai::{OpenAiEmbedder, OpenAiScorer, OpenAiSettings};
pub use source::{CandidateSource, StaticCandidateSource, SupabaseCandidateSource};
