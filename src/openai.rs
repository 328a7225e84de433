//! OpenAI-compatible HTTP clients for scoring and embeddings

use crate::prefilter::Embedder;
use crate::scorer::CompatibilityScorer;
use crate::types::{Assessment, NormalizedCandidate, Seeker};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Characters of candidate bio included in the prompt
const BIO_PROMPT_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = "You are an expert judge of mentor-mentee compatibility. \
Reply in JSON: {\"score\": N, \"reason\": \"...\", \"components\": {\"name\": N, ...}}";

/// Connection settings shared by the scorer and the embedder
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

fn build_client(settings: &OpenAiSettings) -> Result<reqwest::Client> {
    anyhow::ensure!(!settings.api_key.trim().is_empty(), "missing OpenAI API key");

    let mut headers = HeaderMap::new();
    let auth = format!("Bearer {}", settings.api_key.trim());
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&auth).context("invalid OpenAI API key")?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .timeout(settings.timeout)
        .default_headers(headers)
        .build()
        .context("failed to build OpenAI HTTP client")
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// JSON body the model is asked to return
#[derive(Debug, Deserialize)]
struct ScorePayload {
    score: f64,
    #[serde(default, alias = "explanation")]
    reason: Option<String>,
    #[serde(default)]
    components: Option<BTreeMap<String, f64>>,
}

/// Scores candidates with a chat-completions model
pub struct OpenAiScorer {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OpenAiScorer {
    pub fn new(settings: &OpenAiSettings, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(settings)?,
            url: endpoint(&settings.base_url, "chat/completions"),
            model: model.into(),
        })
    }

    fn build_prompt(seeker: &Seeker, candidate: &NormalizedCandidate) -> String {
        let bio: String = candidate.bio.chars().take(BIO_PROMPT_CHARS).collect();
        format!(
            "MENTEE: {} is looking for: {}\n\n\
             MENTOR: {}, {} at {}.\n\
             Bio: {}\n\n\
             Rate the compatibility (0-100) between this mentee and mentor based on \
             interests, experience and skills. If you include components, they must \
             sum to the score.",
            seeker.display_name, seeker.goal_text, candidate.name, candidate.title,
            candidate.company, bio
        )
    }

    fn parse_content(content: &str) -> Result<Assessment> {
        let payload: ScorePayload =
            serde_json::from_str(content.trim()).context("model reply is not a score object")?;
        Ok(Assessment {
            score: payload.score,
            explanation: payload.reason,
            components: payload.components,
        })
    }
}

#[async_trait]
impl CompatibilityScorer for OpenAiScorer {
    fn name(&self) -> &'static str {
        "openai_chat"
    }

    async fn score(
        &self,
        seeker: &Seeker,
        candidate: &NormalizedCandidate,
        model: Option<&str>,
    ) -> Result<Assessment> {
        let model = model.unwrap_or(&self.model);
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::build_prompt(seeker, candidate),
                },
            ],
            temperature: 0.5,
            max_tokens: 500,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!("Scoring candidate {} with model {}", candidate.id, model);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context("Failed to call scoring model")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Scoring model error ({}): {}", status, error_text);
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse scoring model response")?;

        let choice = chat
            .choices
            .first()
            .ok_or_else(|| anyhow::anyhow!("No choices in scoring model response"))?;

        Self::parse_content(&choice.message.content)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embeds seeker goal text for the prefilter
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(settings: &OpenAiSettings, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        Ok(Self {
            client: build_client(settings)?,
            url: endpoint(&settings.base_url, "embeddings"),
            model,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context("Failed to call embedding service")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding service error ({}): {}", status, error_text);
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow::anyhow!("Embedding response contained no vectors"))
    }
}
