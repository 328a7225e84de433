//! Candidate lookup used when a request carries no candidates

use crate::types::RawCandidate;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

/// Trait for pluggable candidate stores
#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<Vec<RawCandidate>>;
}

/// Fixed in-memory candidate list
#[derive(Debug, Clone, Default)]
pub struct StaticCandidateSource {
    records: Vec<RawCandidate>,
}

impl StaticCandidateSource {
    pub fn new(records: Vec<RawCandidate>) -> Self {
        Self { records }
    }

    /// Five sample mentors, for demos without a store
    pub fn sample() -> Self {
        let records = vec![
            json!({
                "id": 1,
                "name": "John Doe",
                "title": "Senior Software Engineer",
                "company": "Google",
                "bio": "10+ years building web and mobile products. Specialised in React and Node.js."
            }),
            json!({
                "id": 2,
                "name": "Jane Smith",
                "title": "Product Manager",
                "company": "Microsoft",
                "bio": "Leads product teams in tech. Focused on product development and UX."
            }),
            json!({
                "id": 3,
                "name": "Carlos Rodríguez",
                "title": "Data Scientist",
                "company": "Amazon",
                "bio": "Machine learning and data analysis specialist with 8 years of predictive modelling."
            }),
            json!({
                "id": 4,
                "name": "María González",
                "title": "UX/UI Designer",
                "company": "Apple",
                "bio": "User experience designer focused on accessibility and inclusion across mobile and web."
            }),
            json!({
                "id": 5,
                "name": "Ahmed Hassan",
                "title": "CTO",
                "company": "FinTech Startup",
                "bio": "Serial founder of three successful startups. Fintech, blockchain and payment systems."
            }),
        ];

        Self::new(
            records
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
        )
    }
}

#[async_trait]
impl CandidateSource for StaticCandidateSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self) -> Result<Vec<RawCandidate>> {
        Ok(self.records.clone())
    }
}

/// Reads candidates from a Supabase (PostgREST) table
#[derive(Debug, Clone)]
pub struct SupabaseCandidateSource {
    base_url: String,
    table: String,
    api_key: String,
    client: reqwest::Client,
}

impl SupabaseCandidateSource {
    pub fn new(
        base_url: impl Into<String>,
        table: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            table: table.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/rest/v1/{}?select=*",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.table)
        )
    }
}

#[async_trait]
impl CandidateSource for SupabaseCandidateSource {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn fetch(&self) -> Result<Vec<RawCandidate>> {
        let url = self.url();
        debug!("Fetching candidates from {}", url);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Failed to call candidate store")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Candidate store error {}: {}", status, body);
        }

        let rows: Vec<RawCandidate> = response
            .json()
            .await
            .context("Failed to parse candidate rows")?;

        debug!("Fetched {} candidates from table {}", rows.len(), self.table);

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sample_source() {
        let source = StaticCandidateSource::sample();
        let rows = source.fetch().await.unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].get("company").and_then(Value::as_str), Some("Google"));
    }

    #[test]
    fn test_supabase_url() {
        let source = SupabaseCandidateSource::new("https://example.supabase.co/", "mentors", "key");
        assert_eq!(source.url(), "https://example.supabase.co/rest/v1/mentors?select=*");
    }

    #[tokio::test]
    #[ignore] // Requires a reachable Supabase project
    async fn test_supabase_integration() {
        let url = std::env::var("SUPABASE_URL").unwrap();
        let key = std::env::var("SUPABASE_ANON_KEY").unwrap();
        let source = SupabaseCandidateSource::new(url, "mentors", key);
        assert!(source.fetch().await.is_ok());
    }
}
