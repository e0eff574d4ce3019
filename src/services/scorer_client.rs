//! Similarity scorer service client
//!
//! Sends one image crop and a list of candidate text labels to the scoring
//! service and receives a relevance score per label. The contract requires
//! the response to cover every input label exactly once; anything else is a
//! scorer error, not something to silently paper over.

use crate::types::{ScorerError, SimilarityScorer};
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default timeout for scorer requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Similarity scorer client
#[derive(Debug, Clone)]
pub struct ScorerClient {
    http_client: Client,
    base_url: String,
}

impl ScorerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl SimilarityScorer for ScorerClient {
    async fn score(
        &self,
        image_path: &Path,
        labels: &[String],
    ) -> Result<Vec<(String, f32)>, ScorerError> {
        let image_bytes = std::fs::read(image_path)
            .map_err(|e| ScorerError::Image(format!("{}: {e}", image_path.display())))?;

        debug!(
            image = %image_path.display(),
            labels = labels.len(),
            "Requesting similarity scores"
        );

        let response = self
            .http_client
            .post(format!("{}/score", self.base_url))
            .json(&serde_json::json!({
                "image": base64::engine::general_purpose::STANDARD.encode(&image_bytes),
                "labels": labels,
            }))
            .send()
            .await
            .map_err(|e| ScorerError::Network(format!("Scorer request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ScorerError::Api(status, body));
        }

        let payload: ScoreResponse = response
            .json()
            .await
            .map_err(|e| ScorerError::Parse(format!("Scorer response parse failed: {e}")))?;

        let mut ranked: Vec<(String, f32)> = payload
            .scores
            .into_iter()
            .map(|entry| (entry.label, entry.score))
            .collect();

        validate_coverage(labels, &ranked)?;

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked)
    }
}

/// Check the response covers every input label exactly once
fn validate_coverage(labels: &[String], ranked: &[(String, f32)]) -> Result<(), ScorerError> {
    if ranked.len() != labels.len() {
        return Err(ScorerError::LabelMismatch(format!(
            "expected {} scores, got {}",
            labels.len(),
            ranked.len()
        )));
    }
    let expected: HashSet<&str> = labels.iter().map(String::as_str).collect();
    let returned: HashSet<&str> = ranked.iter().map(|(label, _)| label.as_str()).collect();
    if expected != returned {
        return Err(ScorerError::LabelMismatch(
            "returned labels do not match input labels".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Scorer service response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    #[serde(default)]
    scores: Vec<ScoreEntry>,
}

#[derive(Debug, Deserialize)]
struct ScoreEntry {
    label: String,
    score: f32,
}

// ============================================================================
// Tests
// ============================================================================
