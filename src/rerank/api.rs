//! Remote reranker provider.
//!
//! Forwards the batch to an HTTP endpoint and maps its response back onto
//! candidate ids. The API key comes from the environment only; it is sent
//! as a bearer header and never logged.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::error::EngineError;
use crate::error::Result;

use super::RerankCandidate;
use super::RerankProvider;

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<ApiDocument<'a>>,
}

#[derive(Serialize)]
struct ApiDocument<'a> {
    id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    results: Vec<ApiResult>,
}

#[derive(Deserialize)]
struct ApiResult {
    id: String,
    score: f32,
}

/// Remote reranking provider.
pub struct ApiProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ApiProvider {
    pub fn new(endpoint: String, model: String, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint,
            model,
            api_key,
        }
    }
}

#[async_trait]
impl RerankProvider for ApiProvider {
    fn name(&self) -> &'static str {
        "api"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn rerank(&self, query: &str, candidates: &[RerankCandidate]) -> Result<Vec<String>> {
        let body = ApiRequest {
            model: &self.model,
            query,
            documents: candidates
                .iter()
                .map(|c| ApiDocument {
                    id: &c.id,
                    text: &c.content,
                })
                .collect(),
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            // Connect errors and timeouts are transient by nature.
            EngineError::ProviderTransient {
                provider: "api".to_string(),
                cause: e.to_string(),
            }
        })?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(EngineError::ProviderTransient {
                provider: "api".to_string(),
                cause: format!("status {status}"),
            });
        }
        if !status.is_success() {
            return Err(EngineError::ProviderPermanent {
                provider: "api".to_string(),
                cause: format!("status {status}"),
            });
        }

        let parsed: ApiResponse = response.json().await.map_err(|e| {
            EngineError::ProviderPermanent {
                provider: "api".to_string(),
                cause: format!("unreadable response: {e}"),
            }
        })?;

        Ok(map_response(candidates, parsed))
    }
}

/// Map the endpoint's scored results back to a full ordering.
///
/// Ids the endpoint did not return are appended in input order, so the
/// provider always returns the complete candidate set. Ties and unknown ids
/// resolve by input position, keeping the mapping deterministic.
fn map_response(candidates: &[RerankCandidate], response: ApiResponse) -> Vec<String> {
    let input_pos: std::collections::HashMap<&str, usize> = candidates
        .iter()
        .enumerate()
        .map(|(idx, c)| (c.id.as_str(), idx))
        .collect();

    let mut scored: Vec<(usize, f32)> = response
        .results
        .into_iter()
        .filter_map(|r| input_pos.get(r.id.as_str()).map(|&idx| (idx, r.score)))
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let mut seen = vec![false; candidates.len()];
    let mut order = Vec::with_capacity(candidates.len());
    for (idx, _) in scored {
        if !seen[idx] {
            seen[idx] = true;
            order.push(candidates[idx].id.clone());
        }
    }
    for (idx, candidate) in candidates.iter().enumerate() {
        if !seen[idx] {
            order.push(candidate.id.clone());
        }
    }
    order
}

#[cfg(test)]
#[path = "api.test.rs"]
mod tests;
