//! Second-stage reranking of retrieved passages via the Cohere rerank API.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::{json, Value};

const COHERE_RERANK_URL: &str = "https://api.cohere.com/v1/rerank";

#[derive(Clone)]
pub struct CohereReranker {
    client: Client,
    api_key: String,
    model: String,
    top_n: usize,
}

impl CohereReranker {
    pub fn new(api_key: String, model: String, top_n: usize) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            top_n,
        }
    }

    /// Reorder `documents` by relevance to `query` and keep the top_n.
    /// Returns (original index, relevance score) pairs, best first.
    pub async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<(usize, f32)>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": self.model,
            "query": query,
            "documents": documents,
            "top_n": self.top_n,
        });

        let response = self
            .client
            .post(COHERE_RERANK_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "Rerank request failed: Status {}, Body: {}",
                status,
                error_text
            ));
        }

        let response_json: Value = response.json().await?;
        parse_rerank_results(&response_json, documents.len())
    }
}

fn parse_rerank_results(response_json: &Value, doc_count: usize) -> Result<Vec<(usize, f32)>> {
    let results = response_json
        .get("results")
        .and_then(|r| r.as_array())
        .ok_or_else(|| anyhow!("No results in rerank response"))?;

    results
        .iter()
        .map(|result| {
            let index = result
                .get("index")
                .and_then(|i| i.as_u64())
                .ok_or_else(|| anyhow!("Missing index in rerank result"))?
                as usize;
            if index >= doc_count {
                return Err(anyhow!("Rerank index {} out of range", index));
            }
            let score = result
                .get("relevance_score")
                .and_then(|s| s.as_f64())
                .ok_or_else(|| anyhow!("Missing relevance_score in rerank result"))?
                as f32;
            Ok((index, score))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_results_in_relevance_order() {
        let response: Value = serde_json::from_str(
            r#"{
                "results": [
                    {"index": 2, "relevance_score": 0.98},
                    {"index": 0, "relevance_score": 0.45}
                ]
            }"#,
        )
        .unwrap();

        let ranked = parse_rerank_results(&response, 3).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, 2);
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let response: Value =
            serde_json::from_str(r#"{"results": [{"index": 9, "relevance_score": 0.5}]}"#).unwrap();
        assert!(parse_rerank_results(&response, 3).is_err());
    }

    #[test]
    fn missing_results_is_an_error() {
        let response: Value = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert!(parse_rerank_results(&response, 1).is_err());
    }
}
