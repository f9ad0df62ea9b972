//! Embeddings via the OCI Generative AI embed-text endpoint, with batching.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use indicatif::ProgressBar;
use reqwest::Client;
use serde_json::{json, Value};

use crate::providers::traits::Embedder;

// the Cohere-family embed models accept at most 96 texts per call
const MAX_BATCH_SIZE: usize = 96;

#[derive(Clone)]
pub struct OciEmbedder {
    client: Client,
    api_key: String,
    compartment_id: String,
    endpoint: String,
    model: String,
    batch_size: usize,
}

impl OciEmbedder {
    pub fn new(
        api_key: String,
        compartment_id: String,
        endpoint: String,
        model: String,
        batch_size: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            compartment_id,
            endpoint,
            model,
            batch_size: clamp_batch_size(batch_size),
        }
    }

    fn embed_url(&self) -> String {
        format!(
            "{}/20231130/actions/embedText",
            self.endpoint.trim_end_matches('/')
        )
    }

    async fn embed_batch(&self, texts: &[String], input_type: &str) -> Result<Vec<Vec<f32>>> {
        let body = json!({
            "compartmentId": self.compartment_id,
            "servingMode": {
                "servingType": "ON_DEMAND",
                "modelId": self.model,
            },
            "inputs": texts,
            "inputType": input_type,
            "truncate": "END",
        });

        let response = self
            .client
            .post(self.embed_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "Embed request failed: Status {}, Body: {}",
                status,
                error_text
            ));
        }

        let response_json: Value = response.json().await?;
        let embeddings = response_json
            .get("embeddings")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("No embeddings in response"))?;

        embeddings
            .iter()
            .map(|vector| {
                vector
                    .as_array()
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(|v| v.as_f64())
                            .map(|v| v as f32)
                            .collect::<Vec<f32>>()
                    })
                    .ok_or_else(|| anyhow!("Malformed embedding vector in response"))
            })
            .collect()
    }
}

fn clamp_batch_size(batch_size: usize) -> usize {
    batch_size.clamp(1, MAX_BATCH_SIZE)
}

#[async_trait]
impl Embedder for OciEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.len() <= self.batch_size {
            // no progress bar for a single call, which includes queries
            return self.embed_batch(texts, "SEARCH_DOCUMENT").await;
        }

        let batches: Vec<&[String]> = texts.chunks(self.batch_size).collect();
        let progress = ProgressBar::new(batches.len() as u64);

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in batches {
            let batch_embeddings = self.embed_batch(batch, "SEARCH_DOCUMENT").await?;
            embeddings.extend(batch_embeddings);
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self
            .embed_batch(&[text.to_string()], "SEARCH_QUERY")
            .await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No embedding returned for query"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_is_clamped_to_model_limit() {
        assert_eq!(clamp_batch_size(500), MAX_BATCH_SIZE);
        assert_eq!(clamp_batch_size(0), 1);
        assert_eq!(clamp_batch_size(50), 50);
    }

    #[test]
    fn embed_url_appends_action_path() {
        let embedder = OciEmbedder::new(
            "key".into(),
            "ocid".into(),
            "https://inference.example.com".into(),
            "cohere.embed-multilingual-v3.0".into(),
            90,
        );
        assert_eq!(
            embedder.embed_url(),
            "https://inference.example.com/20231130/actions/embedText"
        );
    }
}
