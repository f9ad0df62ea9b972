//! OpenSearch-backed vector index, reached over HTTP with basic auth.
//!
//! The cluster is expected to have the k-NN plugin; the index is created on
//! first write with a `knn_vector` mapping.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::ingest::Chunk;
use crate::providers::Embedder;
use crate::store::{RetrievedChunk, StoreError, VectorStore};

pub struct OpenSearchStore {
    client: Client,
    base_url: String,
    index: String,
    user: String,
    pwd: String,
}

impl OpenSearchStore {
    pub fn new(
        url: &str,
        index: String,
        user: String,
        pwd: String,
        verify_certs: bool,
    ) -> Result<Self, StoreError> {
        // demo clusters typically run with self-signed certificates
        let client = Client::builder()
            .danger_accept_invalid_certs(!verify_certs)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            index,
            user,
            pwd,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn ensure_index(&self, dimension: usize) -> Result<(), StoreError> {
        let body = json!({
            "settings": {
                "index.knn": true,
            },
            "mappings": {
                "properties": {
                    "embedding": {
                        "type": "knn_vector",
                        "dimension": dimension,
                    },
                    "text": {"type": "text"},
                    "source": {"type": "keyword"},
                    "page": {"type": "integer"},
                    "indexed_at": {"type": "date"},
                }
            }
        });

        let response = self
            .client
            .put(self.url(&self.index))
            .basic_auth(&self.user, Some(&self.pwd))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::BAD_REQUEST => {
                let text = response.text().await.unwrap_or_default();
                if text.contains("resource_already_exists_exception") {
                    log::info!("Index {} already exists, skipping creation", self.index);
                    Ok(())
                } else {
                    Err(StoreError::Operation(text))
                }
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(StoreError::Operation(format!(
                    "Index creation failed: Status {}, Body: {}",
                    status, text
                )))
            }
        }
    }
}

fn bulk_body(index: &str, chunks: &[Chunk], vectors: &[Vec<f32>]) -> String {
    let mut body = String::new();
    for (chunk, vector) in chunks.iter().zip(vectors) {
        body.push_str(&json!({"index": {"_index": index}}).to_string());
        body.push('\n');
        body.push_str(
            &json!({
                "embedding": vector,
                "text": chunk.text,
                "source": chunk.source,
                "page": chunk.page,
                "indexed_at": chrono::Utc::now().to_rfc3339(),
            })
            .to_string(),
        );
        body.push('\n');
    }
    body
}

fn chunks_from_hits(response_json: &Value) -> Vec<RetrievedChunk> {
    let Some(hits) = response_json.pointer("/hits/hits").and_then(|h| h.as_array()) else {
        return Vec::new();
    };

    hits.iter()
        .filter_map(|hit| {
            let score = hit.get("_score")?.as_f64()? as f32;
            let source_doc = hit.get("_source")?;
            Some(RetrievedChunk {
                chunk: Chunk {
                    text: source_doc.get("text")?.as_str()?.to_string(),
                    source: source_doc.get("source")?.as_str()?.to_string(),
                    page: source_doc.get("page")?.as_u64()? as u32,
                },
                score,
            })
        })
        .collect()
}

#[async_trait]
impl VectorStore for OpenSearchStore {
    async fn add_chunks(
        &self,
        chunks: &[Chunk],
        embedder: &dyn Embedder,
    ) -> Result<(), StoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder
            .embed_documents(&texts)
            .await
            .map_err(|e| StoreError::Embedding(e.to_string()))?;

        let dimension = vectors
            .first()
            .map(|v| v.len())
            .ok_or_else(|| StoreError::Embedding("empty embedding batch".into()))?;
        self.ensure_index(dimension).await?;

        log::info!("Saving {} chunks to OpenSearch...", chunks.len());

        let response = self
            .client
            .post(self.url("_bulk"))
            .basic_auth(&self.user, Some(&self.pwd))
            .header("Content-Type", "application/x-ndjson")
            .body(bulk_body(&self.index, chunks, &vectors))
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Operation(format!(
                "Bulk indexing failed: Status {}, Body: {}",
                status, text
            )));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;
        if response_json
            .get("errors")
            .and_then(|e| e.as_bool())
            .unwrap_or(false)
        {
            return Err(StoreError::Operation(
                "Bulk indexing reported item errors".to_string(),
            ));
        }

        log::info!("Saved new documents to Vector Store!");

        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let body = json!({
            "size": top_k,
            "query": {
                "knn": {
                    "embedding": {
                        "vector": query_vector,
                        "k": top_k,
                    }
                }
            }
        });

        let response = self
            .client
            .post(self.url(&format!("{}/_search", self.index)))
            .basic_auth(&self.user, Some(&self.pwd))
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::Operation(format!(
                "Search failed: Status {}, Body: {}",
                status, text
            )));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;

        Ok(chunks_from_hits(&response_json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_body_alternates_action_and_document_lines() {
        let chunks = vec![
            Chunk {
                text: "first".into(),
                source: "a.pdf".into(),
                page: 1,
            },
            Chunk {
                text: "second".into(),
                source: "b.pdf".into(),
                page: 2,
            },
        ];
        let vectors = vec![vec![0.1, 0.2], vec![0.3, 0.4]];

        let body = bulk_body("knowledge", &chunks, &vectors);
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines.len(), 4);
        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_index"], "knowledge");
        let doc: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(doc["text"], "first");
        assert_eq!(doc["page"], 1);
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn parses_knn_search_hits() {
        let response: Value = serde_json::from_str(
            r#"{
                "hits": {
                    "hits": [
                        {
                            "_score": 0.87,
                            "_source": {"text": "a passage", "source": "doc.pdf", "page": 3}
                        }
                    ]
                }
            }"#,
        )
        .unwrap();

        let results = chunks_from_hits(&response);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.source, "doc.pdf");
        assert_eq!(results[0].chunk.page, 3);
        assert!((results[0].score - 0.87).abs() < 1e-6);
    }

    #[test]
    fn malformed_hits_are_skipped() {
        let response: Value = serde_json::from_str(
            r#"{"hits": {"hits": [{"_score": 0.5, "_source": {"text": "no source field"}}]}}"#,
        )
        .unwrap();
        assert!(chunks_from_hits(&response).is_empty());
    }
}
