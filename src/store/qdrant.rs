//! Qdrant-backed vector index, reached over the native gRPC client.

use qdrant_client::config::QdrantConfig;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::with_payload_selector::SelectorOptions;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, CreateCollection, Distance, PointId, PointStruct, SearchPoints,
    UpsertPoints, Value, VectorParams, VectorsConfig, WithPayloadSelector,
};
use qdrant_client::Qdrant;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::ingest::Chunk;
use crate::providers::Embedder;
use crate::store::{RetrievedChunk, StoreError, VectorStore};

pub struct QdrantStore {
    client: Arc<Qdrant>,
    collection: String,
}

impl QdrantStore {
    /// Connect and probe the server. Qdrant listens for gRPC on the REST
    /// port + 1, so a :6333 URL is rewritten to :6334.
    pub async fn connect(url: &str, collection: String) -> Result<Self, StoreError> {
        let clean_url = match url.split_once("://") {
            Some((_, rest)) => rest.to_string(),
            None => url.to_string(),
        };
        let grpc_url = if clean_url.ends_with(":6333") {
            clean_url.replace(":6333", ":6334")
        } else {
            clean_url
        };
        let url_with_scheme = format!("http://{}", grpc_url);
        log::info!("Connecting to Qdrant at {}", url_with_scheme);

        let mut config = QdrantConfig::from_url(&url_with_scheme);
        config.check_compatibility = false;
        config.timeout = Duration::from_secs(30);
        config.connect_timeout = Duration::from_secs(10);

        let client = Qdrant::new(config).map_err(|e| StoreError::Connection(e.to_string()))?;

        client
            .list_collections()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to Qdrant: {}", e)))?;
        log::info!("Successfully connected to Qdrant");

        Ok(Self {
            client: Arc::new(client),
            collection,
        })
    }

    async fn ensure_collection(&self, vector_size: u64) -> Result<(), StoreError> {
        let vectors_config = VectorsConfig {
            config: Some(qdrant_client::qdrant::vectors_config::Config::Params(
                VectorParams {
                    size: vector_size,
                    distance: Distance::Cosine.into(),
                    ..Default::default()
                },
            )),
        };

        let create_collection = CreateCollection {
            collection_name: self.collection.clone(),
            vectors_config: Some(vectors_config),
            ..Default::default()
        };

        match self.client.create_collection(create_collection).await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("AlreadyExists") => {
                log::info!("Collection {} already exists, skipping creation", self.collection);
                Ok(())
            }
            Err(e) => Err(StoreError::Operation(e.to_string())),
        }
    }
}

fn chunk_payload(chunk: &Chunk) -> HashMap<String, Value> {
    let mut payload = HashMap::new();
    payload.insert("text".to_string(), Value::from(chunk.text.clone()));
    payload.insert("source".to_string(), Value::from(chunk.source.clone()));
    payload.insert("page".to_string(), Value::from(chunk.page as i64));
    payload.insert(
        "indexed_at".to_string(),
        Value::from(chrono::Utc::now().to_rfc3339()),
    );
    payload
}

fn chunk_from_payload(payload: &HashMap<String, Value>) -> Option<Chunk> {
    let as_str = |key: &str| -> Option<String> {
        match payload.get(key)?.kind.as_ref()? {
            Kind::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    };
    let page = match payload.get("page")?.kind.as_ref()? {
        Kind::IntegerValue(i) => *i as u32,
        _ => return None,
    };

    Some(Chunk {
        text: as_str("text")?,
        source: as_str("source")?,
        page,
    })
}

#[async_trait]
impl VectorStore for QdrantStore {
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

        let vector_size = vectors
            .first()
            .map(|v| v.len() as u64)
            .ok_or_else(|| StoreError::Embedding("empty embedding batch".into()))?;
        self.ensure_collection(vector_size).await?;

        let points: Vec<PointStruct> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| PointStruct {
                id: Some(PointId {
                    point_id_options: Some(PointIdOptions::Uuid(Uuid::new_v4().to_string())),
                }),
                vectors: Some(vector.into()),
                payload: chunk_payload(chunk),
            })
            .collect();

        log::info!("Saving {} chunks to Qdrant...", points.len());

        let upsert_points = UpsertPoints {
            collection_name: self.collection.clone(),
            points,
            ..Default::default()
        };

        self.client
            .upsert_points(upsert_points)
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;

        log::info!("Saved new documents to Vector Store!");

        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        let request = SearchPoints {
            collection_name: self.collection.clone(),
            vector: query_vector,
            limit: top_k as u64,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let results = self
            .client
            .search_points(request)
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;

        let chunks = results
            .result
            .into_iter()
            .filter_map(|point| {
                let chunk = chunk_from_payload(&point.payload)?;
                Some(RetrievedChunk {
                    chunk,
                    score: point.score,
                })
            })
            .collect();

        Ok(chunks)
    }
}
