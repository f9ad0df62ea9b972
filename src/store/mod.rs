//! Vector store backends behind one capability interface.
//!
//! Two interchangeable targets: Qdrant over its native gRPC client and
//! OpenSearch over HTTP with basic auth and TLS. Which one is used is decided
//! once at startup from config.

pub mod opensearch;
pub mod qdrant;

pub use opensearch::OpenSearchStore;
pub use qdrant::QdrantStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{AppConfig, Secrets, StoreType};
use crate::ingest::Chunk;
use crate::providers::Embedder;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Operation failed: {0}")]
    Operation(String),
    #[error("Store misconfigured: {0}")]
    Config(String),
    #[error("Embedding failed: {0}")]
    Embedding(String),
}

/// A chunk returned from nearest-neighbor search with its similarity score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed and index a batch of chunks.
    async fn add_chunks(&self, chunks: &[Chunk], embedder: &dyn Embedder)
        -> Result<(), StoreError>;

    /// Nearest-neighbor search over the index.
    async fn search(
        &self,
        query_vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError>;
}

/// Build the configured vector store backend.
pub async fn build_vector_store(
    config: &AppConfig,
    secrets: &Secrets,
) -> Result<Box<dyn VectorStore>, StoreError> {
    let collection = config.vector_store.collection_name.clone();

    match config.vector_store.store_type {
        StoreType::Qdrant => {
            let qdrant = config
                .vector_store
                .qdrant
                .as_ref()
                .ok_or_else(|| StoreError::Config("missing [vector_store.qdrant] section".into()))?;
            let store = QdrantStore::connect(&qdrant.url, collection).await?;
            Ok(Box::new(store))
        }
        StoreType::OpenSearch => {
            let opensearch = config.vector_store.opensearch.as_ref().ok_or_else(|| {
                StoreError::Config("missing [vector_store.opensearch] section".into())
            })?;
            let user = secrets
                .opensearch_user
                .clone()
                .ok_or_else(|| StoreError::Config("OPENSEARCH_USER not set".into()))?;
            let pwd = secrets
                .opensearch_pwd
                .clone()
                .ok_or_else(|| StoreError::Config("OPENSEARCH_PWD not set".into()))?;
            let store = OpenSearchStore::new(
                &opensearch.url,
                collection,
                user,
                pwd,
                opensearch.verify_certs,
            )?;
            Ok(Box::new(store))
        }
    }
}
