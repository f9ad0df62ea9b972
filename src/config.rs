use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Chat model backend, chosen once at startup from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ModelType {
    #[serde(rename = "OCI")]
    Oci,
    #[serde(rename = "COHERE")]
    Cohere,
}

/// Embedding model backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EmbedModelType {
    #[serde(rename = "OCI")]
    Oci,
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum StoreType {
    #[serde(rename = "QDRANT")]
    Qdrant,
    #[serde(rename = "OPENSEARCH")]
    OpenSearch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextSplittingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub books_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OciEmbeddingsConfig {
    pub embed_model: String,
    pub embed_endpoint: String,
    pub embed_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub embed_model_type: EmbedModelType,
    pub oci: OciEmbeddingsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OciLlmConfig {
    pub endpoint: String,
    pub llm_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CohereLlmConfig {
    pub llm_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model_type: ModelType,
    pub max_tokens: u32,
    pub temperature: f32,
    pub oci: OciLlmConfig,
    pub cohere: CohereLlmConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QdrantStoreConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenSearchStoreConfig {
    pub url: String,
    #[serde(default = "default_true")]
    pub verify_certs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreConfig {
    pub store_type: StoreType,
    pub collection_name: String,
    pub qdrant: Option<QdrantStoreConfig>,
    pub opensearch: Option<OpenSearchStoreConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrieverConfig {
    pub top_k: usize,
    pub top_n: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RerankerConfig {
    pub add_reranker: bool,
    pub cohere_reranker_model: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TracingConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub project: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    pub title: String,
    pub hello_msg: String,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_true")]
    pub add_references: bool,
    #[serde(default)]
    pub do_streaming: bool,
}

fn default_true() -> bool {
    true
}

/// Full application configuration, loaded once from `config.toml` and passed
/// by reference into every component constructor. No global lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub text_splitting: TextSplittingConfig,
    pub embeddings: EmbeddingsConfig,
    pub llm: LlmConfig,
    pub vector_store: VectorStoreConfig,
    pub retriever: RetrieverConfig,
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

/// Credentials, never present in code or in config.toml. Loaded from the
/// environment (a .env file is picked up by dotenv in main).
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub oci_api_key: Option<String>,
    pub oci_compartment_id: Option<String>,
    pub cohere_api_key: Option<String>,
    pub opensearch_user: Option<String>,
    pub opensearch_pwd: Option<String>,
    pub tracing_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            oci_api_key: env::var("OCI_API_KEY").ok(),
            oci_compartment_id: env::var("OCI_COMPARTMENT_ID").ok(),
            cohere_api_key: env::var("COHERE_API_KEY").ok(),
            opensearch_user: env::var("OPENSEARCH_USER").ok(),
            opensearch_pwd: env::var("OPENSEARCH_PWD").ok(),
            tracing_api_key: env::var("TRACING_API_KEY").ok(),
        }
    }
}

/// Log the effective configuration on startup.
pub fn print_configuration(config: &AppConfig) {
    log::info!("--------------------------------------------------");
    log::info!("Configuration used:");
    log::info!("");

    log::info!(" Embedding model type: {:?}", config.embeddings.embed_model_type);
    log::info!(" Using {} for Embeddings...", config.embeddings.oci.embed_model);

    if config.reranker.add_reranker {
        log::info!(" Added Cohere Reranker...");
        log::info!(" Using {} as reranker...", config.reranker.cohere_reranker_model);
    }

    log::info!(" Using {:?} as Vector Store...", config.vector_store.store_type);
    log::info!(" Retrieval parameters:");
    log::info!("    TOP_K: {}", config.retriever.top_k);
    if config.reranker.add_reranker {
        log::info!("    TOP_N: {}", config.retriever.top_n);
    }

    log::info!(" Using {:?} as Generative Model type...", config.llm.model_type);
    match config.llm.model_type {
        ModelType::Oci => log::info!(" Using {} for LLM...", config.llm.oci.llm_model),
        ModelType::Cohere => log::info!(" Using {} for LLM...", config.llm.cohere.llm_model),
    }

    if config.tracing.enable {
        log::info!("");
        log::info!(" Enabled tracing for project {}...", config.tracing.project);
    }

    log::info!("--------------------------------------------------");
    log::info!("");
}

/// Export the tracing settings to the environment so the external tracing
/// service picks them up.
pub fn enable_tracing(config: &AppConfig, secrets: &Secrets) {
    if !config.tracing.enable {
        return;
    }
    env::set_var("TRACING_ENABLED", "true");
    env::set_var("TRACING_PROJECT", &config.tracing.project);
    if let Some(key) = &secrets.tracing_api_key {
        env::set_var("TRACING_API_KEY", key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[text_splitting]
chunk_size = 1500
chunk_overlap = 100
books_dir = "./books"

[embeddings]
embed_model_type = "OCI"

[embeddings.oci]
embed_model = "cohere.embed-multilingual-v3.0"
embed_endpoint = "https://inference.example.com"
embed_batch_size = 90

[llm]
model_type = "COHERE"
max_tokens = 1024
temperature = 0.1

[llm.oci]
endpoint = "https://inference.example.com"
llm_model = "cohere.command-r-16k"

[llm.cohere]
llm_model = "command-r"

[vector_store]
store_type = "OPENSEARCH"
collection_name = "knowledge"

[vector_store.opensearch]
url = "https://localhost:9200"
verify_certs = false

[retriever]
top_k = 8
top_n = 4

[reranker]
add_reranker = true
cohere_reranker_model = "rerank-multilingual-v3.0"

[ui]
title = "Knowledge Assistant"
hello_msg = "Hello, how can I help you?"
verbose = false
add_references = true
do_streaming = true
"#;

    #[test]
    fn parses_full_config() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.text_splitting.chunk_size, 1500);
        assert_eq!(config.embeddings.embed_model_type, EmbedModelType::Oci);
        assert_eq!(config.llm.model_type, ModelType::Cohere);
        assert_eq!(config.vector_store.store_type, StoreType::OpenSearch);
        assert!(!config.vector_store.opensearch.as_ref().unwrap().verify_certs);
        assert_eq!(config.retriever.top_k, 8);
        assert!(config.reranker.add_reranker);
        assert!(config.ui.do_streaming);
        // tracing section omitted -> disabled by default
        assert!(!config.tracing.enable);
    }

    #[test]
    fn rejects_unknown_store_type() {
        let raw = SAMPLE.replace("\"OPENSEARCH\"", "\"FAISS\"");
        assert!(AppConfig::from_toml_str(&raw).is_err());
    }

    #[test]
    fn rejects_unknown_model_type() {
        let raw = SAMPLE.replace("model_type = \"COHERE\"", "model_type = \"LLAMA\"");
        assert!(AppConfig::from_toml_str(&raw).is_err());
    }
}
