use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use validator::Validate;

use crate::config::{AppConfig, Secrets};
use crate::ingest::{load_pdf_and_split, TextSplitter};
use crate::providers::ChatMessage;
use crate::rag::{self, RagChain};

#[derive(Clone)]
pub struct AppState {
    chain: Arc<RwLock<RagChain>>,
    history: Arc<RwLock<Vec<ChatMessage>>>,
    config: Arc<AppConfig>,
    secrets: Arc<Secrets>,
}

#[derive(Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    message: String,
}

#[derive(Serialize)]
pub struct ChatApiResponse {
    response: String,
    references: Vec<Reference>,
    citations: Vec<CitationInfo>,
}

#[derive(Serialize)]
pub struct Reference {
    source: String,
    page: u32,
}

#[derive(Serialize)]
pub struct CitationInfo {
    start: usize,
    end: usize,
    document_ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct DocumentRequest {
    path: String,
}

#[derive(Deserialize)]
pub struct ModelRequest {
    model: String,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    current: String,
    available: Vec<String>,
}

#[derive(Serialize)]
struct ApiResponse {
    status: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiResponse>)>;

fn internal_error(msg: String) -> (StatusCode, Json<ApiResponse>) {
    log::error!("{}", msg);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse { status: msg }))
}

fn bad_request(msg: String) -> (StatusCode, Json<ApiResponse>) {
    (StatusCode::BAD_REQUEST, Json(ApiResponse { status: msg }))
}

/// Create and configure the API router
pub fn create_api(chain: RagChain, config: AppConfig, secrets: Secrets) -> Router {
    let state = AppState {
        chain: Arc::new(RwLock::new(chain)),
        history: Arc::new(RwLock::new(Vec::new())),
        config: Arc::new(config),
        secrets: Arc::new(secrets),
    };

    // demo deployment, so CORS stays fully permissive
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/documents", post(documents_handler))
        .route("/models", get(models_handler).post(model_switch_handler))
        .route("/reset", post(reset_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .with_state(state)
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatApiResponse> {
    if let Err(e) = request.validate() {
        return Err(bad_request(format!("invalid request: {}", e)));
    }

    let history = state.history.read().await.clone();

    let chain = state.chain.read().await;
    let answer = chain
        .ask(&request.message, &history)
        .await
        .map_err(|e| internal_error(format!("chat failed: {}", e)))?;
    drop(chain);

    // answers are highlighted where the model cited; a malformed citation
    // payload falls back to the plain answer
    let response_text = answer.highlighted().unwrap_or_else(|e| {
        log::warn!("dropping citations: {}", e);
        answer.answer.clone()
    });

    let references = if state.config.ui.add_references {
        answer
            .context
            .iter()
            .map(|r| Reference {
                source: r.chunk.source.clone(),
                page: r.chunk.page,
            })
            .collect()
    } else {
        Vec::new()
    };

    let citations = answer
        .citations
        .iter()
        .map(|(span, doc_ids)| CitationInfo {
            start: span.start,
            end: span.end,
            document_ids: doc_ids.clone(),
        })
        .collect();

    let mut history = state.history.write().await;
    history.push(ChatMessage::user(&request.message));
    history.push(ChatMessage::assistant(rag::strip_references(&answer.answer)));

    Ok(Json(ChatApiResponse {
        response: response_text,
        references,
        citations,
    }))
}

async fn documents_handler(
    State(state): State<AppState>,
    Json(request): Json<DocumentRequest>,
) -> ApiResult<ApiResponse> {
    let path = Path::new(&request.path);
    if !path.is_file() {
        return Err(bad_request(format!("no such file: {}", request.path)));
    }

    let splitter = TextSplitter::new(
        state.config.text_splitting.chunk_size,
        state.config.text_splitting.chunk_overlap,
    );
    let chunks = load_pdf_and_split(path, &splitter)
        .map_err(|e| internal_error(format!("failed to load {}: {}", request.path, e)))?;

    let chain = state.chain.read().await;
    chain
        .index_chunks(&chunks)
        .await
        .map_err(|e| internal_error(format!("indexing failed: {}", e)))?;

    Ok(Json(ApiResponse {
        status: format!("indexed {} chunks from {}", chunks.len(), request.path),
    }))
}

async fn models_handler(State(state): State<AppState>) -> Json<ModelsResponse> {
    let chain = state.chain.read().await;
    Json(ModelsResponse {
        current: chain.model_id().to_string(),
        available: crate::providers::available_models()
            .iter()
            .map(|m| m.to_string())
            .collect(),
    })
}

async fn model_switch_handler(
    State(state): State<AppState>,
    Json(request): Json<ModelRequest>,
) -> ApiResult<ApiResponse> {
    let new_chain = RagChain::build(&state.config, &state.secrets, Some(&request.model))
        .await
        .map_err(|e| internal_error(format!("failed to switch model: {}", e)))?;

    *state.chain.write().await = new_chain;
    state.history.write().await.clear();

    Ok(Json(ApiResponse {
        status: format!("now using {}", request.model),
    }))
}

async fn reset_handler(State(state): State<AppState>) -> Json<ApiResponse> {
    state.history.write().await.clear();
    Json(ApiResponse {
        status: "conversation cleared".to_string(),
    })
}

async fn health_check() -> Response {
    (StatusCode::OK, "OK").into_response()
}
