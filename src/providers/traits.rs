use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::citations::CitationSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A retrieved chunk in the map format citation-capable chat APIs expect.
#[derive(Debug, Clone)]
pub struct GroundingDoc {
    pub id: String,
    pub snippet: String,
    pub source: String,
    pub page: String,
}

/// Answer text plus the citation spans the provider claims support it.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: String,
    pub citations: Vec<(CitationSpan, Vec<String>)>,
}

pub type TokenStream = BoxStream<'static, Result<String>>;

/// A hosted chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Single blocking call; `documents` ground the answer and may yield
    /// citations when the backend supports them.
    async fn chat(&self, messages: &[ChatMessage], documents: &[GroundingDoc])
        -> Result<ChatResponse>;

    /// Token-streamed variant. Citations are not available while streaming.
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        documents: &[GroundingDoc],
    ) -> Result<TokenStream>;

    fn model_id(&self) -> &str;
}

/// An embedding model mapping text to vectors for nearest-neighbor search.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
