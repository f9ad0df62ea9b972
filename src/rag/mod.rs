//! The retrieval-then-generation pipeline: condense the question, retrieve
//! top-K chunks, optionally rerank, then call the chat model with the
//! retrieved context and the conversation history.

pub mod prompts;
pub mod references;

pub use references::{format_references, strip_references};

use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::citations::{annotate_answer, CitationError, CitationSpan};
use crate::config::{AppConfig, EmbedModelType, ModelType, Secrets};
use crate::ingest::Chunk;
use crate::providers::cohere::{CohereProvider, CohereReranker};
use crate::providers::oci::{OciEmbedder, OciGenAiProvider};
use crate::providers::{
    ChatMessage, ChatModel, Embedder, GroundingDoc, TokenStream,
};
use crate::store::{build_vector_store, RetrievedChunk, VectorStore};

/// An answer plus the chunks that grounded it and any citation spans the
/// chat model returned.
#[derive(Debug)]
pub struct RagAnswer {
    pub answer: String,
    pub context: Vec<RetrievedChunk>,
    pub citations: Vec<(CitationSpan, Vec<String>)>,
}

impl RagAnswer {
    /// The answer with every cited span highlighted and annotated with the
    /// ids of its supporting documents.
    pub fn highlighted(&self) -> Result<String, CitationError> {
        let (spans, doc_ids): (Vec<_>, Vec<_>) = self.citations.iter().cloned().unzip();
        annotate_answer(&self.answer, &spans, &doc_ids)
    }
}

/// Everything needed to answer a question, constructed once from config.
pub struct RagChain {
    embedder: Arc<dyn Embedder>,
    store: Box<dyn VectorStore>,
    reranker: Option<CohereReranker>,
    chat_model: Box<dyn ChatModel>,
    top_k: usize,
    verbose: bool,
}

fn require(secret: &Option<String>, name: &str) -> Result<String> {
    secret
        .clone()
        .ok_or_else(|| anyhow!("{} must be set in the environment", name))
}

impl RagChain {
    /// Build the whole chain. `model_override` replaces the configured chat
    /// model id, so the UI can switch models without touching config.
    pub async fn build(
        config: &AppConfig,
        secrets: &Secrets,
        model_override: Option<&str>,
    ) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = match config.embeddings.embed_model_type {
            EmbedModelType::Oci => Arc::new(OciEmbedder::new(
                require(&secrets.oci_api_key, "OCI_API_KEY")?,
                require(&secrets.oci_compartment_id, "OCI_COMPARTMENT_ID")?,
                config.embeddings.oci.embed_endpoint.clone(),
                config.embeddings.oci.embed_model.clone(),
                config.embeddings.oci.embed_batch_size,
            )),
        };

        let store = build_vector_store(config, secrets).await?;

        let reranker = if config.reranker.add_reranker {
            if config.ui.verbose {
                log::info!("Adding a reranker...");
            }
            Some(CohereReranker::new(
                require(&secrets.cohere_api_key, "COHERE_API_KEY")?,
                config.reranker.cohere_reranker_model.clone(),
                config.retriever.top_n,
            ))
        } else {
            None
        };

        let chat_model: Box<dyn ChatModel> = match config.llm.model_type {
            ModelType::Oci => {
                let model = model_override
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| config.llm.oci.llm_model.clone());
                log::info!(" Using {} as ChatModel...", model);
                Box::new(OciGenAiProvider::new(
                    require(&secrets.oci_api_key, "OCI_API_KEY")?,
                    require(&secrets.oci_compartment_id, "OCI_COMPARTMENT_ID")?,
                    config.llm.oci.endpoint.clone(),
                    model,
                    config.llm.max_tokens,
                    config.llm.temperature,
                ))
            }
            ModelType::Cohere => {
                let model = model_override
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| config.llm.cohere.llm_model.clone());
                log::info!(" Using {} as ChatModel...", model);
                Box::new(CohereProvider::new(
                    require(&secrets.cohere_api_key, "COHERE_API_KEY")?,
                    model,
                    config.llm.max_tokens,
                    config.llm.temperature,
                ))
            }
        };

        Ok(Self {
            embedder,
            store,
            reranker,
            chat_model,
            top_k: config.retriever.top_k,
            verbose: config.ui.verbose,
        })
    }

    pub fn model_id(&self) -> &str {
        self.chat_model.model_id()
    }

    /// Rewrite a follow-up question as a standalone one using the history.
    /// With no history the question already stands alone.
    async fn condense_question(
        &self,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let mut messages = vec![ChatMessage::system(prompts::CONTEXT_Q_SYSTEM_PROMPT)];
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(question));

        let response = self.chat_model.chat(&messages, &[]).await?;
        let condensed = response.text.trim().to_string();

        if self.verbose {
            log::info!("Condensed question: {}", condensed);
        }

        Ok(condensed)
    }

    /// Top-K nearest chunks for the (already standalone) question, reranked
    /// down to top-N when a reranker is configured.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>> {
        let query_vector = self.embedder.embed_query(question).await?;
        let retrieved = self.store.search(query_vector, self.top_k).await?;

        if self.verbose {
            log::info!("Retrieved {} chunks from the Vector Store", retrieved.len());
        }

        let Some(reranker) = &self.reranker else {
            return Ok(retrieved);
        };

        let texts: Vec<String> = retrieved.iter().map(|r| r.chunk.text.clone()).collect();
        let ranked = reranker.rerank(question, &texts).await?;

        let reranked = ranked
            .into_iter()
            .map(|(index, score)| RetrievedChunk {
                chunk: retrieved[index].chunk.clone(),
                score,
            })
            .collect();

        Ok(reranked)
    }

    fn qa_messages(&self, question: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(prompts::QA_SYSTEM_PROMPT)];
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(question));
        messages
    }

    /// The full pipeline, blocking until the whole answer is available.
    pub async fn ask(&self, question: &str, history: &[ChatMessage]) -> Result<RagAnswer> {
        let standalone = self.condense_question(question, history).await?;
        let context = self.retrieve(&standalone).await?;

        let documents = grounding_docs(&context);
        let messages = self.qa_messages(question, history);

        let response = self.chat_model.chat(&messages, &documents).await?;

        Ok(RagAnswer {
            answer: response.text,
            context,
            citations: response.citations,
        })
    }

    /// Same pipeline with the generation step streamed. The retrieved
    /// context is returned up front so references can be appended after the
    /// final token.
    pub async fn ask_stream(
        &self,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<(TokenStream, Vec<RetrievedChunk>)> {
        let standalone = self.condense_question(question, history).await?;
        let context = self.retrieve(&standalone).await?;

        let documents = grounding_docs(&context);
        let messages = self.qa_messages(question, history);

        let stream = self.chat_model.chat_stream(&messages, &documents).await?;

        Ok((stream, context))
    }

    /// Embed and index chunks into the configured vector store.
    pub async fn index_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        self.store
            .add_chunks(chunks, self.embedder.as_ref())
            .await?;
        Ok(())
    }
}

/// Present retrieved chunks in the map format citation-capable chat APIs
/// expect; ids are 1-based and match the annotations in highlighted answers.
fn grounding_docs(context: &[RetrievedChunk]) -> Vec<GroundingDoc> {
    context
        .iter()
        .enumerate()
        .map(|(i, retrieved)| GroundingDoc {
            id: (i + 1).to_string(),
            snippet: retrieved.chunk.text.clone(),
            source: retrieved.chunk.source.clone(),
            page: retrieved.chunk.page.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retrieved(text: &str, source: &str, page: u32) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                text: text.to_string(),
                source: source.to_string(),
                page,
            },
            score: 0.9,
        }
    }

    #[test]
    fn grounding_docs_are_one_based_and_aligned() {
        let context = vec![
            retrieved("first passage", "a.pdf", 3),
            retrieved("second passage", "b.pdf", 9),
        ];

        let docs = grounding_docs(&context);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "1");
        assert_eq!(docs[0].snippet, "first passage");
        assert_eq!(docs[1].id, "2");
        assert_eq!(docs[1].page, "9");
    }

    #[test]
    fn highlighted_answer_wraps_cited_spans() {
        let answer = RagAnswer {
            answer: "The sky is blue.".to_string(),
            context: Vec::new(),
            citations: vec![(CitationSpan::new(4, 7), vec!["1".to_string()])],
        };

        assert_eq!(
            answer.highlighted().unwrap(),
            "The <mark>sky</mark> [1] is blue."
        );
    }

    #[test]
    fn highlighted_answer_without_citations_is_unchanged() {
        let answer = RagAnswer {
            answer: "Plain answer.".to_string(),
            context: Vec::new(),
            citations: Vec::new(),
        };

        assert_eq!(answer.highlighted().unwrap(), "Plain answer.");
    }
}
