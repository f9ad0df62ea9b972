//! Chat client for the hosted Cohere API.
//!
//! When grounding documents are supplied, the non-streaming response carries
//! a `citations` array of character spans into the answer, each with the ids
//! of the documents that support it.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use crate::citations::CitationSpan;
use crate::providers::traits::{
    ChatMessage, ChatModel, ChatResponse, GroundingDoc, Role, TokenStream,
};
use crate::providers::utils::split_lines;

const COHERE_CHAT_URL: &str = "https://api.cohere.com/v1/chat";

#[derive(Clone)]
pub struct CohereProvider {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl CohereProvider {
    pub fn new(api_key: String, model: String, max_tokens: u32, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            max_tokens,
            temperature,
        }
    }

    fn request_body(
        &self,
        messages: &[ChatMessage],
        documents: &[GroundingDoc],
        stream: bool,
    ) -> Result<Value> {
        let last_user_idx = messages
            .iter()
            .rposition(|m| m.role == Role::User)
            .ok_or_else(|| anyhow!("No user message to send"))?;
        let message = messages[last_user_idx].content.clone();

        let preamble = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone());

        let chat_history: Vec<Value> = messages[..last_user_idx]
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = match m.role {
                    Role::User => "USER",
                    _ => "CHATBOT",
                };
                json!({"role": role, "message": m.content})
            })
            .collect();

        let documents: Vec<Value> = documents
            .iter()
            .map(|doc| {
                json!({
                    "id": doc.id,
                    "snippet": doc.snippet,
                    "source": doc.source,
                    "page": doc.page,
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "message": message,
            "chat_history": chat_history,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream": stream,
        });
        if let Some(preamble) = preamble {
            body["preamble"] = json!(preamble);
        }
        if !documents.is_empty() {
            body["documents"] = json!(documents);
        }

        Ok(body)
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(COHERE_CHAT_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "Cohere request failed: Status {}, Body: {}",
                status,
                error_text
            ));
        }
        Ok(response)
    }
}

/// Map the response's `citations` array into spans aligned with our answer.
fn parse_citations(response_json: &Value) -> Vec<(CitationSpan, Vec<String>)> {
    let Some(citations) = response_json.get("citations").and_then(|c| c.as_array()) else {
        return Vec::new();
    };

    citations
        .iter()
        .filter_map(|citation| {
            let start = citation.get("start")?.as_u64()? as usize;
            let end = citation.get("end")?.as_u64()? as usize;
            let doc_ids = citation
                .get("document_ids")?
                .as_array()?
                .iter()
                .filter_map(|id| id.as_str().map(|s| s.to_string()))
                .collect();
            Some((CitationSpan::new(start, end), doc_ids))
        })
        .collect()
}

/// Pull the generated text out of one `stream-events` JSON line.
fn parse_stream_event(line: &str) -> Option<String> {
    let event: Value = serde_json::from_str(line).ok()?;
    if event.get("event_type")?.as_str()? != "text-generation" {
        return None;
    }
    event
        .get("text")
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
}

#[async_trait]
impl ChatModel for CohereProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        documents: &[GroundingDoc],
    ) -> Result<ChatResponse> {
        let body = self.request_body(messages, documents, false)?;
        let response = self.post(&body).await?;
        let response_json: Value = response.json().await?;

        let text = response_json
            .get("text")
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                let debug_json = serde_json::to_string_pretty(&response_json).unwrap_or_default();
                anyhow!("Invalid Cohere response format. Response JSON: {}", debug_json)
            })?;

        let citations = parse_citations(&response_json);

        Ok(ChatResponse { text, citations })
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        documents: &[GroundingDoc],
    ) -> Result<TokenStream> {
        let body = self.request_body(messages, documents, true)?;
        let response = self.post(&body).await?;

        let tokens = split_lines(response.bytes_stream())
            .filter_map(|line| {
                futures::future::ready(match line {
                    Ok(line) => parse_stream_event(&line).map(Ok),
                    Err(e) => Some(Err(e)),
                })
            })
            .boxed();

        Ok(tokens)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
