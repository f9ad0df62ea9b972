//! Chat client for models hosted on the OCI Generative AI inference service.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use crate::providers::traits::{
    ChatMessage, ChatModel, ChatResponse, GroundingDoc, Role, TokenStream,
};
use crate::providers::utils::split_lines;

#[derive(Clone)]
pub struct OciGenAiProvider {
    client: Client,
    api_key: String,
    compartment_id: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OciGenAiProvider {
    pub fn new(
        api_key: String,
        compartment_id: String,
        endpoint: String,
        model: String,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            compartment_id,
            endpoint,
            model,
            max_tokens,
            temperature,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/20231130/actions/chat", self.endpoint.trim_end_matches('/'))
    }

    fn request_body(
        &self,
        messages: &[ChatMessage],
        documents: &[GroundingDoc],
        stream: bool,
    ) -> Value {
        let messages = fold_documents(messages, documents);

        let generic_messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "SYSTEM",
                    Role::User => "USER",
                    Role::Assistant => "ASSISTANT",
                };
                json!({
                    "role": role,
                    "content": [{"type": "TEXT", "text": m.content}],
                })
            })
            .collect();

        json!({
            "compartmentId": self.compartment_id,
            "servingMode": {
                "servingType": "ON_DEMAND",
                "modelId": self.model,
            },
            "chatRequest": {
                "apiFormat": "GENERIC",
                "messages": generic_messages,
                "maxTokens": self.max_tokens,
                "temperature": self.temperature,
                "isStream": stream,
            },
        })
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.chat_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!(
                "OCI GenAI request failed: Status {}, Body: {}",
                status,
                error_text
            ));
        }
        Ok(response)
    }
}

/// Pull the generated text out of one server-sent event line.
fn parse_sse_event(line: &str) -> Option<String> {
    let payload = line.strip_prefix("data:")?.trim();
    let event: Value = serde_json::from_str(payload).ok()?;
    event
        .get("text")
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
}

/// The generic chat format has no grounding-documents field; retrieved
/// context is appended to the system message instead.
fn fold_documents(messages: &[ChatMessage], documents: &[GroundingDoc]) -> Vec<ChatMessage> {
    if documents.is_empty() {
        return messages.to_vec();
    }

    let context: String = documents
        .iter()
        .map(|doc| format!("[{}] {} (from {}, pag. {})", doc.id, doc.snippet, doc.source, doc.page))
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut folded = messages.to_vec();
    match folded.iter_mut().find(|m| m.role == Role::System) {
        Some(system) => {
            system.content = format!("{}\n\nContext:\n{}", system.content, context);
        }
        None => {
            folded.insert(0, ChatMessage::system(format!("Context:\n{}", context)));
        }
    }
    folded
}

#[async_trait]
impl ChatModel for OciGenAiProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        documents: &[GroundingDoc],
    ) -> Result<ChatResponse> {
        let body = self.request_body(messages, documents, false);
        let response = self.post(&body).await?;
        let response_json: Value = response.json().await?;

        let text = response_json
            .pointer("/chatResponse/choices/0/message/content/0/text")
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                let debug_json = serde_json::to_string_pretty(&response_json).unwrap_or_default();
                anyhow!("Invalid OCI response format. Response JSON: {}", debug_json)
            })?;

        // the generic API format carries no citation spans
        Ok(ChatResponse {
            text,
            citations: Vec::new(),
        })
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        documents: &[GroundingDoc],
    ) -> Result<TokenStream> {
        let body = self.request_body(messages, documents, true);
        let response = self.post(&body).await?;

        let tokens = split_lines(response.bytes_stream())
            .filter_map(|line| {
                futures::future::ready(match line {
                    Ok(line) => parse_sse_event(&line).map(Ok),
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

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OciGenAiProvider {
        OciGenAiProvider::new(
            "key".into(),
            "ocid1.compartment.oc1..test".into(),
            "https://inference.example.com/".into(),
            "meta.llama-3-70b-instruct".into(),
            512,
            0.1,
        )
    }

    #[test]
    fn builds_generic_chat_request() {
        let p = provider();
        let messages = [
            ChatMessage::system("You are helpful."),
            ChatMessage::user("What is RAG?"),
        ];
        let body = p.request_body(&messages, &[], false);

        assert_eq!(body["servingMode"]["modelId"], "meta.llama-3-70b-instruct");
        assert_eq!(body["chatRequest"]["apiFormat"], "GENERIC");
        assert_eq!(body["chatRequest"]["maxTokens"], 512);
        assert_eq!(body["chatRequest"]["isStream"], false);
        assert_eq!(body["chatRequest"]["messages"][0]["role"], "SYSTEM");
        assert_eq!(
            body["chatRequest"]["messages"][1]["content"][0]["text"],
            "What is RAG?"
        );
    }

    #[test]
    fn chat_url_normalizes_trailing_slash() {
        let p = provider();
        assert_eq!(
            p.chat_url(),
            "https://inference.example.com/20231130/actions/chat"
        );
    }

    #[test]
    fn parses_sse_text_events() {
        assert_eq!(
            parse_sse_event(r#"data: {"text": "Hello"}"#),
            Some("Hello".to_string())
        );
        assert_eq!(parse_sse_event(r#"data: {"finishReason": "stop"}"#), None);
        assert_eq!(parse_sse_event("not an event"), None);
    }

    #[test]
    fn folds_documents_into_system_message() {
        let messages = [ChatMessage::system("Answer."), ChatMessage::user("q")];
        let docs = [GroundingDoc {
            id: "1".into(),
            snippet: "aspirin lowers fever".into(),
            source: "drugs.pdf".into(),
            page: "12".into(),
        }];

        let folded = fold_documents(&messages, &docs);
        assert_eq!(folded.len(), 2);
        assert!(folded[0].content.contains("Context:"));
        assert!(folded[0].content.contains("aspirin lowers fever"));
        assert!(folded[0].content.contains("drugs.pdf"));
    }

    #[test]
    fn fold_without_system_message_prepends_one() {
        let messages = [ChatMessage::user("q")];
        let docs = [GroundingDoc {
            id: "1".into(),
            snippet: "snippet".into(),
            source: "s.pdf".into(),
            page: "1".into(),
        }];

        let folded = fold_documents(&messages, &docs);
        assert_eq!(folded.len(), 2);
        assert_eq!(folded[0].role, Role::System);
    }
}
