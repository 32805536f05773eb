//! OpenAI-compatible HTTP clients for embeddings and answer rewriting.
//!
//! Both use a blocking `ureq` agent with the configured request timeout.
//! Any transport, status or decoding failure is a [`Error::Provider`]; the
//! callers in this crate treat that as "provider unavailable".

use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::phrasing::Rewriter;
use crate::{Embedder, Error, Result};

const REWRITE_PROMPT: &str = "Rephrase the user's sentence so it sounds natural when spoken aloud. \
Keep every name, date and fact exactly as given and add nothing. Reply with the sentence only.";

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

struct Client {
    config: ProviderConfig,
    agent: ureq::Agent,
}

impl Client {
    fn new(config: ProviderConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self { config, agent }
    }

    fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{path}", self.config.base_url.trim_end_matches('/'));
        self.agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", self.config.api_key))
            .send_json(body)
            .map_err(|e| Error::Provider(format!("{path}: {e}")))?
            .into_json()
            .map_err(|e| Error::Provider(format!("{path}: unreadable response: {e}")))
    }
}

/// `POST {base_url}/embeddings`.
pub struct OpenAiEmbedder {
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({ "model": self.client.config.model, "input": text });
        first_embedding(self.client.post("embeddings", body)?)
    }
}

/// `POST {base_url}/chat/completions`.
pub struct OpenAiRewriter {
    client: Client,
}

impl OpenAiRewriter {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

impl Rewriter for OpenAiRewriter {
    fn rewrite(&self, text: &str) -> Result<String> {
        let body = json!({
            "model": self.client.config.model,
            "temperature": 0.2,
            "messages": [
                { "role": "system", "content": REWRITE_PROMPT },
                { "role": "user", "content": text },
            ],
        });
        first_message(self.client.post("chat/completions", body)?)
    }
}

fn first_embedding(body: serde_json::Value) -> Result<Vec<f32>> {
    let parsed: EmbeddingResponse = serde_json::from_value(body)
        .map_err(|e| Error::Provider(format!("embeddings: unexpected shape: {e}")))?;
    parsed
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Provider("embeddings: empty response".into()))
}

fn first_message(body: serde_json::Value) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_value(body)
        .map_err(|e| Error::Provider(format!("chat/completions: unexpected shape: {e}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Provider("chat/completions: empty response".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_embedding_response() {
        let body = json!({"object": "list", "data": [{"index": 0, "embedding": [0.5, -0.25]}]});
        assert_eq!(first_embedding(body).unwrap(), vec![0.5, -0.25]);
    }

    #[test]
    fn rejects_empty_or_malformed_embedding_response() {
        assert!(matches!(first_embedding(json!({"data": []})), Err(Error::Provider(_))));
        assert!(matches!(
            first_embedding(json!({"data": [{"embedding": []}]})),
            Err(Error::Provider(_))
        ));
        assert!(matches!(first_embedding(json!({"error": "nope"})), Err(Error::Provider(_))));
    }

    #[test]
    fn decodes_chat_response() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": " Rickey is Pam's husband. "}}]});
        assert_eq!(first_message(body).unwrap(), "Rickey is Pam's husband.");
        assert!(first_message(json!({"choices": [{"message": {"content": null}}]})).is_err());
        assert!(first_message(json!({"choices": []})).is_err());
    }

    #[test]
    fn unreachable_endpoint_is_a_provider_error() {
        let config = ProviderConfig {
            base_url: "http://127.0.0.1:9".into(),
            api_key: "sk-test".into(),
            model: "m".into(),
            timeout_secs: 1,
        };
        let err = OpenAiEmbedder::new(config.clone()).embed("pam").unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
        let err = OpenAiRewriter::new(config).rewrite("pam").unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }
}
