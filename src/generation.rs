//! Generation provider abstraction.
//!
//! [`GenerationProvider`] takes a system instruction, the windowed
//! conversation history, and a human turn, and returns the model's text.
//! The shipped backend is Ollama's non-streaming `/api/chat`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::error::{RagError, Result};
use crate::models::{ChatMessage, Role};

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Invoke the model with a fixed system instruction, prior turns, and
    /// the human turn. Returns the generated text verbatim.
    async fn invoke(&self, system: &str, history: &[ChatMessage], human: &str) -> Result<String>;
}

/// Instantiate the provider selected by `[generation] provider`.
pub fn create_provider(config: &GenerationConfig) -> anyhow::Result<Arc<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

pub struct OllamaGenerator {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: WireMessage,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    async fn invoke(&self, system: &str, history: &[ChatMessage], human: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(WireMessage {
            role: "system".to_string(),
            content: system.to_string(),
        });
        for msg in history {
            messages.push(WireMessage {
                role: role_str(msg.role).to_string(),
                content: msg.content.clone(),
            });
        }
        messages.push(WireMessage {
            role: "user".to_string(),
            content: human.to_string(),
        });

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Generation(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!(
                "Ollama error {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RagError::Generation(format!("invalid Ollama response: {}", e)))?;

        Ok(parsed.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn generator(server: &MockServer) -> OllamaGenerator {
        OllamaGenerator::new(&GenerationConfig {
            base_url: server.base_url(),
            ..GenerationConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn invoke_returns_assistant_content() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/chat").matches(|req| {
                let body: serde_json::Value = serde_json::from_slice(req.body().as_ref()).unwrap();
                let messages = body["messages"].as_array().unwrap();
                messages[0]["role"] == "system"
                    && messages[1]["role"] == "user"
                    && messages[2]["role"] == "assistant"
                    && messages[3]["content"] == "What about France?"
            });
            then.status(200).json_body(json!({
                "message": { "role": "assistant", "content": "Paris." }
            }));
        });

        let history = vec![
            ChatMessage::new(Role::User, "Name capitals."),
            ChatMessage::new(Role::Assistant, "Which country?"),
        ];
        let reply = generator(&server)
            .invoke("Answer briefly.", &history, "What about France?")
            .await
            .unwrap();

        assert_eq!(reply, "Paris.");
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn invoke_surfaces_http_errors() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/chat");
            then.status(503).body("overloaded");
        });

        let err = generator(&server)
            .invoke("sys", &[], "question")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn invoke_rejects_malformed_body() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/chat");
            then.status(200).body("{\"unexpected\": true}");
        });

        let err = generator(&server)
            .invoke("sys", &[], "question")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
    }
}
