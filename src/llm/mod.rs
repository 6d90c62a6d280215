//! Generation backends
//!
//! A chat-shaped seam over whichever model is configured: an
//! OpenAI-compatible endpoint when the configured key env var is set, a
//! local Ollama server when a model name is configured, or nothing at all,
//! in which case the orchestrator answers extractively. Requests run at the
//! configured temperature (0 for this system) with a bounded timeout;
//! transport and protocol failures surface as the upstream error naming
//! the provider.

use crate::config::LlmConfig;
use crate::error::{DadyarError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One prior conversation turn, read-only input to prompt assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Chat completion backend
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate an answer for `user`, preceded by the system instruction
    /// and any prior turns
    async fn generate(&self, system: &str, history: &[ChatTurn], user: &str) -> Result<String>;

    fn name(&self) -> &str;
}

/// Pick a backend from the configuration.
///
/// Order matches the production selection: the OpenAI key env var first,
/// then a configured Ollama model, else `None` (extractive fallback mode).
pub fn from_config(config: &LlmConfig) -> Option<Arc<dyn LanguageModel>> {
    if let Ok(api_key) = std::env::var(&config.openai_api_key_env) {
        if !api_key.is_empty() {
            tracing::info!(model = %config.openai_model, "generation backend: openai-compatible");
            return Some(Arc::new(OpenAiChat::new(config, api_key)));
        }
    }
    if !config.ollama_model.is_empty() {
        tracing::info!(model = %config.ollama_model, "generation backend: ollama");
        return Some(Arc::new(OllamaChat::new(config)));
    }
    tracing::info!("no generation backend configured, answers will be extractive");
    None
}

fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

fn message_array(system: &str, history: &[ChatTurn], user: &str) -> Vec<serde_json::Value> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(serde_json::json!({ "role": "system", "content": system }));
    for turn in history {
        messages.push(serde_json::json!({ "role": turn.role.as_str(), "content": turn.content }));
    }
    messages.push(serde_json::json!({ "role": "user", "content": user }));
    messages
}

fn upstream(service: &str, reason: impl std::fmt::Display) -> DadyarError {
    DadyarError::Upstream {
        service: service.to_string(),
        reason: reason.to_string(),
    }
}

/// OpenAI-compatible chat completions client
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig, api_key: String) -> Self {
        Self {
            client: build_client(config.request_timeout_secs),
            api_key,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model: config.openai_model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    async fn generate(&self, system: &str, history: &[ChatTurn], user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": message_array(system, history, user),
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| upstream("openai", e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(upstream("openai", format!("HTTP {}: {}", status, detail)));
        }

        let payload: serde_json::Value =
            response.json().await.map_err(|e| upstream("openai", e))?;

        payload
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| upstream("openai", "no content in response choices"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Ollama chat client for local models
pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: build_client(config.request_timeout_secs),
            base_url: config.ollama_base_url.trim_end_matches('/').to_string(),
            model: config.ollama_model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaChat {
    async fn generate(&self, system: &str, history: &[ChatTurn], user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": message_array(system, history, user),
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| upstream("ollama", e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(upstream("ollama", format!("HTTP {}: {}", status, detail)));
        }

        let payload: serde_json::Value =
            response.json().await.map_err(|e| upstream("ollama", e))?;

        payload
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| upstream("ollama", "no message content in response"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn llm_config() -> LlmConfig {
        Config::default().llm
    }

    #[test]
    fn test_message_array_shape() {
        let history = vec![ChatTurn::user("سوال قبلی"), ChatTurn::assistant("پاسخ قبلی")];
        let messages = message_array("دستور", &history, "سوال جدید");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "سوال قبلی");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"], "سوال جدید");
    }

    #[test]
    fn test_no_backend_without_configuration() {
        let mut config = llm_config();
        // Point at an env var that is never set
        config.openai_api_key_env = "DADYAR_TEST_MISSING_KEY".to_string();
        config.ollama_model = String::new();
        assert!(from_config(&config).is_none());
    }

    #[test]
    fn test_ollama_selected_when_model_set() {
        let mut config = llm_config();
        config.openai_api_key_env = "DADYAR_TEST_MISSING_KEY".to_string();
        config.ollama_model = "qwen2.5:7b".to_string();
        let backend = from_config(&config).unwrap();
        assert_eq!(backend.name(), "qwen2.5:7b");
    }

    #[test]
    fn test_chat_turn_constructors() {
        assert_eq!(ChatTurn::user("متن").role, ChatRole::User);
        assert_eq!(ChatTurn::assistant("متن").role, ChatRole::Assistant);
    }
}
