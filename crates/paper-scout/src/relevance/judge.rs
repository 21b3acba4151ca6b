//! LLM judges: OpenAI-compatible chat completions and Ollama.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::HttpClient;
use crate::config::LlmConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::LlmProvider;

/// A language model asked for a relevance verdict.
#[async_trait]
pub trait LlmJudge: Send + Sync + fmt::Debug {
    /// Send one system + user exchange and return the raw answer text.
    async fn ask(&self, system: &str, user: &str) -> ClientResult<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

fn exchange(system: &str, user: &str) -> Vec<Message> {
    vec![
        Message { role: "system".to_string(), content: system.to_string() },
        Message { role: "user".to_string(), content: user.to_string() },
    ]
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Judge backed by any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiJudge {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiJudge {
    /// Create a judge from the LLM settings.
    #[must_use]
    pub fn new(http: HttpClient, config: &LlmConfig) -> Self {
        Self {
            http,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.timeout,
        }
    }
}

#[async_trait]
impl LlmJudge for OpenAiJudge {
    async fn ask(&self, system: &str, user: &str) -> ClientResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionsRequest {
            model: &self.model,
            messages: exchange(system, user),
            temperature: self.temperature,
        };
        let response: ChatCompletionsResponse =
            self.http.post_json(&url, &request, self.api_key.as_deref(), self.timeout).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClientError::Malformed("chat completion without choices".to_string()))
    }
}

impl fmt::Debug for OpenAiJudge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiJudge")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<ChoiceMessage>,
}

/// Judge backed by a local Ollama server (`/api/chat`).
#[derive(Debug, Clone)]
pub struct OllamaJudge {
    http: HttpClient,
    base_url: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OllamaJudge {
    /// Create a judge from the LLM settings.
    #[must_use]
    pub fn new(http: HttpClient, config: &LlmConfig) -> Self {
        Self {
            http,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.timeout,
        }
    }
}

#[async_trait]
impl LlmJudge for OllamaJudge {
    async fn ask(&self, system: &str, user: &str) -> ClientResult<String> {
        let url = format!("{}/api/chat", self.base_url);
        let request = OllamaChatRequest {
            model: &self.model,
            messages: exchange(system, user),
            stream: false,
            options: OllamaOptions { temperature: self.temperature },
        };
        let response: OllamaChatResponse = self.http.post_json(&url, &request, None, self.timeout).await?;
        response
            .message
            .and_then(|m| m.content)
            .ok_or_else(|| ClientError::Malformed("ollama reply without message".to_string()))
    }
}

/// Build the configured judge.
#[must_use]
pub fn judge_from_config(http: HttpClient, config: &LlmConfig) -> Arc<dyn LlmJudge> {
    match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAiJudge::new(http, config)),
        LlmProvider::Ollama => Arc::new(OllamaJudge::new(http, config)),
    }
}

/// User message for one record.
#[must_use]
pub fn user_message(title: &str, keywords: &[String]) -> String {
    let mut message = format!("Title of the publication: '{title}'");
    if !keywords.is_empty() {
        message.push_str("\nKeywords: ");
        message.push_str(&keywords.join(", "));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message() {
        assert_eq!(user_message("T", &[]), "Title of the publication: 'T'");
        assert_eq!(
            user_message("T", &["a".to_string(), "b".to_string()]),
            "Title of the publication: 'T'\nKeywords: a, b"
        );
    }

    #[test]
    fn test_request_shape() {
        let request = ChatCompletionsRequest {
            model: "gpt-3.5-turbo",
            messages: exchange("sys", "usr"),
            temperature: 0.1,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "usr");
        assert_eq!(json["model"], "gpt-3.5-turbo");
    }
}
