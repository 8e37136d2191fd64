//! Completion capability used only for `general_query` turns.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use bistro_core::config::{AppConfig, LlmProvider};

const SYSTEM_PROMPT: &str = "You are a friendly assistant for a restaurant. Answer briefly. \
You cannot take orders or book tables yourself; suggest the customer ask for the menu, \
place an order, or make a reservation instead.";

const RETRY_BASE_DELAY_MS: u64 = 250;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, history: &[ChatTurn], utterance: &str) -> Result<String>;
}

/// Used when no provider is configured. Every call fails so the caller falls
/// back to its canned reply.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledLlm;

#[async_trait]
impl LlmClient for DisabledLlm {
    async fn complete(&self, _history: &[ChatTurn], _utterance: &str) -> Result<String> {
        Err(anyhow!("language model fallback is disabled"))
    }
}

/// Client for OpenAI-compatible `/chat/completions` endpoints (OpenAI, Groq,
/// and Ollama's `/v1` surface).
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    max_retries: u32,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for the language model")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key,
            max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, history: &[ChatTurn], utterance: &str) -> serde_json::Value {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatTurn::new(ChatRole::System, SYSTEM_PROMPT));
        messages.extend(history.iter().cloned());
        messages.push(ChatTurn::new(ChatRole::User, utterance));

        serde_json::json!({
            "model": &self.model,
            "messages": messages,
            "temperature": 0.7,
            "max_tokens": 300
        })
    }

    async fn call_once(&self, body: &serde_json::Value) -> Result<String> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("completion endpoint returned {status}: {body}"));
        }

        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = response.json().await?;
        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| anyhow!("completion endpoint returned no content"))
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, history: &[ChatTurn], utterance: &str) -> Result<String> {
        let body = self.request_body(history, utterance);
        let mut attempt = 0;
        loop {
            match self.call_once(&body).await {
                Ok(reply) => return Ok(reply),
                Err(error) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        event_name = "llm.completion.retry",
                        attempt,
                        error = %error,
                        "retrying language model completion"
                    );
                    let delay = RETRY_BASE_DELAY_MS.saturating_mul(1 << attempt.min(4));
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Builds the configured completion client; `Disabled` yields `DisabledLlm`.
pub fn build_llm_client(config: &AppConfig) -> Result<Arc<dyn LlmClient>> {
    if config.llm.provider == LlmProvider::Disabled {
        return Ok(Arc::new(DisabledLlm));
    }
    let base_url = config
        .llm_base_url()
        .ok_or_else(|| anyhow!("llm.base_url is required for provider {:?}", config.llm.provider))?;
    let client = ChatCompletionsClient::new(
        &base_url,
        config.llm.model.clone(),
        config.llm.api_key.clone(),
        Duration::from_secs(config.llm.timeout_secs.max(1)),
        config.llm.max_retries,
    )?;
    Ok(Arc::new(client))
}
