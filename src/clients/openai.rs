//! OpenAI-compatible chat-completions client.
//!
//! Works against any endpoint speaking the `/chat/completions` dialect
//! (OpenAI, Groq, vLLM, LM Studio). Single-turn: the pipeline's stages are
//! independent calls, so no conversation state is kept here.

use async_trait::async_trait;
use serde_json::Value;

use crate::clients::traits::{GenerativeModel, ModelError};
use crate::config::ModelConfig;

#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
    timeout_ms: u64,
}

impl ChatCompletionsClient {
    /// Build a client from transport config. The API key comes from
    /// FORK_API_KEY, falling back to OPENAI_API_KEY.
    pub fn from_config(cfg: &ModelConfig) -> Result<Self, ModelError> {
        let api_key = std::env::var("FORK_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .unwrap_or_default();
        if api_key.is_empty() {
            return Err(ModelError::MissingKey);
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| ModelError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.clone(),
            model: cfg.model.clone(),
            api_key,
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            timeout_ms: cfg.timeout_ms,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl GenerativeModel for ChatCompletionsClient {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    ModelError::Http(e.to_string())
                }
            })?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: truncate_snippet(message.trim(), 500),
            });
        }
        let v: Value = resp.json().await.map_err(|e| ModelError::Http(e.to_string()))?;
        let text = v["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();
        if text.is_empty() {
            return Err(ModelError::Empty);
        }
        Ok(text)
    }
}

fn truncate_snippet(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    let head: String = input.chars().take(max).collect();
    format!("{}...", head)
}
