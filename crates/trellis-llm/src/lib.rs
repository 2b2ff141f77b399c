//! OpenAI-compatible chat completions client.
//!
//! Works with OpenAI, OpenRouter, Ollama, Groq, vLLM, and anything else
//! speaking the `/chat/completions` shape. Non-streaming, blocking: a stage
//! that calls the model holds its run until the reply arrives.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use trellis_core::config::ModelConfig;
use trellis_core::error::{Result, TrellisError};
use trellis_core::traits::TextCompleter;

pub struct OpenAiClient {
    http: Client,
    config: ModelConfig,
}

impl OpenAiClient {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatRequestMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequestMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl TextCompleter for OpenAiClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let request = ChatRequest {
            model: self.config.model_id.clone(),
            messages: vec![ChatRequestMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(model = %self.config.model_id, url = %url, "sending completion request");

        let mut req = self.http.post(&url).json(&request);
        if let Some(ref key) = self.config.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .map_err(|e| TrellisError::Llm(format!("request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(TrellisError::Llm(format!("API error {}: {}", status, body)));
        }

        let body: ChatResponse = resp
            .json()
            .map_err(|e| TrellisError::LlmParse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TrellisError::LlmParse("response contained no choices".to_string()))
    }
}
