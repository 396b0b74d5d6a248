//! OpenAI driver (concrete C6 implementation)
//!
//! Grounded on the teacher's `OpenAIProtocolLlmProvider`
//! (`everruns-core/src/openai_protocol.rs`): same reqwest client shape,
//! constructors, and bearer-auth header. Narrowed to one non-streaming
//! completion per `query` — the engine only ever wants a finished answer,
//! never token deltas, so `stream` is always `false` and the response body
//! is read whole.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use pondkeep_engine::driver::{Driver, DriverFactory, DriverOptions, DriverResponse};
use pondkeep_engine::error::EngineError;

use crate::types::{ChatRequest, ChatResponse, Message};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone)]
pub struct OpenAiDriver {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAiDriver {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Requires the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, EngineError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| EngineError::DriverError(anyhow::anyhow!("OPENAI_API_KEY environment variable not set")))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl Driver for OpenAiDriver {
    async fn query(
        &self,
        prompt: &str,
        options: DriverOptions,
    ) -> Result<DriverResponse, EngineError> {
        let temperature = options
            .params
            .get("temperature")
            .and_then(|v| v.as_f64())
            .map(|v| v as f32);
        let max_tokens = options
            .params
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32);
        let model = options
            .params
            .get("model")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.model.clone());

        let request = ChatRequest {
            model,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature,
            max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::DriverError(anyhow::anyhow!("failed to send request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::DriverError(anyhow::anyhow!(
                "openai api error ({status}): {body}"
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            EngineError::DriverError(anyhow::anyhow!("failed to parse response: {e}"))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        let structured_output = serde_json::from_str::<serde_json::Value>(&content).ok();

        Ok(DriverResponse {
            content,
            structured_output,
        })
    }
}

impl std::fmt::Debug for OpenAiDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiDriver")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Advertises `{"fast", "structured"}` (spec §4.6.1) — OpenAI's chat
/// completion models are the quick, cheap default and support JSON-mode
/// structured decoding.
pub struct OpenAiDriverFactory {
    api_key: String,
    api_url: Option<String>,
    tags: HashSet<String>,
}

impl OpenAiDriverFactory {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: None,
            tags: ["fast", "structured"].into_iter().map(String::from).collect(),
        }
    }

    pub fn from_env() -> Result<Self, EngineError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| EngineError::DriverError(anyhow::anyhow!("OPENAI_API_KEY environment variable not set")))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }
}

impl DriverFactory for OpenAiDriverFactory {
    fn tags(&self) -> &HashSet<String> {
        &self.tags
    }

    fn create(&self) -> Arc<dyn Driver> {
        let driver = match &self.api_url {
            Some(url) => OpenAiDriver::with_base_url(self.api_key.clone(), url.clone()),
            None => OpenAiDriver::new(self.api_key.clone()),
        };
        Arc::new(driver)
    }
}
