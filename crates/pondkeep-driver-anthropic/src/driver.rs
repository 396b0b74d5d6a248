//! Anthropic driver (concrete C6 implementation)
//!
//! Grounded on the teacher's `AnthropicLlmDriver`
//! (`everruns-core` Claude Messages API client): same reqwest client
//! shape, `x-api-key`/`anthropic-version` headers, and constructors.
//! Narrowed to one non-streaming call per `query` — no SSE parsing, no
//! tool-use content blocks, just the first text block of the response.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use pondkeep_engine::driver::{Driver, DriverFactory, DriverOptions, DriverResponse};
use pondkeep_engine::error::EngineError;

use crate::types::{ContentBlock, Message, MessagesRequest, MessagesResponse};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Clone)]
pub struct AnthropicDriver {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl AnthropicDriver {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Requires the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, EngineError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            EngineError::DriverError(anyhow::anyhow!(
                "ANTHROPIC_API_KEY environment variable not set"
            ))
        })?;
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
impl Driver for AnthropicDriver {
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
            .map(|v| v as u32)
            .unwrap_or(DEFAULT_MAX_TOKENS);
        let model = options
            .params
            .get("model")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.model.clone());
        let system = options
            .params
            .get("system")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let request = MessagesRequest {
            model,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens,
            temperature,
            system,
            stream: false,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::DriverError(anyhow::anyhow!("failed to send request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::DriverError(anyhow::anyhow!(
                "anthropic api error ({status}): {body}"
            )));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            EngineError::DriverError(anyhow::anyhow!("failed to parse response: {e}"))
        })?;

        let content = parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .unwrap_or_default();
        let structured_output = serde_json::from_str::<serde_json::Value>(&content).ok();

        Ok(DriverResponse {
            content,
            structured_output,
        })
    }
}

impl std::fmt::Debug for AnthropicDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicDriver")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Advertises `{"reasoning", "structured", "long-context"}` (spec
/// §4.6.1) — Claude's Messages API is the engine's pick for
/// deliberation-heavy workflows.
pub struct AnthropicDriverFactory {
    api_key: String,
    api_url: Option<String>,
    tags: HashSet<String>,
}

impl AnthropicDriverFactory {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: None,
            tags: ["reasoning", "structured", "long-context"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    pub fn from_env() -> Result<Self, EngineError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            EngineError::DriverError(anyhow::anyhow!(
                "ANTHROPIC_API_KEY environment variable not set"
            ))
        })?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }
}

impl DriverFactory for AnthropicDriverFactory {
    fn tags(&self) -> &HashSet<String> {
        &self.tags
    }

    fn create(&self) -> Arc<dyn Driver> {
        let driver = match &self.api_url {
            Some(url) => AnthropicDriver::with_base_url(self.api_key.clone(), url.clone()),
            None => AnthropicDriver::new(self.api_key.clone()),
        };
        Arc::new(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_debug_redacts_api_key() {
        let driver = AnthropicDriver::new("sk-ant-test-secret");
        assert!(!format!("{driver:?}").contains("sk-ant-test-secret"));
        assert!(format!("{driver:?}").contains("REDACTED"));
    }

    #[test]
    fn factory_advertises_reasoning_structured_long_context_tags() {
        let factory = AnthropicDriverFactory::new("sk-ant-test-secret");
        assert!(factory.tags().contains("reasoning"));
        assert!(factory.tags().contains("structured"));
        assert!(factory.tags().contains("long-context"));
    }

    #[test]
    fn factory_with_base_url_overrides_default_endpoint() {
        let factory = AnthropicDriverFactory::new("sk-ant-test-secret")
            .with_base_url("https://example.test/v1/messages");
        let _driver = factory.create();
    }
}
