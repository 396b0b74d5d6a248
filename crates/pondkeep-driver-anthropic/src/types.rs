//! Anthropic Messages API wire types
//!
//! Narrowed from the teacher's `everruns-core::anthropic` request/response
//! shapes (`AnthropicRequest`, `AnthropicContentBlock`, ...) to the
//! single-text-block, non-streaming case this crate's
//! [`crate::driver::AnthropicDriver`] actually sends.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}
