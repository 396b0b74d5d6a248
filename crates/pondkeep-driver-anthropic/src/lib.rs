// Anthropic Driver Factory
//
// This crate provides a `DriverFactory`/`Driver` pair backed by
// Anthropic's Messages API, so a registered workflow engine can route
// prompts tagged `"reasoning"`, `"structured"`, or `"long-context"` here.

mod driver;
mod types;

pub use driver::{AnthropicDriver, AnthropicDriverFactory};
