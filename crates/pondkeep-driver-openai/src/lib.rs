// OpenAI Driver Factory
//
// This crate provides a `DriverFactory`/`Driver` pair backed by OpenAI's
// chat completion API, so a registered workflow engine can route prompts
// tagged `"fast"` or `"structured"` here.

mod driver;
mod types;

pub use driver::{OpenAiDriver, OpenAiDriverFactory};
