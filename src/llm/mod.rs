pub mod analyzer;
pub mod client;

pub use client::{ChatMessage, LlmClient, OpenRouterClient};
