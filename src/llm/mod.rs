//! LLM client used by the Code and Content agents.

mod factory;
mod openai;
mod provider;

pub use factory::LlmClientFactory;
pub use openai::OpenAiProvider;
pub use provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};
