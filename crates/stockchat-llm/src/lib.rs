//! Chat-model client for stockchat
//!
//! A provider-neutral view of one completion round trip: the transcript
//! ([`Message`]), the functions offered to the model ([`ToolDefinition`]),
//! whether it may call one ([`FunctionCallPolicy`]) and what came back
//! ([`CompletionResponse`]). [`LLMProvider`] is implemented for OpenAI-style
//! endpoints behind the `openai` feature.

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod tools;

#[cfg(feature = "openai")]
pub mod providers;

pub use completion::{
    CompletionRequest, CompletionResponse, FunctionCallPolicy, StopReason, TokenUsage,
};
pub use error::{LLMError, Result};
pub use messages::{ContentBlock, FunctionCall, Message, MessageContent, Role};
pub use provider::LLMProvider;
pub use tools::ToolDefinition;
