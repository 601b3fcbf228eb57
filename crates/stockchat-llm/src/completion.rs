//! Completion request and response types

use crate::{Message, ToolDefinition};
use serde::{Deserialize, Serialize};

/// Default completion budget when none is configured
pub const DEFAULT_MAX_TOKENS: usize = 1024;

/// Whether the model may answer with a function call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionCallPolicy {
    /// The model picks between a text answer and at most one function call
    #[default]
    Auto,
    /// The model must answer in text
    None,
}

/// One request to a chat model: the whole transcript plus what it may call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,

    /// Transcript, oldest first
    pub messages: Vec<Message>,

    /// Prepended as a system message; never part of the transcript
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub max_tokens: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Functions offered to the model; empty offers none
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<ToolDefinition>,

    #[serde(default)]
    pub function_call: FunctionCallPolicy,
}

impl CompletionRequest {
    /// Start a request for `model`
    pub fn builder(model: impl Into<String>) -> CompletionRequestBuilder {
        CompletionRequestBuilder {
            request: Self {
                model: model.into(),
                messages: Vec::new(),
                system: None,
                max_tokens: DEFAULT_MAX_TOKENS,
                temperature: None,
                functions: Vec::new(),
                function_call: FunctionCallPolicy::Auto,
            },
        }
    }

    /// Whether the model is allowed to answer with a call
    pub fn allows_function_call(&self) -> bool {
        !self.functions.is_empty() && self.function_call == FunctionCallPolicy::Auto
    }
}

/// The model's answer to a [`CompletionRequest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Assistant message: text, or text plus one function call
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

/// Why generation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    FunctionCall,
}

/// Token counts reported by the provider (zero when not reported)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

/// Fluent construction of a [`CompletionRequest`]
#[derive(Debug, Clone)]
pub struct CompletionRequestBuilder {
    request: CompletionRequest,
}

impl CompletionRequestBuilder {
    /// Replace the transcript
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.request.messages = messages;
        self
    }

    /// Append one message to the transcript
    pub fn add_message(mut self, message: Message) -> Self {
        self.request.messages.push(message);
        self
    }

    pub fn system(self, system: impl Into<String>) -> Self {
        self.maybe_system(Some(system.into()))
    }

    /// Set or clear the system prompt
    pub fn maybe_system(mut self, system: Option<String>) -> Self {
        self.request.system = system;
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.request.max_tokens = max_tokens;
        self
    }

    pub fn temperature(self, temperature: f32) -> Self {
        self.maybe_temperature(Some(temperature))
    }

    /// Set or clear the sampling temperature
    pub fn maybe_temperature(mut self, temperature: Option<f32>) -> Self {
        self.request.temperature = temperature;
        self
    }

    /// Offer these functions to the model
    pub fn functions(mut self, functions: Vec<ToolDefinition>) -> Self {
        self.request.functions = functions;
        self
    }

    pub fn function_call(mut self, policy: FunctionCallPolicy) -> Self {
        self.request.function_call = policy;
        self
    }

    pub fn build(self) -> CompletionRequest {
        self.request
    }
}
