//! OpenAI chat completions provider
//!
//! Speaks `POST {api_base}/chat/completions` using the `tools` form of function
//! calling. Any OpenAI-compatible server (vLLM, llama.cpp, LM Studio) works by
//! pointing `api_base` at it.
//!
//! ```no_run
//! use stockchat_llm::{CompletionRequest, LLMProvider, Message};
//! use stockchat_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! # async fn run() -> stockchat_llm::Result<()> {
//! let provider = OpenAIProvider::with_config(
//!     OpenAIConfig::new("sk-...").with_api_base("http://localhost:8000/v1"),
//! )?;
//!
//! let request = CompletionRequest::builder("gpt-3.5-turbo")
//!     .add_message(Message::user("Hello!"))
//!     .build();
//! let response = provider.complete(request).await?;
//! println!("{}", response.message.text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, FunctionCall, FunctionCallPolicy,
    LLMError, LLMProvider, Message, MessageContent, Result, Role, StopReason, TokenUsage,
    ToolDefinition,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,

    /// Base URL without a trailing slash
    pub api_base: String,

    pub timeout: Duration,

    /// Models the endpoint accepts; empty accepts any
    pub supported_models: Vec<String>,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            supported_models: Vec::new(),
        }
    }

    /// Read `OPENAI_API_KEY` and, if present, `OPENAI_API_BASE`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            LLMError::ConfigurationError("OPENAI_API_KEY is not set".to_string())
        })?;

        let config = Self::new(api_key);
        Ok(match std::env::var("OPENAI_API_BASE") {
            Ok(base) => config.with_api_base(base),
            Err(_) => config,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject requests for models outside this list
    pub fn with_supported_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_models = models.into_iter().map(Into::into).collect();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

/// [`LLMProvider`] for OpenAI-compatible chat completions
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Build a provider, failing fast on an empty key
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LLMError::ConfigurationError(
                "OpenAI API key is empty".to_string(),
            ));
        }

        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    pub fn from_env() -> Result<Self> {
        Self::with_config(OpenAIConfig::from_env()?)
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn check_model(&self, model: &str) -> Result<()> {
        let supported = &self.config.supported_models;
        if supported.is_empty() || supported.iter().any(|m| m == model) {
            Ok(())
        } else {
            Err(LLMError::InvalidRequest(format!(
                "model '{model}' is not one of {supported:?}"
            )))
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip_all, fields(model = %request.model, policy = ?request.function_call))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.check_model(&request.model)?;

        let body = WireRequest::from(request);
        debug!(messages = body.messages.len(), url = %self.config.completions_url(), "Sending completion request");

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(status_error(status, detail, body.model));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| LLMError::UnexpectedResponse(format!("undecodable body: {e}")))?;

        into_completion(wire)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn status_error(status: StatusCode, detail: String, model: String) -> LLMError {
    match status {
        StatusCode::UNAUTHORIZED => LLMError::AuthenticationFailed,
        StatusCode::TOO_MANY_REQUESTS => LLMError::RateLimitExceeded(detail),
        StatusCode::BAD_REQUEST => LLMError::InvalidRequest(detail),
        StatusCode::NOT_FOUND => LLMError::ModelNotFound(model),
        _ => LLMError::RequestFailed(format!("HTTP {status}: {detail}")),
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireReply,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireReply {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

// ============================================================================
// Conversion
// ============================================================================

impl From<CompletionRequest> for WireRequest {
    fn from(request: CompletionRequest) -> Self {
        let tools: Vec<WireTool> = request.functions.iter().map(wire_tool).collect();

        // Narration keeps the functions visible but forbids calling them
        let (tool_choice, parallel_tool_calls) = match (tools.is_empty(), request.function_call) {
            (true, _) => (None, None),
            (false, FunctionCallPolicy::Auto) => (Some("auto"), Some(false)),
            (false, FunctionCallPolicy::None) => (Some("none"), None),
        };

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system {
            messages.push(WireMessage::text("system", system));
        }
        for message in request.messages {
            push_wire_messages(message, &mut messages);
        }

        Self {
            model: request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools,
            tool_choice,
            parallel_tool_calls,
        }
    }
}

impl WireMessage {
    fn text(role: &'static str, text: String) -> Self {
        Self {
            role,
            content: Some(text),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

fn wire_tool(definition: &ToolDefinition) -> WireTool {
    WireTool {
        kind: "function",
        function: WireFunction {
            name: definition.name.clone(),
            description: definition.description.clone(),
            parameters: definition.input_schema.clone(),
        },
    }
}

/// Append the wire form of one transcript message
///
/// Function results travel as `tool` messages keyed by call id. Text and calls
/// in an assistant message share one wire message, with null content when
/// there is no text.
fn push_wire_messages(message: Message, out: &mut Vec<WireMessage>) {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Function => "tool",
    };

    let blocks = match message.content {
        Some(MessageContent::Blocks(blocks)) => blocks,
        Some(MessageContent::Text(text)) => {
            out.push(WireMessage::text(role, text));
            return;
        }
        None => {
            out.push(WireMessage::text(role, String::new()));
            return;
        }
    };

    let mut text: Vec<String> = Vec::new();
    let mut calls = Vec::new();
    let mut results = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text: t } => text.push(t),
            ContentBlock::FunctionCall(FunctionCall {
                id,
                name,
                arguments,
            }) => calls.push(WireToolCall {
                id,
                kind: function_kind(),
                function: WireCall { name, arguments },
            }),
            ContentBlock::FunctionResult {
                call_id, content, ..
            } => results.push(WireMessage {
                role: "tool",
                content: Some(content),
                tool_calls: Vec::new(),
                tool_call_id: Some(call_id),
            }),
        }
    }

    if !text.is_empty() || !calls.is_empty() {
        out.push(WireMessage {
            role,
            content: (!text.is_empty()).then(|| text.join("\n")),
            tool_calls: calls,
            tool_call_id: None,
        });
    }
    out.extend(results);
}

fn into_completion(wire: WireResponse) -> Result<CompletionResponse> {
    let choice = wire
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::UnexpectedResponse("response had no choices".to_string()))?;

    let usage = TokenUsage {
        input_tokens: wire.usage.prompt_tokens,
        output_tokens: wire.usage.completion_tokens,
    };
    let stop_reason = stop_reason(choice.finish_reason.as_deref().unwrap_or("stop"));

    debug!(?stop_reason, total_tokens = usage.total(), "Completion received");

    Ok(CompletionResponse {
        message: assistant_message(choice.message),
        stop_reason,
        usage,
    })
}

/// Assistant message from the wire reply, keeping at most one call
///
/// Argument text is passed through undecoded.
fn assistant_message(reply: WireReply) -> Message {
    let mut blocks = Vec::with_capacity(2);

    if let Some(text) = reply.content.filter(|t| !t.is_empty()) {
        blocks.push(ContentBlock::Text { text });
    }

    if reply.tool_calls.len() > 1 {
        warn!(
            count = reply.tool_calls.len(),
            "Model returned several tool calls, keeping the first"
        );
    }
    if let Some(call) = reply.tool_calls.into_iter().next() {
        blocks.push(ContentBlock::FunctionCall(FunctionCall::new(
            call.id,
            call.function.name,
            call.function.arguments,
        )));
    }

    Message {
        role: Role::Assistant,
        content: Some(MessageContent::Blocks(blocks)),
    }
}

fn stop_reason(finish_reason: &str) -> StopReason {
    match finish_reason {
        "length" => StopReason::MaxTokens,
        "tool_calls" | "function_call" => StopReason::FunctionCall,
        "stop" => StopReason::EndTurn,
        other => {
            debug!(finish_reason = other, "Treating finish reason as end of turn");
            StopReason::EndTurn
        }
    }
}
