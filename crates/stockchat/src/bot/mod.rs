//! Conversation loop
//!
//! One call to [`StockBot::handle_turn`] is one user turn:
//!
//! 1. Append the user's message and ask the model, offering every operation
//! 2. If the model answers in text, that is the reply
//! 3. Otherwise resolve the suggested operation, decode its arguments and run it
//! 4. Append the result; a chart is shown as-is, anything else goes back to the
//!    model once more to be narrated
//!
//! Any failure rolls the session back to just after the user's message, so a
//! half-finished function call never leaks into later turns.
//!
//! # Example
//!
//! ```rust,ignore
//! use stockchat::bot::{Session, StockBot};
//!
//! let bot = StockBot::new(provider, config)?;
//! let mut session = Session::new();
//! let reply = bot.handle_turn(&mut session, "What's the RSI of TSLA?").await?;
//! println!("{reply}");
//! ```

pub mod commands;
pub mod conversation;

pub use commands::Command;
pub use conversation::Session;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use stockchat_llm::{
    CompletionRequest, CompletionResponse, FunctionCall, FunctionCallPolicy, LLMError,
    LLMProvider, Message, ToolDefinition,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{PriceHistorySource, YahooFinanceClient};
use crate::config::StockConfig;
use crate::error::StockError;
use crate::tools::{self, ChartRenderer, Invocation, Operation, OperationCall, OperationExecutor};

/// Why a turn produced no reply
#[derive(Debug, Error)]
pub enum TurnError {
    /// The language model request failed or returned nothing usable
    #[error("LLM request failed: {0}")]
    Upstream(#[from] LLMError),

    /// The model named an operation that does not exist
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// The arguments do not satisfy the operation's schema
    #[error("Invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: String, reason: String },

    /// The operation ran and failed
    #[error("{operation} failed: {source}")]
    InvocationFailed {
        operation: String,
        #[source]
        source: StockError,
    },
}

/// What the user sees at the end of a successful turn
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Text from the model
    Text(String),
    /// A rendered chart
    Chart(PathBuf),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Chart(path) => write!(f, "Chart saved to {}", path.display()),
        }
    }
}

/// Routes user questions through the model to the stock operations
pub struct StockBot {
    provider: Arc<dyn LLMProvider>,
    executor: OperationExecutor,
    definitions: Vec<ToolDefinition>,
    config: StockConfig,
}

impl StockBot {
    /// Create a bot backed by Yahoo Finance
    pub fn new(provider: Arc<dyn LLMProvider>, config: StockConfig) -> crate::Result<Self> {
        let source = Arc::new(YahooFinanceClient::new(&config)?);
        Self::with_source(provider, source, config)
    }

    /// Create a bot with a custom market data source
    pub fn with_source(
        provider: Arc<dyn LLMProvider>,
        source: Arc<dyn PriceHistorySource>,
        config: StockConfig,
    ) -> crate::Result<Self> {
        config.validate()?;

        Ok(Self {
            provider,
            executor: OperationExecutor::new(source, ChartRenderer::new(&config.chart_path)),
            definitions: tools::definitions(),
            config,
        })
    }

    pub fn config(&self) -> &StockConfig {
        &self.config
    }

    /// Name of the underlying LLM provider
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run one user turn against `session`
    pub async fn handle_turn(
        &self,
        session: &mut Session,
        input: &str,
    ) -> Result<Reply, TurnError> {
        session.push(Message::user(input));
        let mark = session.len();

        let outcome = self.run_turn(session).await;
        if let Err(e) = &outcome {
            let retryable = matches!(e, TurnError::Upstream(inner) if inner.is_transient());
            warn!(error = %e, retryable, "Turn failed, rolling back transcript");
            session.rollback_to(mark);
        }
        outcome
    }

    async fn run_turn(&self, session: &mut Session) -> Result<Reply, TurnError> {
        let response = self.complete(session, FunctionCallPolicy::Auto).await?;
        let message = response.message;
        let call = message.function_call_request().cloned();
        let text = message.text().map(str::to_string);
        session.push(message);

        let Some(call) = call else {
            info!("Model answered directly");
            return text
                .map(Reply::Text)
                .ok_or_else(|| LLMError::UnexpectedResponse("empty reply".to_string()).into());
        };

        info!(operation = %call.name, arguments = %call.arguments, "Model requested operation");
        let invocation = self.dispatch(&call).await?;
        session.push(Message::function_result(
            &call.id,
            &call.name,
            invocation.content(),
        ));

        match invocation {
            Invocation::Chart(path) => Ok(Reply::Chart(path)),
            Invocation::Value(_) => {
                let narration = self.narrate(session).await?;
                session.push(Message::assistant(&narration));
                Ok(Reply::Text(narration))
            }
        }
    }

    /// Resolve, decode and invoke a suggested call
    pub async fn dispatch(&self, call: &FunctionCall) -> Result<Invocation, TurnError> {
        let operation = Operation::from_name(&call.name)
            .ok_or_else(|| TurnError::UnknownOperation(call.name.clone()))?;

        let parsed = OperationCall::parse(operation, &call.arguments).map_err(|e| {
            TurnError::InvalidArguments {
                operation: call.name.clone(),
                reason: e.0,
            }
        })?;

        self.executor
            .invoke(&parsed)
            .await
            .map_err(|source| TurnError::InvocationFailed {
                operation: call.name.clone(),
                source,
            })
    }

    /// Ask the model to describe the latest function result in prose
    async fn narrate(&self, session: &Session) -> Result<String, TurnError> {
        let response = self.complete(session, FunctionCallPolicy::None).await?;

        response
            .message
            .text()
            .map(str::to_string)
            .ok_or_else(|| LLMError::UnexpectedResponse("narration had no text".to_string()).into())
    }

    async fn complete(
        &self,
        session: &Session,
        policy: FunctionCallPolicy,
    ) -> Result<CompletionResponse, TurnError> {
        let request = CompletionRequest::builder(&self.config.model)
            .messages(session.messages().to_vec())
            .maybe_system(self.config.system_prompt.clone())
            .max_tokens(self.config.max_tokens)
            .maybe_temperature(self.config.temperature)
            .functions(self.definitions.clone())
            .function_call(policy)
            .build();

        let response = self.provider.complete(request).await?;
        debug!(
            ?policy,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            total_tokens = response.usage.total(),
            "Completion finished"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::technical::tests::FixedSource;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use stockchat_llm::{Role, StopReason, TokenUsage};

    /// Replays canned responses and records every request
    #[derive(Default)]
    struct ScriptedProvider {
        script: Mutex<VecDeque<stockchat_llm::Result<CompletionResponse>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn then_call(self, name: &str, arguments: &str) -> Self {
            let message = Message::function_call(FunctionCall::new("call_1", name, arguments));
            self.push(Ok(response(message, StopReason::FunctionCall)))
        }

        fn then_text(self, text: &str) -> Self {
            self.push(Ok(response(Message::assistant(text), StopReason::EndTurn)))
        }

        fn then_error(self, error: LLMError) -> Self {
            self.push(Err(error))
        }

        fn push(self, item: stockchat_llm::Result<CompletionResponse>) -> Self {
            self.script.lock().unwrap().push_back(item);
            self
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn response(message: Message, stop_reason: StopReason) -> CompletionResponse {
        CompletionResponse {
            message,
            stop_reason,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> stockchat_llm::Result<CompletionResponse> {
            self.requests.lock().unwrap().push(request);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LLMError::RequestFailed("script exhausted".to_string())))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct Harness {
        bot: StockBot,
        provider: Arc<ScriptedProvider>,
        source: Arc<FixedSource>,
        dir: tempfile::TempDir,
    }

    fn harness(provider: ScriptedProvider) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let closes: Vec<f64> = (0..250)
            .map(|i| 200.0 + f64::from(i % 11) - f64::from(i % 7))
            .collect();
        let source = Arc::new(
            FixedSource::default()
                .with("TSLA", &closes)
                .with("NVDA", &closes)
                .with("AAPL", &closes),
        );
        let provider = Arc::new(provider);
        let config = StockConfig {
            chart_path: dir.path().join("stock.png"),
            ..Default::default()
        };

        let bot = StockBot::with_source(provider.clone(), source.clone(), config).unwrap();
        Harness {
            bot,
            provider,
            source,
            dir,
        }
    }

    #[tokio::test]
    async fn test_rsi_turn_is_narrated() {
        let h = harness(
            ScriptedProvider::default()
                .then_call("calculate_RSI", r#"{"ticker": "TSLA"}"#)
                .then_text("TSLA's RSI is neutral."),
        );
        let mut session = Session::new();

        let reply = h
            .bot
            .handle_turn(&mut session, "What's the RSI of TSLA?")
            .await
            .unwrap();
        assert_eq!(reply, Reply::Text("TSLA's RSI is neutral.".to_string()));

        let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Function, Role::Assistant]
        );

        let requests = h.provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].function_call, FunctionCallPolicy::Auto);
        assert_eq!(requests[0].functions.len(), 6);
        assert_eq!(requests[0].messages.len(), 1);

        // Narration sees exactly one new function result, carrying the RSI value
        assert_eq!(requests[1].function_call, FunctionCallPolicy::None);
        assert_eq!(requests[1].messages.len(), 3);
        let (name, content) = requests[1].messages[2].function_output().unwrap();
        assert_eq!(name, "calculate_RSI");
        let rsi: f64 = content.parse().unwrap();
        assert!((0.0..=100.0).contains(&rsi));
        assert_eq!(h.source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_sma_uses_requested_window() {
        let h = harness(
            ScriptedProvider::default()
                .then_call("calculate_SMA", r#"{"ticker": "aapl", "window": 20}"#)
                .then_text("The 20-day SMA is above 200."),
        );
        let mut session = Session::new();

        h.bot
            .handle_turn(&mut session, "20-day SMA for AAPL?")
            .await
            .unwrap();

        let (_, content) = session.messages()[2].function_output().unwrap();
        let closes: Vec<f64> = (0..250)
            .map(|i| 200.0 + f64::from(i % 11) - f64::from(i % 7))
            .collect();
        let expected = closes[230..].iter().sum::<f64>() / 20.0;
        let got: f64 = content.parse().unwrap();
        assert!((got - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_chart_turn_makes_one_request() {
        let h = harness(
            ScriptedProvider::default().then_call("plot_stock_price", r#"{"ticker": "NVDA"}"#),
        );
        let mut session = Session::new();

        let reply = h
            .bot
            .handle_turn(&mut session, "Show me NVDA's chart")
            .await
            .unwrap();

        let path = h.dir.path().join("stock.png");
        assert_eq!(reply, Reply::Chart(path.clone()));
        assert!(path.exists());
        assert_eq!(h.provider.requests().len(), 1);
        assert_eq!(session.len(), 3);
        assert!(reply.to_string().starts_with("Chart saved to "));
    }

    #[tokio::test]
    async fn test_unknown_ticker_keeps_user_message() {
        let h = harness(
            ScriptedProvider::default().then_call("get_stock_price", r#"{"ticker": "ZZZZINVALID"}"#),
        );
        let mut session = Session::new();

        let err = h
            .bot
            .handle_turn(&mut session, "ZZZZINVALID")
            .await
            .unwrap_err();

        match err {
            TurnError::InvocationFailed { operation, source } => {
                assert_eq!(operation, "get_stock_price");
                assert!(source.is_data_unavailable());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(session.len(), 1);
        assert_eq!(session.messages()[0].text(), Some("ZZZZINVALID"));
        assert_eq!(h.provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_operation_never_invokes() {
        let h = harness(ScriptedProvider::default().then_call("buy_stock", r#"{"ticker": "TSLA"}"#));
        let mut session = Session::new();

        let err = h
            .bot
            .handle_turn(&mut session, "Buy TSLA")
            .await
            .unwrap_err();

        assert!(matches!(err, TurnError::UnknownOperation(ref name) if name == "buy_stock"));
        assert_eq!(h.source.fetch_count(), 0);
        assert_eq!(session.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_invoke() {
        let h = harness(
            ScriptedProvider::default().then_call("calculate_SMA", r#"{"ticker": "AAPL"}"#),
        );
        let mut session = Session::new();

        let err = h
            .bot
            .handle_turn(&mut session, "SMA of AAPL")
            .await
            .unwrap_err();

        assert!(matches!(err, TurnError::InvalidArguments { .. }));
        assert!(err.to_string().contains("window"));
        assert_eq!(h.source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let h = harness(ScriptedProvider::default().then_text("Hi! Ask me about a stock."));
        let mut session = Session::new();

        let reply = h.bot.handle_turn(&mut session, "hello").await.unwrap();

        assert_eq!(reply.to_string(), "Hi! Ask me about a stock.");
        assert_eq!(session.len(), 2);
        assert_eq!(h.provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_upstream_failures_roll_back() {
        let h = harness(
            ScriptedProvider::default()
                .then_error(LLMError::RateLimitExceeded("slow down".to_string()))
                .then_call("calculate_MACD", r#"{"ticker": "TSLA"}"#)
                .then_error(LLMError::AuthenticationFailed),
        );
        let mut session = Session::new();

        let first = h.bot.handle_turn(&mut session, "MACD TSLA").await;
        assert!(matches!(first, Err(TurnError::Upstream(LLMError::RateLimitExceeded(_)))));
        assert_eq!(session.len(), 1);

        // Narration fails after the operation ran
        let second = h.bot.handle_turn(&mut session, "MACD TSLA please").await;
        assert!(matches!(second, Err(TurnError::Upstream(LLMError::AuthenticationFailed))));
        assert_eq!(session.len(), 2);
        assert!(session.messages().iter().all(|m| m.role == Role::User));
    }

    #[tokio::test]
    async fn test_transcript_and_system_prompt_carry_over() {
        let provider = ScriptedProvider::default()
            .then_text("Sure.")
            .then_call("calculate_EMA", r#"{"ticker": "TSLA", "window": 10}"#)
            .then_text("The 10-day EMA is about 200.");
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(provider);
        let source = Arc::new(FixedSource::default().with("TSLA", &[200.0; 30]));
        let config = StockConfig {
            chart_path: dir.path().join("stock.png"),
            system_prompt: Some("You are a stock assistant.".to_string()),
            ..Default::default()
        };
        let bot = StockBot::with_source(provider.clone(), source, config).unwrap();
        let mut session = Session::new();

        bot.handle_turn(&mut session, "hi").await.unwrap();
        bot.handle_turn(&mut session, "EMA 10 of TSLA").await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].messages.len(), 3);
        assert!(
            requests
                .iter()
                .all(|r| r.system.as_deref() == Some("You are a stock assistant."))
        );
        assert_eq!(session.len(), 6);
        let (name, content) = session.messages()[4].function_output().unwrap();
        assert_eq!(name, "calculate_EMA");
        assert!((content.parse::<f64>().unwrap() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StockConfig {
            max_tokens: 0,
            ..Default::default()
        };
        let result = StockBot::with_source(
            Arc::new(ScriptedProvider::default()),
            Arc::new(FixedSource::default()),
            config,
        );
        assert!(result.is_err());
    }
}
