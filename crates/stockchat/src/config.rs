//! Configuration for the stock chat bot

use crate::error::{Result, StockError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the LLM API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the model name
pub const MODEL_ENV: &str = "OPENAI_MODEL";

/// Configuration for the conversation loop, market data and chart output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    /// Chat model used for both routing and narration
    pub model: String,

    /// Maximum tokens per completion
    pub max_tokens: usize,

    /// Sampling temperature, provider default when unset
    pub temperature: Option<f32>,

    /// System prompt prepended to every request
    pub system_prompt: Option<String>,

    /// Where the chart renderer writes its image
    pub chart_path: PathBuf,

    /// File holding the API key when the environment variable is unset
    pub api_key_file: PathBuf,

    /// Request timeout for market data calls
    pub request_timeout: Duration,

    /// Maximum market data requests per minute
    pub market_rate_limit: u32,

    /// Use split/dividend adjusted closes when the provider has them
    pub use_adjusted_close: bool,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 1024,
            temperature: None,
            system_prompt: None,
            chart_path: PathBuf::from("stock.png"),
            api_key_file: PathBuf::from("API_KEY.txt"),
            request_timeout: Duration::from_secs(30),
            market_rate_limit: 60,
            use_adjusted_close: true,
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(StockError::ConfigError("model must not be empty".to_string()));
        }

        if self.max_tokens == 0 {
            return Err(StockError::ConfigError(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(StockError::ConfigError(format!(
                    "temperature must be within 0.0..=2.0, got {t}"
                )));
            }
        }

        if self.market_rate_limit == 0 {
            return Err(StockError::ConfigError(
                "market_rate_limit must be greater than 0".to_string(),
            ));
        }

        let is_png = self
            .chart_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if !is_png {
            return Err(StockError::ConfigError(format!(
                "chart_path must be a .png file, got {}",
                self.chart_path.display()
            )));
        }

        Ok(())
    }

    /// Load the LLM API key
    ///
    /// `OPENAI_API_KEY` wins; otherwise the key file is read and trimmed.
    pub fn load_api_key(&self) -> Result<String> {
        resolve_api_key(std::env::var(API_KEY_ENV).ok(), &self.api_key_file)
    }
}

/// Pick the API key from an environment value or the key file
pub(crate) fn resolve_api_key(env_value: Option<String>, key_file: &Path) -> Result<String> {
    let (key, source) = match env_value {
        Some(value) => (value, API_KEY_ENV.to_string()),
        None => {
            let contents = std::fs::read_to_string(key_file).map_err(|e| {
                StockError::ConfigError(format!(
                    "no API key: {API_KEY_ENV} is not set and {} could not be read ({e})",
                    key_file.display()
                ))
            })?;
            (contents, key_file.display().to_string())
        }
    };

    let key = key.trim().to_string();
    if key.is_empty() {
        return Err(StockError::ConfigError(format!("API key from {source} is empty")));
    }
    if key.chars().any(char::is_whitespace) {
        return Err(StockError::ConfigError(format!(
            "API key from {source} contains whitespace"
        )));
    }

    Ok(key)
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    model: Option<String>,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
    system_prompt: Option<String>,
    chart_path: Option<PathBuf>,
    api_key_file: Option<PathBuf>,
    request_timeout: Option<Duration>,
    market_rate_limit: Option<u32>,
    use_adjusted_close: Option<bool>,
}

impl StockConfigBuilder {
    /// Set the chat model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Read the model from `OPENAI_MODEL` if set
    pub fn model_from_env(mut self) -> Self {
        if let Ok(model) = std::env::var(MODEL_ENV) {
            self.model = Some(model);
        }
        self
    }

    /// Set maximum tokens per completion
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the chart output path
    pub fn chart_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chart_path = Some(path.into());
        self
    }

    /// Set the API key file
    pub fn api_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.api_key_file = Some(path.into());
        self
    }

    /// Set market data request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set market data requests per minute
    pub fn market_rate_limit(mut self, per_minute: u32) -> Self {
        self.market_rate_limit = Some(per_minute);
        self
    }

    /// Choose adjusted or raw closes
    pub fn use_adjusted_close(mut self, adjusted: bool) -> Self {
        self.use_adjusted_close = Some(adjusted);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = StockConfig::default();

        let config = StockConfig {
            model: self.model.unwrap_or(defaults.model),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.or(defaults.temperature),
            system_prompt: self.system_prompt.or(defaults.system_prompt),
            chart_path: self.chart_path.unwrap_or(defaults.chart_path),
            api_key_file: self.api_key_file.unwrap_or(defaults.api_key_file),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            market_rate_limit: self.market_rate_limit.unwrap_or(defaults.market_rate_limit),
            use_adjusted_close: self
                .use_adjusted_close
                .unwrap_or(defaults.use_adjusted_close),
        };

        config.validate()?;
        Ok(config)
    }
}
