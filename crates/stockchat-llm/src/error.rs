//! Failures talking to a chat model

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LLMError>;

#[derive(Error, Debug)]
pub enum LLMError {
    /// The service answered with a status we have no better mapping for
    #[error("completion request failed: {0}")]
    RequestFailed(String),

    #[error("the model service rejected the API key")]
    AuthenticationFailed,

    #[error("rate limited by the model service: {0}")]
    RateLimitExceeded(String),

    #[error("request rejected: {0}")]
    InvalidRequest(String),

    #[error("unknown model '{0}'")]
    ModelNotFound(String),

    #[error("malformed JSON: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "openai")]
    #[error("transport error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The body decoded but did not have the expected shape
    #[error("unexpected reply from the model service: {0}")]
    UnexpectedResponse(String),

    #[error("provider misconfigured: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// Whether retrying the same request later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimitExceeded(_) | Self::RequestFailed(_) => true,
            #[cfg(feature = "openai")]
            Self::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
