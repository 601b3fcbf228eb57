//! The seam between the bot and a concrete chat service

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// A chat model that can answer in text or suggest one function call
///
/// One call to [`complete`](LLMProvider::complete) is one round trip; the
/// caller owns the transcript and resends it in full each time.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short identifier used in logs
    fn name(&self) -> &str;
}
