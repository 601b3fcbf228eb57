//! Conversational stock assistant
//!
//! Questions in plain language go to a chat model, which may pick one of six
//! operations over a ticker's trailing year of daily closes:
//!
//! - latest price
//! - simple and exponential moving averages over a chosen window
//! - RSI (14-period)
//! - MACD (12, 26, 9)
//! - a PNG price chart
//!
//! Numeric results are handed back to the model to be narrated; charts are
//! written to disk and reported by path.
//!
//! # Example
//!
//! ```rust,ignore
//! use stockchat::{Session, StockBot, StockConfig};
//! use stockchat_llm::providers::OpenAIProvider;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StockConfig::default();
//!     let provider = Arc::new(OpenAIProvider::new(config.load_api_key()?)?);
//!     let bot = StockBot::new(provider, config)?;
//!
//!     let mut session = Session::new();
//!     let reply = bot.handle_turn(&mut session, "What's the RSI of TSLA?").await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bot;
pub mod config;
pub mod error;
pub mod indicators;
pub mod tools;

pub use api::{PriceHistorySource, PricePoint, PriceSeries, YahooFinanceClient};
pub use bot::{Command, Reply, Session, StockBot, TurnError};
pub use config::StockConfig;
pub use error::{Result, StockError};
pub use indicators::{IndicatorResult, Macd};
pub use tools::{Operation, OperationCall};
