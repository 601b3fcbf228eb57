//! Executes validated operation calls

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

use super::{ChartRenderer, OperationCall, TechnicalIndicators};
use crate::api::PriceHistorySource;
use crate::error::Result;
use crate::indicators::IndicatorResult;

/// Outcome of one operation
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// A number to narrate
    Value(IndicatorResult),
    /// A chart written to disk
    Chart(PathBuf),
}

impl Invocation {
    /// Text recorded as the function result in the transcript
    pub fn content(&self) -> String {
        match self {
            Self::Value(value) => value.to_string(),
            Self::Chart(path) => format!("Chart saved to {}", path.display()),
        }
    }
}

/// Runs operation calls against market data and the chart renderer
#[derive(Debug, Clone)]
pub struct OperationExecutor {
    indicators: TechnicalIndicators,
    chart: ChartRenderer,
}

impl OperationExecutor {
    pub fn new(source: Arc<dyn PriceHistorySource>, chart: ChartRenderer) -> Self {
        Self {
            indicators: TechnicalIndicators::new(source),
            chart,
        }
    }

    /// Invoke one call
    #[instrument(skip(self), fields(operation = %call.operation(), ticker = call.ticker()))]
    pub async fn invoke(&self, call: &OperationCall) -> Result<Invocation> {
        let outcome = match call {
            OperationCall::Price { ticker } => Invocation::Value(self.indicators.price(ticker).await?),
            OperationCall::Sma { ticker, window } => {
                Invocation::Value(self.indicators.sma(ticker, *window as usize).await?)
            }
            OperationCall::Ema { ticker, window } => {
                Invocation::Value(self.indicators.ema(ticker, *window as usize).await?)
            }
            OperationCall::Rsi { ticker } => Invocation::Value(self.indicators.rsi(ticker).await?),
            OperationCall::Macd { ticker } => Invocation::Value(self.indicators.macd(ticker).await?),
            OperationCall::Chart { ticker } => {
                let series = self.indicators.fetch(ticker).await?;
                Invocation::Chart(self.chart.render(&series)?)
            }
        };

        info!(result = %outcome.content(), "Operation completed");
        Ok(outcome)
    }
}
