//! Indicator operations backed by fresh market data

use std::sync::Arc;
use tracing::debug;

use crate::api::{PriceHistorySource, PriceSeries};
use crate::error::{Result, StockError};
use crate::indicators::{self, IndicatorResult};

/// Computes indicators over the trailing year of daily closes
///
/// Every call fetches the series again; nothing is cached between calls.
#[derive(Clone)]
pub struct TechnicalIndicators {
    source: Arc<dyn PriceHistorySource>,
}

impl TechnicalIndicators {
    pub fn new(source: Arc<dyn PriceHistorySource>) -> Self {
        Self { source }
    }

    /// Latest closing price
    pub async fn price(&self, ticker: &str) -> Result<IndicatorResult> {
        let series = self.fetch(ticker).await?;
        indicators::price(&series).map(IndicatorResult::Scalar)
    }

    /// Simple moving average over `window` trading days
    pub async fn sma(&self, ticker: &str, window: usize) -> Result<IndicatorResult> {
        let series = self.fetch(ticker).await?;
        indicators::sma(&series, window).map(IndicatorResult::Scalar)
    }

    /// Exponential moving average with span `window`
    pub async fn ema(&self, ticker: &str, window: usize) -> Result<IndicatorResult> {
        let series = self.fetch(ticker).await?;
        indicators::ema(&series, window).map(IndicatorResult::Scalar)
    }

    pub async fn rsi(&self, ticker: &str) -> Result<IndicatorResult> {
        let series = self.fetch(ticker).await?;
        indicators::rsi(&series).map(IndicatorResult::Scalar)
    }

    pub async fn macd(&self, ticker: &str) -> Result<IndicatorResult> {
        let series = self.fetch(ticker).await?;
        indicators::macd(&series).map(IndicatorResult::Macd)
    }

    /// One year of closes, failing when there are none
    pub async fn fetch(&self, ticker: &str) -> Result<PriceSeries> {
        let series = self.source.one_year_daily(ticker).await?;
        debug!(ticker, points = series.len(), "Fetched price history");

        if series.is_empty() {
            return Err(StockError::unavailable(ticker, "no price history returned"));
        }
        Ok(series)
    }
}

impl std::fmt::Debug for TechnicalIndicators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TechnicalIndicators").finish_non_exhaustive()
    }
}
