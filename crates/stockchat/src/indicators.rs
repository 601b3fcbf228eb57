//! Technical indicators over a daily close series
//!
//! Every indicator reports its value at the most recent close. Averages are
//! streamed through `ta` indicators; its exponential average is recursive and
//! seeded with the first input, so short series are fine as long as they are
//! non-empty.

use crate::api::PriceSeries;
use crate::error::{Result, StockError};
use std::fmt;
use ta::Next;
use ta::indicators::{ExponentialMovingAverage, SimpleMovingAverage};

/// Smoothing period of the RSI
pub const RSI_PERIOD: usize = 14;

/// EMA span giving the RSI smoothing factor `1 / RSI_PERIOD` (`2 / (span + 1)`)
const RSI_SPAN: usize = 2 * RSI_PERIOD - 1;

/// Fast EMA span of the MACD line
pub const MACD_FAST: usize = 12;

/// Slow EMA span of the MACD line
pub const MACD_SLOW: usize = 26;

/// EMA span of the MACD signal line
pub const MACD_SIGNAL: usize = 9;

/// MACD line, signal line and histogram at the last close
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl fmt::Display for Macd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.line, self.signal, self.histogram)
    }
}

/// Value produced by an indicator, rendered as text before it enters a message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorResult {
    Scalar(f64),
    Macd(Macd),
}

impl fmt::Display for IndicatorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(value) => write!(f, "{value}"),
            Self::Macd(macd) => macd.fmt(f),
        }
    }
}

/// Feed every value through `indicator`, keeping each output
fn stream<I: Next<f64, Output = f64>>(mut indicator: I, values: &[f64]) -> Vec<f64> {
    values.iter().map(|&x| indicator.next(x)).collect()
}

fn ta_error(e: impl fmt::Display) -> StockError {
    StockError::InvalidParameter(e.to_string())
}

/// EMA series for a span, `alpha = 2 / (span + 1)`
pub fn ema_series(values: &[f64], span: usize) -> Result<Vec<f64>> {
    let ema = ExponentialMovingAverage::new(span).map_err(ta_error)?;
    Ok(stream(ema, values))
}

/// Latest close
pub fn price(series: &PriceSeries) -> Result<f64> {
    series
        .last()
        .map(|p| p.close)
        .ok_or_else(|| no_data(series))
}

/// Arithmetic mean of the last `window` closes
pub fn sma(series: &PriceSeries, window: usize) -> Result<f64> {
    let closes = series.closes();
    check_window(series, closes.len(), window)?;

    let sma = SimpleMovingAverage::new(window).map_err(ta_error)?;
    last(series, &stream(sma, &closes))
}

/// Exponential moving average at the last close
pub fn ema(series: &PriceSeries, window: usize) -> Result<f64> {
    let closes = series.closes();
    check_window(series, closes.len(), window)?;

    last(series, &ema_series(&closes, window)?)
}

/// Relative Strength Index with Wilder-style smoothing (`alpha = 1/14`)
///
/// Only gains gives 100, only losses gives 0, a flat series gives 50.
pub fn rsi(series: &PriceSeries) -> Result<f64> {
    let closes = series.closes();
    if closes.len() < 2 {
        return Err(StockError::unavailable(
            series.symbol(),
            format!("RSI needs at least 2 closes, got {}", closes.len()),
        ));
    }

    let mut gains = ExponentialMovingAverage::new(RSI_SPAN).map_err(ta_error)?;
    let mut losses = ExponentialMovingAverage::new(RSI_SPAN).map_err(ta_error)?;
    let (mut avg_gain, mut avg_loss) = (0.0, 0.0);

    for w in closes.windows(2) {
        let change = w[1] - w[0];
        avg_gain = gains.next(change.max(0.0));
        avg_loss = losses.next((-change).max(0.0));
    }

    Ok(rsi_from_averages(avg_gain, avg_loss))
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// MACD(12, 26, 9) at the last close
pub fn macd(series: &PriceSeries) -> Result<Macd> {
    let closes = series.closes();
    if closes.is_empty() {
        return Err(no_data(series));
    }

    let mut fast = ExponentialMovingAverage::new(MACD_FAST).map_err(ta_error)?;
    let mut slow = ExponentialMovingAverage::new(MACD_SLOW).map_err(ta_error)?;
    let mut signal_ema = ExponentialMovingAverage::new(MACD_SIGNAL).map_err(ta_error)?;

    let (mut line, mut signal) = (0.0, 0.0);
    for &close in &closes {
        line = fast.next(close) - slow.next(close);
        signal = signal_ema.next(line);
    }

    Ok(Macd {
        line,
        signal,
        histogram: line - signal,
    })
}

fn last(series: &PriceSeries, values: &[f64]) -> Result<f64> {
    values.last().copied().ok_or_else(|| no_data(series))
}

fn check_window(series: &PriceSeries, len: usize, window: usize) -> Result<()> {
    if window == 0 {
        return Err(StockError::InvalidParameter(
            "window must be at least 1".to_string(),
        ));
    }
    if len == 0 {
        return Err(no_data(series));
    }
    if window > len {
        return Err(StockError::unavailable(
            series.symbol(),
            format!("window of {window} exceeds the {len} available closes"),
        ));
    }
    Ok(())
}

fn no_data(series: &PriceSeries) -> StockError {
    StockError::unavailable(series.symbol(), "no price history")
}
