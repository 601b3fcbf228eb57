//! Yahoo Finance daily history

use crate::api::{PriceHistorySource, PricePoint, PriceSeries};
use crate::config::StockConfig;
use crate::error::{Result, StockError};
use async_trait::async_trait;
use chrono::DateTime;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Yahoo Finance client for daily closes
#[derive(Debug, Clone)]
pub struct YahooFinanceClient {
    rate_limiter: SharedRateLimiter,
    timeout: Duration,
    use_adjusted_close: bool,
}

/// One daily bar as Yahoo reports it, before the exchange offset is applied
#[derive(Debug, Clone, Copy, PartialEq)]
struct DailyBar {
    timestamp: i64,
    close: f64,
    adjclose: f64,
}

impl YahooFinanceClient {
    /// Create a client using the timeout, rate limit and close preference from `config`
    pub fn new(config: &StockConfig) -> Result<Self> {
        let per_minute = NonZeroU32::new(config.market_rate_limit).ok_or_else(|| {
            StockError::ConfigError("market_rate_limit must be greater than 0".to_string())
        })?;

        Ok(Self {
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
            timeout: config.request_timeout,
            use_adjusted_close: config.use_adjusted_close,
        })
    }

    /// Daily history for a symbol over a Yahoo range such as "1mo" or "1y"
    #[instrument(skip(self))]
    pub async fn get_history(&self, symbol: &str, range: &str) -> Result<PriceSeries> {
        let symbol = normalize_symbol(symbol)?;

        self.rate_limiter.until_ready().await;

        let provider = yahoo::YahooConnector::new()
            .map_err(|e| StockError::ApiError(format!("Yahoo Finance connector: {e}")))?;

        let response = tokio::time::timeout(
            self.timeout,
            provider.get_quote_range(&symbol, "1d", range),
        )
        .await
        .map_err(|_| {
            StockError::ApiError(format!("Yahoo Finance timed out after {:?}", self.timeout))
        })?
        .map_err(|e| StockError::unavailable(&symbol, e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| StockError::unavailable(&symbol, e.to_string()))?;
        let gmtoffset = response
            .metadata()
            .map(|meta| i64::from(meta.gmtoffset))
            .unwrap_or(0);
        debug!(quotes = quotes.len(), gmtoffset, "Yahoo quotes received");

        let bars: Vec<DailyBar> = quotes
            .iter()
            .filter_map(|q| {
                Some(DailyBar {
                    timestamp: i64::try_from(q.timestamp).ok()?,
                    close: q.close,
                    adjclose: q.adjclose,
                })
            })
            .collect();

        Ok(series_from_bars(
            &symbol,
            &bars,
            gmtoffset,
            self.use_adjusted_close,
        ))
    }
}

#[async_trait]
impl PriceHistorySource for YahooFinanceClient {
    async fn one_year_daily(&self, symbol: &str) -> Result<PriceSeries> {
        self.get_history(symbol, "1y").await
    }
}

/// Trim and upper-case a ticker
///
/// A ticker with characters Yahoo never uses cannot have data, so it is
/// reported as unavailable without a request.
pub fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim().to_uppercase();

    let valid = !symbol.is_empty()
        && symbol.len() <= 20
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));

    if valid {
        Ok(symbol)
    } else {
        Err(StockError::unavailable(symbol, "invalid ticker symbol"))
    }
}

/// Turn daily bars into a series
///
/// Non-finite closes are dropped, timestamps are shifted into exchange-local
/// dates, and a repeated date keeps its latest close. Adjusted closes are used
/// when asked for and usable, raw closes otherwise.
fn series_from_bars(
    symbol: &str,
    bars: &[DailyBar],
    gmtoffset: i64,
    use_adjusted_close: bool,
) -> PriceSeries {
    let mut points: Vec<PricePoint> = Vec::with_capacity(bars.len());

    for bar in bars {
        let close = if use_adjusted_close && bar.adjclose.is_finite() && bar.adjclose > 0.0 {
            bar.adjclose
        } else {
            bar.close
        };
        if !close.is_finite() {
            continue;
        }

        let Some(date) = bar
            .timestamp
            .checked_add(gmtoffset)
            .and_then(|local| DateTime::from_timestamp(local, 0))
            .map(|dt| dt.date_naive())
        else {
            continue;
        };

        match points.last_mut() {
            Some(last) if last.date == date => last.close = close,
            _ => points.push(PricePoint { date, close }),
        }
    }

    PriceSeries::new(symbol, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(timestamp: i64, close: f64, adjclose: f64) -> DailyBar {
        DailyBar {
            timestamp,
            close,
            adjclose,
        }
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("brk-b").unwrap(), "BRK-B");
        assert_eq!(normalize_symbol("^gspc").unwrap(), "^GSPC");
    }

    #[test]
    fn test_malformed_symbols_are_unavailable() {
        for bad in ["", "ZZZZ INVALID", "../etc", "ABCDEFGHIJKLMNOPQRSTUVWXYZ"] {
            let err = normalize_symbol(bad).unwrap_err();
            assert!(err.is_data_unavailable(), "{bad:?} gave {err}");
        }
    }

    #[test]
    fn test_prefers_adjusted_close_and_shifts_dates() {
        let bars = [
            bar(1_704_205_800, 185.6, 184.9),
            bar(1_704_292_200, 184.2, 183.5),
            bar(1_704_378_600, 181.9, 181.2),
        ];

        let series = series_from_bars("AAPL", &bars, -14_400, true);
        assert_eq!(series.closes(), vec![184.9, 183.5, 181.2]);
        assert_eq!(
            series.points()[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
    }

    #[test]
    fn test_raw_close_and_non_finite_points() {
        let bars = [
            bar(1_704_205_800, 10.0, 9.0),
            bar(1_704_292_200, f64::NAN, 9.5),
            bar(1_704_378_600, 12.0, 11.0),
        ];

        let series = series_from_bars("X", &bars, 0, false);
        assert_eq!(series.closes(), vec![10.0, 12.0]);
    }

    #[test]
    fn test_unusable_adjusted_close_falls_back_to_close() {
        let bars = [bar(1_704_205_800, 10.0, f64::NAN), bar(1_704_292_200, 11.0, 0.0)];
        let series = series_from_bars("X", &bars, 0, true);
        assert_eq!(series.closes(), vec![10.0, 11.0]);
    }

    #[test]
    fn test_repeated_date_keeps_latest() {
        let bars = [bar(1_704_205_800, 10.0, 10.0), bar(1_704_220_000, 10.5, 10.5)];
        let series = series_from_bars("X", &bars, 0, true);
        assert_eq!(series.closes(), vec![10.5]);
    }

    #[test]
    fn test_overflowing_offset_skips_point() {
        let bars = [bar(i64::MAX - 10, 5.0, 5.0), bar(1_704_205_800, 6.0, 6.0)];

        let series = series_from_bars("X", &bars, 3_600, true);
        assert_eq!(series.closes(), vec![6.0]);

        let series = series_from_bars("X", &bars[..1], i64::MAX, true);
        assert!(series.is_empty());
    }

    #[test]
    fn test_no_bars_is_empty() {
        assert!(series_from_bars("X", &[], 0, true).is_empty());
    }

    #[test]
    fn test_client_rejects_zero_rate_limit() {
        let config = StockConfig {
            market_rate_limit: 0,
            ..Default::default()
        };
        assert!(matches!(
            YahooFinanceClient::new(&config),
            Err(StockError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_symbol_fails_before_fetching() {
        let client = YahooFinanceClient::new(&StockConfig::default()).unwrap();
        let err = client.one_year_daily("ZZZZ INVALID").await.unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_one_year_daily() {
        let client = YahooFinanceClient::new(&StockConfig::default()).unwrap();
        let series = client.one_year_daily("AAPL").await.unwrap();

        assert!(series.len() > 200);
        assert!(series.last().unwrap().close > 0.0);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_unknown_symbol_is_unavailable() {
        let client = YahooFinanceClient::new(&StockConfig::default()).unwrap();
        match client.one_year_daily("ZZZZINVALID").await {
            Ok(series) => assert!(series.is_empty()),
            Err(e) => assert!(e.is_data_unavailable()),
        }
    }
}
