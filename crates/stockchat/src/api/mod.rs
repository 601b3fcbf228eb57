//! Market data: the price series type and the providers that fill it

pub mod yahoo;

pub use yahoo::YahooFinanceClient;

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closes for one symbol, ascending by date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, sorting the points by date
    pub fn new(symbol: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    /// An empty series, as returned for unknown symbols
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Vec::new())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Closing prices in date order
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Synthetic series on consecutive days starting 2024-01-02
    #[cfg(test)]
    pub(crate) fn from_closes(symbol: &str, closes: &[f64]) -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let points = closes
            .iter()
            .zip(start.iter_days())
            .map(|(&close, date)| PricePoint { date, close })
            .collect();
        Self::new(symbol, points)
    }
}

/// Source of trailing one-year daily price history
///
/// Every call fetches fresh data; implementations do not cache.
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    /// Daily closes for the last year. Unknown symbols yield an empty series
    /// or a `DataUnavailable` error.
    async fn one_year_daily(&self, symbol: &str) -> Result<PriceSeries>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_sorted_on_construction() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let series = PriceSeries::new(
            "AAPL",
            vec![
                PricePoint { date: d(5), close: 3.0 },
                PricePoint { date: d(1), close: 1.0 },
                PricePoint { date: d(3), close: 2.0 },
            ],
        );

        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.last().map(|p| p.date), Some(d(5)));
        assert_eq!(series.symbol(), "AAPL");
    }

    #[test]
    fn test_empty_series() {
        let series = PriceSeries::empty("ZZZZINVALID");
        assert!(series.is_empty());
        assert_eq!(series.len(), 0);
        assert!(series.last().is_none());
    }

    #[test]
    fn test_from_closes_dates_ascend() {
        let series = PriceSeries::from_closes("T", &[1.0, 2.0, 3.0]);
        let dates: Vec<_> = series.points().iter().map(|p| p.date).collect();
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }
}
