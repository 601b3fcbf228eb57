//! Errors from market data, indicators, charts and configuration

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StockError {
    /// The market data service answered, but not with usable data
    #[error("market data API error: {0}")]
    ApiError(String),

    /// No prices exist for the symbol, or too few for the computation
    #[error("no data for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("invalid indicator parameter: {0}")]
    InvalidParameter(String),

    #[error("chart rendering failed: {0}")]
    ChartError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    CommandError(String),
}

impl StockError {
    pub fn unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, Self::DataUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, StockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable() {
        let err = StockError::unavailable("ZZZZINVALID", "empty price history");
        assert_eq!(err.to_string(), "no data for ZZZZINVALID: empty price history");
        assert!(err.is_data_unavailable());
    }

    #[test]
    fn test_other_kinds_are_not_unavailable() {
        let err = StockError::ConfigError("missing key".to_string());
        assert!(!err.is_data_unavailable());
        assert_eq!(err.to_string(), "configuration error: missing key");
        assert!(!StockError::ApiError("timed out".into()).is_data_unavailable());
    }
}
