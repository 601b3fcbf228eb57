//! Operations the model may call, with their schemas and typed arguments

pub mod chart;
pub mod executor;
pub mod technical;

pub use chart::ChartRenderer;
pub use executor::{Invocation, OperationExecutor};
pub use technical::TechnicalIndicators;

use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt;
use stockchat_llm::ToolDefinition;
use stockchat_llm::tools::schema;
use thiserror::Error;

/// The closed set of callable operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Price,
    Sma,
    Ema,
    Rsi,
    Macd,
    Chart,
}

impl Operation {
    /// Every operation, in the order presented to the model
    pub const ALL: [Operation; 6] = [
        Operation::Price,
        Operation::Sma,
        Operation::Ema,
        Operation::Rsi,
        Operation::Macd,
        Operation::Chart,
    ];

    /// Wire name used in function calls
    pub fn name(self) -> &'static str {
        match self {
            Self::Price => "get_stock_price",
            Self::Sma => "calculate_SMA",
            Self::Ema => "calculate_EMA",
            Self::Rsi => "calculate_RSI",
            Self::Macd => "calculate_MACD",
            Self::Chart => "plot_stock_price",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Price => "Gets the latest stock price given the ticker symbol of a company",
            Self::Sma => "Calculate Simple Moving Average",
            Self::Ema => "Calculate Exponential Moving Average",
            Self::Rsi => "Calculate RSI (Relative Strength Index)",
            Self::Macd => "Calculate MACD indicator",
            Self::Chart => "Plot stock price over the past year",
        }
    }

    /// Resolve a wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Whether the operation takes a `window` argument
    pub fn takes_window(self) -> bool {
        matches!(self, Self::Sma | Self::Ema)
    }

    /// Schema handed to the model
    pub fn definition(self) -> ToolDefinition {
        let ticker = match self {
            Self::Price => schema::string("Stock ticker symbol (e.g., AAPL)"),
            _ => schema::bare("string"),
        };

        let parameters = if self.takes_window() {
            schema::object(
                json!({ "ticker": ticker, "window": schema::bare("integer") }),
                vec!["ticker", "window"],
            )
        } else {
            schema::object(json!({ "ticker": ticker }), vec!["ticker"])
        };

        ToolDefinition::new(self.name(), self.description(), parameters)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Schemas for every operation
pub fn definitions() -> Vec<ToolDefinition> {
    Operation::ALL.into_iter().map(Operation::definition).collect()
}

/// Argument text that does not satisfy an operation's schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ArgumentError(pub String);

/// A resolved operation with validated arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationCall {
    Price { ticker: String },
    Sma { ticker: String, window: u32 },
    Ema { ticker: String, window: u32 },
    Rsi { ticker: String },
    Macd { ticker: String },
    Chart { ticker: String },
}

#[derive(Debug, Deserialize)]
struct RawArguments {
    ticker: Option<Value>,
    window: Option<Value>,
}

impl OperationCall {
    /// Decode the model's raw argument text for `operation`
    ///
    /// The ticker is trimmed and upper-cased. Windows may arrive as integers,
    /// integral floats or numeric strings, and must be at least 1.
    pub fn parse(operation: Operation, raw: &str) -> Result<Self, ArgumentError> {
        let raw = if raw.trim().is_empty() { "{}" } else { raw };
        let args: RawArguments = serde_json::from_str(raw)
            .map_err(|e| ArgumentError(format!("arguments are not a JSON object: {e}")))?;

        let ticker = parse_ticker(args.ticker)?;
        let window = if operation.takes_window() {
            parse_window(args.window)?
        } else {
            0
        };

        Ok(match operation {
            Operation::Price => Self::Price { ticker },
            Operation::Sma => Self::Sma { ticker, window },
            Operation::Ema => Self::Ema { ticker, window },
            Operation::Rsi => Self::Rsi { ticker },
            Operation::Macd => Self::Macd { ticker },
            Operation::Chart => Self::Chart { ticker },
        })
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Price { .. } => Operation::Price,
            Self::Sma { .. } => Operation::Sma,
            Self::Ema { .. } => Operation::Ema,
            Self::Rsi { .. } => Operation::Rsi,
            Self::Macd { .. } => Operation::Macd,
            Self::Chart { .. } => Operation::Chart,
        }
    }

    pub fn ticker(&self) -> &str {
        match self {
            Self::Price { ticker }
            | Self::Sma { ticker, .. }
            | Self::Ema { ticker, .. }
            | Self::Rsi { ticker }
            | Self::Macd { ticker }
            | Self::Chart { ticker } => ticker,
        }
    }
}

fn parse_ticker(value: Option<Value>) -> Result<String, ArgumentError> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_uppercase()),
        Some(Value::String(_)) => Err(ArgumentError("ticker must not be empty".to_string())),
        Some(other) => Err(ArgumentError(format!(
            "ticker must be a string, got {other}"
        ))),
        None => Err(ArgumentError("missing required argument: ticker".to_string())),
    }
}

fn parse_window(value: Option<Value>) -> Result<u32, ArgumentError> {
    let invalid = |shown: &dyn fmt::Display| {
        ArgumentError(format!("window must be a positive integer, got {shown}"))
    };

    let window = match value {
        None => return Err(ArgumentError("missing required argument: window".to_string())),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e12 => f as i64,
            _ => return Err(invalid(&n)),
        },
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid(&s))?,
        Some(other) => return Err(invalid(&other)),
    };

    u32::try_from(window)
        .ok()
        .filter(|w| *w > 0)
        .ok_or_else(|| invalid(&window))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
        assert_eq!(Operation::from_name("calculate_sma"), None);
        assert_eq!(Operation::from_name("buy_stock"), None);
    }

    #[test]
    fn test_definitions() {
        let defs = definitions();
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "get_stock_price",
                "calculate_SMA",
                "calculate_EMA",
                "calculate_RSI",
                "calculate_MACD",
                "plot_stock_price",
            ]
        );

        assert_eq!(defs[1].required_parameters(), vec!["ticker", "window"]);
        assert_eq!(defs[3].required_parameters(), vec!["ticker"]);
        assert_eq!(
            defs[0].input_schema["properties"]["ticker"]["description"],
            "Stock ticker symbol (e.g., AAPL)"
        );
        assert_eq!(defs[2].input_schema["properties"]["window"]["type"], "integer");
    }

    #[test]
    fn test_parse_ticker_only() {
        let call = OperationCall::parse(Operation::Rsi, r#"{"ticker": " tsla "}"#).unwrap();
        assert_eq!(
            call,
            OperationCall::Rsi {
                ticker: "TSLA".to_string()
            }
        );
        assert_eq!(call.operation(), Operation::Rsi);
        assert_eq!(call.ticker(), "TSLA");
    }

    #[test]
    fn test_parse_window_forms() {
        for raw in [
            r#"{"ticker": "AAPL", "window": 20}"#,
            r#"{"ticker": "AAPL", "window": 20.0}"#,
            r#"{"ticker": "AAPL", "window": "20"}"#,
        ] {
            let call = OperationCall::parse(Operation::Sma, raw).unwrap();
            assert_eq!(
                call,
                OperationCall::Sma {
                    ticker: "AAPL".to_string(),
                    window: 20
                },
                "{raw}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_bad_windows() {
        for raw in [
            r#"{"ticker": "AAPL"}"#,
            r#"{"ticker": "AAPL", "window": 0}"#,
            r#"{"ticker": "AAPL", "window": -5}"#,
            r#"{"ticker": "AAPL", "window": 2.5}"#,
            r#"{"ticker": "AAPL", "window": "twenty"}"#,
            r#"{"ticker": "AAPL", "window": [20]}"#,
        ] {
            assert!(OperationCall::parse(Operation::Ema, raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_parse_rejects_bad_tickers() {
        assert!(OperationCall::parse(Operation::Price, "{}").is_err());
        assert!(OperationCall::parse(Operation::Price, "").is_err());
        assert!(OperationCall::parse(Operation::Price, r#"{"ticker": ""}"#).is_err());
        assert!(OperationCall::parse(Operation::Price, r#"{"ticker": 42}"#).is_err());
        assert!(OperationCall::parse(Operation::Price, "not json").is_err());
    }

    #[test]
    fn test_window_ignored_where_not_taken() {
        let call =
            OperationCall::parse(Operation::Macd, r#"{"ticker": "MSFT", "window": 0}"#).unwrap();
        assert_eq!(call.operation(), Operation::Macd);
    }
}
