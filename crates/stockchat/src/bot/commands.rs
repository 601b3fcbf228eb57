//! REPL command parsing
//!
//! Lines starting with `/` are commands; anything else is a question for the model.

use crate::error::{Result, StockError};

/// Parsed line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start a fresh session
    Clear,
    /// Print the transcript
    History,
    /// Show help
    Help,
    /// Exit the bot
    Exit,
    /// Natural language query
    Query { text: String },
}

impl Command {
    /// Parse a command from user input
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.is_empty() {
            return Err(StockError::CommandError("Empty input".to_string()));
        }

        let Some(rest) = input.strip_prefix('/') else {
            return Ok(Command::Query {
                text: input.to_string(),
            });
        };

        let Some(cmd) = rest.split_whitespace().next() else {
            return Err(StockError::CommandError("Empty command".to_string()));
        };

        match cmd.to_lowercase().as_str() {
            "clear" | "cls" => Ok(Command::Clear),
            "history" | "hist" => Ok(Command::History),
            "help" | "h" | "?" => Ok(Command::Help),
            "exit" | "quit" | "q" => Ok(Command::Exit),
            other => Err(StockError::CommandError(format!(
                "Unknown command: /{other} (try /help)"
            ))),
        }
    }

    /// Help text for the REPL
    pub fn help_text() -> &'static str {
        r#"
Stock Chat Commands
===================

  /help       Show this help
  /history    Print the conversation so far
  /clear      Start a new conversation
  /exit       Exit (Ctrl-D also works)

Ask anything else in plain language, for example:
  - "What's the latest price of AAPL?"
  - "Calculate the 20-day SMA for MSFT"
  - "What's the RSI of TSLA?"
  - "Show me NVDA's chart"
"#
    }
}
