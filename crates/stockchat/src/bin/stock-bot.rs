//! Stock chat REPL
//!
//! # Usage
//!
//! ```bash
//! export OPENAI_API_KEY="sk-..."   # or put the key in API_KEY.txt
//! cargo run --bin stock-bot -p stockchat
//! ```

use anyhow::Context as _;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use stockchat::bot::{Command, Session, StockBot};
use stockchat::config::StockConfig;
use stockchat_llm::providers::{OpenAIConfig, OpenAIProvider};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PROMPT: &str = ">>> ";

#[derive(Parser, Debug)]
#[command(name = "stock-bot")]
#[command(about = "Ask questions about stocks; the model picks the indicator", long_about = None)]
struct Args {
    /// Chat model (overrides OPENAI_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// OpenAI-compatible API base URL (overrides OPENAI_API_BASE)
    #[arg(long)]
    api_base: Option<String>,

    /// File to read the API key from when OPENAI_API_KEY is unset
    #[arg(long, default_value = "API_KEY.txt")]
    key_file: PathBuf,

    /// Where to write chart images
    #[arg(long, default_value = "stock.png")]
    chart_path: PathBuf,

    /// System prompt sent with every request
    #[arg(long)]
    system_prompt: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,stockchat=debug,stockchat_llm=debug"
    } else {
        "warn,stockchat=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn print_banner(config: &StockConfig) {
    println!(
        r#"
╔══════════════════════════════════════════════════════════════╗
║                      Stock Chat Assistant                    ║
║                                                              ║
║  Ask about price, SMA, EMA, RSI, MACD or a one-year chart.   ║
║  Commands: /help  /history  /clear  /exit                    ║
╚══════════════════════════════════════════════════════════════╝
"#
    );
    println!("Configuration:");
    println!("  Model: {}", config.model);
    println!("  Chart: {}", config.chart_path.display());
    println!();
}

fn build_config(args: &Args) -> anyhow::Result<StockConfig> {
    let mut builder = StockConfig::builder()
        .model_from_env()
        .api_key_file(&args.key_file)
        .chart_path(&args.chart_path);

    if let Some(model) = &args.model {
        builder = builder.model(model);
    }
    if let Some(prompt) = &args.system_prompt {
        builder = builder.system_prompt(prompt);
    }

    Ok(builder.build()?)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = build_config(&args)?;
    let api_key = config.load_api_key().context("Failed to load the API key")?;

    let mut openai = OpenAIConfig::new(api_key);
    if let Some(base) = args
        .api_base
        .clone()
        .or_else(|| std::env::var("OPENAI_API_BASE").ok())
    {
        openai = openai.with_api_base(base);
    }

    print_banner(&config);

    let provider = Arc::new(OpenAIProvider::with_config(openai)?);
    let bot = StockBot::new(provider, config)?;
    info!(provider = bot.provider_name(), model = %bot.config().model, "Ready");

    let mut session = Session::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{PROMPT}");
        stdout.flush()?;

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) => {
                println!("\nGoodbye!");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {e}");
                continue;
            }
        }

        if input.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&input) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("Error: {e}\n");
                continue;
            }
        };

        match command {
            Command::Help => println!("{}", Command::help_text()),
            Command::History => println!("{}", session.format_history()),
            Command::Clear => {
                session = Session::new();
                println!("Conversation cleared.\n");
            }
            Command::Exit => {
                println!("Goodbye!");
                break;
            }
            Command::Query { text } => match bot.handle_turn(&mut session, &text).await {
                Ok(reply) => println!("{reply}\n"),
                Err(e) => eprintln!("Error: {e}\n"),
            },
        }
    }

    Ok(())
}
