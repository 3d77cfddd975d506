//! AlphaTrade CLI - simulated stock trading from the command line.
//!
//! Every command prints an `ApiResponse` JSON document on stdout; logs go to stderr.

use std::path::PathBuf;

use alphatrade_core::{ApiResponse, AppConfig, TimeRange, TradeSide, TradingDesk};
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "alphatrade")]
#[command(about = "AlphaTrade CLI - quotes, AI commentary and a simulated portfolio")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.alphatrade/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the ledger records
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether live services are configured
    Mode,
    /// Get a quote
    Quote {
        /// Stock symbol
        symbol: String,
    },
    /// Get price history
    Candles {
        /// Stock symbol
        symbol: String,
        /// Time range: 1D, 1M or 1Y
        #[arg(short, long, default_value = "1M")]
        range: TimeRange,
    },
    /// Quote and price history together
    Search {
        /// Stock symbol
        symbol: String,
        #[arg(short, long, default_value = "1M")]
        range: TimeRange,
    },
    /// Buy shares at the current price
    Buy {
        /// Stock symbol
        symbol: String,
        /// Number of shares
        #[arg(short = 'n', long)]
        quantity: u64,
    },
    /// Sell shares at the current price
    Sell {
        /// Stock symbol
        symbol: String,
        /// Number of shares
        #[arg(short = 'n', long)]
        quantity: u64,
    },
    /// List open positions
    Positions {
        /// Fetch current prices first
        #[arg(long)]
        refresh: bool,
    },
    /// List transactions, newest first
    Transactions,
    /// Portfolio totals
    Summary,
    /// AI commentary on a symbol
    Analyze {
        /// Stock symbol
        symbol: String,
    },
    /// Recompute positions from the transaction history
    Rebuild,
    /// Delete all transactions and positions
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return print(&ApiResponse::<()>::err(e.to_string())),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let desk = TradingDesk::from_config(&config);
    let output = run(&desk, cli.command).await;
    println!("{}", output?);
    Ok(())
}

async fn run(desk: &TradingDesk, command: Commands) -> Result<String> {
    let rendered = match command {
        Commands::Mode => render(Ok(json!({ "mode": desk.mode() }))),
        Commands::Quote { symbol } => render(desk.quote(&symbol).await),
        Commands::Candles { symbol, range } => render(desk.candles(&symbol, range).await),
        Commands::Search { symbol, range } => render(desk.search(&symbol, range).await),
        Commands::Buy { symbol, quantity } => {
            render(desk.trade(TradeSide::Buy, &symbol, quantity).await)
        }
        Commands::Sell { symbol, quantity } => {
            render(desk.trade(TradeSide::Sell, &symbol, quantity).await)
        }
        Commands::Positions { refresh } => {
            let positions = if refresh {
                desk.refresh_positions().await
            } else {
                desk.ledger().list_positions().await
            };
            render(positions.map(|p| json!({ "positions": p.into_values().collect::<Vec<_>>() })))
        }
        Commands::Transactions => render(
            desk.ledger()
                .list_transactions()
                .await
                .map(|t| json!({ "transactions": t })),
        ),
        Commands::Summary => render(desk.ledger().summary().await),
        Commands::Analyze { symbol } => render(desk.analyze(&symbol).await),
        Commands::Rebuild => render(
            desk.ledger()
                .rebuild_positions()
                .await
                .map(|p| json!({ "positions": p.into_values().collect::<Vec<_>>() })),
        ),
        Commands::Clear => render(
            desk.ledger()
                .clear()
                .await
                .map(|()| json!({ "message": "Portfolio cleared" })),
        ),
    };
    Ok(rendered?)
}

fn render<T: Serialize>(result: alphatrade_core::Result<T>) -> serde_json::Result<String> {
    match result {
        Ok(data) => serde_json::to_string_pretty(&ApiResponse::ok(data)),
        Err(e) => serde_json::to_string_pretty(&ApiResponse::<()>::err(e.to_string())),
    }
}

fn print<T: Serialize>(response: &ApiResponse<T>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}
