//! # botkit — chat bot engine
//!
//! Keeps a connection to a chat platform, answers messages that match hear
//! rules, and fires scheduled tasks. Reconnects forever.
//!
//! Usage:
//!   botkit                                  # Discord, token from config or BOTKIT_TOKEN
//!   botkit --transport console              # Talk to the bot on stdin
//!   botkit --modules hello,echo -v          # Pick modules, debug logging

mod modules;

use anyhow::Result;
use botkit_core::config::BotConfig;
use botkit_engine::{BotEngine, Timings, install_declarative};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "botkit", version, about = "🤖 botkit — chat bot engine")]
struct Cli {
    /// Transport: discord or console
    #[arg(short, long)]
    transport: Option<String>,

    /// Platform auth token (falls back to config, then BOTKIT_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Comma-separated bot modules to load
    #[arg(short, long, value_delimiter = ',')]
    modules: Option<Vec<String>>,

    /// Channel that receives handler failure reports (id or #name)
    #[arg(long)]
    errors_to: Option<String>,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

const CRATES: &[&str] = &[
    "botkit",
    "botkit_core",
    "botkit_channels",
    "botkit_scheduler",
    "botkit_engine",
];

fn log_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    CRATES
        .iter()
        .map(|c| format!("{c}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn load_config(cli: &Cli) -> Result<BotConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = shellexpand::tilde(path).into_owned();
            BotConfig::load_from(std::path::Path::new(&path))?
        }
        None => BotConfig::load()?,
    };
    apply_overrides(&mut config, cli);
    Ok(config)
}

/// Command-line flags win over the file.
fn apply_overrides(config: &mut BotConfig, cli: &Cli) {
    if let Some(kind) = &cli.transport {
        config.transport.kind = kind.clone();
    }
    if let Some(token) = &cli.token {
        config.transport.token = token.clone();
    }
    if let Some(modules) = &cli.modules {
        config.modules = modules.clone();
    }
    if let Some(errors_to) = &cli.errors_to {
        config.errors_to = errors_to.clone();
    }
}

fn build_engine(config: &BotConfig) -> Result<BotEngine> {
    let transport =
        botkit_channels::create_transport(&config.transport.kind, config.transport.resolved_token())?;
    let mut builder = BotEngine::builder(transport)
        .errors_to(config.errors_to.clone())
        .timings(Timings::from(&config.timings));
    modules::install_all(&mut builder, &config.modules)?;
    install_declarative(&mut builder, &config.hears, &config.tasks)?;
    Ok(builder.build())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose))),
        )
        .with_target(false)
        .init();

    let config = load_config(&cli)?;
    let engine = build_engine(&config)?;

    tokio::select! {
        _ = engine.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("👋 Shutting down");
        }
    }
    Ok(())
}
