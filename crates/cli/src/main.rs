mod commands;
mod config;
mod progress;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "shipwatch",
    version,
    about = "Notify customers when their CRM order ships"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Config file (default: <config dir>/shipwatch/shipwatch.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Credentials usually live in a `.env` next to the binary; real env vars win.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let config = cli.config.as_deref();
    match cli.command {
        commands::Command::Run(args) => commands::run::run(args, config).await,
        commands::Command::Once(args) => commands::once::run(args, config).await,
        commands::Command::State(args) => commands::state::run(args, config).await,
        commands::Command::Check(args) => commands::check::run(args, config).await,
    }
}
