//! TransientDB CLI - run the transient table server

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use transientdb::config;

#[derive(Parser)]
#[command(name = "transientdb")]
#[command(version)]
#[command(about = "The Transient Database - in-memory tables snapshotted to CSV")]
#[command(long_about = r#"
TransientDB keeps tables in memory, seeds them from CSV files on startup and
periodically dumps each table back to <data_folder>/<table>.csv.

Example usage:
  transientdb --config ./transientdb.toml
  transientdb -v serve
"#)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server and the maintenance loop (default)
    Serve,

    /// Print the effective configuration and exit
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    // Initialize logging; RUST_LOG wins over the configured level
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.server.log_level))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(transientdb::server::start_server(cfg))?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}
