mod commands;
mod store_backend;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arb")]
#[command(about = "Binary prediction-market arbitrage engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the arbitrage engine until interrupted.
    Run(commands::run::RunArgs),
    /// Load configuration and print the resolved values without trading.
    ConfigCheck(commands::config_check::ConfigCheckArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await?,
        Commands::ConfigCheck(args) => commands::config_check::run(args).await?,
    }

    Ok(())
}
