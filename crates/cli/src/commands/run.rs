//! Wires configuration, storage, and the paper exchange into the engine
//! and runs it until Ctrl+C (spec.md §5, §4.11).

use anyhow::{Context, Result};
use arb_core::{ConfigLoader, EventSink};
use arb_engine::{recover, BroadcastEventSink, Engine, LoggingEventSink, ShutdownCoordinator};
use arb_exchange::{PaperExchange, PaperExchangeConfig};
use arb_store::{InMemoryStore, PostgresStore};
use clap::Args;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use crate::store_backend::AnyStore;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Named config overlay merged on top of `config/Config.toml`
    /// (loads `config/Config.<profile>.toml` as well).
    #[arg(long)]
    pub profile: Option<String>,

    /// Force dry-run (simulated fills, no live orders) regardless of what
    /// the resolved configuration says.
    #[arg(long)]
    pub dry_run: bool,

    /// Seconds to let in-flight executions and rebalances drain after
    /// Ctrl+C before tearing down.
    #[arg(long, default_value_t = 5)]
    pub drain_grace_secs: u64,

    /// Emit every `EngineEvent` at info level instead of fanning it out
    /// over the broadcast channel. Useful when nothing subscribes.
    #[arg(long)]
    pub log_events: bool,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.profile {
        Some(profile) => ConfigLoader::load_with_profile(profile).context("failed to load configuration")?,
        None => ConfigLoader::load().context("failed to load configuration")?,
    };
    if args.dry_run {
        config.dry_run = true;
    }
    tracing::info!(assets = ?config.assets, dry_run = config.dry_run, "configuration loaded");

    let clock = Arc::new(arb_core::SystemClock);
    let exchange = Arc::new(PaperExchange::new(PaperExchangeConfig::with_balance(dec!(10_000))));

    let events: Arc<dyn EventSink> = if args.log_events {
        Arc::new(LoggingEventSink)
    } else {
        Arc::new(BroadcastEventSink::new(1024))
    };

    let store: Arc<AnyStore> = match std::env::var("DATABASE_URL").ok() {
        Some(url) => {
            tracing::info!("connecting to postgres store");
            Arc::new(AnyStore::Postgres(PostgresStore::connect(&url, 5).await.context("failed to connect to postgres")?))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using a non-durable in-memory store");
            Arc::new(AnyStore::Memory(InMemoryStore::new()))
        }
    };

    let now = chrono::Utc::now();
    let recovered = recover(&store, &config, now)
        .await
        .map_err(|err| anyhow::anyhow!("startup recovery failed: {err}"))?;
    tracing::info!(
        open_positions = recovered.open_condition_ids.len(),
        circuit_level = ?recovered.circuit_breaker.level(),
        "startup recovery complete",
    );

    let mut engine = Engine::new(exchange, store, clock, events, config, recovered);
    let shutdown = ShutdownCoordinator::new();

    tokio::join!(engine.run(&shutdown), shutdown.run_until_ctrl_c(Duration::from_secs(args.drain_grace_secs)));

    tracing::info!("engine stopped");
    Ok(())
}
