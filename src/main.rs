//! Gradwatch - Graduation Detection & Token State Reconciliation
//!
//! Watches a bonding-curve launchpad on BNB Smart Chain and maintains a
//! durable, ranked registry of graduated tokens.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use gradwatch::adapters::chain::LogScanner;
use gradwatch::adapters::cli::{CliApp, Command, LookupCmd, RunCmd};
use gradwatch::adapters::index::IndexClient;
use gradwatch::adapters::market::MarketClient;
use gradwatch::adapters::oracle::PriceOracle;
use gradwatch::application::Reconciler;
use gradwatch::config::{load_config, Config};
use gradwatch::ports::IndexSource;
use gradwatch::storage::RegistryStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (endpoint overrides go here)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    match app.command {
        Command::Run(cmd) => run_command(cmd, app.verbose, app.debug).await,
        Command::Lookup(cmd) => lookup_command(cmd, app.verbose, app.debug).await,
    }
}

fn init_logging(verbose: bool, debug: bool, configured_level: &str) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_new(configured_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).init();
}

async fn run_command(cmd: RunCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    init_logging(verbose, debug, &config.logging.level);
    tracing::info!(config = %cmd.config, "starting gradwatch");

    let oracle = Arc::new(PriceOracle::new(&config.oracle));
    let index = IndexClient::new(&config.index, &config.bonding, Arc::clone(&oracle))
        .context("Failed to create index client")?;
    let market = MarketClient::new(&config.market).context("Failed to create market client")?;
    let chain = LogScanner::new(&config.chain, &config.market.address_suffixes)
        .context("Failed to create chain scanner")?;
    let store = Arc::new(
        RegistryStore::open(config.storage.expanded_db_path(), config.storage.upsert_batch)
            .context("Failed to open registry store")?,
    );

    let (reconciler, handle) = Reconciler::new(
        index,
        market,
        chain,
        store,
        config.view.clone(),
        config.reconciler.interval_secs,
        config.reconciler.placeholder_budget,
    )
    .context("Failed to initialize reconciler")?;

    // Surface cycle results in the log even with no external consumers.
    let mut updates = handle.subscribe();
    tokio::spawn(async move {
        while let Ok(view) = updates.recv().await {
            tracing::info!(tokens = view.len(), "ranked view updated");
        }
    });

    tokio::select! {
        _ = reconciler.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }
    Ok(())
}

async fn lookup_command(cmd: LookupCmd, verbose: bool, debug: bool) -> Result<()> {
    let config: Config = load_config(&cmd.config).context("Failed to load configuration")?;
    init_logging(verbose, debug, &config.logging.level);

    let oracle = Arc::new(PriceOracle::new(&config.oracle));
    let index = IndexClient::new(&config.index, &config.bonding, oracle)
        .context("Failed to create index client")?;

    match index.lookup(&cmd.address).await? {
        Some(candidate) => {
            println!("{}", serde_json::to_string_pretty(&candidate)?);
            Ok(())
        }
        None => bail!("token {} is not known to the index", cmd.address),
    }
}
