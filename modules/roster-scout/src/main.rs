use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use browserless_client::BrowserlessClient;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use roster_common::{load_engine_config, Config, EngineConfig, TeamId};
use roster_scout::{save_run_report, BrowserlessFetcher, Coordinator, HttpFetcher, PageFetcher, RunOptions};
use roster_store::PgCanonicalStore;

/// Reconcile canonical rosters against the teams' athletics sites.
#[derive(Parser, Debug)]
#[command(name = "roster-scout")]
struct Args {
    /// Team ids to reconcile.
    #[arg(long = "team", required_unless_present = "all")]
    teams: Vec<TeamId>,

    /// Reconcile every team in the store.
    #[arg(long, conflicts_with = "teams")]
    all: bool,

    /// Also delete canonical athletes the source no longer lists.
    #[arg(long)]
    full_resync: bool,

    /// Decide and report without writing to the store.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("roster=info".parse()?))
        .init();

    let args = Args::parse();
    info!("Roster scout starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    let engine_config = Arc::new(match &config.engine_config_path {
        Some(path) => load_engine_config(path)?,
        None => EngineConfig::default(),
    });

    let store = PgCanonicalStore::connect(&config.database_url)
        .await
        .context("Failed to connect to canonical store")?;
    store.migrate().await.context("Failed to run migrations")?;

    let pacing = &engine_config.pacing;
    let fetcher: Arc<dyn PageFetcher> = match &config.browserless_url {
        Some(url) => {
            // Leave the renderer room to report its own timeout.
            let request_timeout = pacing.fetch_timeout() + Duration::from_secs(10);
            let client = BrowserlessClient::new(url, config.browserless_token.as_deref(), request_timeout)
                .context("Failed to build Browserless client")?;
            Arc::new(BrowserlessFetcher::new(client, pacing.fetch_timeout(), pacing.max_attempts))
        }
        None => Arc::new(HttpFetcher::new(pacing.fetch_timeout()).context("Failed to build HTTP client")?),
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, stopping before the next athlete is written");
                cancelled.store(true, Ordering::Relaxed);
            }
        });
    }

    let options = RunOptions {
        full_resync: args.full_resync,
        dry_run: args.dry_run,
    };
    let coordinator = Coordinator::new(Arc::new(store), fetcher, engine_config.clone(), cancelled, options);

    let teams = if args.all { Vec::new() } else { args.teams };
    let report = coordinator.run(&teams).await?;

    println!("{report}");

    let path = save_run_report(&config.data_dir, &report)?;
    info!(path = %path.display(), "Reconciliation complete");
    Ok(())
}
