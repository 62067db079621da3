use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use roster_common::{load_engine_config, Config, EngineConfig, TeamId};
use roster_store::PgCanonicalStore;
use roster_supervisor::{save_report, Auditor};

/// Audit stored athlete photos and names. Read-only.
#[derive(Parser, Debug)]
#[command(name = "roster-supervisor")]
struct Args {
    /// Team ids to audit. Defaults to every team.
    #[arg(long = "team")]
    teams: Vec<TeamId>,

    /// Print the summary without writing report files.
    #[arg(long)]
    no_save: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("roster=info".parse()?))
        .init();

    let args = Args::parse();
    info!("Roster supervisor starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    let engine_config = match &config.engine_config_path {
        Some(path) => load_engine_config(path)?,
        None => EngineConfig::default(),
    };

    let store = PgCanonicalStore::connect(&config.database_url)
        .await
        .context("Failed to connect to canonical store")?;

    let auditor = Auditor::new(Arc::new(store), Arc::new(engine_config));
    let (report, stats) = auditor.run(&args.teams).await?;

    println!("{}", report.summary());

    if !args.no_save {
        let path = save_report(&config.data_dir, &report)?;
        info!(path = %path.display(), "Report written");
    }

    info!("Audit complete. {stats}");
    Ok(())
}
