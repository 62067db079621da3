use std::path::PathBuf;

use anyhow::{Context, Result};

/// Process configuration loaded from environment variables.
/// Holds secrets and deployment-specific values only; matching and media
/// tuning lives in the TOML [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Clone)]
pub struct Config {
    // Canonical store
    pub database_url: String,

    // Page fetching (Browserless when set, plain HTTP otherwise)
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,

    // Reports
    pub data_dir: PathBuf,

    // Engine tuning file
    pub engine_config_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable is required")?,
            browserless_url: non_empty_env("BROWSERLESS_URL"),
            browserless_token: non_empty_env("BROWSERLESS_TOKEN"),
            data_dir: PathBuf::from(
                std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            ),
            engine_config_path: non_empty_env("ROSTER_CONFIG").map(PathBuf::from),
        })
    }

    /// Log config with secrets redacted.
    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let head: String = val.chars().take(5).collect();
            format!("{}...({} chars)", head, val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", preview(&self.database_url));
        tracing::info!("  BROWSERLESS_URL: {}", self.browserless_url.as_deref().unwrap_or("<not set>"));
        tracing::info!("  BROWSERLESS_TOKEN: {}", preview_opt(&self.browserless_token));
        tracing::info!("  DATA_DIR: {}", self.data_dir.display());
        tracing::info!(
            "  ROSTER_CONFIG: {}",
            self.engine_config_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<defaults>".to_string())
        );
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
