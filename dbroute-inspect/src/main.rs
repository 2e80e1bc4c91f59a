//! DB Router Inspect - Main entry point
//!
//! Usage: `dbroute-inspect [--config FILE] [--sql SQL] KEY...`
//!
//! Without `--config` the layout is read from `DB_ROUTER_*` variables.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dbroute_core::RouterSettings;
use dbroute_inspect::Inspector;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "dbroute-inspect",
    version,
    about = "Show which database pool and table a routing key lands on"
)]
struct CliArgs {
    /// JSON settings file; `DB_ROUTER_*` variables are used when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Statement to rewrite for each key.
    #[arg(short, long)]
    sql: Option<String>,

    /// Routing key values to inspect.
    #[arg(required = true)]
    keys: Vec<String>,
}

fn load_settings(cli: &CliArgs) -> Result<RouterSettings> {
    match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            RouterSettings::from_json(&json).with_context(|| format!("loading {}", path.display()))
        }
        None => RouterSettings::from_env().context("loading DB_ROUTER_* environment"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = CliArgs::parse();
    let settings = load_settings(&cli)?;
    let inspector = Inspector::new(&settings)?;

    let mut failures = 0;
    for key in &cli.keys {
        match inspector.inspect(key, cli.sql.as_deref()).await {
            Ok(inspection) => println!("{}", serde_json::to_string(&inspection)?),
            Err(e) => {
                warn!(key = %key, kind = ?e.kind(), error = %e, "Routing failed");
                failures += 1;
            }
        }
    }

    info!(keys = cli.keys.len(), failures, "Inspection finished");
    if failures > 0 {
        bail!("{} of {} keys failed to route", failures, cli.keys.len());
    }
    Ok(())
}
