use anyhow::Result;
use clap::Parser;
use tracing::info;

use helpdesk_daemon::cli::{self, Cli};
use triage::HelpdeskConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let mut config = HelpdeskConfig::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);

    info!(
        nlp = %config.nlp.base_url,
        nlp_enabled = config.nlp.enabled,
        store = ?config.store.backend,
        sweep_interval_secs = config.sweep.interval_secs,
        "helpdeskd starting"
    );

    cli::execute(args.command, config).await
}
