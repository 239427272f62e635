//! tdgram CLI entry point

use std::sync::Arc;

use clap::Parser;
use tdgram_tdjson::TdJsonTransport;
use tracing::{error, info};

use tdgram_cli::{app::TdgramApp, cli::Cli, config::AppConfig, error::Result, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from_file(&cli.config)?;
    if let Some(path) = cli.library_path.clone() {
        config.settings.library_path = Some(path);
    }
    let log_guard = logging::init_logging(&config.logging, &cli.name, cli.verbose)?;
    info!(config = %cli.config.display(), session = %cli.name, "configuration loaded");

    let transport = Arc::new(TdJsonTransport::open(
        config.settings.library_path.as_deref(),
        config.settings.verbosity,
    )?);
    let executor = transport.clone();
    let app = TdgramApp::start(&cli.name, config, transport)?
        .with_executor(move |query| executor.execute(query));

    let outcome = app.execute(cli.command).await;
    match &outcome {
        Ok(()) => info!("tdgram exited successfully"),
        Err(e) => error!("Command failed: {}", e),
    }

    // Flushes the file writer before a failure exit skips destructors
    drop(log_guard);
    if outcome.is_err() {
        std::process::exit(1);
    }
    Ok(())
}
