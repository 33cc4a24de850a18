//! Hangouts CLI entry point

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hangouts_cli::{Cli, CliAppConfig, CommandDispatcher, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // needs no identity, so it runs before the configuration is validated
    if let Commands::InitConfig { path, force } = &cli.command {
        let (path, _) = CliAppConfig::init_config(path.as_deref().map(Path::new), *force)
            .context("could not write the configuration")?;
        println!("Wrote example configuration to {}", path.display());
        return Ok(());
    }

    let config = CliAppConfig::load(&cli).context("invalid configuration")?;
    setup_logging(config.cli.verbose);
    info!(
        username = config.username(),
        host = %config.engine.server.host,
        "starting hangouts"
    );

    CommandDispatcher::execute(cli.command, config)
        .await
        .context("command failed")?;
    Ok(())
}

/// `RUST_LOG` wins; otherwise INFO, or DEBUG with `--verbose`
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
