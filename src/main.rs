use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use xml_tuples::{Cli, ConfigManager, DocumentLoader, Output, TypeResolver, VerbosityLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbosity());

    cli.validate().map_err(anyhow::Error::msg)?;

    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;
    debug!(?config, "Effective configuration");

    let source = config
        .definition_source()
        .context("Failed to set up definition sources")?;
    let resolver = Arc::new(TypeResolver::new(source));
    let loader = DocumentLoader::new(resolver, config.loader_config());
    let discovery = config
        .file_discovery()
        .context("Invalid file patterns")?;

    info!(path = %cli.path.display(), threads = config.thread_count(), "Loading documents");
    let results = loader
        .load_path(&cli.path, &discovery)
        .await
        .with_context(|| format!("Failed to load documents from {}", cli.path.display()))?;

    // Debug output is only reachable through -vv
    let verbosity = match cli.verbosity() {
        VerbosityLevel::Debug => VerbosityLevel::Debug,
        _ => config.verbosity(),
    };
    let output = Output::new(config.output.format.into(), verbosity);
    print!("{}", output.format_results(&results));

    if results.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

/// `RUST_LOG` wins over the level chosen by -v/-q
fn init_logging(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
