//! hostprep - main entry point
//!
//! Provisions the host in one pass and exits 0 once the sequence has run,
//! whatever individual steps reported.

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hostprep::cleanup::CleanupOptions;
use hostprep::cli::Cli;
use hostprep::command_runner::HostRunner;
use hostprep::config::{HostPaths, ProvisionConfig};
use hostprep::report::never_abort;
use hostprep::sanity::run_preflight_checks;
use hostprep::sequencer::{RunOptions, provision};

/// Initialize the logger with level, file and line on every record
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<ProvisionConfig> {
    let Some(path) = &cli.config else {
        return Ok(ProvisionConfig::default());
    };

    info!("Loading configuration from {:?}", path);
    let config = ProvisionConfig::load_from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("validating {}", path.display()))?;
    Ok(config)
}

fn main() {
    init_logger();
    info!("hostprep starting up");

    let cli = Cli::parse_args();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            std::process::exit(1);
        }
    };

    let paths = HostPaths::new(&cli.root);
    let mut runner = HostRunner::new();
    run_preflight_checks(&mut runner);

    let options = RunOptions {
        policy: never_abort,
        cleanup: CleanupOptions::from_config(&config, cli.no_reboot),
    };
    info!("Provisioning host rooted at {}", paths.root().display());
    // Logs the summary itself, before any reboot is requested.
    provision(&mut runner, &paths, &config, &options);
}
