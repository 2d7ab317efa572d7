//! livesnmpd entry point.
//!
//! Loads the host/service/device configuration, starts one poller per
//! selected host and logs (or prints as JSON lines) every poll result until
//! interrupted.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use livesnmp_common::config::DEFAULT_CONFIG_PATH;
use livesnmp_common::{CommandRunner, PollerConfig, SystemRunner};
use livesnmp_poller::daemon::{self, DaemonOptions};
use livesnmp_poller::{JsonSink, LogSink};

/// Live SNMP poller
#[derive(Parser, Debug)]
#[command(name = "livesnmpd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Host to poll (repeatable); all hosts when omitted
    #[arg(short = 'H', long = "host")]
    hosts: Vec<String>,

    /// Only poll hosts of this group
    #[arg(short = 'g', long)]
    group: Option<String>,

    /// Poll every host once and exit
    #[arg(long)]
    once: bool,

    /// Poll interval in milliseconds, overrides the configuration
    #[arg(short = 'i', long, value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: Option<u64>,

    /// Print results as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn options(&self) -> DaemonOptions {
        DaemonOptions {
            hosts: self.hosts.clone(),
            group: self.group.clone(),
            once: self.once,
            interval: self.interval_ms.map(Duration::from_millis),
        }
    }
}

/// Initialize tracing on stderr, keeping stdout for `--json`.
fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level '{}'", level))?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    Ok(())
}

/// Cancels `shutdown` on SIGINT.
fn setup_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, stopping pollers");
            shutdown.cancel();
        }
    });
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = PollerConfig::load_or_default(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    config.validate().context("Invalid configuration")?;

    let shutdown = CancellationToken::new();
    setup_signal_handler(shutdown.clone());

    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
    let options = args.options();

    if args.json {
        daemon::run(&config, &options, runner, |_| JsonSink::stdout(), shutdown).await?;
    } else {
        daemon::run(&config, &options, runner, |_| LogSink, shutdown).await?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("livesnmpd: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!(config = %args.config.display(), "--- Starting livesnmpd ---");

    match run(args).await {
        Ok(()) => {
            info!("livesnmpd exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "livesnmpd exiting with error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["livesnmpd"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(args.hosts.is_empty());
        assert!(!args.once);
        assert_eq!(args.log_level, "info");
        assert_eq!(args.options(), DaemonOptions::default());
    }

    #[test]
    fn test_host_selection_args() {
        let args = Args::parse_from([
            "livesnmpd",
            "--host",
            "gw",
            "-H",
            "sw1",
            "--group",
            "lab",
            "--once",
            "--interval-ms",
            "250",
            "--json",
        ]);
        let options = args.options();
        assert_eq!(options.hosts, vec!["gw".to_string(), "sw1".to_string()]);
        assert_eq!(options.group.as_deref(), Some("lab"));
        assert!(options.once);
        assert_eq!(options.interval, Some(Duration::from_millis(250)));
        assert!(args.json);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let err = Args::try_parse_from(["livesnmpd", "--interval-ms", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
