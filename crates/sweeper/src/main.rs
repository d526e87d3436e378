#![forbid(unsafe_code)]

mod config;

use clap::Parser;
use config::{CliOverrides, SweeperConfig};
use fulcrum_storage::{SqliteStore, StoreError, SweepReport, TimeoutSweeper};
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fulcrum-sweeper")]
#[command(version)]
#[command(about = "Fails reconciliation work stuck past its timeout")]
struct Args {
    /// Directory holding the control plane database [env: FULCRUM_STORAGE_DIR]
    #[arg(long, value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    /// Retries allowed per target before a failure is final [env: FULCRUM_MAX_RETRIES]
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Silence after which claimed work is failed [env: FULCRUM_JOB_TIMEOUT_SECS]
    #[arg(long, value_name = "SECS")]
    job_timeout_secs: Option<u64>,

    /// Pause between passes [env: FULCRUM_SWEEP_INTERVAL_SECS]
    #[arg(long, value_name = "SECS")]
    interval_secs: Option<u64>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Print each pass report to stdout as one JSON line
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn sweep_once(
    sweeper: &mut impl TimeoutSweeper,
    timeout: Duration,
) -> Result<SweepReport, StoreError> {
    sweeper.fail_timeout_services_and_jobs(timeout)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let config = SweeperConfig::from_env()?.with_overrides(CliOverrides {
        storage_dir: args.storage_dir,
        max_retries: args.max_retries,
        job_timeout_secs: args.job_timeout_secs,
        interval_secs: args.interval_secs,
        once: args.once,
    });
    let mut store = SqliteStore::open_with_policy(&config.storage_dir, config.policy)?;

    tracing::info!(
        storage_dir = %config.storage_dir.display(),
        job_timeout_secs = config.policy.job_timeout.as_secs(),
        max_retries = config.policy.max_retries,
        interval_secs = config.interval.as_secs(),
        once = config.once,
        "sweeper started"
    );

    loop {
        match sweep_once(&mut store, config.policy.job_timeout) {
            Ok(report) => {
                if args.json {
                    println!("{}", serde_json::to_string(&report)?);
                }
            }
            // A failed pass in loop mode is retried on the next tick.
            Err(err) if !config.once => {
                tracing::warn!(error = %err, kind = ?err.kind(), "sweep pass failed");
            }
            Err(err) => return Err(err.into()),
        }

        if config.once {
            break;
        }
        sleep(config.interval);
    }

    Ok(())
}
