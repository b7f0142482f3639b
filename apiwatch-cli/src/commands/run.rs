//! Run command - one watch cycle, or a daemon loop of them.

use anyhow::{Context, Result};
use apiwatch_detect::{load_targets, CycleReport, Watcher};
use apiwatch_store::{lock_path, Config, ProcessLock};
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::output::{JsonFormatter, TextFormatter};
use crate::{setup, Cli, OutputFormat};

/// Arguments for the run command.
#[derive(Args, Default)]
pub struct RunArgs {
    /// Targets file (defaults to general.targets_file).
    #[arg(long, short)]
    pub targets: Option<PathBuf>,

    /// Keep running, one cycle per check interval.
    #[arg(long, short)]
    pub daemon: bool,

    /// Check interval in seconds for daemon mode (defaults to watch.check_interval_secs).
    #[arg(long, short)]
    pub interval: Option<u64>,

    /// Send the change digest after the cycle; in daemon mode, every watch.digest_days.
    #[arg(long)]
    pub digest: bool,
}

/// Runs the run command.
pub async fn run(args: &RunArgs, cli: &Cli, config: &Config) -> Result<()> {
    config.validate()?;

    let targets_path = args
        .targets
        .clone()
        .or_else(|| config.general.targets_file.clone())
        .context("no targets file: pass --targets or set general.targets_file")?;

    let _lock = if config.general.use_lock_file {
        let lock = ProcessLock::acquire(lock_path(&config.data_dir()))
            .context("another apiwatch is running")?;
        Some(lock)
    } else {
        None
    };

    let fetcher = setup::build_fetcher(config, setup::quota_tracker(config))?;
    let watcher = setup::build_watcher(config, fetcher);

    if args.daemon {
        return run_daemon(args, cli, config, &watcher, &targets_path).await;
    }

    let report = run_once(&watcher, &targets_path).await?;
    print_report(cli, &report)?;

    if args.digest {
        send_digest(&watcher, config).await?;
    }
    Ok(())
}

async fn run_once(watcher: &Watcher, targets_path: &Path) -> Result<CycleReport> {
    let targets = load_targets(targets_path)
        .await
        .with_context(|| format!("failed to load targets from {}", targets_path.display()))?;
    info!(targets = targets.len(), "Starting watch cycle");

    let report = watcher.run_cycle(&targets).await;
    info!(
        total = report.summary.total,
        changed = report.summary.changed,
        failed = report.summary.failed,
        "Watch cycle finished"
    );
    Ok(report)
}

/// The daemon interval in seconds, after the fast-poll guard.
fn daemon_interval(args: &RunArgs, config: &Config) -> u64 {
    let mut config = config.clone();
    if let Some(requested) = args.interval {
        config.watch.check_interval_secs = requested;
    }

    let requested = config.watch.check_interval_secs;
    let effective = config.effective_check_interval();
    if effective != requested.max(1) {
        warn!(
            requested,
            effective, "Check interval raised to the minimum while a proxy is configured"
        );
    }
    effective
}

async fn run_daemon(
    args: &RunArgs,
    cli: &Cli,
    config: &Config,
    watcher: &Watcher,
    targets_path: &Path,
) -> Result<()> {
    let every = daemon_interval(args, config);
    let digest_days = u64::try_from(config.watch.digest_days.max(1)).unwrap_or(7);
    let digest_every = Duration::from_secs(digest_days * 86_400);
    info!(interval = every, "Starting daemon mode");

    let mut ticker = interval(Duration::from_secs(every));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_digest = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping daemon");
                return Ok(());
            }
        }

        // Target edits are picked up on the next cycle.
        match run_once(watcher, targets_path).await {
            Ok(report) => print_report(cli, &report)?,
            Err(e) => error!(error = %format!("{e:#}"), "Watch cycle skipped"),
        }

        if args.digest && last_digest.elapsed() >= digest_every {
            if let Err(e) = send_digest(watcher, config).await {
                error!(error = %e, "Digest failed");
            }
            last_digest = Instant::now();
        }
    }
}

async fn send_digest(watcher: &Watcher, config: &Config) -> Result<()> {
    let days = u32::try_from(config.watch.digest_days.max(1)).unwrap_or(u32::MAX);
    let delivered = watcher.send_digest(days).await?;
    info!(days, delivered, "Digest sent");
    Ok(())
}

fn print_report(cli: &Cli, report: &CycleReport) -> Result<()> {
    if cli.quiet {
        return Ok(());
    }
    match cli.format {
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(report)?),
        OutputFormat::Text => print!("{}", TextFormatter::new(!cli.no_color).format_report(report)),
    }
    Ok(())
}
