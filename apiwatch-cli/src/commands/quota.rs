//! Quota command - today's proxy usage and circuit state.

use anyhow::Result;
use apiwatch_store::Config;

use crate::output::{JsonFormatter, QuotaOutput, TextFormatter};
use crate::{setup, Cli, OutputFormat};

/// Runs the quota command.
pub async fn run(cli: &Cli, config: &Config) -> Result<()> {
    let quota = setup::quota_tracker(config);
    let fetcher = setup::build_fetcher(config, quota.clone())?;

    let output = QuotaOutput {
        service: config.proxy.service_name.clone(),
        daily_limit: config.proxy.daily_limit,
        quota: quota.snapshot().await,
        fetch: fetcher.stats().await,
    };

    match cli.format {
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&output)?),
        OutputFormat::Text => print!("{}", TextFormatter::new(!cli.no_color).format_quota(&output)),
    }
    Ok(())
}
