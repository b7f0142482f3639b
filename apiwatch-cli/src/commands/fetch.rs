//! Fetch command - fetch one URL the way a watch cycle would.

use anyhow::{bail, Result};
use apiwatch_detect::ContentProcessor;
use apiwatch_store::Config;
use clap::Args;

use crate::output::{FetchOutput, JsonFormatter, TextFormatter};
use crate::{setup, Cli, OutputFormat};

/// Arguments for the fetch command.
#[derive(Args)]
pub struct FetchArgs {
    /// URL to fetch.
    pub url: String,

    /// Print the whole body instead of a preview.
    #[arg(long)]
    pub full: bool,
}

/// Runs the fetch command.
pub async fn run(args: &FetchArgs, cli: &Cli, config: &Config) -> Result<()> {
    config.validate()?;

    let fetcher = setup::build_fetcher(config, setup::quota_tracker(config))?;
    let outcome = fetcher.fetch(&args.url).await;

    let processor = ContentProcessor::new(config.watch.max_json_parse_chars);
    let output = FetchOutput::from_outcome(&outcome, &processor);

    if !cli.quiet {
        match cli.format {
            OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&output)?),
            OutputFormat::Text => {
                let formatter = TextFormatter::new(!cli.no_color);
                print!("{}", formatter.format_fetch(&output, &outcome, args.full));
            }
        }
    }

    if !outcome.succeeded {
        bail!("fetch failed: {}", outcome.failure_reason());
    }
    Ok(())
}
