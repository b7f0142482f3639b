//! Check-config command - validate the configuration and show where
//! things live.

use anyhow::Result;
use apiwatch_store::{history_dir, lock_path, quota_path, Config};

use crate::output::{ConfigCheckOutput, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the check-config command.
pub fn run(cli: &Cli, config: &Config) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let data_dir = config.data_dir();
    let validation = config.validate();

    let output = ConfigCheckOutput {
        config_path: config_path.display().to_string(),
        config_exists: config_path.exists(),
        valid: validation.is_ok(),
        error: validation.as_ref().err().map(ToString::to_string),
        data_dir: data_dir.display().to_string(),
        history_dir: history_dir(&data_dir).display().to_string(),
        quota_file: quota_path(&data_dir).display().to_string(),
        lock_file: config
            .general
            .use_lock_file
            .then(|| lock_path(&data_dir).display().to_string()),
        targets_file: config
            .general
            .targets_file
            .as_ref()
            .map(|p| p.display().to_string()),
        strategy: config.fetch.strategy,
        proxy_configured: config.proxy.api_key().is_some(),
        check_interval_secs: config.effective_check_interval(),
    };

    match cli.format {
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&output)?),
        OutputFormat::Text => {
            print!("{}", TextFormatter::new(!cli.no_color).format_config_check(&output));
        }
    }

    validation?;
    Ok(())
}
