//! Output formatting for CLI.

mod json;
mod text;

pub use json::{ConfigCheckOutput, FetchOutput, JsonFormatter, QuotaOutput};
pub use text::TextFormatter;
