//! Fetch routing choices shared by configuration and the fetch layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which path a URL takes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchStrategyKind {
    /// Direct first, proxy as fallback.
    #[default]
    DirectFirst,
    /// Proxy for everything except static assets.
    ProxyOnly,
}

impl FetchStrategyKind {
    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DirectFirst => "direct-first",
            Self::ProxyOnly => "proxy-only",
        }
    }
}

impl fmt::Display for FetchStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
