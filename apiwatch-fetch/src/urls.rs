//! URL helpers shared by the fetchers.

use url::Url;

/// File extensions that never need a rendering proxy.
const STATIC_EXTENSIONS: &[&str] = &[".json", ".yaml", ".yml", ".xml"];

/// Hosts that serve raw file content.
pub const DEFAULT_RAW_HOSTS: &[&str] = &["raw.githubusercontent.com", "gist.githubusercontent.com"];

/// Strips the `#fragment`, if any.
pub fn strip_fragment(url: &str) -> &str {
    url.split_once('#').map_or(url, |(base, _)| base)
}

/// Lowercased host of `url`, or the lowercased URL when it has none.
pub fn domain_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_else(|| url.to_ascii_lowercase())
}

/// Returns true if `url` points at a static asset or a raw-content host.
pub fn looks_static(url: &str, raw_hosts: &[String]) -> bool {
    let (host, path) = match Url::parse(url) {
        Ok(parsed) => (
            parsed.host_str().map(str::to_ascii_lowercase).unwrap_or_default(),
            parsed.path().to_ascii_lowercase(),
        ),
        Err(_) => {
            let lowered = strip_fragment(url).to_ascii_lowercase();
            let path = lowered.split('?').next().unwrap_or_default().to_string();
            (String::new(), path)
        }
    };

    STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        || raw_hosts.iter().any(|h| h.eq_ignore_ascii_case(&host))
}
