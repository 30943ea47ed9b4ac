//! URL helpers shared by the add, update and import paths

use tracing::warn;
use url::Url;

/// Parse `input` as an absolute URL that has a host
pub fn parse_url(input: &str) -> Option<Url> {
    Url::parse(input)
        .ok()
        .filter(|url| url.host_str().is_some_and(|host| !host.is_empty()))
}

/// Check that `input` is a well-formed absolute URL (scheme and host)
pub fn is_valid_url(input: &str) -> bool {
    parse_url(input).is_some()
}

/// Derive the grouping hostname for a URL
///
/// Takes the host component (lower-cased by URL parsing) and strips one
/// leading `www.` label. Invalid URLs yield an empty string.
pub fn hostname(input: &str) -> String {
    match parse_url(input) {
        Some(url) => {
            let host = url.host_str().unwrap_or_default();
            host.strip_prefix("www.").unwrap_or(host).to_string()
        }
        None => {
            warn!("Invalid URL: {}", input);
            String::new()
        }
    }
}
