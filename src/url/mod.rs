//! URL handling module for Sumi-Audit
//!
//! This module provides registrable-domain extraction, host safety checks,
//! and link normalization with same-site scoping.
//!
//! # Components
//!
//! - `registrable_domain`: eTLD+1 of a host via the public suffix list
//! - `HostGuard`: rejects hosts resolving into private or reserved space
//! - `Normalizer`: resolves, canonicalizes, and scopes discovered links

mod domain;
mod guard;
mod normalize;

// Re-export main types
pub use domain::{extract_domain, registrable_domain, url_registrable_domain};
pub use guard::{is_unsafe_ip, GuardError, HostGuard, Resolver, StaticResolver, SystemResolver};
pub use normalize::Normalizer;

use crate::{UrlError, UrlResult};
use url::Url;

/// Parses and validates a seed URL
///
/// # Arguments
///
/// * `raw` - The URL string supplied by the caller
///
/// # Returns
///
/// * `Ok(Url)` - An absolute http/https URL with a host and no fragment
/// * `Err(UrlError)` - The URL is malformed, uses another scheme, or has no host
pub fn parse_seed(raw: &str) -> UrlResult<Url> {
    let mut url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed() {
        let url = parse_seed("  https://Example.com/start#top ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/start");
    }

    #[test]
    fn test_parse_seed_invalid_scheme() {
        let result = parse_seed("ftp://example.com/");
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_parse_seed_malformed() {
        assert!(matches!(parse_seed("not a url"), Err(UrlError::Parse(_))));
    }

    #[test]
    fn test_parse_seed_missing_host() {
        assert!(parse_seed("https://").is_err());
    }
}
