use std::net::IpAddr;
use url::Url;

/// Extracts the host from a URL, lowercased
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_audit::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the registrable domain (eTLD+1) of a host
///
/// Uses the public suffix list, so `blog.example.co.uk` maps to
/// `example.co.uk`. IP-literal hosts are their own registrable domain.
/// Returns None for bare public suffixes and single-label hosts.
///
/// # Examples
///
/// ```
/// use sumi_audit::url::registrable_domain;
///
/// assert_eq!(registrable_domain("www.example.com"), Some("example.com".to_string()));
/// assert_eq!(registrable_domain("shop.example.co.uk"), Some("example.co.uk".to_string()));
/// assert_eq!(registrable_domain("co.uk"), None);
/// ```
pub fn registrable_domain(host: &str) -> Option<String> {
    let host = host.trim_end_matches('.').to_lowercase();
    if host.is_empty() {
        return None;
    }

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        return Some(bare.to_string());
    }

    psl::domain_str(&host).map(str::to_string)
}

/// Returns the registrable domain of a URL's host
pub fn url_registrable_domain(url: &Url) -> Option<String> {
    url.host_str().and_then(registrable_domain)
}
