use crate::url::domain::registrable_domain;
use crate::url::guard::HostGuard;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;
use url::form_urlencoded;
use url::Url;

/// Tracking query parameters removed during normalization
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Href prefixes that never point at a crawlable page
const IGNORED_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Canonicalizes discovered links and decides whether they belong to the crawl
///
/// One normalizer exists per crawl run. It is bound to the seed's registrable
/// domain and caches guard verdicts per host for the lifetime of the run.
pub struct Normalizer {
    scope_domain: String,
    guard: HostGuard,
    include: Option<Regex>,
    exclude: Option<Regex>,
    verdicts: Mutex<HashMap<String, bool>>,
}

impl Normalizer {
    /// Creates a normalizer scoped to a registrable domain
    ///
    /// # Arguments
    ///
    /// * `scope_domain` - The crawl's registrable domain (eTLD+1)
    /// * `guard` - Host guard used to reject private-resolving hosts
    pub fn new(scope_domain: impl Into<String>, guard: HostGuard) -> Self {
        Self {
            scope_domain: scope_domain.into().to_lowercase(),
            guard,
            include: None,
            exclude: None,
            verdicts: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the optional include/exclude filters applied to the full URL
    pub fn with_patterns(mut self, include: Option<Regex>, exclude: Option<Regex>) -> Self {
        self.include = include;
        self.exclude = exclude;
        self
    }

    /// The registrable domain this normalizer accepts
    pub fn scope_domain(&self) -> &str {
        &self.scope_domain
    }

    /// Returns true if the URL's host shares the crawl's registrable domain
    pub fn in_scope(&self, url: &Url) -> bool {
        url.host_str()
            .and_then(registrable_domain)
            .is_some_and(|domain| domain == self.scope_domain)
    }

    /// Resolves and canonicalizes a link without consulting the guard
    ///
    /// # Normalization Steps
    ///
    /// 1. Trim whitespace; ignore empty, fragment-only, and
    ///    `javascript:`/`mailto:`/`tel:`/`data:` hrefs
    /// 2. Resolve relative to `base`
    /// 3. Remove fragment
    /// 4. Reject schemes other than http/https
    /// 5. Remove tracking query parameters and an empty query string
    /// 6. Reject hosts outside the crawl's registrable domain
    /// 7. Apply include/exclude patterns
    ///
    /// # Returns
    ///
    /// * `Some(Url)` - canonical in-scope URL
    /// * `None` - not a discoverable link
    pub fn resolve_in_scope(&self, base: &Url, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }

        let lowered = href.to_ascii_lowercase();
        if IGNORED_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
            return None;
        }

        let mut url = base.join(href).ok()?;
        url.set_fragment(None);

        if url.scheme() != "http" && url.scheme() != "https" {
            return None;
        }

        strip_tracking_params(&mut url);

        if !self.in_scope(&url) {
            return None;
        }

        if let Some(include) = &self.include {
            if !include.is_match(url.as_str()) {
                return None;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(url.as_str()) {
                return None;
            }
        }

        Some(url)
    }

    /// Resolves a link and rejects it if its host is unsafe
    ///
    /// Guard verdicts are cached per host, so each host is resolved at most
    /// once during discovery. Fetch-time checks do not use this cache.
    pub async fn normalize(&self, base: &Url, href: &str) -> Option<Url> {
        let url = self.resolve_in_scope(base, href)?;
        let host = url.host_str()?.to_lowercase();

        if self.host_is_unsafe(&host).await {
            tracing::debug!("Dropping link to unsafe host: {}", url);
            return None;
        }

        Some(url)
    }

    async fn host_is_unsafe(&self, host: &str) -> bool {
        if let Ok(verdicts) = self.verdicts.lock() {
            if let Some(&unsafe_host) = verdicts.get(host) {
                return unsafe_host;
            }
        }

        let unsafe_host = self.guard.is_unsafe_host(host).await;

        if let Ok(mut verdicts) = self.verdicts.lock() {
            verdicts.insert(host.to_string(), unsafe_host);
        }

        unsafe_host
    }
}

/// Removes tracking parameters, leaving the query untouched when none match
fn strip_tracking_params(url: &mut Url) {
    match url.query() {
        None => return,
        Some("") => {
            url.set_query(None);
            return;
        }
        Some(_) => {}
    }

    if !url.query_pairs().any(|(key, _)| is_tracking_param(&key)) {
        return;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        url.set_query(Some(&query));
    }
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
