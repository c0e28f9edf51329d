//! Host safety guard
//!
//! Resolves hostnames and refuses any host whose addresses land in private,
//! loopback, link-local, reserved, or otherwise non-public address space.
//! Resolution failure counts as unsafe.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Resolves a hostname to its addresses
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Returns every address the host resolves to (both families)
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system through tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Resolver with a fixed host table
///
/// Hosts missing from the table fail to resolve.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the addresses for a host
    pub fn with_host(mut self, host: &str, addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        self.hosts
            .insert(host.to_lowercase(), addrs.into_iter().collect());
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.hosts
            .get(&host.to_lowercase())
            .cloned()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no static entry for {}", host),
                )
            })
    }
}

/// Why a host was refused
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("empty host")]
    EmptyHost,

    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("{host} resolved to no addresses")]
    NoAddresses { host: String },

    #[error("{host} resolves to non-public address {ip}")]
    NonPublic { host: String, ip: IpAddr },
}

/// Decides whether a host is safe to contact
#[derive(Clone)]
pub struct HostGuard {
    resolver: Arc<dyn Resolver>,
}

impl std::fmt::Debug for HostGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostGuard").finish_non_exhaustive()
    }
}

impl Default for HostGuard {
    fn default() -> Self {
        Self::new(Arc::new(SystemResolver))
    }
}

impl HostGuard {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    /// Resolves a host, refusing any non-public result
    ///
    /// IP literals (including bracketed IPv6) are classified directly.
    /// Otherwise the host is resolved and is refused if resolution fails,
    /// yields nothing, or yields any non-public address.
    ///
    /// # Arguments
    ///
    /// * `host` - Hostname or IP literal, without port
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<IpAddr>)` - Every address, all public
    /// * `Err(GuardError)` - The host must not be contacted
    pub async fn resolve_public(&self, host: &str) -> Result<Vec<IpAddr>, GuardError> {
        let host = host.trim_end_matches('.');
        if host.is_empty() {
            return Err(GuardError::EmptyHost);
        }

        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return if is_unsafe_ip(&ip) {
                Err(GuardError::NonPublic {
                    host: host.to_string(),
                    ip,
                })
            } else {
                Ok(vec![ip])
            };
        }

        let addrs = self
            .resolver
            .resolve(host)
            .await
            .map_err(|source| GuardError::Resolve {
                host: host.to_string(),
                source,
            })?;

        if addrs.is_empty() {
            return Err(GuardError::NoAddresses {
                host: host.to_string(),
            });
        }
        if let Some(ip) = addrs.iter().find(|ip| is_unsafe_ip(ip)) {
            return Err(GuardError::NonPublic {
                host: host.to_string(),
                ip: *ip,
            });
        }

        Ok(addrs)
    }

    /// Returns true if the host must not be contacted
    pub async fn is_unsafe_host(&self, host: &str) -> bool {
        match self.resolve_public(host).await {
            Ok(_) => false,
            Err(e) => {
                tracing::debug!("Refusing host: {}", e);
                true
            }
        }
    }

    /// Returns true if the URL's host must not be contacted
    pub async fn is_unsafe_url(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => self.is_unsafe_host(host).await,
            None => true,
        }
    }
}

/// Returns true if the address is not publicly routable
pub fn is_unsafe_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_unsafe_ipv4(v4),
        IpAddr::V6(v6) => is_unsafe_ipv6(v6),
    }
}

fn is_unsafe_ipv4(ip: &Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();

    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || ip.is_documentation()
        // 0.0.0.0/8 "this network"
        || a == 0
        // 100.64.0.0/10 shared address space (CGN)
        || (a == 100 && (b & 0xc0) == 64)
        // 192.0.0.0/24 IETF protocol assignments
        || (a == 192 && b == 0 && c == 0)
        // 198.18.0.0/15 benchmarking
        || (a == 198 && (b & 0xfe) == 18)
        // 240.0.0.0/4 reserved
        || a >= 240
}

fn is_unsafe_ipv6(ip: &Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_unsafe_ipv4(&v4);
    }

    let segments = ip.segments();

    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 unique local
        || (segments[0] & 0xfe00) == 0xfc00
        // fe80::/10 link-local
        || (segments[0] & 0xffc0) == 0xfe80
        // 2001:db8::/32 documentation
        || (segments[0] == 0x2001 && segments[1] == 0x0db8)
        // 100::/64 discard-only
        || (segments[0] == 0x0100 && segments[1] == 0 && segments[2] == 0 && segments[3] == 0)
        // 64:ff9b:1::/48 local-use translation
        || (segments[0] == 0x0064 && segments[1] == 0xff9b && segments[2] == 0x0001)
        // 2001::/23 IETF protocol assignments (includes benchmarking 2001:2::/48)
        || (segments[0] == 0x2001 && segments[1] < 0x0200)
}
