//! Hostname resolution (spec §4.4 "lookup_host").
//!
//! Grounded in `request_lookup_host` in `request.c`: an IP-literal
//! short-circuit, then a hostname-cache lookup, then a fallback to the
//! platform resolver with the result cached for next time. `tokio::net::
//! lookup_host` stands in for the original's `getaddrinfo` call - it is
//! already part of the teacher's async runtime dependency, so no extra DNS
//! crate is pulled in.

use std::net::Ipv4Addr;

use crate::ttl_map::TtlMap;
use crate::url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// `host` was already a dotted-quad IPv4 literal.
    Literal,
    /// Found in the hostname cache.
    Hit,
    /// Not cached; resolved via DNS and inserted into the cache.
    Miss,
    /// DNS resolution failed.
    Invalid,
}

/// Resolve `url.host` to an IP, filling in `url.ip` on success. Mirrors
/// `request_lookup_host`'s four-way outcome.
pub async fn lookup_host(url: &mut Url, hostname_cache: &TtlMap) -> Resolution {
    if url.host.parse::<Ipv4Addr>().is_ok() {
        url.ip = Some(url.host.clone());
        return Resolution::Literal;
    }

    if let Some(ip) = hostname_cache.get(&url.host).await {
        url.ip = Some(ip);
        return Resolution::Hit;
    }

    match resolve_via_dns(&url.host, url.port).await {
        Some(ip) => {
            hostname_cache.put(&url.host, &ip).await;
            url.ip = Some(ip);
            Resolution::Miss
        }
        None => Resolution::Invalid,
    }
}

async fn resolve_via_dns(host: &str, port: u16) -> Option<String> {
    let addrs = tokio::net::lookup_host((host, port)).await.ok()?;
    addrs
        .filter_map(|addr| match addr.ip() {
            std::net::IpAddr::V4(v4) => Some(v4.to_string()),
            std::net::IpAddr::V6(_) => None,
        })
        .next()
}
