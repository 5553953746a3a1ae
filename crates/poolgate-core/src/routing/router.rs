//! Service and pool resolution
//!
//! Service resolution collects the services whose host equals the request
//! host (falling back to the catch-all services with an empty host), sorts
//! them by url in descending lexicographic order and takes the first whose
//! url is a prefix of the request path. Candidates are ordered by string
//! comparison, not by length: `/b` is tried before `/ab`.

use http::HeaderMap;
use http::header::HOST;
use http::request::Parts;

use crate::model::{PoolKind, Service};

/// The parts of an inbound request the routing engine looks at
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    /// Host as received; a port suffix is ignored
    pub host: &'a str,
    pub path: &'a str,
    pub headers: &'a HeaderMap,
}

impl<'a> RouteRequest<'a> {
    pub fn new(host: &'a str, path: &'a str, headers: &'a HeaderMap) -> Self {
        Self {
            host,
            path,
            headers,
        }
    }

    /// Build from an HTTP request head. The host comes from the URI
    /// authority when present, otherwise from the `Host` header.
    pub fn from_parts(parts: &'a Parts) -> Self {
        let host = parts
            .uri
            .authority()
            .map(|authority| authority.host())
            .or_else(|| parts.headers.get(HOST).and_then(|h| h.to_str().ok()))
            .unwrap_or("");

        Self::new(host, parts.uri.path(), &parts.headers)
    }
}

/// Drop a `:port` suffix from a host
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }

    match host.split_once(':') {
        Some((name, _)) => name,
        None => host,
    }
}

/// Find the index of the service a request belongs to
pub fn resolve_service(services: &[Service], request: &RouteRequest<'_>) -> Option<usize> {
    let host = strip_port(request.host);

    let mut candidates = services_with_host(services, host);
    if candidates.is_empty() {
        candidates = services_with_host(services, "");
    }

    candidates.sort_by(|(_, a), (_, b)| b.url.cmp(&a.url));

    candidates
        .into_iter()
        .find(|(_, service)| request.path.starts_with(service.url.as_str()))
        .map(|(idx, _)| idx)
}

fn services_with_host<'s>(services: &'s [Service], host: &str) -> Vec<(usize, &'s Service)> {
    services
        .iter()
        .enumerate()
        .filter(|(_, service)| service.host == host)
        .collect()
}

/// Choose the pool a request is served from.
///
/// Debug is evaluated first, then gray; the first present pool whose pattern
/// matches wins, even if it has no available node. Otherwise prod serves the
/// request without consulting its pattern. Deleted pools are skipped.
pub fn select_pool(service: &Service, headers: &HeaderMap) -> Option<PoolKind> {
    for kind in [PoolKind::Debug, PoolKind::Gray] {
        if let Some(pool) = service.pools.get(kind)
            && let Some(pattern) = &pool.pattern
            && pattern.matches(headers)
        {
            return Some(kind);
        }
    }

    service.pools.get(PoolKind::Prod).map(|_| PoolKind::Prod)
}
