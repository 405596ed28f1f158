//! A TTL-based cache layered over a [`Resolve`].

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::{GaiResolver, Name, Resolve};
use crate::error::Error;

struct Entry {
    addrs: Vec<IpAddr>,
    expires_at: Instant,
}

/// A snapshot of the cache's internal counters, returned by
/// [`DnsCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from a non-expired cache entry.
    pub hits: u64,
    /// Lookups that required a fresh resolver query.
    pub misses: u64,
    /// Hosts currently cached (including expired-but-not-pruned entries).
    pub entries: usize,
}

struct Inner {
    resolver: Arc<dyn Resolve>,
    ttl: Duration,
    entries: HashMap<String, Entry>,
    hits: u64,
    misses: u64,
}

/// Caches DNS answers for `ttl`, serializing readers and the refresh path
/// through a single lock; a stale entry may briefly still be returned if a
/// refresh for the same host is concurrently in flight, which is an
/// accepted tradeoff against resolver storms.
#[derive(Clone)]
pub struct DnsCache {
    inner: Arc<RwLock<Inner>>,
}

impl std::fmt::Debug for DnsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("DnsCache")
            .field("ttl", &inner.ttl)
            .field("entries", &inner.entries.len())
            .finish()
    }
}

impl Default for DnsCache {
    fn default() -> DnsCache {
        DnsCache::new(Arc::new(GaiResolver::new()), Duration::from_secs(60))
    }
}

impl DnsCache {
    /// Creates a cache wrapping `resolver`, caching successful answers for
    /// `ttl`.
    pub fn new(resolver: Arc<dyn Resolve>, ttl: Duration) -> DnsCache {
        DnsCache {
            inner: Arc::new(RwLock::new(Inner {
                resolver,
                ttl,
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            })),
        }
    }

    /// Resolves `host`, returning a non-empty ordered list of addresses.
    /// Serves a cached, non-expired entry when available; otherwise
    /// queries the underlying resolver and caches the result.
    pub async fn resolve(&self, host: &str) -> crate::Result<Vec<IpAddr>> {
        if let Some(addrs) = self.cached(host) {
            return Ok(addrs);
        }

        let (resolver, ttl) = {
            let inner = self.inner.read();
            (inner.resolver.clone(), inner.ttl)
        };

        let addrs: Vec<IpAddr> = resolver
            .resolve(Name::new(host))
            .await
            .map_err(Error::network)?
            .into_iter()
            .map(|addr| addr.ip())
            .collect();

        if addrs.is_empty() {
            return Err(Error::network(format!("no addresses found for host {host:?}")));
        }

        let mut inner = self.inner.write();
        inner.entries.insert(
            host.to_string(),
            Entry {
                addrs: addrs.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(addrs)
    }

    /// Resolves `host` and returns only the first address.
    pub async fn resolve_first(&self, host: &str) -> crate::Result<IpAddr> {
        self.resolve(host)
            .await
            .map(|addrs| addrs[0])
    }

    fn cached(&self, host: &str) -> Option<Vec<IpAddr>> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        match inner.entries.get(host) {
            Some(entry) if entry.expires_at > now => {
                let addrs = entry.addrs.clone();
                inner.hits += 1;
                Some(addrs)
            }
            _ => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Removes the cache entry for a single host.
    pub fn clear(&self, host: &str) {
        self.inner.write().entries.remove(host);
    }

    /// Removes every cache entry.
    pub fn clear_all(&self) {
        self.inner.write().entries.clear();
    }

    /// Removes expired entries, returning the number removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.expires_at > now);
        before - inner.entries.len()
    }

    /// Changes the TTL applied to entries cached from now on; existing
    /// entries keep their original expiry.
    pub fn set_ttl(&self, ttl: Duration) {
        self.inner.write().ttl = ttl;
    }

    /// Returns a snapshot of hit/miss/entry counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }
}
