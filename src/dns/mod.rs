//! DNS resolution and the TTL cache layered over it.

mod cache;
#[cfg(feature = "hickory-dns")]
mod hickory;

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

pub use cache::{CacheStats, DnsCache};
#[cfg(feature = "hickory-dns")]
pub use hickory::HickoryDnsResolver;

use crate::error::BoxError;

/// A domain name to resolve into addresses.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name {
    host: Box<str>,
}

impl Name {
    /// Creates a `Name` from a host string.
    pub fn new(host: impl Into<Box<str>>) -> Name {
        Name { host: host.into() }
    }

    /// Views the hostname as a string slice.
    pub fn as_str(&self) -> &str {
        &self.host
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Name {
        Name::new(value)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.host, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.host, f)
    }
}

/// An iterator of resolved addresses.
pub type Addrs = Vec<SocketAddr>;

/// The future type returned by a resolver.
pub type Resolving = Pin<Box<dyn Future<Output = Result<Addrs, BoxError>> + Send>>;

/// A pluggable DNS resolver.
///
/// It is assumed `resolve` is always ready to poll and needs no mutable
/// access to `self`, unlike a `tower::Service<Name>` — this is a narrower,
/// purpose-built trait rather than a generic service.
pub trait Resolve: Send + Sync {
    /// Resolves `name` into a set of candidate addresses.
    fn resolve(&self, name: Name) -> Resolving;
}

/// The default resolver: the platform's threadpool-backed `getaddrinfo`,
/// via `tokio::net::lookup_host`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GaiResolver;

impl GaiResolver {
    /// Creates a new resolver.
    pub fn new() -> GaiResolver {
        GaiResolver
    }
}

impl Resolve for GaiResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            // Port 0 is a placeholder; the caller overrides it once the
            // request's own scheme/URI port is known.
            let target = format!("{}:0", name.as_str());
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host(target)
                .await
                .map_err(|e| Box::new(e) as BoxError)?
                .collect();
            Ok(addrs)
        })
    }
}

/// Converts a type into a shared, type-erased resolver.
pub trait IntoResolve {
    /// Converts `self` into an `Arc<dyn Resolve>`.
    fn into_resolve(self) -> Arc<dyn Resolve>;
}

impl IntoResolve for Arc<dyn Resolve> {
    fn into_resolve(self) -> Arc<dyn Resolve> {
        self
    }
}

impl<R: Resolve + 'static> IntoResolve for Arc<R> {
    fn into_resolve(self) -> Arc<dyn Resolve> {
        self
    }
}

impl<R: Resolve + 'static> IntoResolve for R {
    fn into_resolve(self) -> Arc<dyn Resolve> {
        Arc::new(self)
    }
}
