//! DNS resolution via the `hickory-resolver` crate, enabled with the
//! `hickory-dns` feature as an alternative to the default threadpool
//! `getaddrinfo` resolver.

use std::net::SocketAddr;

use hickory_resolver::config::LookupIpStrategy;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use once_cell::sync::Lazy;

use super::{Addrs, Name, Resolve, Resolving};
use crate::error::BoxError;

static RESOLVER: Lazy<TokioResolver> = Lazy::new(|| {
    let mut builder = match TokioResolver::builder_tokio() {
        Ok(resolver) => {
            debug!("using system DNS configuration");
            resolver
        }
        Err(e) => {
            debug!("error reading DNS system conf: {e}, using defaults");
            TokioResolver::builder_with_config(
                Default::default(),
                TokioConnectionProvider::default(),
            )
        }
    };
    builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
    builder.build()
});

/// A [`Resolve`] implementation backed by a shared, lazily-initialized
/// `hickory-resolver` instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct HickoryDnsResolver;

impl HickoryDnsResolver {
    /// Creates a resolver using the system's DNS configuration, falling
    /// back to sensible defaults if it can't be read, and looking up both
    /// IPv4 and IPv6 addresses.
    pub fn new() -> HickoryDnsResolver {
        HickoryDnsResolver
    }
}

impl Resolve for HickoryDnsResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let lookup = RESOLVER
                .lookup_ip(name.as_str())
                .await
                .map_err(|e| Box::new(e) as BoxError)?;
            let addrs: Addrs = lookup
                .into_iter()
                .map(|ip| SocketAddr::new(ip, 0))
                .collect();
            Ok(addrs)
        })
    }
}
