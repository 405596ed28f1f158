//! Proxy configuration.
//!
//! SPEC_FULL.md's option table names a single `proxy` URL override with no
//! mention of per-scheme rules, a system-proxy reader, or SOCKS support, so
//! this is reduced from the teacher's `Proxy`/`Intercept`/`NoProxy` stack to
//! the one thing the spec actually asks for: an optional proxy URL, plus a
//! no-proxy host allow-list.

use url::Url;

use crate::error::Error;
use crate::into_url::IntoUrl;

/// A proxy that requests may be routed through.
#[derive(Clone, Debug)]
pub struct Proxy {
    url: Url,
    no_proxy: Vec<String>,
}

impl Proxy {
    /// Routes every request, regardless of scheme, through `proxy_url`.
    pub fn all<U: IntoUrl>(proxy_url: U) -> crate::Result<Proxy> {
        Ok(Proxy {
            url: proxy_url.into_url()?,
            no_proxy: Vec::new(),
        })
    }

    /// Hosts (exact match) that should bypass this proxy.
    pub fn no_proxy(mut self, hosts: impl IntoIterator<Item = impl Into<String>>) -> Proxy {
        self.no_proxy = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// The proxy's own URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// True if `target` should bypass this proxy.
    pub(crate) fn bypasses(&self, target: &Url) -> bool {
        target
            .host_str()
            .is_some_and(|host| self.no_proxy.iter().any(|skip| skip == host))
    }

    pub(crate) fn for_url(&self, target: &Url) -> Option<&Url> {
        if self.bypasses(target) {
            None
        } else {
            Some(&self.url)
        }
    }
}

impl TryFrom<&str> for Proxy {
    type Error = Error;

    fn try_from(value: &str) -> Result<Proxy, Error> {
        Proxy::all(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypasses_listed_hosts() {
        let proxy = Proxy::all("http://proxy.local:8080")
            .unwrap()
            .no_proxy(["internal.example.com"]);
        let target = Url::parse("https://internal.example.com/x").unwrap();
        assert!(proxy.bypasses(&target));
        assert!(proxy.for_url(&target).is_none());
    }

    #[test]
    fn routes_unlisted_hosts() {
        let proxy = Proxy::all("http://proxy.local:8080").unwrap();
        let target = Url::parse("https://api.example.com/x").unwrap();
        assert!(!proxy.bypasses(&target));
        assert!(proxy.for_url(&target).is_some());
    }
}
