//! HTTP cookie jar support.
//!
//! Reduced from the teacher's `cookie.rs`: kept the `CookieStore` trait and
//! the `Jar` reference implementation backed by the `cookie_store` crate,
//! dropped the borrowed `Cookie`/`CookieBuilder` wrapper API the teacher
//! exposes for constructing cookies by hand, since nothing in the spec's
//! data model calls for it — the engine only ever reads `Set-Cookie`
//! response headers and writes `Cookie` request headers.

use std::fmt;

use http::HeaderValue;
use parking_lot::RwLock;
use url::Url;

/// A persistent cookie store used to carry session state across requests
/// made with the same `Client`.
pub trait CookieStore: Send + Sync {
    /// Stores the `Set-Cookie` header values received from `url`.
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url);

    /// Returns the `Cookie` header value, if any, to send for `url`.
    fn cookies(&self, url: &Url) -> Option<HeaderValue>;
}

/// An in-memory, thread-safe `CookieStore` implementation.
pub struct Jar(RwLock<cookie_store::CookieStore>);

impl Default for Jar {
    fn default() -> Jar {
        Jar(RwLock::new(cookie_store::CookieStore::default()))
    }
}

impl fmt::Debug for Jar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jar").finish_non_exhaustive()
    }
}

impl Jar {
    /// Creates an empty jar.
    pub fn new() -> Jar {
        Jar::default()
    }
}

impl CookieStore for Jar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let iter = cookie_headers.filter_map(|val| {
            std::str::from_utf8(val.as_bytes())
                .ok()
                .and_then(|s| cookie_store::RawCookie::parse(s.to_owned()).ok())
                .map(cookie_store::Cookie::try_from_raw_cookie)
                .and_then(Result::ok)
        });

        let mut store = self.0.write();
        store.store_response_cookies(iter, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let store = self.0.read();
        let value = store
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");

        if value.is_empty() {
            None
        } else {
            HeaderValue::from_maybe_shared(bytes::Bytes::from(value)).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_cookie() {
        let jar = Jar::new();
        let url = Url::parse("https://example.com/").unwrap();
        let set_cookie = HeaderValue::from_static("session=abc123; Path=/");
        jar.set_cookies(&mut std::iter::once(&set_cookie), &url);

        let sent = jar.cookies(&url).expect("cookie should round-trip");
        assert_eq!(sent, "session=abc123");
    }

    #[test]
    fn empty_jar_sends_nothing() {
        let jar = Jar::new();
        let url = Url::parse("https://example.com/").unwrap();
        assert!(jar.cookies(&url).is_none());
    }
}
