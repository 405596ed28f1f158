//! Consolidated request and client configuration.
//!
//! The original engine's configuration surface was spread across several
//! overlapping interfaces (per-call options, a client-wide default options
//! object, and ad-hoc keyword arguments). Per the redesign notes, this
//! engine consolidates all of that into one concrete [`RequestOptions`]
//! value: a client builds a default `RequestOptions`, and a per-call
//! request is free to override any field before it is merged in by the
//! executor.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::events::EventDispatcher;
#[cfg(feature = "cookies")]
use crate::cookie::CookieStore;
use crate::mock::MockContext;
use crate::proxy::Proxy;
use crate::redirect::Policy as RedirectPolicy;
use crate::retry::RetryConfig;

/// Connection-pool tuning, mirrored on [`RequestOptions`] so a single call
/// can override the client-wide defaults.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum idle connections kept per origin.
    pub max_idle_per_host: usize,
    /// How long an idle connection may sit before it is evicted.
    pub idle_timeout: Option<Duration>,
    /// Upper bound on simultaneously active connections per origin. `None`
    /// means unbounded.
    pub max_connections_per_host: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> PoolConfig {
        PoolConfig {
            max_idle_per_host: 32,
            idle_timeout: Some(Duration::from_secs(90)),
            max_connections_per_host: None,
        }
    }
}

/// TLS client identity material, used only when the caller wants mutual TLS.
#[derive(Clone, Debug, Default)]
pub struct TlsIdentity {
    /// Path to a PEM-encoded client certificate.
    pub cert_path: Option<String>,
    /// Path to a PEM-encoded private key.
    pub key_path: Option<String>,
    /// Path to a PEM bundle of extra trusted CA certificates.
    pub ca_bundle_path: Option<String>,
    /// When `true`, TLS certificate verification is skipped. Exists for
    /// local development against self-signed endpoints; never the default.
    pub accept_invalid_certs: bool,
}

/// Per-call or client-wide request configuration.
///
/// A [`crate::client::Client`] holds one `RequestOptions` as its defaults;
/// [`crate::request::RequestBuilder`] methods override individual fields for
/// a single call. The executor merges the two (the per-call value wins
/// where set) before dispatch.
#[derive(Clone)]
pub struct RequestOptions {
    /// Base URI relative request paths are resolved against.
    pub base_uri: Option<Url>,
    /// Extra query parameters appended to every request made with these
    /// options, in addition to any the caller supplied on the URI itself.
    pub query: Vec<(String, String)>,
    /// Time budget for a single attempt. Applied fresh to each retry; the
    /// engine does not enforce a whole-call budget across retries (see
    /// `cancellation_token` for that).
    pub timeout: Option<Duration>,
    /// Time budget to establish a connection, per attempt.
    pub connect_timeout: Option<Duration>,
    /// Proxy configuration, if any.
    pub proxy: Option<Proxy>,
    /// Mutual TLS identity / CA trust overrides.
    pub tls: TlsIdentity,
    /// Redirect-following policy.
    pub redirect: RedirectPolicy,
    /// Retry policy (classifier + backoff).
    pub retry: RetryConfig,
    /// Connection-pool tuning.
    pub pool: PoolConfig,
    /// Cookie jar to read from and write `Set-Cookie` responses into.
    #[cfg(feature = "cookies")]
    pub cookie_store: Option<Arc<dyn CookieStore>>,
    /// When set, the engine looks up mocks from this context before
    /// touching DNS or the connection pool, instead of a hidden process
    /// global (see the redesign notes on singletons).
    pub mock: Option<MockContext>,
    /// Listeners for the lifecycle events described in the event model.
    pub events: EventDispatcher,
    /// Reserved for a future RFC 7234 cache layer; unused today.
    pub cache_enabled: bool,
    /// Emit `tracing` spans/events at `debug` level for each attempt.
    pub debug: bool,
    /// Whether the engine sends `Accept-Encoding: gzip` and transparently
    /// decodes a gzip-encoded response body. Always `false` when the
    /// `gzip` feature is disabled.
    #[cfg(feature = "gzip")]
    pub gzip: bool,
    /// When signaled, the in-flight attempt is aborted with a
    /// cancellation-kind error and no retry is attempted.
    pub cancellation_token: Option<CancellationToken>,
}

impl Default for RequestOptions {
    fn default() -> RequestOptions {
        RequestOptions {
            base_uri: None,
            query: Vec::new(),
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            proxy: None,
            tls: TlsIdentity::default(),
            redirect: RedirectPolicy::default(),
            retry: RetryConfig::default(),
            pool: PoolConfig::default(),
            #[cfg(feature = "cookies")]
            cookie_store: None,
            mock: None,
            events: EventDispatcher::new(),
            cache_enabled: false,
            debug: false,
            #[cfg(feature = "gzip")]
            gzip: true,
            cancellation_token: None,
        }
    }
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("base_uri", &self.base_uri)
            .field("query", &self.query)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("redirect", &self.redirect)
            .field("retry", &self.retry)
            .field("pool", &self.pool)
            .field("cache_enabled", &self.cache_enabled)
            .field("debug", &self.debug)
            .finish()
    }
}

impl RequestOptions {
    /// Overlays `other`'s explicitly-set fields onto `self`, returning the
    /// merged options. Used by the executor to combine client-wide defaults
    /// with a per-call override; `other` wins.
    pub(crate) fn merged_with(&self, other: &RequestOptionsOverride) -> RequestOptions {
        let mut merged = self.clone();
        if let Some(v) = other.timeout {
            merged.timeout = Some(v);
        }
        if let Some(v) = other.connect_timeout {
            merged.connect_timeout = Some(v);
        }
        if let Some(v) = &other.retry {
            merged.retry = v.clone();
        }
        if let Some(v) = other.debug {
            merged.debug = v;
        }
        if let Some(v) = &other.cancellation_token {
            merged.cancellation_token = Some(v.clone());
        }
        merged
    }
}

/// A sparse, per-call set of overrides layered onto a [`Client`](crate::client::Client)'s
/// default `RequestOptions` by [`crate::request::RequestBuilder`].
///
/// No `base_uri` field: relative request paths are resolved against the
/// client's base URI at `RequestBuilder` construction time, before any
/// per-call override exists to consult, so a per-call base URI override
/// has nothing left to act on by the time one could be applied.
#[derive(Clone, Debug, Default)]
pub(crate) struct RequestOptionsOverride {
    pub(crate) timeout: Option<Duration>,
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) retry: Option<RetryConfig>,
    pub(crate) debug: Option<bool>,
    pub(crate) cancellation_token: Option<CancellationToken>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overrides_client_defaults() {
        let base = RequestOptions::default();
        let mut over = RequestOptionsOverride::default();
        over.timeout = Some(Duration::from_secs(5));
        let merged = base.merged_with(&over);
        assert_eq!(merged.timeout, Some(Duration::from_secs(5)));
        assert_eq!(merged.connect_timeout, base.connect_timeout);
    }
}
