//! The public `Client`/`ClientBuilder` surface.
//!
//! Per the redesign notes, the fluent builder is a thin adapter: it only
//! assembles one [`RequestOptions`] value and hands it, plus a middleware
//! chain, to an [`Executor`](crate::executor::Executor). Nothing about
//! retries, pooling, or events lives here — this module exists to make the
//! engine pleasant to call, not to do any of its work.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use url::Url;

use crate::error::Error;
use crate::events::EventDispatcher;
use crate::executor::Executor;
use crate::into_url::{IntoUrl, IntoUrlSealed};
use crate::middleware::{Chain, Middleware};
use crate::mock::MockContext;
use crate::options::{PoolConfig, RequestOptions, RequestOptionsOverride};
use crate::proxy::Proxy;
use crate::redirect::Policy as RedirectPolicy;
use crate::request::{Request, RequestBuilder};
use crate::response::Response;
use crate::retry::RetryConfig;

#[cfg(feature = "cookies")]
use crate::cookie::CookieStore;

struct ClientInner {
    options: RequestOptions,
    executor: Executor,
}

/// A client to make requests with.
///
/// A `Client` holds a connection pool and DNS cache internally, so it's
/// cheap to clone (an `Arc` bump) and is intended to be built once and
/// reused, the same way the teacher's `reqwest`-style client is.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Default for Client {
    fn default() -> Client {
        Client::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Client {
    /// Creates a `Client` with default options. Equivalent to
    /// `Client::builder().build().unwrap()`; defaults never fail to build.
    pub fn new() -> Client {
        ClientBuilder::new().build().expect("default client options are always valid")
    }

    /// Starts building a `Client` with custom options.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Starts a `GET` request.
    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Starts a `POST` request.
    pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Starts a `PUT` request.
    pub fn put<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Starts a `PATCH` request.
    pub fn patch<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    /// Starts a `DELETE` request.
    pub fn delete<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Starts a `HEAD` request.
    pub fn head<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    /// Starts an `OPTIONS` request.
    pub fn options<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::OPTIONS, url)
    }

    /// Starts a request with an arbitrary method.
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        let built = self.resolve_url(url).map(|url| Request::new(method, url));
        RequestBuilder::new(self.clone(), built)
    }

    fn resolve_url<U: IntoUrl>(&self, url: U) -> crate::Result<Url> {
        crate::into_url::resolve(url.as_str(), self.inner.options.base_uri.as_ref())
    }

    /// The client-wide default options new requests are built against.
    pub fn options(&self) -> &RequestOptions {
        &self.inner.options
    }

    /// A snapshot of the connection pool's counters.
    pub fn pool_stats(&self) -> crate::pool::PoolStats {
        self.inner.executor.pool().stats()
    }

    /// A snapshot of the DNS cache's hit/miss counters.
    pub fn dns_stats(&self) -> crate::dns::CacheStats {
        self.inner.executor.dns().stats()
    }

    /// Closes every idle pooled connection. Active (borrowed) connections
    /// finish their in-flight request but are not returned for reuse.
    pub fn close_idle_connections(&self) {
        self.inner.executor.pool().close_all();
    }

    /// Dispatches a built `Request`, merging `overrides` onto the client's
    /// default options (`overrides` wins field-by-field), and appending any
    /// client-wide default query parameters.
    pub(crate) async fn execute(
        &self,
        mut request: Request,
        overrides: RequestOptionsOverride,
    ) -> crate::Result<Response> {
        let options = self.inner.options.merged_with(&overrides);

        if !options.query.is_empty() {
            let mut url = request.url().clone();
            {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in &options.query {
                    pairs.append_pair(key, value);
                }
            }
            *request.url_mut() = url;
        }

        #[cfg(feature = "cookies")]
        if let Some(store) = &options.cookie_store {
            if let Some(cookie) = store.cookies(request.url()) {
                request.headers_mut().insert(http::header::COOKIE, cookie);
            }
        }

        let response = self.inner.executor.execute(request, &options).await;

        #[cfg(feature = "cookies")]
        if let (Some(store), Ok(resp)) = (&options.cookie_store, &response) {
            let mut headers = resp.headers().get_all(http::header::SET_COOKIE).iter();
            store.set_cookies(&mut headers, resp.url());
        }

        response
    }
}

/// A builder to construct a [`Client`].
///
/// Per the redesign notes, this is deliberately thin: every setter stores
/// its value directly on the [`RequestOptions`] the eventual `Client` will
/// hold as its defaults, and `build()` does nothing but hand that struct
/// plus a middleware chain to an [`Executor`].
pub struct ClientBuilder {
    options: RequestOptions,
    middleware: Chain,
}

impl Default for ClientBuilder {
    fn default() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder").field("options", &self.options).finish()
    }
}

impl ClientBuilder {
    /// Starts a builder with every [`RequestOptions`] default (see §6 of
    /// the design).
    pub fn new() -> ClientBuilder {
        ClientBuilder {
            options: RequestOptions::default(),
            middleware: Chain::new(),
        }
    }

    /// Sets the base URI relative request paths are resolved against.
    pub fn base_uri<U: IntoUrl>(mut self, url: U) -> crate::Result<ClientBuilder> {
        self.options.base_uri = Some(url.into_url()?);
        Ok(self)
    }

    /// Overrides the per-attempt timeout (default 30s). Re-applied fresh to
    /// each retry; it does not bound the whole logical call.
    pub fn timeout(mut self, timeout: Duration) -> ClientBuilder {
        self.options.timeout = Some(timeout);
        self
    }

    /// Disables the per-attempt timeout entirely.
    pub fn no_timeout(mut self) -> ClientBuilder {
        self.options.timeout = None;
        self
    }

    /// Overrides the per-attempt connect timeout (default 10s).
    pub fn connect_timeout(mut self, timeout: Duration) -> ClientBuilder {
        self.options.connect_timeout = Some(timeout);
        self
    }

    /// Sets the retry policy (classifier + exponential backoff).
    pub fn retry(mut self, retry: RetryConfig) -> ClientBuilder {
        self.options.retry = retry;
        self
    }

    /// Sets the redirect-following policy (default: follow up to 10 hops).
    pub fn redirect(mut self, policy: RedirectPolicy) -> ClientBuilder {
        self.options.redirect = policy;
        self
    }

    /// Tunes connection-pool behavior.
    pub fn pool(mut self, pool: PoolConfig) -> ClientBuilder {
        self.options.pool = pool;
        self
    }

    /// Routes every request through `proxy`.
    pub fn proxy(mut self, proxy: Proxy) -> ClientBuilder {
        self.options.proxy = Some(proxy);
        self
    }

    /// Attaches a persistent cookie jar.
    #[cfg(feature = "cookies")]
    pub fn cookie_store(mut self, store: Arc<dyn CookieStore>) -> ClientBuilder {
        self.options.cookie_store = Some(store);
        self
    }

    /// Attaches an in-memory cookie jar (shorthand for
    /// `cookie_store(Arc::new(Jar::new()))`).
    #[cfg(feature = "cookies")]
    pub fn cookie_store_default(self) -> ClientBuilder {
        self.cookie_store(Arc::new(crate::cookie::Jar::new()))
    }

    /// Attaches a mock interceptor the executor consults before touching
    /// DNS or the connection pool.
    pub fn mock(mut self, mock: MockContext) -> ClientBuilder {
        self.options.mock = Some(mock);
        self
    }

    /// Attaches an event dispatcher (otherwise an empty one is created).
    pub fn events(mut self, events: EventDispatcher) -> ClientBuilder {
        self.options.events = events;
        self
    }

    /// Appends a query parameter sent with every request made by the
    /// eventual client, in addition to anything a call adds itself.
    pub fn query<T: ToString>(mut self, key: &str, value: T) -> ClientBuilder {
        self.options.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Enables verbose `tracing` output for every call made by the
    /// eventual client.
    pub fn debug(mut self, enabled: bool) -> ClientBuilder {
        self.options.debug = enabled;
        self
    }

    /// Controls whether this client sends `Accept-Encoding: gzip` and
    /// transparently decodes a gzip-encoded response body. Enabled by
    /// default when the `gzip` feature is compiled in.
    #[cfg(feature = "gzip")]
    pub fn gzip(mut self, enabled: bool) -> ClientBuilder {
        self.options.gzip = enabled;
        self
    }

    /// Appends `middleware` as the new innermost layer of the chain, run
    /// after every previously-registered middleware but before the
    /// terminal DNS/pool/transport handler.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> ClientBuilder {
        self.middleware.push(middleware);
        self
    }

    /// Assembles the `Client`.
    pub fn build(self) -> crate::Result<Client> {
        let executor = Executor::new(&self.options, self.middleware);
        Ok(Client {
            inner: Arc::new(ClientInner {
                options: self.options,
                executor,
            }),
        })
    }

    /// Builds options from a loosely-typed string map — the entry point a
    /// dynamically-configured caller (e.g. options sourced from a config
    /// file) would use instead of the strongly-typed setters above.
    ///
    /// Recognized keys: `base_uri`, `timeout` (seconds), `connect_timeout`
    /// (seconds), `retries` (count), `retry_delay` (milliseconds), `debug`
    /// (`"true"`/`"false"`). An unknown key is rejected with
    /// [`Kind::Builder`](crate::error::Kind::Builder) rather than silently
    /// ignored — see SPEC_FULL.md §9's resolution of that open question.
    pub fn options_from_map(mut self, map: &HashMap<String, String>) -> crate::Result<ClientBuilder> {
        const RECOGNIZED: &[&str] = &["base_uri", "timeout", "connect_timeout", "retries", "retry_delay", "debug"];

        for key in map.keys() {
            if !RECOGNIZED.contains(&key.as_str()) {
                return Err(Error::builder(format!("unrecognized option key: {key:?}")));
            }
        }

        if let Some(v) = map.get("base_uri") {
            self = self.base_uri(v.as_str())?;
        }
        if let Some(v) = map.get("timeout") {
            let secs: u64 = v
                .parse()
                .map_err(|_| Error::builder(format!("invalid timeout value: {v:?}")))?;
            self = self.timeout(Duration::from_secs(secs));
        }
        if let Some(v) = map.get("connect_timeout") {
            let secs: u64 = v
                .parse()
                .map_err(|_| Error::builder(format!("invalid connect_timeout value: {v:?}")))?;
            self = self.connect_timeout(Duration::from_secs(secs));
        }
        if map.contains_key("retries") || map.contains_key("retry_delay") {
            let mut retry = self.options.retry.clone();
            if let Some(v) = map.get("retries") {
                retry.max_retries = v
                    .parse()
                    .map_err(|_| Error::builder(format!("invalid retries value: {v:?}")))?;
            }
            if let Some(v) = map.get("retry_delay") {
                let ms: u64 = v
                    .parse()
                    .map_err(|_| Error::builder(format!("invalid retry_delay value: {v:?}")))?;
                retry.base_delay = Duration::from_millis(ms);
            }
            self = self.retry(retry);
        }
        if let Some(v) = map.get("debug") {
            let enabled = match v.as_str() {
                "true" => true,
                "false" => false,
                _ => return Err(Error::builder(format!("invalid debug value: {v:?}"))),
            };
            self = self.debug(enabled);
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockResponse;

    #[tokio::test]
    async fn get_sends_through_mock() {
        let mock = MockContext::new();
        mock.when("https://api.example.com/", MockResponse::ok("hi"));
        let client = Client::builder().mock(mock).build().unwrap();
        let resp = client.get("https://api.example.com/").send().await.unwrap();
        assert_eq!(resp.text().unwrap(), "hi");
    }

    #[tokio::test]
    async fn relative_url_requires_base_uri() {
        let client = Client::new();
        let err = client.get("relative/path").build().unwrap_err();
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn base_uri_resolves_relative_paths() {
        let mock = MockContext::new();
        mock.when("https://api.example.com/v1/users", MockResponse::ok("ok"));
        let client = Client::builder()
            .base_uri("https://api.example.com/v1/")
            .unwrap()
            .mock(mock)
            .build()
            .unwrap();
        let resp = client.get("users").send().await.unwrap();
        assert_eq!(resp.text().unwrap(), "ok");
    }

    #[test]
    fn options_from_map_rejects_unknown_keys() {
        let mut map = HashMap::new();
        map.insert("bogus".to_string(), "1".to_string());
        let err = ClientBuilder::new().options_from_map(&map).unwrap_err();
        assert!(err.is_builder());
    }

    #[test]
    fn options_from_map_applies_recognized_keys() {
        let mut map = HashMap::new();
        map.insert("retries".to_string(), "5".to_string());
        map.insert("retry_delay".to_string(), "20".to_string());
        let builder = ClientBuilder::new().options_from_map(&map).unwrap();
        assert_eq!(builder.options.retry.max_retries, 5);
        assert_eq!(builder.options.retry.base_delay, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn redirect_chain_is_capped() {
        let mock = MockContext::new();
        mock.when(
            "https://api.example.com/a",
            MockResponse::status(http::StatusCode::FOUND)
                .with_header(http::header::LOCATION, http::HeaderValue::from_static("https://api.example.com/b")),
        );
        mock.when(
            "https://api.example.com/b",
            MockResponse::status(http::StatusCode::FOUND)
                .with_header(http::header::LOCATION, http::HeaderValue::from_static("https://api.example.com/a")),
        );

        let client = Client::builder()
            .mock(mock)
            .redirect(RedirectPolicy::limited(2))
            .build()
            .unwrap();

        let err = client.get("https://api.example.com/a").send().await.unwrap_err();
        assert!(err.is_redirect());
    }
}
