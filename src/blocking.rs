//! A synchronous client built atop the async engine.
//!
//! Grounded on the teacher's `blocking/client.rs::ClientHandle`: a
//! dedicated single-threaded Tokio runtime, reached from ordinary
//! synchronous code over a channel rather than by nesting a second runtime
//! inside whatever the caller happens to be running on. This is what makes
//! `blocking::Client` safe to call even from within another async runtime's
//! worker thread, which a naive `Runtime::block_on` would panic on.
//!
//! Nothing about retries, events, pooling, or mocking differs from the
//! async path — both sides ultimately call the same
//! [`crate::executor::Executor`].

use std::fmt;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use http::Method;

use crate::error::Error;
use crate::into_url::IntoUrl;
use crate::options::RequestOptionsOverride;
use crate::request::Request;
use crate::response::Response;
use crate::retry::RetryConfig;

#[cfg(feature = "multipart")]
use crate::body::Multipart;
use crate::body::Body;

enum Job {
    Execute {
        client: crate::client::Client,
        request: Request,
        overrides: RequestOptionsOverride,
        reply: std_mpsc::Sender<crate::Result<Response>>,
    },
}

/// The dedicated background runtime a [`Client`] submits work to.
struct Handle {
    jobs: tokio::sync::mpsc::UnboundedSender<Job>,
}

impl Handle {
    fn spawn() -> crate::Result<Handle> {
        let (jobs_tx, mut jobs_rx) = tokio::sync::mpsc::unbounded_channel::<Job>();

        thread::Builder::new()
            .name("fetchr-blocking".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt,
                    Err(_) => return,
                };
                rt.block_on(async move {
                    while let Some(job) = jobs_rx.recv().await {
                        match job {
                            Job::Execute {
                                client,
                                request,
                                overrides,
                                reply,
                            } => {
                                tokio::task::spawn(async move {
                                    let result = client.execute(request, overrides).await;
                                    let _ = reply.send(result);
                                });
                            }
                        }
                    }
                });
            })
            .map_err(Error::builder)?;

        Ok(Handle { jobs: jobs_tx })
    }

    fn execute(
        &self,
        client: crate::client::Client,
        request: Request,
        overrides: RequestOptionsOverride,
    ) -> crate::Result<Response> {
        let (reply_tx, reply_rx) = std_mpsc::channel();
        self.jobs
            .send(Job::Execute {
                client,
                request,
                overrides,
                reply: reply_tx,
            })
            .map_err(|_| Error::cancelled())?;
        reply_rx.recv().map_err(|_| Error::cancelled())?
    }
}

/// A blocking `Client` to make requests with.
///
/// Cheap to clone — the inner async [`crate::client::Client`] is already
/// `Arc`-backed, and the background runtime handle is shared too.
#[derive(Clone)]
pub struct Client {
    inner: crate::client::Client,
    handle: Arc<Handle>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("blocking::Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a blocking client with default options.
    pub fn new() -> Client {
        ClientBuilder::new().build().expect("default client options are always valid")
    }

    /// Starts building a blocking client with custom options.
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

    /// Starts a request with an arbitrary method.
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        RequestBuilder {
            inner: self.inner.request(method, url),
            handle: self.handle.clone(),
        }
    }
}

impl Default for Client {
    fn default() -> Client {
        Client::new()
    }
}

/// A builder to construct a blocking [`Client`].
pub struct ClientBuilder {
    inner: crate::client::ClientBuilder,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("blocking::ClientBuilder").finish_non_exhaustive()
    }
}

impl Default for ClientBuilder {
    fn default() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl ClientBuilder {
    /// Starts a builder with every default.
    pub fn new() -> ClientBuilder {
        ClientBuilder {
            inner: crate::client::ClientBuilder::new(),
        }
    }

    /// Sets the base URI relative request paths are resolved against.
    pub fn base_uri<U: IntoUrl>(mut self, url: U) -> crate::Result<ClientBuilder> {
        self.inner = self.inner.base_uri(url)?;
        Ok(self)
    }

    /// Overrides the per-attempt timeout, re-applied fresh to each retry
    /// (default 30s).
    pub fn timeout(mut self, timeout: Duration) -> ClientBuilder {
        self.inner = self.inner.timeout(timeout);
        self
    }

    /// Overrides the per-attempt connect timeout (default 10s).
    pub fn connect_timeout(mut self, timeout: Duration) -> ClientBuilder {
        self.inner = self.inner.connect_timeout(timeout);
        self
    }

    /// Sets the retry policy (classifier + exponential backoff).
    pub fn retry(mut self, retry: RetryConfig) -> ClientBuilder {
        self.inner = self.inner.retry(retry);
        self
    }

    /// Sets the redirect-following policy (default: follow up to 10 hops).
    pub fn redirect(mut self, policy: crate::redirect::Policy) -> ClientBuilder {
        self.inner = self.inner.redirect(policy);
        self
    }

    /// Attaches a mock interceptor the executor consults before touching
    /// DNS or the connection pool.
    pub fn mock(mut self, mock: crate::mock::MockContext) -> ClientBuilder {
        self.inner = self.inner.mock(mock);
        self
    }

    /// Enables verbose `tracing` output for every call made by the
    /// eventual client.
    pub fn debug(mut self, enabled: bool) -> ClientBuilder {
        self.inner = self.inner.debug(enabled);
        self
    }

    /// Assembles the blocking `Client`, spawning its dedicated background
    /// runtime thread.
    pub fn build(self) -> crate::Result<Client> {
        Ok(Client {
            inner: self.inner.build()?,
            handle: Arc::new(Handle::spawn()?),
        })
    }
}

/// A builder to construct the properties of a blocking request.
#[must_use = "RequestBuilder does nothing until you 'send' it"]
pub struct RequestBuilder {
    inner: crate::request::RequestBuilder,
    handle: Arc<Handle>,
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl RequestBuilder {
    /// Sets a header, replacing any existing value for the same name.
    pub fn header<K, V>(mut self, key: K, value: V) -> RequestBuilder
    where
        http::HeaderName: TryFrom<K>,
        <http::HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        http::HeaderValue: TryFrom<V>,
        <http::HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.inner = self.inner.header(key, value);
        self
    }

    /// Merges a full set of headers into the request.
    pub fn headers(mut self, headers: http::HeaderMap) -> RequestBuilder {
        self.inner = self.inner.headers(headers);
        self
    }

    /// Appends a query parameter to the request URL.
    pub fn query<T: ToString>(mut self, key: &str, value: T) -> RequestBuilder {
        self.inner = self.inner.query(key, value);
        self
    }

    /// Sets HTTP Basic authentication on the request.
    pub fn basic_auth<U, P>(mut self, username: U, password: Option<P>) -> RequestBuilder
    where
        U: fmt::Display,
        P: fmt::Display,
    {
        self.inner = self.inner.basic_auth(username, password);
        self
    }

    /// Sets a `Bearer` authorization header on the request.
    pub fn bearer_auth<T: fmt::Display>(mut self, token: T) -> RequestBuilder {
        self.inner = self.inner.bearer_auth(token);
        self
    }

    /// Sets the request body to a raw byte payload.
    pub fn body<T: Into<Body>>(mut self, body: T) -> RequestBuilder {
        self.inner = self.inner.body(body);
        self
    }

    /// Sends `form` as an `application/x-www-form-urlencoded` body.
    pub fn form<T: serde::Serialize + ?Sized>(mut self, form: &T) -> RequestBuilder {
        self.inner = self.inner.form(form);
        self
    }

    /// Sends `json` as an `application/json` body.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize + ?Sized>(mut self, json: &T) -> RequestBuilder {
        self.inner = self.inner.json(json);
        self
    }

    /// Sends `multipart` as a `multipart/form-data` body.
    #[cfg(feature = "multipart")]
    pub fn multipart(mut self, multipart: Multipart) -> RequestBuilder {
        self.inner = self.inner.multipart(multipart);
        self
    }

    /// Overrides the per-attempt timeout, re-applied fresh to each retry.
    pub fn timeout(mut self, timeout: Duration) -> RequestBuilder {
        self.inner = self.inner.timeout(timeout);
        self
    }

    /// Overrides the call's per-attempt connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> RequestBuilder {
        self.inner = self.inner.connect_timeout(timeout);
        self
    }

    /// Overrides the client's retry policy for this call only.
    pub fn retry(mut self, retry: RetryConfig) -> RequestBuilder {
        self.inner = self.inner.retry(retry);
        self
    }

    /// Enables verbose `tracing` output for this call only.
    pub fn debug(mut self, enabled: bool) -> RequestBuilder {
        self.inner = self.inner.debug(enabled);
        self
    }

    /// Returns the assembled request, assuming no builder method failed.
    pub fn build(self) -> crate::Result<Request> {
        self.inner.build()
    }

    /// Dispatches the request on the dedicated background runtime and
    /// blocks the calling thread until it completes.
    pub fn send(self) -> crate::Result<Response> {
        let (client, request, overrides) = self.inner.into_parts();
        let request = request?;
        self.handle.execute(client, request, overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockResponse;

    #[test]
    fn get_sends_through_mock() {
        let mock = crate::mock::MockContext::new();
        mock.when("https://api.example.com/", MockResponse::ok("hi"));
        let client = Client::builder().mock(mock).build().unwrap();
        let resp = client.get("https://api.example.com/").send().unwrap();
        assert_eq!(resp.text().unwrap(), "hi");
    }

    #[test]
    fn works_from_inside_an_async_runtime() {
        let mock = crate::mock::MockContext::new();
        mock.when("https://api.example.com/nested", MockResponse::ok("ok"));
        let client = Client::builder().mock(mock).build().unwrap();

        let rt = tokio::runtime::Runtime::new().unwrap();
        let resp = rt.block_on(async {
            // Running inside a second, outer runtime would panic a naive
            // `Runtime::block_on`-based blocking client; the dedicated
            // background thread sidesteps that entirely.
            tokio::task::spawn_blocking(move || client.get("https://api.example.com/nested").send())
                .await
                .unwrap()
        });
        assert_eq!(resp.unwrap().text().unwrap(), "ok");
    }
}
