//! Requests and the builder used to assemble them.

use std::fmt;
use std::time::Duration;

use http::{HeaderName, HeaderValue, Method, Version};
use url::Url;

use crate::body::Body;
#[cfg(feature = "multipart")]
use crate::body::Multipart;
use crate::client::Client;
use crate::error::Error;
use crate::options::RequestOptionsOverride;
use crate::response::Response;
use crate::util;

/// A request which can be executed with [`Client::execute`].
#[derive(Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: http::HeaderMap,
    body: Option<Body>,
    version: Option<Version>,
}

impl Request {
    /// Constructs a new request with no headers or body.
    pub fn new(method: Method, url: Url) -> Request {
        Request {
            method,
            url,
            headers: http::HeaderMap::new(),
            body: None,
            version: None,
        }
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// A mutable reference to the request method.
    pub fn method_mut(&mut self) -> &mut Method {
        &mut self.method
    }

    /// The request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// A mutable reference to the request URL.
    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    /// The request headers.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }

    /// A mutable reference to the request headers.
    pub fn headers_mut(&mut self) -> &mut http::HeaderMap {
        &mut self.headers
    }

    /// The request body, if one was set.
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// A mutable reference to the request body.
    pub fn body_mut(&mut self) -> &mut Option<Body> {
        &mut self.body
    }

    /// The explicit HTTP version override, if any.
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    /// Clones the request. Always succeeds, since bodies are buffered
    /// bytes rather than one-shot streams (see `src/body.rs`).
    pub fn try_clone(&self) -> Request {
        self.clone()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .finish()
    }
}

/// A builder to construct the properties of a [`Request`].
///
/// Built via [`Client::get`]/[`Client::post`]/etc; does nothing until
/// [`send`](RequestBuilder::send) is called.
#[must_use = "RequestBuilder does nothing until you 'send' it"]
pub struct RequestBuilder {
    client: Client,
    request: crate::Result<Request>,
    overrides: RequestOptionsOverride,
}

impl RequestBuilder {
    pub(crate) fn new(client: Client, request: crate::Result<Request>) -> RequestBuilder {
        RequestBuilder {
            client,
            request,
            overrides: RequestOptionsOverride::default(),
        }
    }

    /// Sets a header, replacing any existing value for the same name.
    pub fn header<K, V>(mut self, key: K, value: V) -> RequestBuilder
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if let Ok(ref mut req) = self.request {
            match (
                <HeaderName as TryFrom<K>>::try_from(key),
                <HeaderValue as TryFrom<V>>::try_from(value),
            ) {
                (Ok(key), Ok(value)) => {
                    req.headers_mut().insert(key, value);
                }
                (Err(e), _) => self.request = Err(Error::builder(e.into())),
                (_, Err(e)) => self.request = Err(Error::builder(e.into())),
            }
        }
        self
    }

    /// Merges a full set of headers into the request.
    pub fn headers(mut self, headers: http::HeaderMap) -> RequestBuilder {
        if let Ok(ref mut req) = self.request {
            for (key, value) in headers.iter() {
                req.headers_mut().insert(key, value.clone());
            }
        }
        self
    }

    /// Appends a query parameter to the request URL.
    pub fn query<T: ToString>(mut self, key: &str, value: T) -> RequestBuilder {
        if let Ok(ref mut req) = self.request {
            req.url_mut()
                .query_pairs_mut()
                .append_pair(key, &value.to_string());
        }
        self
    }

    /// Sets HTTP Basic authentication on the request.
    pub fn basic_auth<U, P>(self, username: U, password: Option<P>) -> RequestBuilder
    where
        U: fmt::Display,
        P: fmt::Display,
    {
        let value = util::basic_auth(username, password);
        self.header(http::header::AUTHORIZATION, value)
    }

    /// Sets a `Bearer` authorization header on the request.
    pub fn bearer_auth<T: fmt::Display>(self, token: T) -> RequestBuilder {
        self.header(http::header::AUTHORIZATION, format!("Bearer {token}"))
    }

    /// Sets the request body to a raw byte payload.
    pub fn body<T: Into<Body>>(mut self, body: T) -> RequestBuilder {
        if let Ok(ref mut req) = self.request {
            *req.body_mut() = Some(body.into());
        }
        self
    }

    /// Sends `form` as an `application/x-www-form-urlencoded` body.
    pub fn form<T: serde::Serialize + ?Sized>(mut self, form: &T) -> RequestBuilder {
        if let Ok(ref mut req) = self.request {
            match Body::form(form) {
                Ok((body, content_type)) => {
                    req.headers_mut()
                        .insert(http::header::CONTENT_TYPE, HeaderValue::from_static(content_type));
                    *req.body_mut() = Some(body);
                }
                Err(e) => self.request = Err(e),
            }
        }
        self
    }

    /// Sends `json` as an `application/json` body.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize + ?Sized>(mut self, json: &T) -> RequestBuilder {
        if let Ok(ref mut req) = self.request {
            match Body::json(json) {
                Ok((body, content_type)) => {
                    req.headers_mut()
                        .insert(http::header::CONTENT_TYPE, HeaderValue::from_static(content_type));
                    *req.body_mut() = Some(body);
                }
                Err(e) => self.request = Err(e),
            }
        }
        self
    }

    /// Sends `multipart` as a `multipart/form-data` body.
    #[cfg(feature = "multipart")]
    pub fn multipart(mut self, multipart: Multipart) -> RequestBuilder {
        if let Ok(ref mut req) = self.request {
            match multipart.encode() {
                Ok((body, content_type)) => {
                    match HeaderValue::from_str(&content_type) {
                        Ok(value) => {
                            req.headers_mut().insert(http::header::CONTENT_TYPE, value);
                            *req.body_mut() = Some(body);
                        }
                        Err(e) => self.request = Err(Error::builder(e)),
                    }
                }
                Err(e) => self.request = Err(Error::body(e)),
            }
        }
        self
    }

    /// Overrides the per-attempt timeout, re-applied fresh to each retry.
    pub fn timeout(mut self, timeout: Duration) -> RequestBuilder {
        self.overrides.timeout = Some(timeout);
        self
    }

    /// Overrides the call's per-attempt connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> RequestBuilder {
        self.overrides.connect_timeout = Some(timeout);
        self
    }

    /// Overrides the client's retry policy for this call only.
    pub fn retry(mut self, retry: crate::retry::RetryConfig) -> RequestBuilder {
        self.overrides.retry = Some(retry);
        self
    }

    /// Enables verbose `tracing` output for this call only.
    pub fn debug(mut self, enabled: bool) -> RequestBuilder {
        self.overrides.debug = Some(enabled);
        self
    }

    /// Attaches a cancellation token: signaling it aborts the in-flight
    /// attempt with a cancellation-kind error and skips any retry.
    pub fn cancellation_token(mut self, token: tokio_util::sync::CancellationToken) -> RequestBuilder {
        self.overrides.cancellation_token = Some(token);
        self
    }

    /// Returns the assembled request, assuming no builder method failed.
    pub fn build(self) -> crate::Result<Request> {
        self.request
    }

    /// Decomposes the builder into its parts, for callers (the blocking
    /// client) that need to drive `Client::execute` themselves instead of
    /// awaiting `send` directly.
    #[cfg(feature = "blocking")]
    pub(crate) fn into_parts(self) -> (Client, crate::Result<Request>, RequestOptionsOverride) {
        (self.client, self.request, self.overrides)
    }

    /// Dispatches the request through the client's executor.
    pub async fn send(self) -> crate::Result<Response> {
        let RequestBuilder {
            client,
            request,
            overrides,
        } = self;
        let request = request?;
        client.execute(request, overrides).await
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.request {
            Ok(req) => f.debug_tuple("RequestBuilder").field(req).finish(),
            Err(e) => f.debug_tuple("RequestBuilder").field(e).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_has_no_body() {
        let req = Request::new(Method::GET, Url::parse("https://example.com").unwrap());
        assert!(req.body().is_none());
        assert_eq!(req.method(), &Method::GET);
    }

    #[test]
    fn try_clone_preserves_headers() {
        let mut req = Request::new(Method::GET, Url::parse("https://example.com").unwrap());
        req.headers_mut()
            .insert(http::header::ACCEPT, HeaderValue::from_static("text/plain"));
        let cloned = req.try_clone();
        assert_eq!(cloned.headers().get(http::header::ACCEPT).unwrap(), "text/plain");
    }
}
