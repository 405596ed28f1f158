use std::{error::Error as StdError, fmt, io};

use url::Url;

use crate::StatusCode;

/// A `Result` alias where the `Err` case is `fetchr::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// A boxed error type that can be used for dynamic error handling.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// The errors that may occur while preparing, sending, or classifying a
/// request.
///
/// Note: errors may include the full URL used to make the request. If the
/// URL contains sensitive information (e.g. an API key as a query
/// parameter), be sure to remove it with [`without_url`](Error::without_url).
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
    url: Option<Url>,
    status: Option<StatusCode>,
}

/// The mutually-exclusive error classification used by the retry policy
/// and by callers distinguishing failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// DNS failure, connect refused, TLS handshake failure, socket reset.
    /// Retryable by default.
    Network,
    /// Per-attempt timeout elapsed. Retryable by default.
    Timeout,
    /// A response was received whose status is in the retry-status set or
    /// matches a user-defined error predicate.
    HttpStatus,
    /// Option or URL validation failed before dispatch. Never retried.
    RequestMalformed,
    /// A cancellation token was signaled. Never retried.
    Cancelled,
    /// Stray-request prevention was triggered during mock interception.
    /// Never retried.
    MockUnmatched,
    /// The request body could not be constructed (e.g. JSON encoding
    /// failure). Never retried.
    Body,
    /// The response body could not be decoded.
    Decode,
    /// `ClientBuilder` was misused.
    Builder,
    /// Following a redirect failed (loop detected, bad `Location`, etc).
    Redirect,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
                url: None,
                status: None,
            }),
        }
    }

    pub(crate) fn builder<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Builder, Some(e))
    }

    pub(crate) fn body<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Body, Some(e))
    }

    pub(crate) fn decode<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Decode, Some(e))
    }

    pub(crate) fn network<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Network, Some(e))
    }

    pub(crate) fn timeout<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Timeout, Some(e))
    }

    pub(crate) fn redirect<E: Into<BoxError>>(e: E, url: Url) -> Error {
        Error::new(Kind::Redirect, Some(e)).with_url(url)
    }

    pub(crate) fn cancelled() -> Error {
        Error::new(Kind::Cancelled, None::<Error>)
    }

    /// Aggregates every rejection reason from a settled `any()` promise
    /// combinator where every branch failed.
    pub(crate) fn all_rejected(messages: Vec<String>) -> Error {
        Error::new(Kind::Cancelled, Some(MessageError(messages.join("; "))))
    }

    pub(crate) fn mock_unmatched(msg: impl Into<String>) -> Error {
        Error::new(Kind::MockUnmatched, Some(MessageError(msg.into())))
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Error {
        Error::new(Kind::RequestMalformed, Some(MessageError(msg.into())))
    }

    pub(crate) fn status_code(url: Url, status: StatusCode) -> Error {
        let mut err = Error::new(Kind::HttpStatus, None::<Error>).with_url(url);
        err.inner.status = Some(status);
        err
    }
}

impl Error {
    /// Returns the classification of this error.
    pub fn kind(&self) -> Kind {
        self.inner.kind
    }

    /// Returns a possible URL related to this error.
    pub fn url(&self) -> Option<&Url> {
        self.inner.url.as_ref()
    }

    /// Returns a mutable reference to the URL related to this error, if any.
    pub fn url_mut(&mut self) -> Option<&mut Url> {
        self.inner.url.as_mut()
    }

    /// Attach a URL to this error (overwriting any existing one).
    pub fn with_url(mut self, url: Url) -> Self {
        self.inner.url = Some(url);
        self
    }

    /// Strip the related URL from this error (e.g. if it contains sensitive
    /// information).
    pub fn without_url(mut self) -> Self {
        self.inner.url = None;
        self
    }

    /// Returns the status code, if the error was generated from a response.
    pub fn status(&self) -> Option<StatusCode> {
        self.inner.status
    }

    /// True if this error is a builder misuse.
    pub fn is_builder(&self) -> bool {
        matches!(self.inner.kind, Kind::Builder)
    }

    /// True if this error is a redirect-following failure.
    pub fn is_redirect(&self) -> bool {
        matches!(self.inner.kind, Kind::Redirect)
    }

    /// True if this error originated from a retry-set or user-predicate
    /// HTTP status.
    pub fn is_status(&self) -> bool {
        matches!(self.inner.kind, Kind::HttpStatus)
    }

    /// True if this error is network-classified (DNS, connect, TLS, reset).
    pub fn is_network(&self) -> bool {
        matches!(self.inner.kind, Kind::Network)
    }

    /// True if this error is a per-attempt timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self.inner.kind, Kind::Timeout)
    }

    /// True if this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.inner.kind, Kind::Cancelled)
    }

    /// True if this error is an unmatched stray request under
    /// `prevent_stray_requests`.
    pub fn is_mock_unmatched(&self) -> bool {
        matches!(self.inner.kind, Kind::MockUnmatched)
    }

    /// True if this error is related to the request or response body.
    pub fn is_body(&self) -> bool {
        matches!(self.inner.kind, Kind::Body)
    }

    /// True if this error is related to decoding the response body.
    pub fn is_decode(&self) -> bool {
        matches!(self.inner.kind, Kind::Decode)
    }

    /// True if option/URL validation failed before dispatch.
    pub fn is_malformed(&self) -> bool {
        matches!(self.inner.kind, Kind::RequestMalformed)
    }

    /// True if this error, or a retry classifier given it, should be
    /// considered a retry candidate by default (network or timeout).
    pub(crate) fn is_retryable_by_default(&self) -> bool {
        matches!(self.inner.kind, Kind::Network | Kind::Timeout)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = f.debug_struct("fetchr::Error");
        builder.field("kind", &self.inner.kind);
        if let Some(ref url) = self.inner.url {
            builder.field("url", url);
        }
        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }
        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.inner.kind {
            Kind::Builder => f.write_str("builder error")?,
            Kind::Network => f.write_str("network error")?,
            Kind::Timeout => f.write_str("request timed out")?,
            Kind::Body => f.write_str("request or response body error")?,
            Kind::Decode => f.write_str("error decoding response body")?,
            Kind::Redirect => f.write_str("error following redirect")?,
            Kind::RequestMalformed => f.write_str("request options or URL are invalid")?,
            Kind::Cancelled => f.write_str("request was cancelled")?,
            Kind::MockUnmatched => f.write_str("request matched no registered mock")?,
            Kind::HttpStatus => {
                if let Some(status) = self.inner.status {
                    write!(f, "HTTP status error ({status})")?
                } else {
                    f.write_str("HTTP status error")?
                }
            }
        };

        if let Some(url) = &self.inner.url {
            write!(f, " for url ({url})")?;
        }

        if let Some(e) = &self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}

#[derive(Debug)]
pub(crate) struct TimedOut;

impl fmt::Display for TimedOut {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("operation timed out")
    }
}

impl StdError for TimedOut {}

/// Converts an I/O error occurring during connect/transport into a
/// classified network [`Error`].
pub(crate) fn io_to_network(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::TimedOut {
        Error::timeout(e)
    } else {
        Error::network(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_source_chain() {
        let root = Error::new(Kind::Network, None::<Error>);
        assert!(std::error::Error::source(&root).is_none());

        let link = Error::body(root);
        assert!(std::error::Error::source(&link).is_some());
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn mem_size_of() {
        use std::mem::size_of;
        assert_eq!(size_of::<Error>(), size_of::<usize>());
    }

    #[test]
    fn is_timeout() {
        let err = Error::timeout(super::TimedOut);
        assert!(err.is_timeout());
    }

    #[test]
    fn retryable_by_default() {
        assert!(Error::network("x").is_retryable_by_default());
        assert!(Error::timeout("x").is_retryable_by_default());
        assert!(!Error::malformed("x").is_retryable_by_default());
    }
}
