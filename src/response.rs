//! The response returned by a completed request.

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use url::Url;

use crate::error::Error;

/// A response to a submitted request.
///
/// The body is always fully buffered by the time a `Response` is returned
/// to the caller: the executor's retry policy needs to classify the
/// outcome before handing control back, so there is no streaming-body
/// variant to thread through that decision.
#[derive(Clone)]
pub struct Response {
    status: StatusCode,
    url: Url,
    headers: HeaderMap,
    version: Version,
    body: Bytes,
}

impl Response {
    pub(crate) fn new(
        status: StatusCode,
        url: Url,
        headers: HeaderMap,
        version: Version,
        body: Bytes,
    ) -> Response {
        Response {
            status,
            url,
            headers,
            version,
            body,
        }
    }

    /// The final URL this response was received from (after any redirects
    /// were followed).
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The response status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The HTTP version used for this response.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The length of the buffered body, if known from a `Content-Length`
    /// header or the buffer itself.
    pub fn content_length(&self) -> u64 {
        self.body.len() as u64
    }

    /// True if the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// True if the status is in the 4xx or 5xx range.
    pub fn is_failed(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }

    /// The raw response body bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Consumes the response, returning the raw body bytes.
    pub fn into_bytes(self) -> Bytes {
        self.body
    }

    /// Decodes the body as UTF-8 text.
    pub fn text(&self) -> crate::Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(Error::decode)
    }

    /// Deserializes the body as JSON.
    #[cfg(feature = "json")]
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::decode)
    }

    /// If `status()` is not a success, returns `self` as an `Err` carrying
    /// an [`Error`] classified as [`crate::error::Kind::HttpStatus`].
    pub fn error_for_status(self) -> crate::Result<Response> {
        if self.is_failed() {
            Err(Error::status_code(self.url.clone(), self.status))
        } else {
            Ok(self)
        }
    }

    /// Borrowing variant of [`error_for_status`](Response::error_for_status).
    pub fn error_for_status_ref(&self) -> crate::Result<&Response> {
        if self.is_failed() {
            Err(Error::status_code(self.url.clone(), self.status))
        } else {
            Ok(self)
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: StatusCode) -> Response {
        Response::new(
            status,
            Url::parse("https://example.com").unwrap(),
            HeaderMap::new(),
            Version::HTTP_11,
            Bytes::from_static(b"hello"),
        )
    }

    #[test]
    fn classifies_success_and_failure() {
        assert!(sample(StatusCode::OK).is_success());
        assert!(!sample(StatusCode::OK).is_failed());
        assert!(sample(StatusCode::NOT_FOUND).is_failed());
    }

    #[test]
    fn error_for_status_only_on_failure() {
        assert!(sample(StatusCode::OK).error_for_status().is_ok());
        let err = sample(StatusCode::INTERNAL_SERVER_ERROR)
            .error_for_status()
            .unwrap_err();
        assert!(err.is_status());
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn decodes_text() {
        assert_eq!(sample(StatusCode::OK).text().unwrap(), "hello");
    }
}
