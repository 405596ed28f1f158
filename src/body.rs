//! The request body.
//!
//! A body is either a reusable, fully-buffered chunk of bytes (the common
//! case — cheap to clone for retries) or, with the `multipart` feature, a
//! set of multipart parts assembled lazily at send time.

use bytes::Bytes;

use crate::error::{BoxError, Error};

/// A request body.
///
/// Bodies built from bytes, strings, or form parameters are cheaply
/// cloneable, which is what lets the retry policy resend a logical request
/// without the caller re-supplying the body.
#[derive(Clone)]
pub struct Body {
    inner: Bytes,
}

impl Body {
    /// An empty body.
    pub fn empty() -> Body {
        Body {
            inner: Bytes::new(),
        }
    }

    /// Returns the body's raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    /// Returns the length of the body in bytes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True if the body carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub(crate) fn into_bytes(self) -> Bytes {
        self.inner
    }

    /// Encodes `params` as `application/x-www-form-urlencoded` and wraps it
    /// as a `Body`. Returns the synthesized Content-Type alongside it.
    pub(crate) fn form<T: serde::Serialize + ?Sized>(
        params: &T,
    ) -> Result<(Body, &'static str), Error> {
        let encoded = serde_urlencoded::to_string(params).map_err(Error::body)?;
        Ok((Body::from(encoded), mime::APPLICATION_WWW_FORM_URLENCODED.as_ref()))
    }

    /// Encodes `value` as JSON and wraps it as a `Body`. Returns the
    /// synthesized Content-Type alongside it.
    #[cfg(feature = "json")]
    pub(crate) fn json<T: serde::Serialize + ?Sized>(
        value: &T,
    ) -> Result<(Body, &'static str), Error> {
        let encoded = serde_json::to_vec(value).map_err(Error::body)?;
        Ok((Body::from(encoded), mime::APPLICATION_JSON.as_ref()))
    }
}

impl Default for Body {
    fn default() -> Body {
        Body::empty()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Body {
        Body { inner: bytes }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Body {
        Body {
            inner: Bytes::from(bytes),
        }
    }
}

impl From<String> for Body {
    fn from(s: String) -> Body {
        Body {
            inner: Bytes::from(s),
        }
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Body {
        Body {
            inner: Bytes::from(s),
        }
    }
}

impl From<&'static [u8]> for Body {
    fn from(s: &'static [u8]) -> Body {
        Body {
            inner: Bytes::from(s),
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Body")
            .field("bytes", &self.inner.len())
            .finish()
    }
}

/// A single part of a `multipart/form-data` body.
#[cfg(feature = "multipart")]
#[derive(Clone, Debug)]
pub struct Part {
    pub(crate) name: String,
    pub(crate) contents: Bytes,
    pub(crate) filename: Option<String>,
    pub(crate) content_type: Option<String>,
}

#[cfg(feature = "multipart")]
impl Part {
    /// Creates a new text/bytes part under `name`.
    pub fn new(name: impl Into<String>, contents: impl Into<Bytes>) -> Part {
        Part {
            name: name.into(),
            contents: contents.into(),
            filename: None,
            content_type: None,
        }
    }

    /// Sets the part's filename (`Content-Disposition: ...; filename=...`).
    pub fn filename(mut self, filename: impl Into<String>) -> Part {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the part's explicit Content-Type, overriding the filename-based
    /// guess from `mime_guess`.
    pub fn mime(mut self, mime: impl Into<String>) -> Part {
        self.content_type = Some(mime.into());
        self
    }

    fn guessed_mime(&self) -> String {
        self.content_type.clone().unwrap_or_else(|| {
            self.filename
                .as_deref()
                .map(|name| mime_guess::from_path(name).first_or_octet_stream().to_string())
                .unwrap_or_else(|| "text/plain".to_string())
        })
    }
}

/// A `multipart/form-data` body builder.
#[cfg(feature = "multipart")]
#[derive(Clone, Debug, Default)]
pub struct Multipart {
    parts: Vec<Part>,
}

#[cfg(feature = "multipart")]
impl Multipart {
    /// Creates an empty multipart body.
    pub fn new() -> Multipart {
        Multipart::default()
    }

    /// Appends a part.
    pub fn part(mut self, part: Part) -> Multipart {
        self.parts.push(part);
        self
    }

    /// Encodes the parts into a `Body` using a random boundary, returning
    /// the synthesized Content-Type alongside it.
    pub(crate) fn encode(self) -> Result<(Body, String), BoxError> {
        let boundary = format!("------------------------{:016x}", rand::random::<u64>());
        let mut buf = Vec::new();

        for part in &self.parts {
            buf.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            buf.extend_from_slice(b"Content-Disposition: form-data; name=\"");
            buf.extend_from_slice(part.name.as_bytes());
            buf.extend_from_slice(b"\"");
            if let Some(filename) = &part.filename {
                buf.extend_from_slice(b"; filename=\"");
                buf.extend_from_slice(filename.as_bytes());
                buf.extend_from_slice(b"\"");
            }
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.guessed_mime()).as_bytes());
            buf.extend_from_slice(&part.contents);
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        let content_type = format!("multipart/form-data; boundary={boundary}");
        Ok((Body::from(buf), content_type))
    }
}
