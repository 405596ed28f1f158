//! Transparent response body gzip decompression, gated behind the `gzip`
//! feature.
//!
//! Grounded on the teacher's `Accepts`/decoder-layer shape
//! (`client/decoder.rs`, `client/layer/decoder.rs`): a small struct
//! recording which content-codings the client accepts, consulted to set
//! the request's `Accept-Encoding` header and to decide whether a
//! response body needs decoding. Unlike the teacher's streaming
//! `tower_http`-based decompression layer, this engine's bodies are
//! already fully buffered by the time they reach this point (see
//! `Response`'s doc comment), so decoding is a synchronous
//! buffer-to-buffer transform — grounded on `flate2::read::GzDecoder`
//! usage in `tls/conn/cert_compressor/zlib.rs` (same crate, its sibling
//! `ZlibDecoder`) and the `hypernetix-hyperspot` example's `flate2`
//! dependency.

use bytes::Bytes;
use http::{HeaderMap, HeaderValue};

use crate::error::Error;

/// Which content-codings the client is willing to accept and transparently
/// decode. Only `gzip` is wired up; the field exists so the shape matches
/// the teacher's multi-codec `Accepts` even though this engine only
/// implements the one codec SPEC_FULL.md's dependency table names.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Accepts {
    pub(crate) gzip: bool,
}

impl Accepts {
    pub(crate) const fn none() -> Accepts {
        Accepts { gzip: false }
    }

    pub(crate) const fn gzip() -> Accepts {
        Accepts { gzip: true }
    }

    /// Sets `Accept-Encoding` on an outgoing request's headers, unless the
    /// caller already supplied one.
    pub(crate) fn apply_request_header(&self, headers: &mut HeaderMap) {
        if !self.gzip {
            return;
        }
        if headers.contains_key(http::header::ACCEPT_ENCODING) {
            return;
        }
        headers.insert(http::header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
    }

    /// Decodes `body` in place if `Content-Encoding: gzip` is present and
    /// accepted, returning the decoded bytes and the headers with
    /// `Content-Encoding`/`Content-Length` stripped (the decoded body no
    /// longer matches either).
    pub(crate) fn decode(&self, mut headers: HeaderMap, body: Bytes) -> crate::Result<(HeaderMap, Bytes)> {
        let is_gzip = self.gzip
            && headers
                .get(http::header::CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.eq_ignore_ascii_case("gzip"))
                .unwrap_or(false);

        if !is_gzip {
            return Ok((headers, body));
        }

        let decoded = gzip_decode(&body)?;
        headers.remove(http::header::CONTENT_ENCODING);
        headers.remove(http::header::CONTENT_LENGTH);
        Ok((headers, Bytes::from(decoded)))
    }
}

fn gzip_decode(input: &[u8]) -> crate::Result<Vec<u8>> {
    use std::io::Read;

    let mut decoder = flate2::read::GzDecoder::new(input);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(Error::decode)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gzip_bytes(input: &[u8]) -> Vec<u8> {
        use std::io::Write;
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(input).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn decodes_gzip_body_and_strips_headers() {
        let accepts = Accepts::gzip();
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from_static("999"));

        let compressed = gzip_bytes(b"hello world");
        let (headers, body) = accepts.decode(headers, Bytes::from(compressed)).unwrap();

        assert_eq!(&body[..], b"hello world");
        assert!(!headers.contains_key(http::header::CONTENT_ENCODING));
        assert!(!headers.contains_key(http::header::CONTENT_LENGTH));
    }

    #[test]
    fn leaves_uncompressed_body_untouched() {
        let accepts = Accepts::gzip();
        let headers = HeaderMap::new();
        let (headers, body) = accepts.decode(headers, Bytes::from_static(b"plain")).unwrap();
        assert_eq!(&body[..], b"plain");
        assert!(headers.is_empty());
    }

    #[test]
    fn disabled_accepts_never_decodes() {
        let accepts = Accepts::none();
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        let compressed = gzip_bytes(b"hello");
        let (headers, body) = accepts.decode(headers, Bytes::from(compressed.clone())).unwrap();
        assert_eq!(&body[..], &compressed[..]);
        assert!(headers.contains_key(http::header::CONTENT_ENCODING));
    }

    #[test]
    fn apply_request_header_does_not_override_explicit_value() {
        let accepts = Accepts::gzip();
        let mut headers = HeaderMap::new();
        headers.insert(http::header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        accepts.apply_request_header(&mut headers);
        assert_eq!(headers.get(http::header::ACCEPT_ENCODING).unwrap(), "identity");
    }
}
