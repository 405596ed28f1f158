use std::io::Write;

use http::HeaderValue;

/// Builds a `Basic` authorization header value from a username and
/// optional password, matching the scheme used for HTTP basic auth.
pub(crate) fn basic_auth<U, P>(username: U, password: Option<P>) -> HeaderValue
where
    U: std::fmt::Display,
    P: std::fmt::Display,
{
    use base64::prelude::BASE64_STANDARD;
    use base64::write::EncoderWriter;

    let mut buf = b"Basic ".to_vec();
    {
        let mut encoder = EncoderWriter::new(&mut buf, &BASE64_STANDARD);
        let _ = write!(encoder, "{username}:");
        if let Some(password) = password {
            let _ = write!(encoder, "{password}");
        }
    }
    let mut header = HeaderValue::from_bytes(&buf).expect("base64 is always a valid HeaderValue");
    header.set_sensitive(true);
    header
}

/// Generates an opaque, process-unique correlation id for one logical call.
///
/// Not cryptographically random — just unique enough to tell concurrent
/// logical calls apart in event streams and logs.
pub(crate) fn correlation_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nonce: u32 = rand::random();
    format!("{count:x}-{nonce:08x}")
}

/// Matches a mock pattern against a `"METHOD URL"` or bare `URL` candidate,
/// where `*` in the pattern matches any substring (including the empty
/// string). Matching is case-sensitive, mirroring the rest of the engine's
/// URL handling.
pub(crate) fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == candidate;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let mut rest = candidate;

    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !rest.starts_with(part) {
                return false;
            }
            rest = &rest[part.len()..];
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else if let Some(pos) = rest.find(part) {
            rest = &rest[pos + part.len()..];
        } else {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_substring() {
        assert!(wildcard_match("GET https://api.example.com/*", "GET https://api.example.com/users/1"));
        assert!(!wildcard_match("GET https://api.example.com/*", "POST https://api.example.com/users/1"));
        assert!(wildcard_match("*/users", "https://api.example.com/users"));
        assert!(wildcard_match("*", "anything"));
    }

    #[test]
    fn non_wildcard_is_exact() {
        assert!(wildcard_match("https://example.com", "https://example.com"));
        assert!(!wildcard_match("https://example.com", "https://example.com/"));
    }

    #[test]
    fn correlation_ids_are_unique() {
        let a = correlation_id();
        let b = correlation_id();
        assert_ne!(a, b);
    }
}
