use std::borrow::Cow;

use url::Url;

use crate::error::Error;

/// A trait to try to convert some type into a `Url`.
///
/// This trait is "sealed", such that only types within fetchr can
/// implement it.
pub trait IntoUrl: IntoUrlSealed {}

impl IntoUrl for Url {}
impl IntoUrl for String {}
impl IntoUrl for &Url {}
impl IntoUrl for &str {}
impl IntoUrl for &String {}
impl IntoUrl for Cow<'_, str> {}

pub trait IntoUrlSealed {
    fn into_url(self) -> crate::Result<Url>;

    fn as_str(&self) -> &str;
}

impl IntoUrlSealed for Url {
    fn into_url(self) -> crate::Result<Url> {
        if self.has_host() {
            Ok(self)
        } else {
            Err(Error::builder("URL has no host").with_url(self))
        }
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl IntoUrlSealed for &Url {
    fn into_url(self) -> crate::Result<Url> {
        self.clone().into_url()
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl IntoUrlSealed for &str {
    fn into_url(self) -> crate::Result<Url> {
        resolve(self, None)
    }

    fn as_str(&self) -> &str {
        self
    }
}

impl IntoUrlSealed for &String {
    fn into_url(self) -> crate::Result<Url> {
        (&**self).into_url()
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl IntoUrlSealed for String {
    fn into_url(self) -> crate::Result<Url> {
        (&*self).into_url()
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl IntoUrlSealed for Cow<'_, str> {
    fn into_url(self) -> crate::Result<Url> {
        (&*self).into_url()
    }
    fn as_str(&self) -> &str {
        self
    }
}

/// Applies the URI validation rules from the request-options contract and
/// resolves a possibly-relative URL against an optional base.
///
/// - The raw URL must be non-empty and must not contain any whitespace
///   character anywhere (leading, trailing, or internal).
/// - If the URL is relative (no `scheme://` prefix), `base` must be
///   supplied, and must itself be absolute, or the call fails with a
///   [`Kind::RequestMalformed`](crate::error::Kind::RequestMalformed) error.
pub(crate) fn resolve(raw: &str, base: Option<&Url>) -> crate::Result<Url> {
    if raw.is_empty() || raw.chars().any(char::is_whitespace) {
        return Err(Error::malformed(format!(
            "URL must be non-empty and contain no whitespace: {raw:?}"
        )));
    }

    if is_absolute(raw) {
        return Url::parse(raw)
            .map_err(|e| Error::malformed(format!("invalid URL {raw:?}: {e}")))?
            .into_url();
    }

    let base = base.ok_or_else(|| {
        Error::malformed(format!(
            "relative URL {raw:?} requires a base_uri to be configured"
        ))
    })?;

    if !is_absolute(base.as_str()) {
        return Err(Error::malformed(format!(
            "base_uri {base:?} must itself be absolute"
        )));
    }

    base.join(raw)
        .map_err(|e| Error::malformed(format!("cannot join {raw:?} onto base {base}: {e}")))?
        .into_url()
}

fn is_absolute(s: &str) -> bool {
    match s.find("://") {
        Some(pos) => s[..pos]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_whitespace() {
        let err = resolve("  /api ", None).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn rejects_relative_without_base() {
        let err = resolve("relative/path", None).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn resolves_relative_with_base() {
        let base = Url::parse("https://api.example.com/v1/").unwrap();
        let url = resolve("users", Some(&base)).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/users");
    }

    #[test]
    fn rejects_non_absolute_base() {
        let base = Url::parse("file:///tmp").unwrap();
        let err = resolve("users", Some(&base)).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn accepts_absolute() {
        let url = resolve("https://example.com/", None).unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }
}
