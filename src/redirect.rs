//! Redirect-following policy.
//!
//! By default the engine does not follow redirects; enabling it caps the
//! chain at 10 hops and emits `request.redirecting` events as described in
//! the event model.

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use url::Url;

use crate::error::Error;

/// Controls whether and how far a chain of redirects is followed.
#[derive(Clone)]
pub struct Policy {
    inner: Kind,
}

#[derive(Clone)]
enum Kind {
    None,
    Limited(usize),
    Custom(Arc<dyn Fn(&Attempt) -> Action + Send + Sync>),
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Kind::None => f.write_str("Policy::none"),
            Kind::Limited(max) => write!(f, "Policy::limited({max})"),
            Kind::Custom(_) => f.write_str("Policy::custom"),
        }
    }
}

impl Default for Policy {
    /// Follows up to 10 redirects, matching the original engine's default.
    fn default() -> Policy {
        Policy::limited(10)
    }
}

/// Information about a single redirect hop, given to a custom policy
/// closure.
#[derive(Debug)]
pub struct Attempt<'a> {
    pub(crate) status: StatusCode,
    pub(crate) next: &'a Url,
    pub(crate) previous: &'a [Url],
}

impl<'a> Attempt<'a> {
    /// The redirect response's status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The URL the next request would be sent to.
    pub fn url(&self) -> &Url {
        self.next
    }

    /// The chain of URLs already visited, oldest first.
    pub fn previous(&self) -> &[Url] {
        self.previous
    }

    /// Follow this redirect.
    pub fn follow(&self) -> Action {
        Action::follow()
    }

    /// Stop and return the redirect response as final.
    pub fn stop(&self) -> Action {
        Action::stop()
    }

    /// Stop and fail with an error.
    pub fn error(&self, err: impl Into<crate::error::BoxError>) -> Action {
        Action::error(err)
    }
}

/// What to do about one specific redirect hop.
#[derive(Debug)]
pub struct Action {
    pub(crate) inner: ActionKind,
}

#[derive(Debug)]
pub(crate) enum ActionKind {
    Follow,
    Stop,
    Error(Error),
}

impl Action {
    pub(crate) fn follow() -> Action {
        Action {
            inner: ActionKind::Follow,
        }
    }

    pub(crate) fn stop() -> Action {
        Action {
            inner: ActionKind::Stop,
        }
    }

    pub(crate) fn error(err: impl Into<crate::error::BoxError>) -> Action {
        Action {
            inner: ActionKind::Error(Error::redirect(err, Url::parse("about:blank").unwrap())),
        }
    }
}

impl Policy {
    /// Follows up to `max` redirects, erroring if the chain runs longer.
    pub fn limited(max: usize) -> Policy {
        Policy {
            inner: Kind::Limited(max),
        }
    }

    /// Never follows redirects; the redirect response itself is returned
    /// and a `request.redirecting` event is emitted describing why it was
    /// not followed.
    pub fn none() -> Policy {
        Policy { inner: Kind::None }
    }

    /// A fully custom policy. The default chain-length cap is not applied
    /// automatically; the closure is responsible for bounding it if needed.
    pub fn custom<F>(func: F) -> Policy
    where
        F: Fn(&Attempt) -> Action + Send + Sync + 'static,
    {
        Policy {
            inner: Kind::Custom(Arc::new(func)),
        }
    }

    pub(crate) fn check(&self, status: StatusCode, next: &Url, previous: &[Url]) -> Action {
        let attempt = Attempt {
            status,
            next,
            previous,
        };
        match &self.inner {
            Kind::None => Action::stop(),
            Kind::Limited(max) => {
                if previous.len() >= *max {
                    Action::error(TooManyRedirects)
                } else {
                    Action::follow()
                }
            }
            Kind::Custom(f) => f(&attempt),
        }
    }

    pub(crate) fn is_none(&self) -> bool {
        matches!(self.inner, Kind::None)
    }
}

#[derive(Debug)]
struct TooManyRedirects;

impl fmt::Display for TooManyRedirects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("too many redirects")
    }
}

impl std::error::Error for TooManyRedirects {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_never_follows() {
        let policy = Policy::none();
        let next = Url::parse("https://example.com/").unwrap();
        assert!(matches!(policy.check(StatusCode::FOUND, &next, &[]).inner, ActionKind::Stop));
    }

    #[test]
    fn limited_stops_after_max() {
        let policy = Policy::limited(1);
        let next = Url::parse("https://example.com/").unwrap();
        let one = Url::parse("https://example.com/a").unwrap();
        assert!(matches!(policy.check(StatusCode::FOUND, &next, &[]).inner, ActionKind::Follow));
        assert!(matches!(
            policy.check(StatusCode::FOUND, &next, &[one]).inner,
            ActionKind::Error(_)
        ));
    }
}
