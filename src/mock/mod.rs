//! Deterministic request mocking: a pattern-matching fake registry plus a
//! record/replay recorder.
//!
//! The original engine frames this as a process-global shim. Per the
//! redesign notes, this is an explicit handle instead: a [`MockContext`]
//! attached to a [`crate::client::Client`] or a single call's
//! [`crate::options::RequestOptions`], never an ambient global. A client
//! built with no context attached talks to the real executor.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::error::Error;
use crate::util::wildcard_match;

/// A canned response a mock can return.
#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: bytes::Bytes,
    /// Simulated latency applied before the response is returned.
    pub delay: Option<Duration>,
    /// If set, the mock fails the call with this error instead of
    /// returning a response.
    pub throw: Option<String>,
}

impl MockResponse {
    /// A `200 OK` response with the given bytes as body.
    pub fn ok(body: impl Into<bytes::Bytes>) -> MockResponse {
        MockResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.into(),
            delay: None,
            throw: None,
        }
    }

    /// A response with an arbitrary status and no body.
    pub fn status(status: StatusCode) -> MockResponse {
        MockResponse {
            status,
            headers: HeaderMap::new(),
            body: bytes::Bytes::new(),
            delay: None,
            throw: None,
        }
    }

    /// A mock that fails the call instead of completing it.
    pub fn throws(message: impl Into<String>) -> MockResponse {
        MockResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: bytes::Bytes::new(),
            delay: None,
            throw: Some(message.into()),
        }
    }

    /// Adds simulated latency before the response is returned.
    pub fn with_delay(mut self, delay: Duration) -> MockResponse {
        self.delay = Some(delay);
        self
    }

    /// Sets a response header.
    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> MockResponse {
        self.headers.insert(name, value);
        self
    }
}

/// What a matched pattern resolves to.
#[derive(Clone)]
enum Fake {
    Single(MockResponse),
    Sequence(Arc<Mutex<MockSequence>>),
    Closure(Arc<dyn Fn(&RecordedRequest) -> MockResponse + Send + Sync>),
}

/// An ordered queue of responses served one at a time.
#[derive(Clone)]
pub struct MockSequence {
    queue: Vec<MockResponse>,
    position: usize,
    behavior: ExhaustedBehavior,
}

/// What happens once a [`MockSequence`] runs out of queued responses.
#[derive(Clone)]
pub enum ExhaustedBehavior {
    /// Start again from the first response.
    Loop,
    /// Fall back to a fixed default response.
    Default(Box<MockResponse>),
    /// Fail the call deterministically.
    Fail,
}

impl MockSequence {
    /// A sequence that repeats `responses` forever once exhausted.
    pub fn looping(responses: Vec<MockResponse>) -> MockSequence {
        MockSequence {
            queue: responses,
            position: 0,
            behavior: ExhaustedBehavior::Loop,
        }
    }

    /// A sequence that serves `default` once `responses` is exhausted.
    pub fn with_default(responses: Vec<MockResponse>, default: MockResponse) -> MockSequence {
        MockSequence {
            queue: responses,
            position: 0,
            behavior: ExhaustedBehavior::Default(Box::new(default)),
        }
    }

    /// A sequence that fails once `responses` is exhausted.
    pub fn then_fail(responses: Vec<MockResponse>) -> MockSequence {
        MockSequence {
            queue: responses,
            position: 0,
            behavior: ExhaustedBehavior::Fail,
        }
    }

    fn next(&mut self) -> crate::Result<MockResponse> {
        if self.queue.is_empty() {
            return Err(Error::mock_unmatched("mock sequence has no responses queued"));
        }
        if self.position >= self.queue.len() {
            return match &self.behavior {
                ExhaustedBehavior::Loop => {
                    self.position = 0;
                    self.next()
                }
                ExhaustedBehavior::Default(resp) => Ok((**resp).clone()),
                ExhaustedBehavior::Fail => {
                    Err(Error::mock_unmatched("mock sequence exhausted"))
                }
            };
        }
        let resp = self.queue[self.position].clone();
        self.position += 1;
        Ok(resp)
    }
}

/// A request snapshot captured for matching, assertions, and recording.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: bytes::Bytes,
}

impl RecordedRequest {
    fn candidate_keys(&self) -> (String, String) {
        (format!("{} {}", self.method, self.url), self.url.to_string())
    }
}

/// One recorded {request, response, timestamp} triple, kept when recording
/// is active. The full `MockResponse` (status, headers, body) is kept so
/// that export-then-import reproduces the same fake, not just its status.
#[derive(Clone, Debug)]
pub struct Recording {
    pub request: RecordedRequest,
    pub response: MockResponse,
    pub recorded_at: SystemTime,
}

struct Registered {
    pattern: String,
    method_scoped: bool,
    fake: Fake,
}

struct Inner {
    registered: Vec<Registered>,
    fallback: Option<Arc<dyn Fn(&RecordedRequest) -> MockResponse + Send + Sync>>,
    prevent_stray_requests: bool,
    allow_list: Vec<String>,
    recording: bool,
    recordings: Vec<Recording>,
    sent: Vec<RecordedRequest>,
}

/// An explicit mock registry handle.
///
/// Attach to a [`crate::client::Client`] or a single call's
/// [`crate::options::RequestOptions::mock`] field; the executor consults
/// it before touching DNS or the connection pool.
#[derive(Clone)]
pub struct MockContext {
    inner: Arc<Mutex<Inner>>,
}

impl fmt::Debug for MockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("MockContext")
            .field("registered", &inner.registered.len())
            .field("recording", &inner.recording)
            .field("prevent_stray_requests", &inner.prevent_stray_requests)
            .finish()
    }
}

impl Default for MockContext {
    fn default() -> MockContext {
        MockContext::new()
    }
}

impl MockContext {
    /// Creates an empty context: no registered fakes, stray requests
    /// allowed, recording off.
    pub fn new() -> MockContext {
        MockContext {
            inner: Arc::new(Mutex::new(Inner {
                registered: Vec::new(),
                fallback: None,
                prevent_stray_requests: false,
                allow_list: Vec::new(),
                recording: false,
                recordings: Vec::new(),
                sent: Vec::new(),
            })),
        }
    }

    /// Registers a canned response for an exact or wildcard pattern
    /// (`"METHOD URL"` or bare `URL`, `*` matches any substring).
    pub fn when(&self, pattern: impl Into<String>, response: MockResponse) {
        self.register(pattern, Fake::Single(response));
    }

    /// Registers an ordered [`MockSequence`] for a pattern.
    pub fn when_sequence(&self, pattern: impl Into<String>, sequence: MockSequence) {
        self.register(pattern, Fake::Sequence(Arc::new(Mutex::new(sequence))));
    }

    /// Registers a closure for a pattern; it's called with the matched
    /// request and must return a response.
    pub fn when_fn<F>(&self, pattern: impl Into<String>, func: F)
    where
        F: Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static,
    {
        self.register(pattern, Fake::Closure(Arc::new(func)));
    }

    fn register(&self, pattern: impl Into<String>, fake: Fake) {
        let pattern = pattern.into();
        let method_scoped = pattern.contains(' ');
        self.inner.lock().unwrap().registered.push(Registered {
            pattern,
            method_scoped,
            fake,
        });
    }

    /// Routes every request that matches no explicit pattern to `func`.
    pub fn when_unmatched<F>(&self, func: F)
    where
        F: Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static,
    {
        self.inner.lock().unwrap().fallback = Some(Arc::new(func));
    }

    /// When enabled, a request matching no registered pattern and no entry
    /// in the allow-list fails with [`crate::error::Kind::MockUnmatched`]
    /// instead of falling through to the real executor.
    pub fn prevent_stray_requests(&self, enabled: bool) {
        self.inner.lock().unwrap().prevent_stray_requests = enabled;
    }

    /// Adds a wildcard pattern exempted from `prevent_stray_requests`: a
    /// request matching it is allowed through to the real executor even
    /// though no fake is registered for it.
    pub fn allow(&self, pattern: impl Into<String>) {
        self.inner.lock().unwrap().allow_list.push(pattern.into());
    }

    /// Turns recording of served requests on or off.
    pub fn set_recording(&self, enabled: bool) {
        self.inner.lock().unwrap().recording = enabled;
    }

    /// Exports recorded {request, response} pairs as JSON, including each
    /// response's headers and body, so a later `import_recordings` can
    /// reconstruct the exact same fakes rather than a bodiless status.
    #[cfg(feature = "json")]
    pub fn export_recordings(&self) -> crate::Result<String> {
        use base64::prelude::BASE64_STANDARD;
        use base64::Engine;

        #[derive(serde::Serialize)]
        struct Entry {
            method: String,
            url: String,
            status: u16,
            headers: Vec<(String, String)>,
            body_base64: String,
        }
        let inner = self.inner.lock().unwrap();
        let entries: Vec<Entry> = inner
            .recordings
            .iter()
            .map(|r| Entry {
                method: r.request.method.to_string(),
                url: r.request.url.to_string(),
                status: r.response.status.as_u16(),
                headers: r
                    .response
                    .headers
                    .iter()
                    .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
                    .collect(),
                body_base64: BASE64_STANDARD.encode(&r.response.body),
            })
            .collect();
        serde_json::to_string(&entries).map_err(Error::decode)
    }

    /// Re-registers every recorded {request, response} pair as an
    /// exact-match single-response fake, reconstructing the fakes a prior
    /// recording session observed — status, headers, and body included.
    #[cfg(feature = "json")]
    pub fn import_recordings(&self, json: &str) -> crate::Result<()> {
        use base64::prelude::BASE64_STANDARD;
        use base64::Engine;

        #[derive(serde::Deserialize)]
        struct Entry {
            method: String,
            url: String,
            status: u16,
            #[serde(default)]
            headers: Vec<(String, String)>,
            #[serde(default)]
            body_base64: String,
        }
        let entries: Vec<Entry> = serde_json::from_str(json).map_err(Error::decode)?;
        for entry in entries {
            let pattern = format!("{} {}", entry.method, entry.url);
            let status = StatusCode::from_u16(entry.status).map_err(Error::decode)?;
            let body = BASE64_STANDARD.decode(entry.body_base64).map_err(Error::decode)?;

            let mut headers = HeaderMap::new();
            for (name, value) in entry.headers {
                let name = http::HeaderName::from_bytes(name.as_bytes()).map_err(Error::decode)?;
                let value = http::HeaderValue::from_str(&value).map_err(Error::decode)?;
                headers.insert(name, value);
            }

            self.when(
                pattern,
                MockResponse {
                    status,
                    headers,
                    body: bytes::Bytes::from(body),
                    delay: None,
                    throw: None,
                },
            );
        }
        Ok(())
    }

    /// Attempts to resolve `request` against registered fakes, in the order
    /// described by the mock interceptor contract: exact `"METHOD URL"`,
    /// exact `URL`, wildcard `"METHOD URL"`, wildcard `URL`.
    ///
    /// Returns `Ok(None)` when nothing matches and the request should be
    /// forwarded to the real executor, or `Err` when
    /// `prevent_stray_requests` rejects it outright.
    pub(crate) async fn intercept(
        &self,
        request: &RecordedRequest,
    ) -> crate::Result<Option<MockResponse>> {
        let (method_url, url_only) = request.candidate_keys();

        let fake = {
            let inner = self.inner.lock().unwrap();

            find_exact(&inner.registered, &method_url, true)
                .or_else(|| find_exact(&inner.registered, &url_only, false))
                .or_else(|| find_wildcard(&inner.registered, &method_url, true))
                .or_else(|| find_wildcard(&inner.registered, &url_only, false))
                .cloned()
                .or_else(|| inner.fallback.clone().map(Fake::Closure))
        };

        let response = match fake {
            Some(Fake::Single(resp)) => Some(resp),
            Some(Fake::Sequence(seq)) => Some(seq.lock().unwrap().next()?),
            Some(Fake::Closure(func)) => Some(func(request)),
            None => None,
        };

        if response.is_none() {
            let inner = self.inner.lock().unwrap();
            let allowed = !inner.prevent_stray_requests
                || inner
                    .allow_list
                    .iter()
                    .any(|p| wildcard_match(p, &url_only) || wildcard_match(p, &method_url));
            if !allowed {
                return Err(Error::mock_unmatched(format!(
                    "stray request not allowed: {method_url}"
                )));
            }
        }

        if let Some(resp) = &response {
            if let Some(delay) = resp.delay {
                tokio::time::sleep(delay).await;
            }
        }

        let mut inner = self.inner.lock().unwrap();
        inner.sent.push(request.clone());
        if inner.recording {
            if let Some(resp) = &response {
                inner.recordings.push(Recording {
                    request: request.clone(),
                    response: resp.clone(),
                    recorded_at: SystemTime::now(),
                });
            }
        }

        if let Some(resp) = &response {
            if let Some(message) = &resp.throw {
                return Err(Error::mock_unmatched(message.clone()));
            }
        }

        Ok(response)
    }

    /// Asserts at least one (or exactly `times`, if given) sent request
    /// matched `pattern`.
    pub fn assert_sent(&self, pattern: &str, times: Option<usize>) -> crate::Result<()> {
        let count = self.count_matching(pattern);
        match times {
            Some(expected) if count != expected => Err(Error::mock_unmatched(format!(
                "expected {expected} requests matching {pattern:?}, saw {count}"
            ))),
            None if count == 0 => Err(Error::mock_unmatched(format!(
                "expected at least one request matching {pattern:?}, saw none"
            ))),
            _ => Ok(()),
        }
    }

    /// Asserts no sent request matched `pattern`.
    pub fn assert_not_sent(&self, pattern: &str) -> crate::Result<()> {
        let count = self.count_matching(pattern);
        if count > 0 {
            Err(Error::mock_unmatched(format!(
                "expected no requests matching {pattern:?}, saw {count}"
            )))
        } else {
            Ok(())
        }
    }

    /// Asserts exactly `n` requests were sent in total.
    pub fn assert_sent_count(&self, n: usize) -> crate::Result<()> {
        let actual = self.inner.lock().unwrap().sent.len();
        if actual != n {
            Err(Error::mock_unmatched(format!(
                "expected {n} total requests, saw {actual}"
            )))
        } else {
            Ok(())
        }
    }

    /// Asserts no requests were sent at all.
    pub fn assert_nothing_sent(&self) -> crate::Result<()> {
        self.assert_sent_count(0)
    }

    fn count_matching(&self, pattern: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .sent
            .iter()
            .filter(|req| {
                let (method_url, url_only) = req.candidate_keys();
                wildcard_match(pattern, &method_url) || wildcard_match(pattern, &url_only)
            })
            .count()
    }
}

fn find_exact<'a>(registered: &'a [Registered], key: &str, method_scoped: bool) -> Option<&'a Fake> {
    registered
        .iter()
        .find(|r| r.method_scoped == method_scoped && !r.pattern.contains('*') && r.pattern == key)
        .map(|r| &r.fake)
}

fn find_wildcard<'a>(registered: &'a [Registered], key: &str, method_scoped: bool) -> Option<&'a Fake> {
    registered
        .iter()
        .find(|r| r.method_scoped == method_scoped && r.pattern.contains('*') && wildcard_match(&r.pattern, key))
        .map(|r| &r.fake)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(method: Method, url: &str) -> RecordedRequest {
        RecordedRequest {
            method,
            url: Url::parse(url).unwrap(),
            headers: HeaderMap::new(),
            body: bytes::Bytes::new(),
        }
    }

    #[tokio::test]
    async fn exact_method_url_wins_first() {
        let ctx = MockContext::new();
        ctx.when("GET https://api.example.com/users", MockResponse::ok("one"));
        ctx.when("https://api.example.com/users", MockResponse::ok("two"));

        let resp = ctx
            .intercept(&req(Method::GET, "https://api.example.com/users"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.body, "one");
    }

    #[tokio::test]
    async fn wildcard_matches_when_no_exact() {
        let ctx = MockContext::new();
        ctx.when("https://api.example.com/*", MockResponse::ok("wild"));
        let resp = ctx
            .intercept(&req(Method::GET, "https://api.example.com/users/9"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.body, "wild");
    }

    #[tokio::test]
    async fn sequence_advances_then_repeats() {
        let ctx = MockContext::new();
        ctx.when_sequence(
            "https://api.example.com/seq",
            MockSequence::looping(vec![MockResponse::ok("a"), MockResponse::ok("b")]),
        );
        let r = req(Method::GET, "https://api.example.com/seq");
        assert_eq!(ctx.intercept(&r).await.unwrap().unwrap().body, "a");
        assert_eq!(ctx.intercept(&r).await.unwrap().unwrap().body, "b");
        assert_eq!(ctx.intercept(&r).await.unwrap().unwrap().body, "a");
    }

    #[tokio::test]
    async fn prevent_stray_requests_rejects_unmatched() {
        let ctx = MockContext::new();
        ctx.prevent_stray_requests(true);
        let err = ctx
            .intercept(&req(Method::GET, "https://unregistered.example.com"))
            .await
            .unwrap_err();
        assert!(err.is_mock_unmatched());
    }

    #[tokio::test]
    async fn allow_list_exempts_stray_requests() {
        let ctx = MockContext::new();
        ctx.prevent_stray_requests(true);
        ctx.allow("https://unregistered.example.com*");
        let result = ctx
            .intercept(&req(Method::GET, "https://unregistered.example.com"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn assertions_reflect_sent_requests() {
        let ctx = MockContext::new();
        ctx.when("https://api.example.com/users", MockResponse::ok("x"));
        ctx.intercept(&req(Method::GET, "https://api.example.com/users"))
            .await
            .unwrap();

        ctx.assert_sent("https://api.example.com/users", Some(1)).unwrap();
        ctx.assert_sent_count(1).unwrap();
        ctx.assert_not_sent("https://api.example.com/other").unwrap();
    }

    #[cfg(feature = "json")]
    #[tokio::test]
    async fn export_then_import_reproduces_status_headers_and_body() {
        let ctx = MockContext::new();
        ctx.set_recording(true);
        ctx.when(
            "https://api.example.com/users",
            MockResponse::ok(r#"{"message":"success"}"#)
                .with_header(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/json")),
        );
        ctx.intercept(&req(Method::GET, "https://api.example.com/users"))
            .await
            .unwrap();

        let exported = ctx.export_recordings().unwrap();

        let replay = MockContext::new();
        replay.import_recordings(&exported).unwrap();
        let resp = replay
            .intercept(&req(Method::GET, "https://api.example.com/users"))
            .await
            .unwrap()
            .expect("imported fake should match");

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, bytes::Bytes::from_static(b"{\"message\":\"success\"}"));
        assert_eq!(
            resp.headers.get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
