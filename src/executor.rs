//! The request executor: the hard core that coordinates DNS, pooling,
//! retries, redirects, middleware, events, and mocking across one logical
//! call.
//!
//! Grounded on the teacher's `async_impl/client.rs::execute_request` /
//! `blocking/client.rs::execute_request` pair — one executor, reused by
//! both the async and blocking call paths — plus `redirect.rs`'s
//! `Attempt`/`Action` for the redirect-observation path when following is
//! disabled.

use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{Method, StatusCode, Version};
use http_body_util::BodyExt;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::dns::DnsCache;
use crate::error::{io_to_network, Error};
use crate::events::{Event, EventKind};
use crate::middleware::Chain;
use crate::mock::{MockContext, RecordedRequest};
use crate::options::RequestOptions;
use crate::pool::{ConnectionGuard, ConnectionPool, Origin};
use crate::redirect;
use crate::request::Request;
use crate::response::Response;
use crate::retry::Action as RetryAction;
use crate::util::correlation_id;

type Transport = HyperClient<HttpConnector, http_body_util::Full<Bytes>>;

/// Owns everything a request needs besides the `Request`/`RequestOptions`
/// values themselves: the DNS cache, connection pool bookkeeping, the
/// middleware chain, and the real transport.
#[derive(Clone)]
pub struct Executor {
    dns: DnsCache,
    pool: ConnectionPool,
    middleware: Chain,
    transport: Transport,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").field("pool", &self.pool).finish()
    }
}

impl Executor {
    /// Builds an executor with a fresh DNS cache, connection pool, and
    /// hyper transport tuned from `options`.
    pub fn new(options: &RequestOptions, middleware: Chain) -> Executor {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(options.connect_timeout);
        connector.enforce_http(false);

        let transport = HyperClient::builder(TokioExecutor::new()).build(connector);

        Executor {
            dns: DnsCache::default(),
            pool: ConnectionPool::new(options.pool.clone()),
            middleware,
            transport,
        }
    }

    /// The executor's connection pool, for callers that want pool stats or
    /// to force-close idle connections.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// The executor's DNS cache, for callers that want cache stats.
    pub fn dns(&self) -> &DnsCache {
        &self.dns
    }

    /// Runs `request` to completion: mock check, retry loop, redirect
    /// observation, and event emission, per the executor contract.
    pub async fn execute(&self, request: Request, options: &RequestOptions) -> crate::Result<Response> {
        let correlation_id = correlation_id();
        let mut attempt: u32 = 1;
        let mut last_request = request;

        loop {
            let started_at = Instant::now();
            options.events.dispatch(&Event {
                kind: EventKind::RequestSending,
                correlation_id: correlation_id.clone(),
                attempt,
                method: last_request.method().clone(),
                url: last_request.url().clone(),
                status: None,
                message: None,
                delay: None,
                duration: None,
            });

            let outcome = self
                .attempt_once(last_request.clone(), options, &correlation_id)
                .await;

            match &outcome {
                Ok(response) => {
                    let status = response.status();
                    if options.retry.is_retryable_status(status) {
                        let action = options.retry.classify(attempt, &Ok(status));
                        if action == RetryAction::Retry {
                            let delay =
                                self.emit_retry(options, &correlation_id, attempt, &last_request, started_at, None);
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            continue;
                        }
                        // Retries exhausted on a retryable status: the response is
                        // still returned to the caller as `Ok`, but `error.occurred`
                        // fires in its place so listeners observe the final failure.
                        let status_error = Error::status_code(last_request.url().clone(), status);
                        self.emit_error(options, &correlation_id, attempt, &last_request, &status_error);
                        return Ok(response.clone());
                    }
                    options.events.dispatch(&Event {
                        kind: EventKind::ResponseReceived,
                        correlation_id: correlation_id.clone(),
                        attempt,
                        method: last_request.method().clone(),
                        url: last_request.url().clone(),
                        status: Some(status),
                        message: None,
                        delay: None,
                        duration: Some(started_at.elapsed()),
                    });
                    return Ok(response.clone());
                }
                Err(err) => {
                    if err.is_timeout() {
                        options.events.dispatch(&Event {
                            kind: EventKind::RequestTimeout,
                            correlation_id: correlation_id.clone(),
                            attempt,
                            method: last_request.method().clone(),
                            url: last_request.url().clone(),
                            status: None,
                            message: Some(err.to_string()),
                            delay: None,
                            duration: Some(started_at.elapsed()),
                        });
                    }

                    if err.is_cancelled() {
                        self.emit_error(options, &correlation_id, attempt, &last_request, err);
                        return outcome;
                    }

                    let action = options.retry.classify(attempt, &Err(clone_for_classify(err)));
                    if action == RetryAction::Retry {
                        let delay =
                            self.emit_retry(options, &correlation_id, attempt, &last_request, started_at, Some(err));
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    self.emit_error(options, &correlation_id, attempt, &last_request, err);
                    return outcome;
                }
            }
        }

        #[allow(unreachable_code)]
        {
            let _ = &mut last_request;
            unreachable!()
        }
    }

    /// Emits `request.retrying` and returns the delay the caller must sleep
    /// before re-entering the loop.
    fn emit_retry(
        &self,
        options: &RequestOptions,
        correlation_id: &str,
        attempt: u32,
        request: &Request,
        started_at: Instant,
        error: Option<&Error>,
    ) -> Duration {
        let delay = options.retry.delay_for(attempt);
        options.events.dispatch(&Event {
            kind: EventKind::RequestRetrying,
            correlation_id: correlation_id.to_string(),
            attempt,
            method: request.method().clone(),
            url: request.url().clone(),
            status: None,
            message: error.map(ToString::to_string),
            delay: Some(delay),
            duration: Some(started_at.elapsed()),
        });
        delay
    }

    fn emit_error(
        &self,
        options: &RequestOptions,
        correlation_id: &str,
        attempt: u32,
        request: &Request,
        error: &Error,
    ) {
        options.events.dispatch(&Event {
            kind: EventKind::ErrorOccurred,
            correlation_id: correlation_id.to_string(),
            attempt,
            method: request.method().clone(),
            url: request.url().clone(),
            status: error.status(),
            message: Some(error.to_string()),
            delay: None,
            duration: None,
        });
    }

    /// Runs exactly one attempt: mock check, middleware chain, terminal
    /// transport call, redirect observation. `correlation_id` is shared
    /// across every retry and redirect hop belonging to one logical call.
    async fn attempt_once(
        &self,
        request: Request,
        options: &RequestOptions,
        correlation_id: &str,
    ) -> crate::Result<Response> {
        self.attempt_with_redirects(request, options, correlation_id, Vec::new())
            .await
    }

    fn attempt_with_redirects<'a>(
        &'a self,
        request: Request,
        options: &'a RequestOptions,
        correlation_id: &'a str,
        visited: Vec<Url>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = crate::Result<Response>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(token) = &options.cancellation_token {
                if token.is_cancelled() {
                    return Err(Error::cancelled());
                }
            }

            if let Some(mock) = &options.mock {
                let mock_future = self.try_mock(mock, &request);
                let matched = match &options.cancellation_token {
                    Some(token) => {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => return Err(Error::cancelled()),
                            res = mock_future => res?,
                        }
                    }
                    None => mock_future.await?,
                };
                if let Some(response) = matched {
                    return Ok(response);
                }
            }

            let timeout = options.timeout;
            let attempt_future = self.run_middleware(request.clone(), options);
            let attempt_with_timeout = async {
                match timeout {
                    Some(d) => tokio::time::timeout(d, attempt_future)
                        .await
                        .map_err(|_| Error::timeout(crate::error::TimedOut))?,
                    None => attempt_future.await,
                }
            };

            let response = match &options.cancellation_token {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(Error::cancelled()),
                        res = attempt_with_timeout => res?,
                    }
                }
                None => attempt_with_timeout.await?,
            };

            if response.status().is_redirection() && !options.redirect.is_none() {
                if let Some(location) = response.headers().get(http::header::LOCATION).cloned() {
                    if let Ok(location_str) = location.to_str() {
                        if let Ok(next_url) = request.url().join(location_str) {
                            let action = options.redirect.check(response.status(), &next_url, &visited);
                            if let redirect::ActionKind::Follow = action.inner {
                                let mut next_request = request.clone();
                                *next_request.url_mut() = next_url;
                                if matches!(
                                    response.status(),
                                    StatusCode::SEE_OTHER | StatusCode::FOUND | StatusCode::MOVED_PERMANENTLY
                                ) && request.method() != Method::GET
                                    && request.method() != Method::HEAD
                                {
                                    *next_request.method_mut() = Method::GET;
                                    *next_request.body_mut() = None;
                                }

                                options.events.dispatch(&Event {
                                    kind: EventKind::RequestRedirecting,
                                    correlation_id: correlation_id.to_string(),
                                    attempt: 1,
                                    method: request.method().clone(),
                                    url: request.url().clone(),
                                    status: Some(response.status()),
                                    message: location.to_str().ok().map(str::to_string),
                                    delay: None,
                                    duration: None,
                                });

                                let mut visited = visited;
                                visited.push(request.url().clone());
                                return self
                                    .attempt_with_redirects(next_request, options, correlation_id, visited)
                                    .await;
                            }
                            if let redirect::ActionKind::Error(e) = action.inner {
                                return Err(e);
                            }
                        }
                    }
                }

                options.events.dispatch(&Event {
                    kind: EventKind::RequestRedirecting,
                    correlation_id: correlation_id.to_string(),
                    attempt: 1,
                    method: request.method().clone(),
                    url: request.url().clone(),
                    status: Some(response.status()),
                    message: response
                        .headers()
                        .get(http::header::LOCATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string),
                    delay: None,
                    duration: None,
                });
            }

            Ok(response)
        })
    }

    async fn try_mock(&self, mock: &MockContext, request: &Request) -> crate::Result<Option<Response>> {
        let recorded = RecordedRequest {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
            body: request
                .body()
                .map(|b| Bytes::copy_from_slice(b.as_bytes()))
                .unwrap_or_default(),
        };

        let fake = mock.intercept(&recorded).await?;
        Ok(fake.map(|resp| {
            Response::new(resp.status, request.url().clone(), resp.headers, Version::HTTP_11, resp.body)
        }))
    }

    async fn run_middleware(&self, request: Request, options: &RequestOptions) -> crate::Result<Response> {
        let pool = self.pool.clone();
        let dns = self.dns.clone();
        let transport = self.transport.clone();
        let connect_timeout = options.connect_timeout;
        #[cfg(feature = "gzip")]
        let accepts = if options.gzip {
            crate::decode::Accepts::gzip()
        } else {
            crate::decode::Accepts::none()
        };

        self.middleware
            .run(request, move |req| {
                let pool = pool.clone();
                let dns = dns.clone();
                let transport = transport.clone();
                Box::pin(terminal(
                    req,
                    pool,
                    dns,
                    transport,
                    connect_timeout,
                    #[cfg(feature = "gzip")]
                    accepts,
                ))
            })
            .await
    }
}

fn clone_for_classify(err: &Error) -> Error {
    // `Error` doesn't implement `Clone` (its `source` may not be), so
    // reclassification reconstructs a lightweight equivalent carrying just
    // the kind information the retry classifier inspects.
    if err.is_timeout() {
        Error::timeout(crate::error::TimedOut)
    } else if err.is_network() {
        Error::network(crate::error::TimedOut)
    } else {
        Error::malformed(err.to_string())
    }
}

/// The terminal handler: resolves DNS, borrows a pool connection, invokes
/// the real transport, records duration, and releases the connection.
async fn terminal(
    request: Request,
    pool: ConnectionPool,
    dns: DnsCache,
    transport: Transport,
    _connect_timeout: Option<Duration>,
    #[cfg(feature = "gzip")] accepts: crate::decode::Accepts,
) -> crate::Result<Response> {
    let url = request.url().clone();
    let origin = Origin::from_url(&url)?;

    if let Some(host) = url.host_str() {
        dns.resolve(host).await?;
    }

    let conn = pool.get(&origin);
    let guard = ConnectionGuard::new(pool.clone(), conn);

    let started = Instant::now();
    let result = send_via_hyper(
        &transport,
        &request,
        #[cfg(feature = "gzip")]
        accepts,
    )
    .await;
    pool.record_latency(started.elapsed());

    match result {
        Ok(response) => {
            guard.get();
            Ok(response)
        }
        Err(e) => {
            drop(guard);
            Err(e)
        }
    }
}

async fn send_via_hyper(
    transport: &Transport,
    request: &Request,
    #[cfg(feature = "gzip")] accepts: crate::decode::Accepts,
) -> crate::Result<Response> {
    let uri: http::Uri = request
        .url()
        .as_str()
        .parse()
        .map_err(|e| Error::malformed(format!("invalid URI: {e}")))?;

    let body = request
        .body()
        .map(|b| Bytes::copy_from_slice(b.as_bytes()))
        .unwrap_or_default();

    let mut builder = http::Request::builder().method(request.method().clone()).uri(uri);
    for (name, value) in request.headers().iter() {
        builder = builder.header(name, value);
    }
    let hyper_request = builder
        .body(http_body_util::Full::new(body))
        .map_err(Error::builder)?;

    #[cfg(feature = "gzip")]
    let hyper_request = {
        let mut hyper_request = hyper_request;
        accepts.apply_request_header(hyper_request.headers_mut());
        hyper_request
    };

    let response = transport
        .request(hyper_request)
        .await
        .map_err(|e| io_to_network(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

    let status = response.status();
    let version = response.version();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(Error::decode)?
        .to_bytes();

    #[cfg(feature = "gzip")]
    let (headers, body) = accepts.decode(headers, body)?;

    Ok(Response::new(status, request.url().clone(), headers, version, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::mock::MockResponse;

    #[tokio::test]
    async fn mocked_request_short_circuits_transport() {
        let mock = MockContext::new();
        mock.when("https://api.example.com/users", MockResponse::ok("hi"));

        let client = Client::builder().mock(mock).build().unwrap();
        let resp = client.get("https://api.example.com/users").send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text().unwrap(), "hi");
    }

    #[tokio::test]
    async fn retry_respects_max_retries() {
        let mock = MockContext::new();
        mock.when(
            "https://api.example.com/flaky",
            MockResponse::status(StatusCode::SERVICE_UNAVAILABLE),
        );

        let events = crate::events::EventDispatcher::new();
        let seen: std::sync::Arc<std::sync::Mutex<Vec<(EventKind, Option<StatusCode>, String)>>> =
            std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = seen.clone();
        for kind in [
            EventKind::RequestSending,
            EventKind::ResponseReceived,
            EventKind::RequestRetrying,
            EventKind::ErrorOccurred,
        ] {
            let recorder = recorder.clone();
            events.on(kind, move |ev| {
                recorder
                    .lock()
                    .unwrap()
                    .push((ev.kind, ev.status, ev.correlation_id.clone()));
            });
        }

        let client = Client::builder()
            .mock(mock.clone())
            .events(events)
            .retry(crate::retry::RetryConfig {
                max_retries: 2,
                jitter: false,
                base_delay: Duration::from_millis(1),
                ..crate::retry::RetryConfig::default()
            })
            .build()
            .unwrap();

        let resp = client.get("https://api.example.com/flaky").send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        mock.assert_sent_count(3).unwrap();

        // S3: retries exhausted on a retryable status surfaces `Ok(503)` to
        // the caller with no exception, but `error.occurred` still fires
        // exactly once, classified `http-status`, and `response.received`
        // never fires for the exhausted attempt.
        let seen = seen.lock().unwrap();
        let retrying = seen.iter().filter(|(k, ..)| *k == EventKind::RequestRetrying).count();
        let errors: Vec<_> = seen.iter().filter(|(k, ..)| *k == EventKind::ErrorOccurred).collect();
        let responses = seen.iter().filter(|(k, ..)| *k == EventKind::ResponseReceived).count();

        assert_eq!(retrying, 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].1, Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(responses, 0);

        let correlation_ids: std::collections::HashSet<_> = seen.iter().map(|(_, _, c)| c.clone()).collect();
        assert_eq!(correlation_ids.len(), 1, "all events of one logical call share a correlation id");
    }

    #[tokio::test]
    async fn cancelling_mid_flight_aborts_with_no_retry() {
        let mock = MockContext::new();
        mock.when(
            "https://api.example.com/slow",
            MockResponse::ok("too late").with_delay(Duration::from_secs(10)),
        );

        let client = Client::builder().mock(mock.clone()).build().unwrap();
        let token = tokio_util::sync::CancellationToken::new();

        let cancel_token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel_token.cancel();
        });

        let err = client
            .get("https://api.example.com/slow")
            .cancellation_token(token)
            .send()
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        mock.assert_sent_count(1).unwrap();
    }

    #[tokio::test]
    async fn already_cancelled_token_short_circuits_before_dispatch() {
        let mock = MockContext::new();
        mock.when("https://api.example.com/users", MockResponse::ok("hi"));

        let client = Client::builder().mock(mock.clone()).build().unwrap();
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();

        let err = client
            .get("https://api.example.com/users")
            .cancellation_token(token)
            .send()
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        mock.assert_sent_count(0).unwrap();
    }
}
