//! The middleware chain.
//!
//! A middleware wraps the remaining chain the way a `tower::Layer` wraps a
//! `tower::Service` — the teacher's composition order — but since this
//! engine's `Request`/`Response` are concrete types rather than generic
//! ones, the chain is a plain `Vec<Arc<dyn Middleware>>` folded into
//! nested futures rather than a stack of `Layer<S>` types. `Next` owns its
//! remaining middlewares and terminal handler through `Arc`s so a single
//! logical call's chain can be driven fresh on every retry attempt without
//! borrowing across awaits.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::Response;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type Terminal = Arc<dyn Fn(Request) -> BoxFuture<crate::Result<Response>> + Send + Sync>;

/// The remainder of a middleware chain, callable once.
pub struct Next {
    remaining: Arc<[Arc<dyn Middleware>]>,
    position: usize,
    terminal: Terminal,
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &(self.remaining.len() - self.position.min(self.remaining.len())))
            .finish()
    }
}

impl Next {
    /// Invokes the next middleware in the chain, or the terminal handler
    /// (DNS + pool + transport) if none remain.
    pub fn run(self, request: Request) -> BoxFuture<crate::Result<Response>> {
        match self.remaining.get(self.position) {
            Some(mw) => {
                let mw = mw.clone();
                let next = Next {
                    remaining: self.remaining,
                    position: self.position + 1,
                    terminal: self.terminal,
                };
                mw.handle(request, next)
            }
            None => (self.terminal)(request),
        }
    }
}

/// A single middleware: a request/response transformer that may
/// short-circuit the chain by returning a synthesized response without
/// invoking `next`.
///
/// Must be idempotent-safe: a retried logical call re-enters the whole
/// chain for each attempt, so a middleware that mutates external state
/// (e.g. incrementing a counter) must tolerate being called more than once
/// per logical request.
pub trait Middleware: Send + Sync {
    /// Handles `request`, optionally delegating to `next` for the rest of
    /// the chain.
    fn handle(&self, request: Request, next: Next) -> BoxFuture<crate::Result<Response>>;
}

/// An ordered middleware chain, composed outside-in: the first-registered
/// middleware is the outermost wrapper and sees the request first and the
/// response last.
#[derive(Clone, Default)]
pub struct Chain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("len", &self.middlewares.len())
            .finish()
    }
}

impl Chain {
    /// An empty chain.
    pub fn new() -> Chain {
        Chain {
            middlewares: Vec::new(),
        }
    }

    /// Appends `middleware` as the new innermost layer.
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Runs the chain against `request`, invoking `terminal` once no
    /// middleware remains.
    pub(crate) async fn run<F>(&self, request: Request, terminal: F) -> crate::Result<Response>
    where
        F: Fn(Request) -> BoxFuture<crate::Result<Response>> + Send + Sync + 'static,
    {
        let next = Next {
            remaining: Arc::from(self.middlewares.clone().into_boxed_slice()),
            position: 0,
            terminal: Arc::new(terminal),
        };
        next.run(request).await
    }
}

/// A middleware built from a plain async closure, for callers who don't
/// need a named type implementing [`Middleware`].
pub struct FnMiddleware<F>(F);

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnMiddleware").finish()
    }
}

impl<F> FnMiddleware<F> {
    /// Wraps `func` as a [`Middleware`].
    pub fn new(func: F) -> FnMiddleware<F> {
        FnMiddleware(func)
    }
}

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = crate::Result<Response>> + Send + 'static,
{
    fn handle(&self, request: Request, next: Next) -> BoxFuture<crate::Result<Response>> {
        Box::pin((self.0)(request, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode, Version};
    use url::Url;

    fn terminal_ok() -> impl Fn(Request) -> BoxFuture<crate::Result<Response>> + Send + Sync + 'static {
        |req: Request| {
            Box::pin(async move {
                Ok(Response::new(
                    StatusCode::OK,
                    req.url().clone(),
                    http::HeaderMap::new(),
                    Version::HTTP_11,
                    bytes::Bytes::new(),
                ))
            })
        }
    }

    struct HeaderStamper;
    impl Middleware for HeaderStamper {
        fn handle(&self, mut request: Request, next: Next) -> BoxFuture<crate::Result<Response>> {
            request
                .headers_mut()
                .insert("x-stamped", http::HeaderValue::from_static("1"));
            next.run(request)
        }
    }

    struct ShortCircuit;
    impl Middleware for ShortCircuit {
        fn handle(&self, request: Request, _next: Next) -> BoxFuture<crate::Result<Response>> {
            Box::pin(async move {
                Ok(Response::new(
                    StatusCode::IM_A_TEAPOT,
                    request.url().clone(),
                    http::HeaderMap::new(),
                    Version::HTTP_11,
                    bytes::Bytes::new(),
                ))
            })
        }
    }

    #[tokio::test]
    async fn runs_middleware_before_terminal() {
        let mut chain = Chain::new();
        chain.push(Arc::new(HeaderStamper));
        let req = Request::new(Method::GET, Url::parse("https://example.com").unwrap());
        let resp = chain.run(req, terminal_ok()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn short_circuit_skips_terminal() {
        let mut chain = Chain::new();
        chain.push(Arc::new(ShortCircuit));
        let req = Request::new(Method::GET, Url::parse("https://example.com").unwrap());
        let resp = chain.run(req, terminal_ok()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    }
}
