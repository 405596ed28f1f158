#![deny(missing_debug_implementations)]

//! # fetchr
//!
//! An ergonomic, high-level HTTP client with a request execution engine
//! that coordinates connection pooling, DNS caching, classifier-driven
//! retry with backoff, a priority-ordered event pipeline, a middleware
//! chain, and a deterministic mock/record/replay testing facility.
//!
//! Both a synchronous and a promise-style asynchronous execution mode
//! are offered over the same underlying executor — nothing about
//! retries, events, or pooling differs between the two.
//!
//! ## Making a GET request
//!
//! ```rust,no_run
//! # async fn run() -> fetchr::Result<()> {
//! let client = fetchr::Client::new();
//! let res = client.get("https://example.com").send().await?;
//! println!("status = {}", res.status());
//! # Ok(())
//! # }
//! ```
//!
//! ## Retry and backoff
//!
//! Configure `RetryConfig` on the builder to retry a bounded number of
//! times on a configurable set of statuses/exception kinds, with
//! exponential backoff between attempts (see [`retry`]).
//!
//! ## Testing with the mock interceptor
//!
//! See [`mock`] for a deterministic request interceptor that can be
//! attached to a `Client` instead of hitting the network.
//!
//! ## Optional Features
//!
//! - **blocking**: a synchronous `blocking::Client` built atop the async engine.
//! - **cookies**: automatic cookie jar support.
//! - **json**: `json()`/`.json()` body and response helpers.
//! - **multipart**: multipart/form-data request bodies.
//! - **gzip**: transparent response body gzip decompression.
//! - **hickory-dns**: an async hickory-dns resolver instead of the default
//!   threadpool `getaddrinfo` resolver.

#[macro_use]
mod trace;

pub use http::Method;
pub use http::{StatusCode, Version};
pub use url::Url;

#[macro_use]
mod error;
mod into_url;

pub use self::error::{Error, Result};
pub use self::into_url::IntoUrl;

pub mod body;
pub mod client;
#[cfg(feature = "gzip")]
mod decode;
pub mod dns;
pub mod events;
pub mod executor;
pub mod middleware;
pub mod mock;
pub mod options;
pub mod pool;
pub mod promise;
pub mod redirect;
pub mod request;
pub mod response;
pub mod retry;

#[cfg(feature = "cookies")]
pub mod cookie;

pub mod proxy;

mod util;

#[cfg(feature = "blocking")]
pub mod blocking;

pub use self::body::Body;
pub use self::client::{Client, ClientBuilder};
pub use self::events::{Event, EventDispatcher, EventKind, Priority};
pub use self::options::{PoolConfig, RequestOptions, RetryConfig};
pub use self::request::{Request, RequestBuilder};
pub use self::response::Response;

fn _assert_impls() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    fn assert_clone<T: Clone>() {}

    assert_send::<Client>();
    assert_sync::<Client>();
    assert_clone::<Client>();

    assert_send::<Request>();
    assert_send::<RequestBuilder>();
    assert_send::<Response>();

    assert_send::<Error>();
    assert_sync::<Error>();
}
