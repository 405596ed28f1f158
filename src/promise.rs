//! The promise adapter.
//!
//! The executor (see [`crate::executor`]) is a single async function; this
//! module is the thin layer of combinators built on top of it, mirroring
//! what the teacher's blocking client gets almost for free from its
//! `ClientHandle` (a dedicated runtime reached over an `mpsc` channel plus a
//! `oneshot` reply for the result) generalized into a reusable `Promise<T>`.
//! Here the "dedicated runtime" is just `tokio::task::spawn`, and the
//! combinators (`all`/`any`/`map`) are built on `futures-util`.

use std::future::Future;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::task::JoinHandle;

use crate::error::Error;

/// A handle to work already running on the runtime, resolving to
/// `crate::Result<T>`.
///
/// Dropping a `Promise` does not cancel the underlying task — exactly the
/// same semantics as dropping a `tokio::task::JoinHandle` — but the
/// combinators below (`all`/`race`/`any`) explicitly [`abort`](JoinHandle::abort)
/// any sibling task once the combined promise has settled, per the laws in
/// the design notes ("pending work is cancelled").
pub struct Promise<T> {
    handle: JoinHandle<crate::Result<T>>,
}

impl<T: Send + 'static> Promise<T> {
    /// Spawns `fut` onto the runtime, wrapping it as a `Promise`.
    pub fn spawn<F>(fut: F) -> Promise<T>
    where
        F: Future<Output = crate::Result<T>> + Send + 'static,
    {
        Promise {
            handle: tokio::task::spawn(fut),
        }
    }

    /// An already-fulfilled promise.
    pub fn resolve(value: T) -> Promise<T> {
        Promise::spawn(async move { Ok(value) })
    }

    /// An already-rejected promise.
    pub fn reject(error: Error) -> Promise<T> {
        Promise::spawn(async move { Err(error) })
    }

    /// Awaits the promise to completion. A panic in the spawned task
    /// surfaces as a [`crate::error::Kind::Cancelled`] error, the same
    /// classification used for an explicitly cancelled call.
    pub async fn join(self) -> crate::Result<T> {
        match self.handle.await {
            Ok(result) => result,
            Err(_join_err) => Err(Error::cancelled()),
        }
    }

    /// Awaits the promise, failing with a timeout error if it doesn't
    /// settle within `timeout`. `None` waits indefinitely.
    pub async fn join_timeout(self, timeout: Option<Duration>) -> crate::Result<T> {
        match timeout {
            None => self.join().await,
            Some(d) => {
                let abort = self.handle.abort_handle();
                match tokio::time::timeout(d, self.handle).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_join_err)) => Err(Error::cancelled()),
                    Err(_elapsed) => {
                        abort.abort();
                        Err(Error::timeout(crate::error::TimedOut))
                    }
                }
            }
        }
    }

    /// Chains a fallible continuation onto a fulfilled promise; a rejected
    /// promise passes its error straight through untouched.
    pub fn then<U, F, Fut>(self, on_ok: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = crate::Result<U>> + Send + 'static,
    {
        Promise::spawn(async move {
            match self.join().await {
                Ok(value) => on_ok(value).await,
                Err(e) => Err(e),
            }
        })
    }

    /// Like [`then`](Promise::then), but also given the chance to recover
    /// from a rejection.
    pub fn then_or_else<U, FOk, FutOk, FErr, FutErr>(self, on_ok: FOk, on_err: FErr) -> Promise<U>
    where
        U: Send + 'static,
        FOk: FnOnce(T) -> FutOk + Send + 'static,
        FutOk: Future<Output = crate::Result<U>> + Send + 'static,
        FErr: FnOnce(Error) -> FutErr + Send + 'static,
        FutErr: Future<Output = crate::Result<U>> + Send + 'static,
    {
        Promise::spawn(async move {
            match self.join().await {
                Ok(value) => on_ok(value).await,
                Err(e) => on_err(e).await,
            }
        })
    }

    /// Recovers from a rejection; a fulfilled promise passes its value
    /// straight through untouched.
    pub fn catch<F, Fut>(self, on_err: F) -> Promise<T>
    where
        F: FnOnce(Error) -> Fut + Send + 'static,
        Fut: Future<Output = crate::Result<T>> + Send + 'static,
    {
        Promise::spawn(async move {
            match self.join().await {
                Ok(value) => Ok(value),
                Err(e) => on_err(e).await,
            }
        })
    }

    /// Runs `on_finally` once the promise settles, regardless of outcome,
    /// then passes the original outcome through unchanged.
    pub fn finally<F, Fut>(self, on_finally: F) -> Promise<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Promise::spawn(async move {
            let outcome = self.join().await;
            on_finally().await;
            outcome
        })
    }
}

/// Awaits every promise, rejecting as soon as the first one rejects and
/// aborting every task still pending at that point.
pub async fn all<T: Send + 'static>(promises: Vec<Promise<T>>) -> crate::Result<Vec<T>> {
    let aborts: Vec<_> = promises.iter().map(|p| p.handle.abort_handle()).collect();

    let mut results = Vec::with_capacity(promises.len());
    for (index, promise) in promises.into_iter().enumerate() {
        match promise.join().await {
            Ok(value) => results.push(value),
            Err(e) => {
                for abort in &aborts[index + 1..] {
                    abort.abort();
                }
                return Err(e);
            }
        }
    }
    Ok(results)
}

/// Settles as soon as any one promise settles (success or failure),
/// aborting the rest.
pub async fn race<T: Send + 'static>(promises: Vec<Promise<T>>) -> crate::Result<T> {
    let aborts: Vec<_> = promises.iter().map(|p| p.handle.abort_handle()).collect();
    let mut futures: futures_util::stream::FuturesUnordered<_> =
        promises.into_iter().map(Promise::join).collect();

    let outcome = futures.next().await.unwrap_or_else(|| Err(Error::cancelled()));
    for abort in &aborts {
        abort.abort();
    }
    outcome
}

/// Fulfills with the first promise to succeed; rejects only once every
/// promise has rejected, aggregating their messages.
pub async fn any<T: Send + 'static>(promises: Vec<Promise<T>>) -> crate::Result<T> {
    let aborts: Vec<_> = promises.iter().map(|p| p.handle.abort_handle()).collect();
    let mut futures: futures_util::stream::FuturesUnordered<_> =
        promises.into_iter().map(Promise::join).collect();

    let mut errors = Vec::new();
    while let Some(outcome) = futures.next().await {
        match outcome {
            Ok(value) => {
                for abort in &aborts {
                    abort.abort();
                }
                return Ok(value);
            }
            Err(e) => errors.push(e.to_string()),
        }
    }
    Err(Error::all_rejected(errors))
}

/// One step of a [`sequence`] — boxed so a caller can mix differently
/// captured closures in a single `Vec`, the way a list of ad-hoc request
/// factories naturally would be.
pub type SequenceStep<T> = Box<dyn FnOnce() -> std::pin::Pin<Box<dyn Future<Output = crate::Result<T>> + Send>> + Send>;

/// Runs a list of factories strictly in order, awaiting each before
/// starting the next.
pub async fn sequence<T>(factories: Vec<SequenceStep<T>>) -> crate::Result<Vec<T>> {
    let mut results = Vec::with_capacity(factories.len());
    for factory in factories {
        results.push(factory().await?);
    }
    Ok(results)
}

/// Maps `func` over `items` with at most `concurrency` calls in flight at
/// once, preserving input order in the output. Rejects (and stops
/// admitting new work) as soon as any call fails.
pub async fn map<I, T, U, F, Fut>(items: Vec<I>, func: F, concurrency: usize) -> crate::Result<Vec<U>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = crate::Result<U>>,
{
    let concurrency = concurrency.max(1);
    stream::iter(items.into_iter().map(func))
        .buffered(concurrency)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_then_join_roundtrips() {
        let value = Promise::resolve(7).join().await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn then_chains_onto_fulfilled_value() {
        let promise = Promise::resolve(2).then(|v| async move { Ok(v * 10) });
        assert_eq!(promise.join().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn catch_recovers_a_rejection() {
        let promise: Promise<i32> = Promise::reject(Error::cancelled()).catch(|_| async { Ok(99) });
        assert_eq!(promise.join().await.unwrap(), 99);
    }

    #[tokio::test]
    async fn all_rejects_on_first_failure() {
        let promises = vec![
            Promise::resolve(1),
            Promise::reject(Error::cancelled()),
            Promise::resolve(3),
        ];
        let result = all(promises).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn all_preserves_order_on_success() {
        let promises = vec![Promise::resolve(1), Promise::resolve(2), Promise::resolve(3)];
        let result = all(promises).await.unwrap();
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn any_fulfills_on_first_success() {
        let promises = vec![Promise::reject(Error::cancelled()), Promise::resolve(5)];
        let result = any(promises).await.unwrap();
        assert_eq!(result, 5);
    }

    #[tokio::test]
    async fn any_rejects_only_once_all_reject() {
        let promises: Vec<Promise<i32>> = vec![Promise::reject(Error::cancelled()), Promise::reject(Error::cancelled())];
        assert!(any(promises).await.is_err());
    }

    #[tokio::test]
    async fn sequence_runs_in_order() {
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let a = order.clone();
        let b = order.clone();
        let factories: Vec<SequenceStep<i32>> = vec![
            Box::new(move || {
                Box::pin(async move {
                    a.lock().unwrap().push(1);
                    crate::Result::Ok(1)
                })
            }),
            Box::new(move || {
                Box::pin(async move {
                    b.lock().unwrap().push(2);
                    crate::Result::Ok(2)
                })
            }),
        ];
        let result = sequence(factories).await.unwrap();
        assert_eq!(result, vec![1, 2]);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn map_preserves_order_with_bounded_concurrency() {
        let items = vec![3u64, 1, 2];
        let result = map(
            items,
            |n| async move {
                tokio::time::sleep(Duration::from_millis(n)).await;
                crate::Result::Ok(n)
            },
            2,
        )
        .await
        .unwrap();
        assert_eq!(result, vec![3, 1, 2]);
    }
}
