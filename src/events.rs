//! Lifecycle event dispatch.
//!
//! The executor emits one [`Event`] at each named point in a request's
//! lifecycle (`request.sending`, `response.received`, `error.occurred`,
//! `request.retrying`, `request.redirecting`, `request.timeout`).
//! Listeners are grouped by [`Priority`] and invoked highest-priority
//! first; a listener that panics or otherwise misbehaves does not prevent
//! the remaining listeners from running, since observers should not be
//! able to destabilize the request they're merely watching.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use parking_lot::RwLock;
use url::Url;

/// The kind of lifecycle event being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A request is about to be sent to the network (or mock registry).
    RequestSending,
    /// A response was received and passed outcome classification.
    ResponseReceived,
    /// A terminal error is about to be returned to the caller.
    ErrorOccurred,
    /// An attempt failed in a way the retry policy decided to retry.
    RequestRetrying,
    /// A redirect response was received.
    RequestRedirecting,
    /// A per-attempt timeout elapsed.
    RequestTimeout,
}

/// The payload delivered to listeners for one lifecycle event.
#[derive(Debug, Clone)]
pub struct Event {
    /// Which lifecycle point this event describes.
    pub kind: EventKind,
    /// Correlates every event for one logical call (across retries).
    pub correlation_id: String,
    /// The attempt number this event pertains to, 1-based.
    pub attempt: u32,
    pub method: Method,
    pub url: Url,
    /// Present on `response.received` and redirect events.
    pub status: Option<StatusCode>,
    /// Present on retry/error events.
    pub message: Option<String>,
    /// Present on retry events: the delay before the next attempt.
    pub delay: Option<Duration>,
    /// Wall-clock time the attempt took, when known.
    pub duration: Option<Duration>,
}

/// Listener priority; listeners registered at a higher priority run first.
/// Listeners at equal priority run in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i32);

impl Priority {
    pub const LOW: Priority = Priority(-100);
    pub const NORMAL: Priority = Priority(0);
    pub const HIGH: Priority = Priority(100);
}

impl Default for Priority {
    fn default() -> Priority {
        Priority::NORMAL
    }
}

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

struct Entry {
    priority: Priority,
    seq: u64,
    kind: EventKind,
    listener: Listener,
}

struct Inner {
    entries: Vec<Entry>,
    next_seq: u64,
}

/// A registry of lifecycle event listeners, dispatched in priority order.
///
/// Cloning an `EventDispatcher` shares the same underlying registry (the
/// same pattern as the connection pool and mock registry: a handle, not a
/// deep copy), so a listener registered on a client is visible to every
/// request built from it.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<RwLock<Inner>>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("EventDispatcher")
            .field("listeners", &inner.entries.len())
            .finish()
    }
}

impl EventDispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> EventDispatcher {
        EventDispatcher {
            inner: Arc::new(RwLock::new(Inner {
                entries: Vec::new(),
                next_seq: 0,
            })),
        }
    }

    /// Registers `listener` for `kind` at [`Priority::NORMAL`].
    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.on_with_priority(kind, Priority::NORMAL, listener);
    }

    /// Registers `listener` for `kind` at an explicit priority.
    pub fn on_with_priority<F>(&self, kind: EventKind, priority: Priority, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut inner = self.inner.write();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.push(Entry {
            priority,
            seq,
            kind,
            listener: Arc::new(listener),
        });
        inner
            .entries
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
    }

    /// Removes every listener registered for `kind`.
    pub fn clear(&self, kind: EventKind) {
        let mut inner = self.inner.write();
        inner.entries.retain(|e| e.kind != kind);
    }

    /// Dispatches `event` to every listener registered for its kind,
    /// highest priority first. A listener that panics is caught and
    /// logged so it cannot abort dispatch to the remaining listeners or
    /// unwind into the executor.
    pub(crate) fn dispatch(&self, event: &Event) {
        let listeners: Vec<Listener> = {
            let inner = self.inner.read();
            inner
                .entries
                .iter()
                .filter(|e| e.kind == event.kind)
                .map(|e| e.listener.clone())
                .collect()
        };

        for listener in listeners {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
            if result.is_err() {
                error!("event listener panicked while handling {:?}", event.kind);
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> EventDispatcher {
        EventDispatcher::new()
    }
}
