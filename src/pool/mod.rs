//! Per-origin connection pooling.
//!
//! Each origin (scheme, host, port) owns a FIFO idle queue of reusable
//! connections plus an active counter. A connection is never shared
//! between concurrent borrows — unlike the teacher's pool, which lets an
//! HTTP/2 connection hand out a second "shared" reservation — because the
//! spec's `active_request_count <= 1` invariant targets blocking-I/O style
//! reuse, one request per connection at a time.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use url::Url;

use crate::error::Error;
use crate::options::PoolConfig;

/// A (scheme, host, port) tuple identifying one origin's pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Origin {
    /// Derives an origin from a URL, defaulting the port to 80/443 by
    /// scheme when the URL doesn't specify one.
    pub fn from_url(url: &Url) -> crate::Result<Origin> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::malformed(format!("URL has no host: {url}")))?
            .to_string();
        let scheme = url.scheme().to_string();
        let port = url.port_or_known_default().unwrap_or(match scheme.as_str() {
            "https" | "wss" => 443,
            _ => 80,
        });
        Ok(Origin { scheme, host, port })
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// An opaque handle to a pooled transport connection.
///
/// This engine doesn't keep its own socket type; `Connection` tracks the
/// bookkeeping (origin, age, reuse eligibility) around an opaque transport
/// identity supplied by whatever actually dials the socket.
pub struct Connection {
    id: u64,
    origin: Origin,
    created_at: Instant,
    last_used_at: Instant,
    closed: bool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Connection {
    fn new(id: u64, origin: Origin) -> Connection {
        let now = Instant::now();
        Connection {
            id,
            origin,
            created_at: now,
            last_used_at: now,
            closed: false,
        }
    }

    /// The origin this connection belongs to.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// True if this connection may be returned to the idle queue: it
    /// hasn't been explicitly closed and hasn't sat idle longer than
    /// `keep_alive_timeout`.
    pub fn reusable(&self, keep_alive_timeout: Duration) -> bool {
        !self.closed && self.last_used_at.elapsed() < keep_alive_timeout
    }

    fn mark_used(&mut self) {
        self.last_used_at = Instant::now();
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

struct HostPool {
    idle: VecDeque<Connection>,
    active: usize,
}

impl HostPool {
    fn new() -> HostPool {
        HostPool {
            idle: VecDeque::new(),
            active: 0,
        }
    }
}

/// Aggregate pool counters, returned by [`ConnectionPool::stats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub connections_created: u64,
    pub connections_reused: u64,
    pub total_requests: u64,
    pub total_latency: Duration,
}

impl PoolStats {
    /// Mean latency across every request that called `record_latency`.
    pub fn average_latency(&self) -> Duration {
        if self.total_requests == 0 {
            Duration::ZERO
        } else {
            self.total_latency / self.total_requests as u32
        }
    }

    /// Fraction of borrows served from the idle queue rather than freshly
    /// created.
    pub fn reuse_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.connections_reused as f64 / self.total_requests as f64
        }
    }
}

struct Counters {
    connections_created: AtomicU64,
    connections_reused: AtomicU64,
    total_requests: AtomicU64,
    total_latency_nanos: AtomicU64,
}

impl Default for Counters {
    fn default() -> Counters {
        Counters {
            connections_created: AtomicU64::new(0),
            connections_reused: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            total_latency_nanos: AtomicU64::new(0),
        }
    }
}

/// A pool of reusable connections, partitioned by origin.
///
/// Borrowing never fails except under memory exhaustion; connect failures
/// are surfaced by whatever dials the socket the connection wraps, not by
/// the pool itself.
#[derive(Clone)]
pub struct ConnectionPool {
    config: PoolConfig,
    hosts: Arc<Mutex<std::collections::HashMap<Origin, HostPool>>>,
    counters: Arc<Counters>,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("stats", &self.stats())
            .finish()
    }
}

impl ConnectionPool {
    /// Creates an empty pool tuned by `config`.
    pub fn new(config: PoolConfig) -> ConnectionPool {
        ConnectionPool {
            config,
            hosts: Arc::new(Mutex::new(std::collections::HashMap::new())),
            counters: Arc::new(Counters::default()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Borrows a connection for `origin`: a reusable idle connection if one
    /// is available, otherwise a freshly-minted handle.
    pub fn get(&self, origin: &Origin) -> Connection {
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);

        let keep_alive = self
            .config
            .idle_timeout
            .unwrap_or(Duration::from_secs(90));

        let mut hosts = self.hosts.lock().unwrap();
        let host_pool = hosts.entry(origin.clone()).or_insert_with(HostPool::new);

        while let Some(mut conn) = host_pool.idle.pop_front() {
            if conn.reusable(keep_alive) {
                conn.mark_used();
                host_pool.active += 1;
                self.counters.connections_reused.fetch_add(1, Ordering::Relaxed);
                return conn;
            }
            // expired idle connection; drop it and keep looking.
        }

        host_pool.active += 1;
        self.counters.connections_created.fetch_add(1, Ordering::Relaxed);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Connection::new(id, origin.clone())
    }

    /// Resolves `url` into an origin and borrows a connection for it.
    pub fn get_from_url(&self, url: &Url) -> crate::Result<Connection> {
        let origin = Origin::from_url(url)?;
        Ok(self.get(&origin))
    }

    /// Returns `conn` to its origin's idle queue if it's still reusable and
    /// there's room, otherwise closes it.
    pub fn release(&self, mut conn: Connection) {
        let keep_alive = self
            .config
            .idle_timeout
            .unwrap_or(Duration::from_secs(90));

        let mut hosts = self.hosts.lock().unwrap();
        let host_pool = hosts.entry(conn.origin.clone()).or_insert_with(HostPool::new);
        host_pool.active = host_pool.active.saturating_sub(1);

        if conn.reusable(keep_alive) && host_pool.idle.len() < self.config.max_idle_per_host {
            host_pool.idle.push_back(conn);
        } else {
            conn.close();
        }
    }

    /// Hard-closes `conn` regardless of its reusability.
    pub fn close(&self, mut conn: Connection) {
        let mut hosts = self.hosts.lock().unwrap();
        if let Some(host_pool) = hosts.get_mut(&conn.origin) {
            host_pool.active = host_pool.active.saturating_sub(1);
        }
        conn.close();
    }

    /// Closes every idle connection across every origin. Active (borrowed)
    /// connections are unaffected until they are released.
    pub fn close_all(&self) {
        let mut hosts = self.hosts.lock().unwrap();
        for host_pool in hosts.values_mut() {
            host_pool.idle.clear();
        }
    }

    /// Adds `latency` to the running total used by
    /// [`PoolStats::average_latency`].
    pub fn record_latency(&self, latency: Duration) {
        self.counters
            .total_latency_nanos
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
    }

    /// A snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            connections_created: self.counters.connections_created.load(Ordering::Relaxed),
            connections_reused: self.counters.connections_reused.load(Ordering::Relaxed),
            total_requests: self.counters.total_requests.load(Ordering::Relaxed),
            total_latency: Duration::from_nanos(
                self.counters.total_latency_nanos.load(Ordering::Relaxed),
            ),
        }
    }
}

impl Default for ConnectionPool {
    fn default() -> ConnectionPool {
        ConnectionPool::new(PoolConfig::default())
    }
}

/// RAII guard that releases a borrowed connection back to its pool when
/// dropped, guaranteeing a connection is never silently leaked if a
/// request attempt returns early (error, cancellation, panic unwind).
pub struct ConnectionGuard {
    pool: ConnectionPool,
    conn: Option<Connection>,
}

impl ConnectionGuard {
    pub(crate) fn new(pool: ConnectionPool, conn: Connection) -> ConnectionGuard {
        ConnectionGuard {
            pool,
            conn: Some(conn),
        }
    }

    /// The wrapped connection.
    pub fn get(&self) -> &Connection {
        self.conn.as_ref().expect("connection taken")
    }

    /// Hard-closes the connection instead of releasing it for reuse, e.g.
    /// after a protocol error that leaves the socket in an unknown state.
    pub fn close(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.close(conn);
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Origin {
        Origin {
            scheme: "https".into(),
            host: "example.com".into(),
            port: 443,
        }
    }

    #[test]
    fn reuses_released_connections() {
        let pool = ConnectionPool::new(PoolConfig::default());
        let conn = pool.get(&origin());
        pool.release(conn);

        let conn2 = pool.get(&origin());
        let stats = pool.stats();
        assert_eq!(stats.connections_created, 1);
        assert_eq!(stats.connections_reused, 1);
        pool.release(conn2);
    }

    #[test]
    fn expired_idle_connections_are_not_reused() {
        let config = PoolConfig {
            idle_timeout: Some(Duration::from_millis(1)),
            ..PoolConfig::default()
        };
        let pool = ConnectionPool::new(config);
        let conn = pool.get(&origin());
        pool.release(conn);
        std::thread::sleep(Duration::from_millis(20));

        let conn2 = pool.get(&origin());
        assert_eq!(pool.stats().connections_created, 2);
        pool.release(conn2);
    }

    #[test]
    fn respects_max_idle_per_host() {
        let config = PoolConfig {
            max_idle_per_host: 1,
            ..PoolConfig::default()
        };
        let pool = ConnectionPool::new(config);
        let a = pool.get(&origin());
        let b = pool.get(&origin());
        pool.release(a);
        pool.release(b);

        let c = pool.get(&origin());
        let d = pool.get(&origin());
        // Only one of the two released connections could have stayed idle.
        assert_eq!(pool.stats().connections_created, 3);
        pool.release(c);
        pool.release(d);
    }

    #[test]
    fn guard_releases_on_drop() {
        let pool = ConnectionPool::new(PoolConfig::default());
        {
            let conn = pool.get(&origin());
            let _guard = ConnectionGuard::new(pool.clone(), conn);
        }
        assert_eq!(pool.stats().connections_reused, 0);
        let conn2 = pool.get(&origin());
        pool.release(conn2);
        assert_eq!(pool.stats().connections_reused, 1);
    }
}
