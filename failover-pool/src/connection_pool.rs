// Copyright 2020 Joyent, Inc.

pub mod types;

use std::fmt::Result as FmtResult;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use slog::{debug, o, trace, warn, Drain, Logger};

use crate::connection::{is_operable, Connection};
use crate::connection_pool::types::{
    ConnectionData, ConnectionPoolOptions, ConnectionPoolStats, ProtectedData,
};
use crate::delegate::{ClosePolicy, DelegateConnection};
use crate::error::Error;
use crate::factory::ConnectionFactory;

// Default number of maximum pool connections
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Receives connections handed back by a `PoolConnection` when it is
/// released.
pub trait ReleaseListener<C>: Send + Sync
where
    C: Connection,
{
    fn on_release(&self, conn: C);
}

/// A bounded pool of connections created on demand by a `ConnectionFactory`.
///
/// The pool starts empty and grows by one connection at a time, only when a
/// caller finds no idle connection, until `max_connections` connections
/// exist. Released connections are reused unless something outside the pool
/// closed or invalidated them, in which case they are discarded and replaced.
///
/// Cloning the pool is cheap and every clone shares the same connections.
pub struct ConnectionPool<F>
where
    F: ConnectionFactory,
{
    inner: Arc<PoolInner<F>>,
}

struct PoolInner<F>
where
    F: ConnectionFactory,
{
    factory: F,
    max_connections: usize,
    // Live connections, idle or claimed. Only ever raised by a winning
    // compare-and-swap, so it never exceeds `max_connections`.
    current_size: AtomicUsize,
    protected_data: ProtectedData<F::Connection>,
    claim_timeout: Option<u64>,
    log: Logger,
}

impl<F> Debug for ConnectionPool<F>
where
    F: ConnectionFactory,
{
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("ConnectionPool")
            .field("max_connections", &self.inner.max_connections)
            .field(
                "current_size",
                &self.inner.current_size.load(Ordering::Acquire),
            )
            .field("claim_timeout", &self.inner.claim_timeout)
            .finish()
    }
}

impl<F> Clone for ConnectionPool<F>
where
    F: ConnectionFactory,
{
    fn clone(&self) -> ConnectionPool<F> {
        ConnectionPool {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F> ConnectionPool<F>
where
    F: ConnectionFactory,
{
    pub fn new(cpo: ConnectionPoolOptions, factory: F) -> Result<Self, Error> {
        let max_connections =
            cpo.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if max_connections == 0 {
            return Err(Error::InvalidPoolSize);
        }

        let logger = cpo
            .log
            .unwrap_or_else(|| Logger::root(slog_stdlog::StdLog.fuse(), o!()));

        debug!(
            logger,
            "creating connection pool";
            "max_connections" => max_connections,
            "claim_timeout" => ?cpo.claim_timeout
        );

        let connection_data = ConnectionData::new(max_connections as usize);

        Ok(ConnectionPool {
            inner: Arc::new(PoolInner {
                factory,
                max_connections: max_connections as usize,
                current_size: AtomicUsize::new(0),
                protected_data: ProtectedData::new(connection_data),
                claim_timeout: cpo.claim_timeout,
                log: logger,
            }),
        })
    }

    /// Claim a connection, blocking until one is available.
    ///
    /// If no connection is idle and the pool is below its maximum size a new
    /// connection is created first, and a failure to create it is returned to
    /// the caller. Otherwise the caller joins a line of waiters that is served
    /// in arrival order. With a `claim_timeout` configured the wait gives up
    /// with `Error::ClaimTimeout`.
    pub fn claim(&self) -> Result<PoolConnection<F::Connection>, Error> {
        if self.inner.protected_data.is_empty() {
            self.inner.grow()?;
        }

        let conn = self.inner.wait_for_idle()?;
        trace!(self.inner.log, "connection claimed");
        Ok(PoolConnection::new(conn, self.listener()))
    }

    /// Claim an idle connection without creating one and without waiting.
    /// Returns `None` if nothing is idle or other callers are already waiting.
    pub fn try_claim(&self) -> Option<PoolConnection<F::Connection>> {
        let mut connection_data =
            self.inner.protected_data.connection_data_lock();
        if connection_data.has_waiters() {
            return None;
        }
        let conn = connection_data.connections.pop_front()?;
        drop(connection_data);

        trace!(self.inner.log, "connection claimed without waiting");
        Some(PoolConnection::new(conn, self.listener()))
    }

    pub fn get_stats(&self) -> ConnectionPoolStats {
        // The size only grows before a push and only shrinks after a pop, so
        // under the lock the idle count never exceeds it.
        let connection_data = self.inner.protected_data.connection_data_lock();
        let idle = connection_data.connections.len();
        let total = self.inner.current_size.load(Ordering::Acquire);
        drop(connection_data);

        ConnectionPoolStats {
            total_connections: (total as u32).into(),
            idle_connections: (idle as u32).into(),
        }
    }

    pub fn max_connections(&self) -> u32 {
        self.inner.max_connections as u32
    }

    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    fn listener(&self) -> Arc<dyn ReleaseListener<F::Connection>> {
        self.inner.clone()
    }
}

impl<F> PoolInner<F>
where
    F: ConnectionFactory,
{
    fn has_spare_capacity(&self) -> bool {
        self.current_size.load(Ordering::Acquire) < self.max_connections
    }

    /// Create one connection and add it to the idle queue, if the pool is
    /// below its maximum size. Returns `Ok(false)` when the pool is already
    /// saturated.
    fn grow(&self) -> Result<bool, Error> {
        loop {
            let current_size = self.current_size.load(Ordering::Acquire);
            if current_size >= self.max_connections {
                trace!(self.log, "pool saturated"; "size" => current_size);
                return Ok(false);
            }

            if self
                .current_size
                .compare_exchange(
                    current_size,
                    current_size + 1,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_err()
            {
                // Another caller changed the pool size, retry
                continue;
            }

            debug!(self.log, "adding connection"; "size" => current_size + 1);
            return match self.factory.create_connection() {
                Ok(conn) => {
                    self.protected_data.push(conn);
                    Ok(true)
                }
                Err(e) => {
                    // Give back the reserved slot
                    self.current_size.fetch_sub(1, Ordering::AcqRel);
                    warn!(self.log, "failed to create connection: {}", e);
                    self.protected_data.condvar_notify();
                    Err(e)
                }
            };
        }
    }

    fn wait_for_idle(&self) -> Result<F::Connection, Error> {
        let deadline = self
            .claim_timeout
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        let mut connection_data = self.protected_data.connection_data_lock();
        let ticket = connection_data.enqueue_waiter();
        let mut expired = false;
        let mut refill_failed = false;

        loop {
            if connection_data.is_next(ticket) {
                if let Some(conn) = connection_data.connections.pop_front() {
                    connection_data.remove_waiter(ticket);
                    drop(connection_data);
                    self.protected_data.condvar_notify();
                    return Ok(conn);
                }

                // First in line with nothing idle. A failed creation or an
                // eviction may have freed capacity that nobody refilled. A
                // waiter keeps waiting if the refill fails too; the next
                // release or claim tries again.
                if !refill_failed && self.has_spare_capacity() {
                    drop(connection_data);
                    let grown = self.grow();
                    connection_data = self.protected_data.connection_data_lock();
                    if let Err(e) = grown {
                        warn!(
                            self.log,
                            "waiting claim could not refill the pool: {}", e
                        );
                        refill_failed = true;
                    }
                    continue;
                }
            }

            if expired {
                connection_data.remove_waiter(ticket);
                drop(connection_data);
                self.protected_data.condvar_notify();
                debug!(self.log, "claim timed out");
                return Err(Error::ClaimTimeout);
            }

            let (guard, timed_out) =
                self.protected_data.condvar_wait(connection_data, deadline);
            connection_data = guard;
            expired = timed_out;
            refill_failed = false;
        }
    }
}

impl<F> ReleaseListener<F::Connection> for PoolInner<F>
where
    F: ConnectionFactory,
{
    fn on_release(&self, mut conn: F::Connection) {
        if is_operable(&mut conn) {
            trace!(self.log, "returning connection to the pool");
            self.protected_data.push(conn);
            return;
        }

        warn!(
            self.log,
            "found an inoperable connection, not returning it to the pool"
        );
        if let Err(e) = conn.close() {
            debug!(self.log, "failed to close inoperable connection: {}", e);
        }
        drop(conn);
        self.current_size.fetch_sub(1, Ordering::AcqRel);

        if let Err(e) = self.grow() {
            warn!(self.log, "failed to replace evicted connection: {}", e);
        }
        self.protected_data.condvar_notify();
    }
}

impl<F> Drop for PoolInner<F>
where
    F: ConnectionFactory,
{
    fn drop(&mut self) {
        let idle: Vec<F::Connection> = self
            .protected_data
            .connection_data_lock()
            .connections
            .drain(..)
            .collect();

        debug!(self.log, "closing {} idle connections", idle.len());
        for mut conn in idle {
            if let Err(e) = conn.close() {
                warn!(self.log, "failed to close idle connection: {}", e);
            }
        }
    }
}

/// A connection claimed from the pool.
///
/// Every operation is forwarded to the underlying connection until the
/// `PoolConnection` is released, after which they all fail with
/// `Error::ConnectionReleased`. Releasing never closes the underlying
/// connection; it goes back to the pool, which decides whether to keep it.
/// Dropping an unreleased `PoolConnection` releases it.
pub struct PoolConnection<C>
where
    C: Connection,
{
    connection: Option<DelegateConnection<C>>,
    listener: Arc<dyn ReleaseListener<C>>,
}

impl<C> PoolConnection<C>
where
    C: Connection,
{
    /// Wrap `conn` so that releasing it hands it to `listener`.
    pub fn new(conn: C, listener: Arc<dyn ReleaseListener<C>>) -> Self {
        PoolConnection {
            connection: Some(DelegateConnection::new(conn, ClosePolicy::Retain)),
            listener,
        }
    }

    pub fn connection(&self) -> Result<&C, Error> {
        self.wrapper()?.get()
    }

    pub fn connection_mut(&mut self) -> Result<&mut C, Error> {
        self.connection
            .as_mut()
            .ok_or(Error::ConnectionReleased)?
            .get_mut()
    }

    pub fn is_valid(&mut self, timeout: Duration) -> Result<bool, Error> {
        self.connection
            .as_mut()
            .ok_or(Error::ConnectionReleased)?
            .is_valid(timeout)
    }

    pub fn is_closed(&self) -> Result<bool, Error> {
        self.wrapper()?.is_closed()
    }

    pub fn is_released(&self) -> bool {
        self.connection.is_none()
    }

    /// Hand the connection back to the pool. Releasing an already released
    /// connection does nothing.
    pub fn release(&mut self) -> Result<(), Error> {
        match self.connection.take() {
            Some(mut wrapper) => {
                let closed = wrapper.close();
                self.listener.on_release(wrapper.into_inner());
                closed
            }
            None => Ok(()),
        }
    }

    fn wrapper(&self) -> Result<&DelegateConnection<C>, Error> {
        self.connection.as_ref().ok_or(Error::ConnectionReleased)
    }
}

impl<C> Debug for PoolConnection<C>
where
    C: Connection + Debug,
{
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("PoolConnection")
            .field("connection", &self.connection)
            .finish()
    }
}

impl<C> Drop for PoolConnection<C>
where
    C: Connection,
{
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc::{channel, Receiver};
    use std::sync::{Barrier, Mutex};
    use std::thread;

    use crate::test_support::{MockConnection, MockFactory};

    const MAX_POOL_SIZE: u32 = 3;

    fn pool_with(max: u32, factory: MockFactory) -> ConnectionPool<MockFactory> {
        let pool_opts = ConnectionPoolOptions {
            max_connections: Some(max),
            claim_timeout: None,
            log: None,
        };
        ConnectionPool::new(pool_opts, factory).unwrap()
    }

    fn id_of(conn: &PoolConnection<MockConnection>) -> usize {
        conn.connection().unwrap().id()
    }

    #[test]
    fn zero_sized_pool_is_rejected() {
        let pool_opts = ConnectionPoolOptions {
            max_connections: Some(0),
            ..Default::default()
        };
        match ConnectionPool::new(pool_opts, MockFactory::new(0)) {
            Err(Error::InvalidPoolSize) => (),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn returns_connection_from_factory() {
        let factory = MockFactory::new(0);
        let pool = pool_with(MAX_POOL_SIZE, factory.clone());

        let conn = pool.claim().unwrap();

        assert_eq!(factory.calls(), 1);
        assert_eq!(id_of(&conn), 1);
    }

    #[test]
    fn claims_while_held_get_distinct_connections() {
        let factory = MockFactory::new(0);
        let pool = pool_with(MAX_POOL_SIZE, factory.clone());

        let conn1 = pool.claim().unwrap();
        let conn2 = pool.claim().unwrap();

        assert_eq!(factory.calls(), 2);
        assert_eq!(id_of(&conn1), 1);
        assert_eq!(id_of(&conn2), 2);
    }

    #[test]
    fn concurrent_claims_below_max_create_one_each() {
        let thread_count = 2;
        let factory = MockFactory::new(0);
        let pool = pool_with(MAX_POOL_SIZE, factory.clone());
        let claimed = Arc::new(Barrier::new(thread_count + 1));
        let finished = Arc::new(Barrier::new(thread_count + 1));
        let (tx, rx) = channel();

        let threads: Vec<_> = (0..thread_count)
            .map(|_| {
                let pool = pool.clone();
                let claimed = claimed.clone();
                let finished = finished.clone();
                let tx = tx.clone();
                thread::spawn(move || {
                    let conn = pool.claim().unwrap();
                    tx.send(id_of(&conn)).unwrap();
                    claimed.wait();
                    finished.wait();
                })
            })
            .collect();

        // Every connection is still held here, so none could be reused
        claimed.wait();
        assert_eq!(factory.calls(), thread_count);
        let stats = pool.get_stats();
        assert_eq!(stats.total_connections, (thread_count as u32).into());
        assert_eq!(stats.idle_connections, 0.into());
        finished.wait();

        for t in threads {
            t.join().unwrap();
        }

        let mut ids: Vec<usize> = rx.try_iter().collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn sequential_claims_reuse_connection() {
        let factory = MockFactory::new(0);
        let pool = pool_with(MAX_POOL_SIZE, factory.clone());

        let mut conn1 = pool.claim().unwrap();
        assert_eq!(id_of(&conn1), 1);
        conn1.release().unwrap();
        let conn2 = pool.claim().unwrap();

        assert_eq!(factory.calls(), 1);
        assert_eq!(id_of(&conn2), 1);
    }

    #[test]
    fn replaces_connection_closed_by_backend() {
        let factory = MockFactory::new(0);
        let pool = pool_with(MAX_POOL_SIZE, factory.clone());

        let mut conn1 = pool.claim().unwrap();
        factory.created()[0].set_closed(true);
        conn1.release().unwrap();

        let conn2 = pool.claim().unwrap();

        assert_eq!(factory.calls(), 2);
        assert_eq!(id_of(&conn2), 2);
        assert_eq!(pool.get_stats().total_connections, 1.into());
    }

    #[test]
    fn replaces_connection_invalidated_by_backend() {
        let factory = MockFactory::new(0);
        let pool = pool_with(MAX_POOL_SIZE, factory.clone());

        let mut conn1 = pool.claim().unwrap();
        let inner = factory.created()[0].clone();
        inner.set_valid(false);
        conn1.release().unwrap();

        let conn2 = pool.claim().unwrap();

        assert_eq!(factory.calls(), 2);
        assert_eq!(id_of(&conn2), 2);
        assert_eq!(inner.close_calls(), 1);
    }

    #[test]
    fn respects_max_size_under_contention() {
        let thread_count = 50;
        let factory = MockFactory::new(0);
        let pool = pool_with(MAX_POOL_SIZE, factory.clone());
        let barrier = Arc::new(Barrier::new(thread_count));

        let threads: Vec<_> = (0..thread_count)
            .map(|_| {
                let pool = pool.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let conn = pool.claim().unwrap();
                    thread::sleep(Duration::from_millis(10));
                    drop(conn);
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(factory.calls(), MAX_POOL_SIZE as usize);
        let stats = pool.get_stats();
        assert_eq!(stats.total_connections, MAX_POOL_SIZE.into());
        assert_eq!(stats.idle_connections, MAX_POOL_SIZE.into());
    }

    #[test]
    fn creation_failure_is_returned_and_frees_the_slot() {
        let factory = MockFactory::new(0);
        factory.break_with("backend down");
        let pool = pool_with(1, factory.clone());

        match pool.claim() {
            Err(Error::ConnectionCreateFailure(msg)) => {
                assert_eq!(msg, "backend down")
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert_eq!(pool.get_stats().total_connections, 0.into());

        factory.repair();
        let conn = pool.claim().unwrap();
        assert_eq!(factory.calls(), 2);
        assert_eq!(id_of(&conn), 2);
    }

    #[test]
    fn failed_backfill_is_retried_by_next_claim() {
        let factory = MockFactory::new(0);
        let pool = pool_with(1, factory.clone());

        let mut conn1 = pool.claim().unwrap();
        factory.created()[0].set_closed(true);
        factory.break_with("still down");
        conn1.release().unwrap();

        assert_eq!(factory.calls(), 2);
        assert_eq!(pool.get_stats().total_connections, 0.into());

        factory.repair();
        let conn2 = pool.claim().unwrap();
        assert_eq!(factory.calls(), 3);
        assert_eq!(id_of(&conn2), 3);
    }

    fn spawn_waiter(
        pool: &ConnectionPool<MockFactory>,
    ) -> (thread::JoinHandle<()>, Receiver<Result<usize, String>>) {
        let pool = pool.clone();
        let (tx, rx) = channel();
        let handle = thread::spawn(move || {
            let conn = pool.claim();
            let claimed = conn.as_ref().map(id_of).map_err(|e| e.to_string());
            tx.send(claimed).unwrap();
        });
        // Give the waiter time to join the line
        thread::sleep(Duration::from_millis(100));
        (handle, rx)
    }

    #[test]
    fn waiter_gets_replacement_for_evicted_connection() {
        let factory = MockFactory::new(0);
        let pool = pool_with(1, factory.clone());

        let mut held = pool.claim().unwrap();
        let (waiter, rx) = spawn_waiter(&pool);
        assert!(rx.try_recv().is_err());

        factory.created()[0].set_valid(false);
        held.release().unwrap();

        let claimed = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(claimed, Ok(2));
        assert_eq!(factory.calls(), 2);
        waiter.join().unwrap();
    }

    #[test]
    fn waiter_keeps_waiting_when_refill_fails() {
        let factory = MockFactory::new(0);
        let pool = pool_with(1, factory.clone());

        let mut held = pool.claim().unwrap();
        let (waiter, rx) = spawn_waiter(&pool);

        factory.created()[0].set_valid(false);
        factory.break_with("transient backend blip");
        held.release().unwrap();

        // The release tries to replace the evicted connection, then the
        // waiter at the front of the line tries once more
        let deadline = Instant::now() + Duration::from_secs(5);
        while factory.calls() < 3 {
            assert!(Instant::now() < deadline, "waiter never refilled the pool");
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(100));
        assert!(rx.try_recv().is_err(), "waiter gave up instead of waiting");
        assert_eq!(factory.calls(), 3);
        assert_eq!(pool.get_stats().total_connections, 0.into());

        // A new claim refills the pool and the waiter is served first
        factory.repair();
        let conn = pool.claim().unwrap();
        let claimed = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(claimed, Ok(4));
        assert_eq!(id_of(&conn), 4);
        assert_eq!(factory.calls(), 4);
        waiter.join().unwrap();
    }

    #[test]
    fn stats_never_report_more_idle_than_total() {
        let factory = MockFactory::new(0);
        let pool = pool_with(2, factory.clone());
        let done = Arc::new(AtomicBool::new(false));

        let churn = {
            let pool = pool.clone();
            let done = done.clone();
            thread::spawn(move || {
                for _ in 0..2000 {
                    let mut conn = pool.claim().unwrap();
                    conn.connection().unwrap().set_valid(false);
                    conn.release().unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        while !done.load(Ordering::SeqCst) {
            let stats = pool.get_stats();
            assert!(stats.idle_connections <= stats.total_connections);
            assert!(stats.claimed_connections() <= stats.total_connections);
        }
        churn.join().unwrap();
    }

    #[test]
    fn claim_times_out_when_saturated() {
        let factory = MockFactory::new(0);
        let pool_opts = ConnectionPoolOptions {
            max_connections: Some(1),
            claim_timeout: Some(50),
            log: None,
        };
        let pool = ConnectionPool::new(pool_opts, factory.clone()).unwrap();

        let _conn = pool.claim().unwrap();
        match pool.claim() {
            Err(Error::ClaimTimeout) => (),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert_eq!(factory.calls(), 1);
    }

    #[test]
    fn try_claim_never_creates_connections() {
        let factory = MockFactory::new(0);
        let pool = pool_with(MAX_POOL_SIZE, factory.clone());

        assert!(pool.try_claim().is_none());
        assert_eq!(factory.calls(), 0);

        let conn = pool.claim().unwrap();
        assert!(pool.try_claim().is_none());
        drop(conn);

        let reclaimed = pool.try_claim();
        assert!(reclaimed.is_some());
        assert_eq!(factory.calls(), 1);
    }

    #[test]
    fn waiters_are_served_in_arrival_order() {
        let factory = MockFactory::new(0);
        let pool = pool_with(1, factory.clone());
        let mut held = pool.claim().unwrap();

        let (tx, rx) = channel();
        let mut threads = Vec::new();
        for name in ["first", "second", "third"].iter() {
            let pool = pool.clone();
            let tx = tx.clone();
            let name = *name;
            threads.push(thread::spawn(move || {
                let conn = pool.claim().unwrap();
                tx.send(name).unwrap();
                thread::sleep(Duration::from_millis(20));
                drop(conn);
            }));
            // Give each waiter time to join the line before the next one
            thread::sleep(Duration::from_millis(100));
        }

        held.release().unwrap();
        for t in threads {
            t.join().unwrap();
        }

        let order: Vec<&str> = rx.try_iter().collect();
        assert_eq!(order, vec!["first", "second", "third"]);
        assert_eq!(factory.calls(), 1);
    }

    #[test]
    fn operations_fail_after_release() {
        let pool = pool_with(1, MockFactory::new(0));
        let mut conn = pool.claim().unwrap();
        conn.release().unwrap();

        assert!(conn.is_released());
        match conn.is_valid(Duration::from_secs(1)) {
            Err(Error::ConnectionReleased) => (),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(conn.connection().is_err());
        assert!(conn.connection_mut().is_err());
        assert!(conn.is_closed().is_err());
    }

    #[test]
    fn second_release_is_a_noop() {
        let factory = MockFactory::new(0);
        let pool = pool_with(MAX_POOL_SIZE, factory.clone());

        let mut conn = pool.claim().unwrap();
        assert!(conn.release().is_ok());
        assert!(conn.release().is_ok());
        drop(conn);

        let created = factory.created();
        let inner = &created[0];
        assert_eq!(inner.validity_checks(), 1);
        assert_eq!(inner.close_calls(), 0);
        assert_eq!(pool.get_stats().idle_connections, 1.into());
    }

    #[test]
    fn dropping_pool_closes_idle_connections() {
        let factory = MockFactory::new(0);
        let pool = pool_with(MAX_POOL_SIZE, factory.clone());

        let conn1 = pool.claim().unwrap();
        let conn2 = pool.claim().unwrap();
        drop(conn1);
        drop(conn2);
        drop(pool);

        for conn in factory.created() {
            assert_eq!(conn.close_calls(), 1);
        }
    }

    struct CountingListener {
        released: AtomicUsize,
        last: Mutex<Option<usize>>,
    }

    impl ReleaseListener<MockConnection> for CountingListener {
        fn on_release(&self, conn: MockConnection) {
            self.released.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(conn.id());
        }
    }

    #[test]
    fn release_notifies_listener_once() {
        let listener = Arc::new(CountingListener {
            released: AtomicUsize::new(0),
            last: Mutex::new(None),
        });
        let mut conn = PoolConnection::new(MockConnection::new(7), listener.clone());

        assert_eq!(conn.is_valid(Duration::from_secs(1)).ok(), Some(true));
        assert_eq!(listener.released.load(Ordering::SeqCst), 0);

        conn.release().unwrap();
        drop(conn);

        assert_eq!(listener.released.load(Ordering::SeqCst), 1);
        assert_eq!(*listener.last.lock().unwrap(), Some(7));
    }
}
