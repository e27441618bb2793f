// Copyright 2020 Joyent, Inc.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use derive_more::{Add, AddAssign, Display, From, Into, Sub, SubAssign};
use slog::Logger;

/// The connection counts for the connection pool
#[derive(Copy, Clone, Debug)]
pub struct ConnectionPoolStats {
    /// The total number of live connections, idle or claimed
    pub total_connections: ConnectionCount,
    /// The count of idle connections in the pool
    pub idle_connections: ConnectionCount,
}

impl ConnectionPoolStats {
    /// Create a new instance of `ConnectionPoolStats`
    pub fn new() -> Self {
        ConnectionPoolStats {
            total_connections: ConnectionCount::from(0),
            idle_connections: ConnectionCount::from(0),
        }
    }

    /// The number of connections currently claimed by callers.
    pub fn claimed_connections(&self) -> ConnectionCount {
        self.total_connections - self.idle_connections
    }
}

impl Default for ConnectionPoolStats {
    fn default() -> Self {
        Self::new()
    }
}

/// The configuration options for a connection pool.
#[derive(Debug, Default)]
pub struct ConnectionPoolOptions {
    /// An optional maximum number of connections to maintain in the connection
    /// pool. If not specified the default is 10. Zero is rejected.
    pub max_connections: Option<u32>,
    /// An optional timeout in milliseconds for blocking calls (`claim`) to
    /// request a connection from the pool. If not specified the calls will
    /// block indefinitely.
    pub claim_timeout: Option<u64>,
    /// An optional `slog` logger instance. If none is provided then the logging
    /// will fall back to using the [`slog-stdlog`](https://docs.rs/slog-stdlog)
    /// drain which is essentially the same as using the rust standard
    /// [`log`](https://docs.rs/log) crate.
    pub log: Option<Logger>,
}

/// A newtype wrapper around u32 used for counts of connections maintained by
/// the connection pool.
#[derive(
    Add,
    AddAssign,
    Clone,
    Copy,
    Debug,
    Display,
    Eq,
    From,
    Into,
    Ord,
    PartialOrd,
    PartialEq,
    Sub,
    SubAssign,
)]
pub struct ConnectionCount(u32);

// Idle connections plus the line of callers waiting for one. Callers are
// served strictly in the order they joined the line.
#[doc(hidden)]
#[derive(Debug)]
pub struct ConnectionData<C> {
    pub connections: VecDeque<C>,
    waiters: VecDeque<u64>,
    next_ticket: u64,
}

impl<C> ConnectionData<C> {
    #[doc(hidden)]
    pub fn new(max_size: usize) -> Self {
        ConnectionData {
            connections: VecDeque::with_capacity(max_size),
            waiters: VecDeque::new(),
            next_ticket: 0,
        }
    }

    /// Join the back of the line.
    pub fn enqueue_waiter(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.waiters.push_back(ticket);
        ticket
    }

    /// Whether `ticket` is at the front of the line.
    pub fn is_next(&self, ticket: u64) -> bool {
        self.waiters.front() == Some(&ticket)
    }

    pub fn has_waiters(&self) -> bool {
        !self.waiters.is_empty()
    }

    /// Leave the line, from the front after being served or from anywhere
    /// after giving up.
    pub fn remove_waiter(&mut self, ticket: u64) {
        self.waiters.retain(|t| *t != ticket);
    }
}

// Protected access to the idle queue
#[doc(hidden)]
#[derive(Debug)]
pub struct ProtectedData<C>(Arc<(Mutex<ConnectionData<C>>, Condvar)>);

impl<C> ProtectedData<C> {
    pub fn new(connection_data: ConnectionData<C>) -> Self {
        ProtectedData(Arc::new((Mutex::new(connection_data), Condvar::new())))
    }

    pub fn connection_data_lock(&self) -> MutexGuard<ConnectionData<C>> {
        (self.0).0.lock().unwrap()
    }

    /// Wait for a notification, but no later than `deadline`. The returned
    /// flag is true if the deadline has passed.
    pub fn condvar_wait<'a>(
        &self,
        g: MutexGuard<'a, ConnectionData<C>>,
        deadline: Option<Instant>,
    ) -> (MutexGuard<'a, ConnectionData<C>>, bool) {
        match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return (g, true);
                }
                let timeout: Duration = deadline - now;
                let wait_result = (self.0).1.wait_timeout(g, timeout).unwrap();
                (wait_result.0, Instant::now() >= deadline)
            }
            None => ((self.0).1.wait(g).unwrap(), false),
        }
    }

    // Waiters are served in ticket order, so every waiter has to wake up and
    // check whether it is now at the front of the line.
    pub fn condvar_notify(&self) {
        (self.0).1.notify_all()
    }

    /// Append an idle connection and wake the waiters.
    pub fn push(&self, conn: C) {
        let mut connection_data = self.connection_data_lock();
        connection_data.connections.push_back(conn);
        drop(connection_data);
        self.condvar_notify();
    }

    pub fn is_empty(&self) -> bool {
        self.connection_data_lock().connections.is_empty()
    }
}
