// Copyright 2020 Joyent, Inc.

use std::error;
use std::time::Duration;

/// Timeout handed to `Connection::is_valid` by the pool when a connection is
/// returned and by the failover factory when probing a recovering primary.
pub const VALIDITY_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Pool connection
///
/// The `Connection` trait defines the interface that must be implemented in
/// order to participate in a connection pool. A connection need not be limited
/// to a TCP socket, but could be any logical notion of a session with a
/// backend that can report its own liveness and be closed.
///
/// The pool never inspects anything beyond these three operations. Whatever
/// else a connection type offers is reached through
/// [`PoolConnection::connection`](../connection_pool/struct.PoolConnection.html#method.connection).
pub trait Connection: Send + Sized + 'static {
    /// The error type returned by `is_valid` or `close`. Each implementation
    /// picks the concrete error that makes sense for its backend.
    type Error: error::Error + Send + Sync + 'static;

    /// Ask the backend whether the connection is still usable, waiting no
    /// longer than `timeout`. An `Err` is treated the same as `Ok(false)`.
    fn is_valid(&mut self, timeout: Duration) -> Result<bool, Self::Error>;

    /// Whether the connection was closed, by this process or by the backend.
    fn is_closed(&self) -> bool;

    /// Close the connection to the backend
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// Check that a connection is open and passes its backend liveness check.
pub(crate) fn is_operable<C: Connection>(conn: &mut C) -> bool {
    !conn.is_closed() && conn.is_valid(VALIDITY_CHECK_TIMEOUT).unwrap_or(false)
}
