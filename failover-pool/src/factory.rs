// Copyright 2020 Joyent, Inc.

use crate::connection::Connection;
use crate::error::Error;

/// A source of new connections.
///
/// The connection pool calls `create_connection` whenever it has reserved
/// capacity for a new connection. Implementations either dial a backend
/// directly or, like
/// [`FailoverConnectionFactory`](../failover/struct.FailoverConnectionFactory.html),
/// choose among other factories.
///
/// Any `Fn() -> Result<C, Error>` closure that is `Send + Sync` is a
/// connection factory.
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: Connection;

    fn create_connection(&self) -> Result<Self::Connection, Error>;
}

impl<C, F> ConnectionFactory for F
where
    C: Connection,
    F: Fn() -> Result<C, Error> + Send + Sync + 'static,
{
    type Connection = C;

    fn create_connection(&self) -> Result<C, Error> {
        self()
    }
}
