// Copyright 2020 Joyent, Inc.

use slog::Logger;

use crate::connection_pool::types::ConnectionPoolOptions;
use crate::connection_pool::{ConnectionPool, PoolConnection};
use crate::error::Error;
use crate::factory::ConnectionFactory;
use crate::failover::{FailoverConnectionFactory, FailoverOptions};

/// The entry point applications hand connections out from.
pub struct ConnectionManager<F>
where
    F: ConnectionFactory,
{
    pool: ConnectionPool<F>,
}

impl<F> Clone for ConnectionManager<F>
where
    F: ConnectionFactory,
{
    fn clone(&self) -> ConnectionManager<F> {
        ConnectionManager {
            pool: self.pool.clone(),
        }
    }
}

impl<F> ConnectionManager<F>
where
    F: ConnectionFactory,
{
    pub fn new(pool: ConnectionPool<F>) -> Self {
        ConnectionManager { pool }
    }

    /// Claim a connection from the underlying pool, blocking until one is
    /// available.
    pub fn get_connection(&self) -> Result<PoolConnection<F::Connection>, Error> {
        self.pool.claim()
    }

    pub fn pool(&self) -> &ConnectionPool<F> {
        &self.pool
    }
}

impl<P, S> ConnectionManager<FailoverConnectionFactory<P, S>>
where
    P: ConnectionFactory,
    S: ConnectionFactory<Connection = P::Connection>,
{
    /// Create a manager that limits the number of concurrently open
    /// connections to `pool_size`. Connections are normally created with the
    /// `primary` factory; while the primary is down the `secondary` factory is
    /// used instead.
    pub fn with_pooling_and_failover(
        pool_size: u32,
        primary: P,
        secondary: S,
        log: Option<Logger>,
    ) -> Result<Self, Error> {
        let failover_opts = FailoverOptions {
            recovery_interval: None,
            log: log.clone(),
        };
        let failover =
            FailoverConnectionFactory::new(primary, secondary, failover_opts);

        let pool_opts = ConnectionPoolOptions {
            max_connections: Some(pool_size),
            claim_timeout: None,
            log,
        };
        let pool = ConnectionPool::new(pool_opts, failover)?;

        Ok(ConnectionManager::new(pool))
    }
}
