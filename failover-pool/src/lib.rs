// Copyright 2020 Joyent, Inc.

//! A bounded connection pool with transparent primary/secondary failover
//!
//! `failover-pool` limits the number of concurrently open connections to a
//! backend service, reuses healthy connections, and hides the loss of a
//! primary backend from its callers by creating new connections from a
//! secondary backend until the primary comes back.
//!
//! The library is built from three pieces:
//!
//! * [`ConnectionFactory`](factory/trait.ConnectionFactory.html)
//!   implementations produce new connections. A direct factory dials a single
//!   backend. A [`FailoverConnectionFactory`](failover/struct.FailoverConnectionFactory.html)
//!   wraps a primary and a secondary factory.
//! * The [`ConnectionPool`](connection_pool/struct.ConnectionPool.html) owns
//!   the connections, creating them lazily up to its maximum size.
//! * A [`PoolConnection`](connection_pool/struct.PoolConnection.html) is what
//!   callers get from the pool. Releasing it, or letting it fall out of scope,
//!   hands the connection back to the pool.
//!
//! ## Connection lifecycle
//!
//! The pool starts empty. A caller that finds no idle connection creates one,
//! as long as the pool is below its maximum size. Once the pool is full,
//! callers wait in line and are served in the order they arrived.
//!
//! When a connection is released the pool checks it. A connection that is
//! still open and reports itself valid goes back into the idle queue. A
//! connection that was closed or invalidated by the backend is closed,
//! dropped, and replaced by a fresh one if the factory can produce it.
//!
//! ## Failover
//!
//! The first failure of the primary factory marks the primary unhealthy. From
//! then on new connections come from the secondary factory without the
//! primary being asked, and a background check polls the primary every
//! recovery interval (60 seconds by default). As soon as the primary hands
//! out a connection that reports itself valid, new connections come from the
//! primary again. Connections already in the pool are not affected by either
//! switch.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::thread;
//! use std::sync::Mutex;
//!
//! use slog::{Drain, Logger, o};
//!
//! use failover_pool::manager::ConnectionManager;
//!
//! let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
//! let log = Logger::root(
//!     Mutex::new(slog_term::FullFormat::new(plain).build()).fuse(),
//!     o!("build-id" => "0.1.0"),
//! );
//!
//! let manager = ConnectionManager::with_pooling_and_failover(
//!     10,
//!     primary_factory,
//!     secondary_factory,
//!     Some(log),
//! )?;
//!
//! for _ in 0..10 {
//!     let manager = manager.clone();
//!     thread::spawn(move || {
//!         let conn = manager.get_connection()?;
//!         // Do stuff here
//!         // The connection is returned to the pool when it falls out of scope.
//!     });
//! }
//! ```

#![allow(missing_docs)]

pub mod backend;
pub mod connection;
pub mod connection_pool;
pub mod delegate;
pub mod error;
pub mod factory;
pub mod failover;
pub mod manager;

#[cfg(test)]
mod test_support;
