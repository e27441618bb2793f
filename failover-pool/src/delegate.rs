// Copyright 2020 Joyent, Inc.

use std::time::Duration;

use crate::connection::Connection;
use crate::error::Error;

/// Whether closing a `DelegateConnection` also closes the connection it
/// wraps.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClosePolicy {
    /// `close` is forwarded to the wrapped connection.
    Propagate,
    /// `close` only marks the wrapper closed. Whoever owns the wrapped
    /// connection decides its fate.
    Retain,
}

/// A wrapper that forwards every operation to an inner connection until the
/// wrapper itself is closed. After that every operation fails with
/// `Error::ConnectionReleased` and nothing reaches the inner connection.
#[derive(Debug)]
pub struct DelegateConnection<C>
where
    C: Connection,
{
    delegate: C,
    close_policy: ClosePolicy,
    closed: bool,
}

impl<C> DelegateConnection<C>
where
    C: Connection,
{
    pub fn new(delegate: C, close_policy: ClosePolicy) -> Self {
        DelegateConnection {
            delegate,
            close_policy,
            closed: false,
        }
    }

    /// Whether this wrapper has been closed. This says nothing about the
    /// wrapped connection.
    pub fn is_released(&self) -> bool {
        self.closed
    }

    pub fn get(&self) -> Result<&C, Error> {
        self.ensure_open()?;
        Ok(&self.delegate)
    }

    pub fn get_mut(&mut self) -> Result<&mut C, Error> {
        self.ensure_open()?;
        Ok(&mut self.delegate)
    }

    pub fn is_valid(&mut self, timeout: Duration) -> Result<bool, Error> {
        self.ensure_open()?;
        self.delegate.is_valid(timeout).map_err(|e| {
            Error::ConnectionValidationFailure(e.to_string())
        })
    }

    pub fn is_closed(&self) -> Result<bool, Error> {
        self.ensure_open()?;
        Ok(self.delegate.is_closed())
    }

    /// Mark the wrapper closed and, under `ClosePolicy::Propagate`, close the
    /// wrapped connection. Closing an already closed wrapper does nothing.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.close_policy {
            ClosePolicy::Propagate => self
                .delegate
                .close()
                .map_err(|e| Error::ConnectionCloseFailure(e.to_string())),
            ClosePolicy::Retain => Ok(()),
        }
    }

    /// Give up the wrapper and hand back the wrapped connection.
    pub fn into_inner(self) -> C {
        self.delegate
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed {
            Err(Error::ConnectionReleased)
        } else {
            Ok(())
        }
    }
}
