// Copyright 2020 Joyent, Inc.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// A connection factory could not produce a connection.
    ConnectionCreateFailure(String),
    /// A connection failed its liveness check.
    ConnectionValidationFailure(String),
    /// Closing a connection's backend session failed.
    ConnectionCloseFailure(String),
    /// An operation was attempted on a pool connection that was already
    /// released back to the pool.
    ConnectionReleased,
    /// The configured claim timeout elapsed before a connection became idle.
    ClaimTimeout,
    /// The pool was configured with a maximum size of zero.
    InvalidPoolSize,
    /// A sleeping recovery check was interrupted by factory shutdown.
    RecoveryInterrupted,
    IOError(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IOError(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ConnectionCreateFailure(err_str) => {
                write!(fmt, "failed to create connection: {}", err_str)
            }
            Error::ConnectionValidationFailure(err_str) => {
                write!(fmt, "connection failed validation: {}", err_str)
            }
            Error::ConnectionCloseFailure(err_str) => {
                write!(fmt, "failed to close connection: {}", err_str)
            }
            Error::ConnectionReleased => {
                String::from("connection has been released").fmt(fmt)
            }
            Error::ClaimTimeout => {
                String::from("timed out waiting for a connection").fmt(fmt)
            }
            Error::InvalidPoolSize => {
                String::from("maximum pool size must be positive").fmt(fmt)
            }
            Error::RecoveryInterrupted => {
                String::from("recovery check was interrupted").fmt(fmt)
            }
            Error::IOError(io_err) => io_err.fmt(fmt),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::IOError(io_err) => Some(io_err),
            _ => None,
        }
    }
}
