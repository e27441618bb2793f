// Copyright 2020 Joyent, Inc.

//! A `Connection` over a plain `TcpStream` and a direct factory that dials a
//! single `Backend`.

use std::io::{Error as IOError, ErrorKind};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use slog::{debug, o, Drain, Logger};

use failover_pool::backend::Backend;
use failover_pool::connection::Connection;
use failover_pool::error::Error;
use failover_pool::factory::ConnectionFactory;

#[derive(Debug)]
pub struct TcpStreamConnection {
    stream: Option<TcpStream>,
    backend: Backend,
}

impl TcpStreamConnection {
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// The underlying stream, or `None` once the connection is closed.
    pub fn stream(&self) -> Option<&TcpStream> {
        self.stream.as_ref()
    }

    /// Mutable access to the stream for reading and writing, or `None` once
    /// the connection is closed.
    pub fn stream_mut(&mut self) -> Option<&mut TcpStream> {
        self.stream.as_mut()
    }
}

impl Connection for TcpStreamConnection {
    type Error = IOError;

    // A peer that has shut down its side shows up as a zero byte peek. The
    // check never blocks, so the timeout is not needed.
    fn is_valid(&mut self, _timeout: Duration) -> Result<bool, Self::Error> {
        let stream = match &self.stream {
            Some(stream) => stream,
            None => return Ok(false),
        };

        if stream.take_error()?.is_some() {
            return Ok(false);
        }

        stream.set_nonblocking(true)?;
        let mut buf = [0u8; 1];
        let peeked = stream.peek(&mut buf);
        stream.set_nonblocking(false)?;

        match peeked {
            Ok(0) => Ok(false),
            Ok(_) => Ok(true),
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(true),
            Err(e) => Err(e),
        }
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        match self.stream.take() {
            Some(stream) => match stream.shutdown(Shutdown::Both) {
                Err(ref e) if e.kind() == ErrorKind::NotConnected => Ok(()),
                result => result,
            },
            None => Ok(()),
        }
    }
}

/// Dials one backend for every connection it creates.
#[derive(Debug)]
pub struct TcpConnectionFactory {
    backend: Backend,
    connect_timeout: Option<Duration>,
    log: Logger,
}

impl TcpConnectionFactory {
    pub fn new(
        backend: Backend,
        connect_timeout: Option<Duration>,
        log: Option<Logger>,
    ) -> Self {
        let logger = log
            .unwrap_or_else(|| Logger::root(slog_stdlog::StdLog.fuse(), o!()));
        TcpConnectionFactory {
            log: logger.new(o!("backend" => backend.name.clone())),
            backend,
            connect_timeout,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}

impl ConnectionFactory for TcpConnectionFactory {
    type Connection = TcpStreamConnection;

    fn create_connection(&self) -> Result<TcpStreamConnection, Error> {
        let addr = SocketAddr::from((self.backend.address, self.backend.port));
        let connected = match self.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };

        let stream = connected.map_err(|e| {
            debug!(self.log, "connect failed: {}", e);
            Error::ConnectionCreateFailure(format!("{}: {}", self.backend, e))
        })?;

        stream.set_nodelay(true)?;

        debug!(self.log, "connected");
        Ok(TcpStreamConnection {
            stream: Some(stream),
            backend: self.backend.clone(),
        })
    }
}
