// Copyright 2020 Joyent, Inc.

//! Hand-rolled connection and factory doubles shared by the unit tests.

use std::io::{Error as IOError, ErrorKind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::connection::Connection;
use crate::error::Error;
use crate::factory::ConnectionFactory;

#[derive(Debug, Default)]
struct MockState {
    invalid: AtomicBool,
    closed: AtomicBool,
    validity_checks: AtomicUsize,
    close_calls: AtomicUsize,
}

/// A connection whose liveness is flipped from the outside. Clones share
/// state, so a test can keep a handle to a connection the pool owns.
#[derive(Clone, Debug)]
pub struct MockConnection {
    id: usize,
    state: Arc<MockState>,
}

impl MockConnection {
    pub fn new(id: usize) -> Self {
        MockConnection {
            id,
            state: Arc::new(MockState::default()),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn set_valid(&self, valid: bool) {
        self.state.invalid.store(!valid, Ordering::SeqCst);
    }

    pub fn set_closed(&self, closed: bool) {
        self.state.closed.store(closed, Ordering::SeqCst);
    }

    pub fn validity_checks(&self) -> usize {
        self.state.validity_checks.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.state.close_calls.load(Ordering::SeqCst)
    }
}

impl Connection for MockConnection {
    type Error = IOError;

    fn is_valid(&mut self, _timeout: Duration) -> Result<bool, IOError> {
        self.state.validity_checks.fetch_add(1, Ordering::SeqCst);
        Ok(!self.state.invalid.load(Ordering::SeqCst))
    }

    fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    fn close(&mut self) -> Result<(), IOError> {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.closed.swap(true, Ordering::SeqCst) {
            return Err(IOError::new(ErrorKind::NotConnected, "already closed"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct FactoryState {
    calls: AtomicUsize,
    failure: Mutex<Option<String>>,
    created_invalid: AtomicBool,
    created: Mutex<Vec<MockConnection>>,
}

/// A factory that hands out `MockConnection`s numbered from `id_base`, or
/// fails with a configured message. Clones share state.
#[derive(Clone, Debug)]
pub struct MockFactory {
    id_base: usize,
    state: Arc<FactoryState>,
}

impl MockFactory {
    pub fn new(id_base: usize) -> Self {
        MockFactory {
            id_base,
            state: Arc::new(FactoryState::default()),
        }
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn break_with(&self, msg: &str) {
        *self.state.failure.lock().unwrap() = Some(String::from(msg));
    }

    pub fn repair(&self) {
        *self.state.failure.lock().unwrap() = None;
    }

    /// Connections created from now on report themselves invalid.
    pub fn create_invalid(&self, invalid: bool) {
        self.state.created_invalid.store(invalid, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<MockConnection> {
        self.state.created.lock().unwrap().clone()
    }
}

impl ConnectionFactory for MockFactory {
    type Connection = MockConnection;

    fn create_connection(&self) -> Result<MockConnection, Error> {
        let n = self.state.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.state.failure.lock().unwrap().as_ref() {
            return Err(Error::ConnectionCreateFailure(msg.clone()));
        }
        let conn = MockConnection::new(self.id_base + n + 1);
        conn.set_valid(!self.state.created_invalid.load(Ordering::SeqCst));
        self.state.created.lock().unwrap().push(conn.clone());
        Ok(conn)
    }
}
