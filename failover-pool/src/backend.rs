// Copyright 2020 Joyent, Inc.

use std::fmt;
use std::net::IpAddr;

/// The port number for a backend. This is a type alias for u16.
pub type BackendPort = u16;
/// The concatenation of the backend address and port with a colon
/// delimiter. This is a type alias for String.
pub type BackendName = String;
/// The IP address of the backend. This is a type alias for std::net::IpAddr.
pub type BackendAddress = IpAddr;

/// A single dialable backend, such as the primary or the secondary of a
/// failover pair.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Backend {
    /// The concatenation of the backend address and port with a colon delimiter.
    pub name: BackendName,
    /// The address of the backend.
    pub address: BackendAddress,
    /// The port of the backend.
    pub port: BackendPort,
}

impl Backend {
    /// Return a new instance of `Backend` given a `BackendAddress` and `BackendPort`.
    pub fn new(address: &BackendAddress, port: BackendPort) -> Self {
        Backend {
            name: backend_name(address, port),
            address: *address,
            port,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.name.fmt(fmt)
    }
}

// Concatentate the backend address and port with a colon delimiter.
fn backend_name(address: &BackendAddress, port: BackendPort) -> BackendName {
    let address_str = format!("{}", address);
    [address_str, String::from(":"), port.to_string()].concat()
}
