// Copyright 2020 Joyent, Inc.

use std::io::Error as IOError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use slog::{info, o, Drain, Logger};

use failover_pool::connection::Connection;
use failover_pool::error::Error;
use failover_pool::manager::ConnectionManager;

#[derive(Debug)]
pub struct DummyConnection {
    source: &'static str,
    connected: bool,
}

impl DummyConnection {
    fn new(source: &'static str) -> Self {
        DummyConnection {
            source,
            connected: true,
        }
    }
}

impl Connection for DummyConnection {
    type Error = IOError;

    fn is_valid(&mut self, _timeout: Duration) -> Result<bool, IOError> {
        Ok(self.connected)
    }

    fn is_closed(&self) -> bool {
        !self.connected
    }

    fn close(&mut self) -> Result<(), IOError> {
        self.connected = false;
        Ok(())
    }
}

fn main() {
    let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
    let log = Logger::root(
        Mutex::new(slog_term::FullFormat::new(plain).build()).fuse(),
        o!("build-id" => "0.1.0"),
    );

    let primary_up = Arc::new(AtomicBool::new(false));
    let primary_flag = primary_up.clone();
    let primary = move || {
        if primary_flag.load(Ordering::SeqCst) {
            Ok(DummyConnection::new("primary"))
        } else {
            Err(Error::ConnectionCreateFailure(String::from(
                "primary unreachable",
            )))
        }
    };
    let secondary = || Ok(DummyConnection::new("secondary"));

    let manager = ConnectionManager::with_pooling_and_failover(
        3,
        primary,
        secondary,
        Some(log.clone()),
    )
    .unwrap();

    let barrier = Arc::new(Barrier::new(6));
    let threads: Vec<_> = (0..6)
        .map(|i| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            let log = log.clone();
            thread::spawn(move || {
                barrier.wait();
                let conn = manager.get_connection().unwrap();
                info!(log, "claimed connection";
                    "thread" => i,
                    "source" => conn.connection().unwrap().source);
                thread::sleep(Duration::from_millis(100));
            })
        })
        .collect();

    for t in threads {
        let _ = t.join();
    }

    primary_up.store(true, Ordering::SeqCst);
    let stats = manager.pool().get_stats();
    info!(log, "pool stats";
        "total" => %stats.total_connections,
        "idle" => %stats.idle_connections,
        "primary_healthy" => manager.pool().factory().is_primary_healthy());
}
