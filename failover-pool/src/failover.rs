// Copyright 2020 Joyent, Inc.

//! Primary/secondary failover for connection creation.
//!
//! A `FailoverConnectionFactory` creates connections from a primary factory
//! for as long as the primary works. The first time the primary fails, the
//! primary is marked unhealthy and every request from then on goes straight
//! to the secondary factory. Ordinary requests never touch the primary again
//! while it is unhealthy. Instead a background recovery check sleeps for the
//! recovery interval, creates a test connection from the primary, and asks
//! it whether it is valid:
//!
//! * A connection that reports itself valid means the primary has
//!   recovered. It is marked healthy and the check ends.
//! * A creation failure, a validation error, or a connection that reports
//!   itself invalid leaves the primary unhealthy and the check schedules
//!   its next run.
//!
//! Only the request that flips the primary from healthy to unhealthy starts
//! a check, so each unhealthy period has a single recovery check running.
//! Dropping the factory interrupts a sleeping check, which then ends without
//! rescheduling.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use slog::{debug, error, info, o, trace, warn, Drain, Logger};

use crate::connection::{Connection, VALIDITY_CHECK_TIMEOUT};
use crate::error::Error;
use crate::factory::ConnectionFactory;

// Recovery check interval in milliseconds
const DEFAULT_RECOVERY_INTERVAL: u64 = 60_000;

/// The configuration options for a `FailoverConnectionFactory`.
#[derive(Debug, Default)]
pub struct FailoverOptions {
    /// Optional delay in milliseconds before each check for primary
    /// recovery. If not specified the default is 60000 milliseconds.
    pub recovery_interval: Option<u64>,
    /// An optional `slog` logger instance. If none is provided then the logging
    /// will fall back to using the [`slog-stdlog`](https://docs.rs/slog-stdlog)
    /// drain.
    pub log: Option<Logger>,
}

/// A connection factory that falls back to a secondary factory while the
/// primary is unhealthy and switches back once the primary recovers.
pub struct FailoverConnectionFactory<P, S>
where
    P: ConnectionFactory,
    S: ConnectionFactory<Connection = P::Connection>,
{
    primary: Arc<Primary<P>>,
    secondary: S,
    log: Logger,
}

struct Primary<P>
where
    P: ConnectionFactory,
{
    factory: P,
    healthy: AtomicBool,
    // Incremented each time the primary is marked unhealthy. A recovery
    // check only runs for the period that started it.
    unhealthy_period: AtomicU64,
    recovery_interval: Duration,
    shutdown: ShutdownSignal,
    log: Logger,
}

// Lets a sleeping recovery check be woken and told to stop.
#[derive(Debug, Default)]
struct ShutdownSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl ShutdownSignal {
    /// Sleep for `interval` unless shutdown is requested first.
    fn sleep(&self, interval: Duration) -> Result<(), Error> {
        let stopped = self.stopped.lock().unwrap();
        let (stopped, _) = self
            .condvar
            .wait_timeout_while(stopped, interval, |stopped| !*stopped)
            .unwrap();
        if *stopped {
            Err(Error::RecoveryInterrupted)
        } else {
            Ok(())
        }
    }

    fn stop(&self) {
        *self.stopped.lock().unwrap() = true;
        self.condvar.notify_all();
    }
}

impl<P, S> FailoverConnectionFactory<P, S>
where
    P: ConnectionFactory,
    S: ConnectionFactory<Connection = P::Connection>,
{
    pub fn new(primary: P, secondary: S, opts: FailoverOptions) -> Self {
        let logger = opts
            .log
            .unwrap_or_else(|| Logger::root(slog_stdlog::StdLog.fuse(), o!()));
        let recovery_interval = Duration::from_millis(
            opts.recovery_interval.unwrap_or(DEFAULT_RECOVERY_INTERVAL),
        );

        let interval_ms = recovery_interval.as_millis() as u64;
        debug!(
            logger,
            "creating failover connection factory";
            "recovery_interval_ms" => interval_ms
        );

        FailoverConnectionFactory {
            primary: Arc::new(Primary {
                factory: primary,
                healthy: AtomicBool::new(true),
                unhealthy_period: AtomicU64::new(0),
                recovery_interval,
                shutdown: ShutdownSignal::default(),
                log: logger.new(o!("factory" => "primary")),
            }),
            secondary,
            log: logger,
        }
    }

    pub fn is_primary_healthy(&self) -> bool {
        self.primary.is_healthy()
    }

    /// Probe the primary once, right now, and mark it healthy if it hands out
    /// a valid connection. Returns whether the primary is healthy afterwards.
    /// This does not start or stop the background recovery check.
    pub fn attempt_primary_recovery(&self) -> bool {
        self.primary.attempt_recovery()
    }
}

impl<P> Primary<P>
where
    P: ConnectionFactory,
{
    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Flip the primary to unhealthy. Only the caller that performs the flip
    /// starts a recovery check.
    fn mark_unhealthy(primary: &Arc<Self>) {
        if primary
            .healthy
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let period =
                primary.unhealthy_period.fetch_add(1, Ordering::AcqRel) + 1;
            info!(primary.log, "primary marked unhealthy"; "period" => period);
            Primary::schedule_recovery(Arc::clone(primary), period);
        }
    }

    fn schedule_recovery(primary: Arc<Self>, period: u64) {
        let interval_ms = primary.recovery_interval.as_millis() as u64;
        trace!(
            primary.log,
            "scheduling recovery check";
            "period" => period,
            "interval_ms" => interval_ms
        );
        let fallback = Arc::clone(&primary);
        let spawned = thread::Builder::new()
            .name(String::from("primary-recovery"))
            .spawn(move || {
                if let Err(e) = primary.run_recovery_check(period) {
                    error!(primary.log, "recovery check stopped: {}", e);
                }
            });

        if let Err(e) = spawned {
            // No check will ever run for this period, so let ordinary
            // traffic probe the primary again.
            error!(fallback.log, "failed to start recovery check: {}", e);
            fallback.healthy.store(true, Ordering::Release);
        }
    }

    fn run_recovery_check(self: &Arc<Self>, period: u64) -> Result<(), Error> {
        self.shutdown.sleep(self.recovery_interval)?;

        if self.unhealthy_period.load(Ordering::Acquire) != period
            || self.is_healthy()
        {
            trace!(
                self.log,
                "recovery check no longer needed";
                "period" => period
            );
            return Ok(());
        }

        if !self.attempt_recovery() {
            Primary::schedule_recovery(Arc::clone(self), period);
        }
        Ok(())
    }

    fn attempt_recovery(&self) -> bool {
        match self.probe() {
            Ok(()) => {
                if !self.healthy.swap(true, Ordering::AcqRel) {
                    info!(self.log, "primary recovered");
                }
            }
            Err(e) => debug!(self.log, "primary still unhealthy: {}", e),
        }
        self.is_healthy()
    }

    // A connection that reports itself valid is proof of a healthy primary.
    fn probe(&self) -> Result<(), Error> {
        let mut conn = self.factory.create_connection()?;
        let valid = conn
            .is_valid(VALIDITY_CHECK_TIMEOUT)
            .map_err(|e| Error::ConnectionValidationFailure(e.to_string()));
        if let Err(e) = conn.close() {
            debug!(self.log, "failed to close test connection: {}", e);
        }

        if valid? {
            Ok(())
        } else {
            Err(Error::ConnectionValidationFailure(String::from(
                "test connection reported itself invalid",
            )))
        }
    }
}

impl<P, S> ConnectionFactory for FailoverConnectionFactory<P, S>
where
    P: ConnectionFactory,
    S: ConnectionFactory<Connection = P::Connection>,
{
    type Connection = P::Connection;

    fn create_connection(&self) -> Result<P::Connection, Error> {
        if self.primary.is_healthy() {
            match self.primary.factory.create_connection() {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    warn!(
                        self.log,
                        "primary failed to create a connection, using \
                         secondary: {}",
                        e
                    );
                    Primary::mark_unhealthy(&self.primary);
                }
            }
        }

        self.secondary.create_connection()
    }
}

impl<P, S> Drop for FailoverConnectionFactory<P, S>
where
    P: ConnectionFactory,
    S: ConnectionFactory<Connection = P::Connection>,
{
    fn drop(&mut self) {
        self.primary.shutdown.stop();
    }
}
