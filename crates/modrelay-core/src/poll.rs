//! Fixed-interval driver for the reconciliation engine.
//!
//! The loop has a single state: run one cycle, wait `interval`, repeat. The
//! wait ends early when a shutdown is requested; a cycle already running is
//! always allowed to finish, since the store reflects each completed step.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use crate::channel::NotificationChannel;
use crate::config::ErrorPolicy;
use crate::error::Result;
use crate::format::Formatter;
use crate::reconcile::Reconciler;
use crate::source::QueueSource;
use crate::store::Store;

// ---------------------------------------------------------------------------
// Shutdown signalling
// ---------------------------------------------------------------------------

/// Sending half: request the loop to stop.
#[derive(Clone)]
pub struct ShutdownHandle(Sender<()>);

impl ShutdownHandle {
    pub fn trigger(&self) {
        // The loop may already be gone; nothing left to stop then.
        let _ = self.0.send(());
    }
}

/// Receiving half, owned by the loop.
pub struct Shutdown(Receiver<()>);

impl Shutdown {
    /// Sleep for up to `timeout`. Returns `true` if shutdown was requested
    /// (or every handle was dropped) during the wait.
    fn wait(&self, timeout: Duration) -> bool {
        match self.0.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    fn requested(&self) -> bool {
        self.wait(Duration::ZERO)
    }
}

pub fn shutdown_channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = mpsc::channel();
    (ShutdownHandle(tx), Shutdown(rx))
}

// ---------------------------------------------------------------------------
// PollLoop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub cycles: u64,
    pub failed_cycles: u64,
}

pub struct PollLoop {
    interval: Duration,
    policy: ErrorPolicy,
}

impl PollLoop {
    pub fn new(interval: Duration, policy: ErrorPolicy) -> Self {
        Self { interval, policy }
    }

    /// Drive `engine` against `source` until `shutdown` fires.
    ///
    /// Non-transient errors always end the loop; transient ones end it only
    /// under [`ErrorPolicy::Exit`].
    pub fn run<St, Ch, F, Q>(
        &self,
        engine: &mut Reconciler<St, Ch, F>,
        source: &mut Q,
        shutdown: &Shutdown,
    ) -> Result<PollSummary>
    where
        St: Store,
        Ch: NotificationChannel,
        F: Formatter,
        Q: QueueSource + ?Sized,
    {
        let mut summary = PollSummary::default();
        info!(interval_secs = self.interval.as_secs(), "polling started");

        loop {
            if shutdown.requested() {
                break;
            }
            summary.cycles += 1;
            if let Err(e) = engine.run_cycle(source) {
                summary.failed_cycles += 1;
                if !e.is_transient() || self.policy == ErrorPolicy::Exit {
                    error!(error = %e, cycle = summary.cycles, "cycle failed, stopping");
                    return Err(e);
                }
                error!(error = %e, cycle = summary.cycles, "cycle failed, retrying next interval");
            }
            if shutdown.wait(self.interval) {
                break;
            }
        }

        info!(
            cycles = summary.cycles,
            failed = summary.failed_cycles,
            "polling stopped"
        );
        Ok(summary)
    }
}
