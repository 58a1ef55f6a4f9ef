//! Reconciliation engine.
//!
//! One cycle compares a queue snapshot with the store and converges the
//! store to "one record per item currently in the queue":
//!
//! 1. every snapshot item not yet tracked is rendered, sent, and recorded;
//! 2. every tracked id missing from the snapshot has its message deleted
//!    and its record removed.
//!
//! A failed channel call never mutates the store, so the same action is
//! attempted again on the next cycle. The window between a successful
//! channel call and the store write is not covered: a crash there yields
//! one duplicate notification (or one repeated delete) on restart.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::channel::NotificationChannel;
use crate::error::Result;
use crate::format::{EmbedFormatter, Formatter};
use crate::source::{ItemDescriptor, QueueSource};
use crate::store::Store;

// ---------------------------------------------------------------------------
// CycleReport
// ---------------------------------------------------------------------------

/// A channel call that failed during a cycle; the id stays as it was.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelFailure {
    pub item_id: String,
    pub error: String,
}

/// Outcome of one reconciliation cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    /// Items delivered and recorded this cycle, in snapshot order.
    pub notified: Vec<String>,
    /// Items already tracked and still queued.
    pub unchanged: Vec<String>,
    /// Stale items whose message was deleted and record removed, sorted.
    pub retracted: Vec<String>,
    /// Ids skipped because the channel was rate limited; handled next cycle.
    pub deferred: Vec<String>,
    pub delivery_failures: Vec<ChannelFailure>,
    pub retraction_failures: Vec<ChannelFailure>,
}

impl CycleReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            notified: Vec::new(),
            unchanged: Vec::new(),
            retracted: Vec::new(),
            deferred: Vec::new(),
            delivery_failures: Vec::new(),
            retraction_failures: Vec::new(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.delivery_failures.is_empty() || !self.retraction_failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler<St, Ch, F = EmbedFormatter> {
    store: St,
    channel: Ch,
    formatter: F,
}

impl<St: Store, Ch: NotificationChannel> Reconciler<St, Ch, EmbedFormatter> {
    pub fn new(store: St, channel: Ch) -> Self {
        Self::with_formatter(store, channel, EmbedFormatter)
    }
}

impl<St: Store, Ch: NotificationChannel, F: Formatter> Reconciler<St, Ch, F> {
    pub fn with_formatter(store: St, channel: Ch, formatter: F) -> Self {
        Self {
            store,
            channel,
            formatter,
        }
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    /// Release the store, closing it when dropped by the caller.
    pub fn into_store(self) -> St {
        self.store
    }

    /// Fetch a snapshot from `source` and reconcile it.
    ///
    /// A source failure is returned before anything is touched.
    pub fn run_cycle<Q: QueueSource + ?Sized>(&mut self, source: &mut Q) -> Result<CycleReport> {
        let snapshot = source.list_queue_items()?;
        self.reconcile(&snapshot)
    }

    /// Apply one snapshot: notify new items, then retract stale ones.
    ///
    /// Channel errors are recorded in the report and the cycle moves on to
    /// the next id. After a rate-limit response no further channel calls are
    /// made; the remaining ids are deferred to the next cycle. Store errors
    /// abort the cycle.
    pub fn reconcile(&mut self, snapshot: &[ItemDescriptor]) -> Result<CycleReport> {
        let mut pass = Pass::default();
        let current_ids: BTreeSet<&str> = snapshot.iter().map(|i| i.item_id.as_str()).collect();

        for item in snapshot {
            self.notify(item, &mut pass)?;
        }

        let stale_ids: Vec<String> = self
            .store
            .all_tracked_ids()?
            .into_iter()
            .filter(|id| !current_ids.contains(id.as_str()))
            .collect();

        for item_id in stale_ids {
            self.retract(item_id, &mut pass)?;
        }

        let report = pass.report;
        info!(
            queued = snapshot.len(),
            notified = report.notified.len(),
            retracted = report.retracted.len(),
            deferred = report.deferred.len(),
            failures = report.delivery_failures.len() + report.retraction_failures.len(),
            "reconciliation cycle complete"
        );
        Ok(report)
    }

    fn notify<'s>(&mut self, item: &'s ItemDescriptor, pass: &mut Pass<'s>) -> Result<()> {
        if !pass.attempted.insert(item.item_id.as_str()) {
            debug!(item_id = %item.item_id, "duplicate id in snapshot");
            return Ok(());
        }
        if self.store.exists(&item.item_id)? {
            debug!(item_id = %item.item_id, "already notified");
            pass.report.unchanged.push(item.item_id.clone());
            return Ok(());
        }
        if pass.rate_limited {
            pass.report.deferred.push(item.item_id.clone());
            return Ok(());
        }

        let payload = self.formatter.render(item);
        match self.channel.send(&payload) {
            Ok(handle) => {
                self.store.record(&item.item_id, &handle)?;
                info!(item_id = %item.item_id, handle = %handle, "notified");
                pass.report.notified.push(item.item_id.clone());
            }
            Err(e) => {
                warn!(item_id = %item.item_id, error = %e, "delivery failed, will retry next cycle");
                pass.rate_limited |= e.is_rate_limit();
                pass.report.delivery_failures.push(ChannelFailure {
                    item_id: item.item_id.clone(),
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    }

    fn retract(&mut self, item_id: String, pass: &mut Pass<'_>) -> Result<()> {
        if pass.rate_limited {
            pass.report.deferred.push(item_id);
            return Ok(());
        }
        let handle = self.store.handle_of(&item_id)?;
        match self.channel.delete(&handle) {
            Ok(()) => {
                self.store.remove(&item_id)?;
                info!(item_id = %item_id, handle = %handle, "retracted");
                pass.report.retracted.push(item_id);
            }
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "retraction failed, will retry next cycle");
                pass.rate_limited |= e.is_rate_limit();
                pass.report.retraction_failures.push(ChannelFailure {
                    item_id,
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Working state of one `reconcile` call.
struct Pass<'s> {
    report: CycleReport,
    /// Snapshot ids already handled this cycle.
    attempted: BTreeSet<&'s str>,
    /// Set once the channel answers with a rate limit.
    rate_limited: bool,
}

impl Default for Pass<'_> {
    fn default() -> Self {
        Self {
            report: CycleReport::new(),
            attempted: BTreeSet::new(),
            rate_limited: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
