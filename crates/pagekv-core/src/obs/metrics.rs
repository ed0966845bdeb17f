use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

///
/// Counter
/// Saturating relaxed counter; values are diagnostic, not synchronizing.
///

#[derive(Debug, Default)]
pub(crate) struct Counter(AtomicU64);

impl Counter {
    pub(crate) fn add(&self, n: u64) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_add(n))
            });
    }

    pub(crate) fn max(&self, n: u64) {
        self.0.fetch_max(n, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

///
/// EventCounters
///

#[derive(Debug, Default)]
pub(crate) struct EventCounters {
    // Index maintenance
    pub(crate) index_adds: Counter,
    pub(crate) index_removes: Counter,
    pub(crate) index_skips: Counter,
    pub(crate) list_appends: Counter,
    pub(crate) list_removes: Counter,

    // Partial-failure compensation
    pub(crate) rollbacks: Counter,
    pub(crate) rollback_steps: Counter,
    pub(crate) rollback_failures: Counter,

    // Spin locks
    pub(crate) lock_acquired: Counter,
    pub(crate) lock_polls: Counter,
    pub(crate) lock_polls_max: Counter,
    pub(crate) lock_timeouts: Counter,
}

impl EventCounters {
    pub(crate) fn snapshot(&self) -> EventReport {
        EventReport {
            index_adds: self.index_adds.get(),
            index_removes: self.index_removes.get(),
            index_skips: self.index_skips.get(),
            list_appends: self.list_appends.get(),
            list_removes: self.list_removes.get(),
            rollbacks: self.rollbacks.get(),
            rollback_steps: self.rollback_steps.get(),
            rollback_failures: self.rollback_failures.get(),
            lock_acquired: self.lock_acquired.get(),
            lock_polls: self.lock_polls.get(),
            lock_polls_max: self.lock_polls_max.get(),
            lock_timeouts: self.lock_timeouts.get(),
        }
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.index_adds,
            &self.index_removes,
            &self.index_skips,
            &self.list_appends,
            &self.list_removes,
            &self.rollbacks,
            &self.rollback_steps,
            &self.rollback_failures,
            &self.lock_acquired,
            &self.lock_polls,
            &self.lock_polls_max,
            &self.lock_timeouts,
        ] {
            counter.reset();
        }
    }
}

///
/// EventReport
/// Serializable snapshot of [`EventCounters`].
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventReport {
    pub index_adds: u64,
    pub index_removes: u64,
    pub index_skips: u64,
    pub list_appends: u64,
    pub list_removes: u64,
    pub rollbacks: u64,
    pub rollback_steps: u64,
    pub rollback_failures: u64,
    pub lock_acquired: u64,
    pub lock_polls: u64,
    pub lock_polls_max: u64,
    pub lock_timeouts: u64,
}
