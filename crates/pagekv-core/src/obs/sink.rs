//! Metrics sink boundary.
//!
//! Sinks are passed down explicitly (index and lock constructors take an
//! `Arc<dyn MetricsSink>`); there is no process-wide sink.
use crate::obs::metrics::{EventCounters, EventReport};

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    /// A page was indexed; `lists` counts Flat List appends performed.
    IndexAdd { lists: u64 },
    /// A page was removed from the index; `lists` counts Flat List removals.
    IndexRemove { lists: u64 },
    /// An add/remove was skipped (opt-out flag or idempotency guard).
    IndexSkip,
    /// A failed index update replayed its compensation log.
    Rollback { steps: u64, failed: u64 },
    /// A lock was acquired after `polls` poll intervals (0 = fast path).
    LockWait { polls: u64 },
    /// A lock acquisition gave up.
    LockTimeout,
}

///
/// MetricsSink
///

pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent);
}

///
/// NoopSink
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record(&self, _event: MetricsEvent) {}
}

///
/// CounterSink
/// In-memory counters; the default sink when the caller wants a report.
///

#[derive(Debug, Default)]
pub struct CounterSink {
    counters: EventCounters,
}

impl CounterSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of every counter.
    #[must_use]
    pub fn report(&self) -> EventReport {
        self.counters.snapshot()
    }

    /// Zero every counter (useful in tests).
    pub fn reset(&self) {
        self.counters.reset();
    }
}

impl MetricsSink for CounterSink {
    fn record(&self, event: MetricsEvent) {
        let c = &self.counters;

        match event {
            MetricsEvent::IndexAdd { lists } => {
                c.index_adds.add(1);
                c.list_appends.add(lists);
            }
            MetricsEvent::IndexRemove { lists } => {
                c.index_removes.add(1);
                c.list_removes.add(lists);
            }
            MetricsEvent::IndexSkip => c.index_skips.add(1),
            MetricsEvent::Rollback { steps, failed } => {
                c.rollbacks.add(1);
                c.rollback_steps.add(steps);
                c.rollback_failures.add(failed);
            }
            MetricsEvent::LockWait { polls } => {
                c.lock_acquired.add(1);
                c.lock_polls.add(polls);
                c.lock_polls_max.max(polls);
            }
            MetricsEvent::LockTimeout => c.lock_timeouts.add(1),
        }
    }
}
