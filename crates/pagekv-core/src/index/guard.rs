use crate::{
    error::InternalError,
    obs::{MetricsEvent, MetricsSink},
};
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};
use tracing::warn;

type Compensation = Box<dyn FnOnce() -> Result<(), InternalError> + Send>;

///
/// IndexWriteGuard
///
/// Compensation log for one multi-step index update.
///
/// Every completed step records its inverse. If the guard is dropped
/// without [`finish`](Self::finish) (an error returned early), the
/// inverses run newest-first.
///
/// - Best-effort and in-process only; nothing is persisted, so a crash
///   mid-update still leaves the index partially written.
/// - A failing inverse is logged and counted, then skipped.
///

pub(crate) struct IndexWriteGuard {
    op: &'static str,
    shasum: String,
    finished: bool,
    compensations: Vec<Compensation>,
    sink: Arc<dyn MetricsSink>,
}

impl IndexWriteGuard {
    pub(crate) fn new(op: &'static str, shasum: &str, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            op,
            shasum: shasum.to_string(),
            finished: false,
            compensations: Vec::new(),
            sink,
        }
    }

    pub(crate) fn record(
        &mut self,
        undo: impl FnOnce() -> Result<(), InternalError> + Send + 'static,
    ) {
        self.compensations.push(Box::new(undo));
    }

    /// Completed steps so far.
    pub(crate) fn steps(&self) -> u64 {
        self.compensations.len() as u64
    }

    /// Commit: forget the log.
    pub(crate) fn finish(mut self) {
        self.finished = true;
        self.compensations.clear();
    }

    fn compensate(&mut self) {
        let steps = self.steps();
        if steps == 0 {
            return;
        }
        let mut failed = 0u64;

        while let Some(undo) = self.compensations.pop() {
            let outcome = catch_unwind(AssertUnwindSafe(undo));

            let err = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(_) => "compensation panicked".to_string(),
            };

            failed += 1;
            warn!(
                target: "pagekv::index",
                op = self.op,
                shasum = %self.shasum,
                error = %err,
                "index rollback step failed"
            );
        }

        self.sink.record(MetricsEvent::Rollback { steps, failed });
    }
}

impl Drop for IndexWriteGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.compensate();
        }
    }
}
