//! Observability: metrics events and the sink boundary.
//!
//! Core logic never touches counters directly. Every instrumented path
//! emits a [`MetricsEvent`] into the [`MetricsSink`] it was handed.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::EventReport;
pub use sink::{CounterSink, MetricsEvent, MetricsSink, NoopSink};
