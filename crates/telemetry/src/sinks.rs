// Path: crates/telemetry/src/sinks.rs

//! Abstract traits for metrics reporting, decoupling the engine from the backend.

use once_cell::sync::OnceCell;

// --- Static Sink Access ---

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// The global `MetricsSink`, set once by the binary.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// The configured consensus metrics sink, or a no-op sink.
pub fn consensus_metrics() -> &'static dyn ConsensusMetricsSink {
    match SINK.get() {
        Some(sink) => sink.as_consensus(),
        None => &NOP_SINK,
    }
}

/// The configured error metrics sink, or a no-op sink.
pub fn error_metrics() -> &'static dyn ErrorMetricsSink {
    match SINK.get() {
        Some(sink) => sink.as_errors(),
        None => &NOP_SINK,
    }
}

// --- Trait Definitions ---

/// Metrics of the key-value backends.
pub trait StorageMetricsSink: Send + Sync + std::fmt::Debug {
    /// Adds to the total bytes of keys and values written.
    fn inc_bytes_written_total(&self, bytes: u64);
    /// Counts one committed write batch.
    fn inc_batches_committed(&self);
    /// Counts one sealed epoch whose records were dropped.
    fn inc_epochs_dropped(&self);
}
impl StorageMetricsSink for NopSink {
    fn inc_bytes_written_total(&self, _bytes: u64) {}
    fn inc_batches_committed(&self) {}
    fn inc_epochs_dropped(&self) {}
}

/// Metrics of the ordering engine.
pub trait ConsensusMetricsSink: Send + Sync + std::fmt::Debug {
    /// Counts one ingested event.
    fn inc_events_processed(&self);
    /// Counts one event that became a root.
    fn inc_roots(&self);
    /// Counts one sealed block.
    fn inc_blocks_sealed(&self);
    /// Counts one sealed epoch.
    fn inc_epochs_sealed(&self);
    /// Counts one observed fork.
    fn inc_equivocations(&self);
    /// Sets the last decided frame of the current epoch.
    fn set_last_decided_frame(&self, frame: u64);
    /// Observes the latency of a single `process` call.
    fn observe_process_duration(&self, duration_secs: f64);
}
impl ConsensusMetricsSink for NopSink {
    fn inc_events_processed(&self) {}
    fn inc_roots(&self) {}
    fn inc_blocks_sealed(&self) {}
    fn inc_epochs_sealed(&self) {}
    fn inc_equivocations(&self) {}
    fn set_last_decided_frame(&self, _frame: u64) {}
    fn observe_process_duration(&self, _duration_secs: f64) {}
}

/// A sink for recording structured error metrics.
pub trait ErrorMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter for a specific error, categorized by its kind and variant.
    fn inc_error(&self, kind: &'static str, variant: &'static str);
}
impl ErrorMetricsSink for NopSink {
    fn inc_error(&self, _kind: &'static str, _variant: &'static str) {}
}

/// A unified sink implementing every domain trait, so a backend like Prometheus
/// has a single point of implementation.
pub trait MetricsSink: StorageMetricsSink + ConsensusMetricsSink + ErrorMetricsSink {
    /// This sink as a storage sink.
    fn as_storage(&self) -> &dyn StorageMetricsSink;
    /// This sink as a consensus sink.
    fn as_consensus(&self) -> &dyn ConsensusMetricsSink;
    /// This sink as an error sink.
    fn as_errors(&self) -> &dyn ErrorMetricsSink;
}

// Blanket implementation so any type implementing all sub-traits is a `MetricsSink`.
impl<T> MetricsSink for T
where
    T: StorageMetricsSink + ConsensusMetricsSink + ErrorMetricsSink,
{
    fn as_storage(&self) -> &dyn StorageMetricsSink {
        self
    }
    fn as_consensus(&self) -> &dyn ConsensusMetricsSink {
        self
    }
    fn as_errors(&self) -> &dyn ErrorMetricsSink {
        self
    }
}
