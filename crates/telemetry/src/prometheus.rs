// Path: crates/telemetry/src/prometheus.rs

//! A concrete implementation of the metrics sinks using the Prometheus crate.
// `get_metric!` fails loudly when `install()` was skipped: that is a startup bug.
#![allow(clippy::expect_used)]

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

// --- Metric Statics ---
// Collectors are initialized exactly once by `install`.

static STORAGE_BYTES_WRITTEN_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static STORAGE_BATCHES_COMMITTED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static STORAGE_EPOCHS_DROPPED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static CONSENSUS_EVENTS_PROCESSED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static CONSENSUS_ROOTS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static CONSENSUS_BLOCKS_SEALED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static CONSENSUS_EPOCHS_SEALED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static CONSENSUS_EQUIVOCATIONS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static CONSENSUS_LAST_DECIDED_FRAME: OnceCell<IntGauge> = OnceCell::new();
static CONSENSUS_PROCESS_DURATION_SECONDS: OnceCell<Histogram> = OnceCell::new();
static ERRORS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

/// Fetches a collector from its `OnceCell`.
macro_rules! get_metric {
    ($metric:ident) => {
        $metric
            .get()
            .expect("Prometheus sink not initialized. Call telemetry::prometheus::install() first.")
    };
}

impl StorageMetricsSink for PrometheusSink {
    fn inc_bytes_written_total(&self, bytes: u64) {
        get_metric!(STORAGE_BYTES_WRITTEN_TOTAL).inc_by(bytes);
    }
    fn inc_batches_committed(&self) {
        get_metric!(STORAGE_BATCHES_COMMITTED_TOTAL).inc();
    }
    fn inc_epochs_dropped(&self) {
        get_metric!(STORAGE_EPOCHS_DROPPED_TOTAL).inc();
    }
}

impl ConsensusMetricsSink for PrometheusSink {
    fn inc_events_processed(&self) {
        get_metric!(CONSENSUS_EVENTS_PROCESSED_TOTAL).inc();
    }
    fn inc_roots(&self) {
        get_metric!(CONSENSUS_ROOTS_TOTAL).inc();
    }
    fn inc_blocks_sealed(&self) {
        get_metric!(CONSENSUS_BLOCKS_SEALED_TOTAL).inc();
    }
    fn inc_epochs_sealed(&self) {
        get_metric!(CONSENSUS_EPOCHS_SEALED_TOTAL).inc();
    }
    fn inc_equivocations(&self) {
        get_metric!(CONSENSUS_EQUIVOCATIONS_TOTAL).inc();
    }
    fn set_last_decided_frame(&self, frame: u64) {
        get_metric!(CONSENSUS_LAST_DECIDED_FRAME).set(i64::try_from(frame).unwrap_or(i64::MAX));
    }
    fn observe_process_duration(&self, duration_secs: f64) {
        get_metric!(CONSENSUS_PROCESS_DURATION_SECONDS).observe(duration_secs);
    }
}

impl ErrorMetricsSink for PrometheusSink {
    fn inc_error(&self, kind: &'static str, variant: &'static str) {
        get_metric!(ERRORS_TOTAL)
            .with_label_values(&[kind, variant])
            .inc();
    }
}

/// Initializes all Prometheus collectors in the default registry and returns
/// the sink. Must be called only once at startup.
pub fn install() -> Result<&'static dyn MetricsSink, prometheus::Error> {
    STORAGE_BYTES_WRITTEN_TOTAL
        .set(register_int_counter!(
            "lachesis_storage_bytes_written_total",
            "Total key and value bytes written to the store."
        )?)
        .expect("static already initialized");
    STORAGE_BATCHES_COMMITTED_TOTAL
        .set(register_int_counter!(
            "lachesis_storage_batches_committed_total",
            "Total atomic write batches committed."
        )?)
        .expect("static already initialized");
    STORAGE_EPOCHS_DROPPED_TOTAL
        .set(register_int_counter!(
            "lachesis_storage_epochs_dropped_total",
            "Total sealed epochs whose per-event records were dropped."
        )?)
        .expect("static already initialized");
    CONSENSUS_EVENTS_PROCESSED_TOTAL
        .set(register_int_counter!(
            "lachesis_consensus_events_processed_total",
            "Total events ingested."
        )?)
        .expect("static already initialized");
    CONSENSUS_ROOTS_TOTAL
        .set(register_int_counter!(
            "lachesis_consensus_roots_total",
            "Total events that became roots."
        )?)
        .expect("static already initialized");
    CONSENSUS_BLOCKS_SEALED_TOTAL
        .set(register_int_counter!(
            "lachesis_consensus_blocks_sealed_total",
            "Total blocks sealed and delivered."
        )?)
        .expect("static already initialized");
    CONSENSUS_EPOCHS_SEALED_TOTAL
        .set(register_int_counter!(
            "lachesis_consensus_epochs_sealed_total",
            "Total epochs sealed."
        )?)
        .expect("static already initialized");
    CONSENSUS_EQUIVOCATIONS_TOTAL
        .set(register_int_counter!(
            "lachesis_consensus_equivocations_total",
            "Total forks observed."
        )?)
        .expect("static already initialized");
    CONSENSUS_LAST_DECIDED_FRAME
        .set(register_int_gauge!(
            "lachesis_consensus_last_decided_frame",
            "Last decided frame of the current epoch."
        )?)
        .expect("static already initialized");
    CONSENSUS_PROCESS_DURATION_SECONDS
        .set(register_histogram!(
            "lachesis_consensus_process_duration_seconds",
            "Latency of a single event ingestion.",
            exponential_buckets(0.00001, 2.0, 20)?
        )?)
        .expect("static already initialized");
    ERRORS_TOTAL
        .set(register_int_counter_vec!(
            "lachesis_errors_total",
            "Total number of errors, categorized by kind and variant.",
            &["kind", "variant"]
        )?)
        .expect("static already initialized");

    static SINK: PrometheusSink = PrometheusSink;
    Ok(&SINK)
}

/// Renders the default registry in the Prometheus text exposition format.
pub fn render() -> Result<String, prometheus::Error> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
