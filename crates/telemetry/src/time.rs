// Path: crates/telemetry/src/time.rs
use crate::sinks::ConsensusMetricsSink;
use std::time::Instant;

/// Reports the lifetime of the guard as one event-processing latency sample.
pub struct Timer<'a> {
    sink: &'a dyn ConsensusMetricsSink,
    start: Instant,
}

impl<'a> Timer<'a> {
    pub fn new(sink: &'a dyn ConsensusMetricsSink) -> Self {
        Self {
            sink,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        self.sink
            .observe_process_duration(self.start.elapsed().as_secs_f64());
    }
}
