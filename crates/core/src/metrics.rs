//! Metrics definitions for the harvester.
//!
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "decode_errors_total",
        "Total number of decode errors while fetching blocks"
    );
    describe_counter!(
        "blocks_added_total",
        "Total number of blocks accumulated"
    );
    describe_counter!(
        "blocks_sequenced_total",
        "Total number of blocks sequenced"
    );
    describe_histogram!(
        "block_phase_duration_seconds",
        "Time taken by one accumulation or sequencing pass in seconds"
    );
    describe_counter!(
        "processor_errors_total",
        "Total number of processor failures"
    );
    describe_counter!(
        "accumulation_reverts_total",
        "Total number of accumulation reverts after a processor failure"
    );
    describe_counter!(
        "event_shape_mismatch_total",
        "Events skipped because their attributes did not match the expected shape"
    );
    describe_counter!(
        "candles_written_total",
        "Market history rows inserted, updated or gap-filled"
    );
    describe_counter!(
        "sequencer_busy_total",
        "Sequencer runs skipped because another run held the flag"
    );
}

/// Record a decode error.
///
/// # Arguments
/// * `kind` - What failed to decode ("event", "extrinsic", "log")
/// * `module` - The module name (if known)
pub fn record_decode_error(kind: &str, module: &str) {
    counter!("decode_errors_total", "type" => kind.to_string(), "module" => module.to_string())
        .increment(1);
}

/// Record an accumulated block.
pub fn record_block_added() {
    counter!("blocks_added_total").increment(1);
}

/// Record a sequenced block.
pub fn record_block_sequenced() {
    counter!("blocks_sequenced_total").increment(1);
}

/// Record a processor failure.
///
/// # Arguments
/// * `phase` - "accumulation" or "sequencing"
/// * `processor` - Processor name or event key
pub fn record_processor_error(phase: &'static str, processor: &str) {
    counter!("processor_errors_total", "phase" => phase, "processor" => processor.to_string())
        .increment(1);
}

/// Record an accumulation revert.
pub fn record_accumulation_revert() {
    counter!("accumulation_reverts_total").increment(1);
}

/// Record an event skipped by its shape check.
pub fn record_shape_mismatch(module: &str, event: &str) {
    counter!("event_shape_mismatch_total", "module" => module.to_string(), "event" => event.to_string())
        .increment(1);
}

/// Record a candle write.
///
/// # Arguments
/// * `interval` - "1m", "5m", "1h" or "1d"
/// * `kind` - "insert", "update" or "gap_fill"
pub fn record_candle_written(interval: &'static str, kind: &'static str) {
    counter!("candles_written_total", "interval" => interval, "kind" => kind).increment(1);
}

/// Record a sequencer run skipped by the single-flight guard.
pub fn record_sequencer_busy() {
    counter!("sequencer_busy_total").increment(1);
}

/// A timer that records the phase duration when dropped.
pub struct PhaseTimer {
    phase: &'static str,
    start: Instant,
}

impl PhaseTimer {
    /// Start a new timer for `phase` ("accumulation" or "sequencing").
    pub fn new(phase: &'static str) -> Self {
        Self {
            phase,
            start: Instant::now(),
        }
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        histogram!("block_phase_duration_seconds", "phase" => self.phase).record(duration);
    }
}
