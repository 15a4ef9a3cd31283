//! Correlation ids for agent runs.
//!
//! Assigns a unique `trace_id` to each agent run and a `span_id` to each
//! turn within it, so interleaved log lines from concurrent runs can be told
//! apart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Generate a unique trace ID for an agent run.
pub fn generate_trace_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    // Use a counter to handle sub-nanosecond calls.
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("tr-{ts:x}-{count:04x}")
}

/// Generate a span ID for a turn within a run.
pub fn generate_span_id(trace_id: &str, turn: u32) -> String {
    format!("{trace_id}:t{turn}")
}
