// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for hashmodel.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application chooses the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `hashmodel_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `operation`: create, drop, check
//! - `status`: success, error, empty

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

/// Record an executed search
pub fn record_search_query(status: &str) {
    counter!(
        "hashmodel_search_queries_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record search latency
pub fn record_search_latency(duration: Duration) {
    histogram!("hashmodel_search_seconds").record(duration.as_secs_f64());
}

/// Record the number of ids returned by one search
pub fn record_search_results(count: usize) {
    histogram!("hashmodel_search_results").record(count as f64);
}

/// Record an index lifecycle operation
pub fn record_index_operation(operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(
        "hashmodel_index_operations_total",
        "operation" => operation.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a predicate that failed to compile
pub fn record_compile_error() {
    counter!("hashmodel_compile_errors_total").increment(1);
}

/// Records search latency on drop
pub struct SearchTimer {
    start: Instant,
}

impl SearchTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }
}

impl Drop for SearchTimer {
    fn drop(&mut self) {
        record_search_latency(self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // No recorder is installed; these check the calls don't panic.

    #[test]
    fn test_search_metrics() {
        record_search_query("success");
        record_search_query("error");
        record_search_results(25);
        record_search_latency(Duration::from_millis(3));
    }

    #[test]
    fn test_index_metrics() {
        record_index_operation("create", true);
        record_index_operation("drop", false);
        record_compile_error();
    }

    #[test]
    fn test_search_timer() {
        let _timer = SearchTimer::start();
    }
}
