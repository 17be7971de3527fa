// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Run profiling metrics.
//!
//! [`RunMetrics`] collects per-path and aggregate timing and memory data
//! for one `Backend::run`.

use std::time::Duration;

/// Metrics for a single path's execution.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PathMetrics {
    /// Path id.
    pub path: u32,
    /// Number of calls executed, `Delete` included.
    pub calls: usize,
    /// Wall-clock time of the path task.
    pub duration: Duration,
    /// Highest pool usage observed after any call of this path, in bytes.
    pub peak_memory_bytes: usize,
}

/// Aggregate metrics for a complete run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RunMetrics {
    /// Total wall-clock time for the run.
    pub total_duration: Duration,
    /// Sum of per-path durations. Exceeds `total_duration` when paths overlap.
    pub total_path_duration: Duration,
    /// Number of paths that completed.
    pub paths_executed: usize,
    /// Number of calls executed.
    pub calls_executed: usize,
    /// Peak pool usage observed during the run.
    pub peak_memory_bytes: usize,
    /// Pool usage after outputs were collected and `clean` was applied.
    pub retained_bytes: usize,
    /// Per-path metrics, in completion order (empty with profiling off).
    pub path_metrics: Vec<PathMetrics>,
}

impl RunMetrics {
    /// Creates an empty metrics container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed path.
    pub fn record_path(&mut self, metrics: PathMetrics, keep_detail: bool) {
        self.paths_executed += 1;
        self.calls_executed += metrics.calls;
        self.total_path_duration += metrics.duration;
        self.peak_memory_bytes = self.peak_memory_bytes.max(metrics.peak_memory_bytes);
        if keep_detail {
            self.path_metrics.push(metrics);
        }
    }

    /// Finalises metrics with the total wall-clock time and retained bytes.
    pub fn finalise(&mut self, total: Duration, retained_bytes: usize) {
        self.total_duration = total;
        self.retained_bytes = retained_bytes;
    }

    /// Average parallelism achieved: busy path time over wall-clock time.
    pub fn parallelism(&self) -> f64 {
        let secs = self.total_duration.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.total_path_duration.as_secs_f64() / secs
    }

    /// Slowest path, if profiling was on.
    pub fn slowest_path(&self) -> Option<&PathMetrics> {
        self.path_metrics.iter().max_by_key(|m| m.duration)
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        format!(
            "Run: {:.3}ms total, {} paths, {} calls, {:.2}x parallelism, \
             peak {:.1} KB, retained {:.1} KB",
            self.total_duration.as_secs_f64() * 1000.0,
            self.paths_executed,
            self.calls_executed,
            self.parallelism(),
            self.peak_memory_bytes as f64 / 1024.0,
            self.retained_bytes as f64 / 1024.0,
        )
    }
}
