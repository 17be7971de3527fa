// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation statistics for profiling and leak accounting.
//!
//! Every buffer handed out by the pool is counted exactly once in
//! `total_allocations` and exactly once in `total_deallocations` when its
//! guard is dropped. A balanced pair (and `allocated_bytes() == 0` on the
//! pool) is how tests prove that shared tensor buffers are neither leaked
//! nor released twice.

/// Cumulative statistics about memory pool usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Number of successful allocations.
    pub total_allocations: u64,
    /// Number of allocations served from the free list.
    pub cache_hits: u64,
    /// Number of allocations that required fresh memory.
    pub cache_misses: u64,
    /// Number of allocation requests rejected by the budget.
    pub oom_count: u64,
    /// High-water mark of live (padded) bytes.
    pub peak_allocated_bytes: usize,
    /// Total padded bytes ever handed out.
    pub cumulative_allocated_bytes: u64,
    /// Number of buffers returned to the pool.
    pub total_deallocations: u64,
}

impl AllocationStats {
    /// Fraction of allocations served from a free list; `0.0` before the
    /// first allocation.
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }

    /// Number of buffers handed out and not yet returned.
    pub fn live_allocations(&self) -> u64 {
        self.total_allocations.saturating_sub(self.total_deallocations)
    }

    /// Counter deltas from an `earlier` snapshot of the same pool. The peak
    /// is not a counter and is carried over from `self`.
    pub fn since(&self, earlier: &AllocationStats) -> AllocationStats {
        AllocationStats {
            total_allocations: self.total_allocations.saturating_sub(earlier.total_allocations),
            cache_hits: self.cache_hits.saturating_sub(earlier.cache_hits),
            cache_misses: self.cache_misses.saturating_sub(earlier.cache_misses),
            oom_count: self.oom_count.saturating_sub(earlier.oom_count),
            peak_allocated_bytes: self.peak_allocated_bytes,
            cumulative_allocated_bytes: self
                .cumulative_allocated_bytes
                .saturating_sub(earlier.cumulative_allocated_bytes),
            total_deallocations: self.total_deallocations.saturating_sub(earlier.total_deallocations),
        }
    }

    pub(crate) fn record_cache_hit(&mut self, size: usize) {
        self.total_allocations += 1;
        self.cache_hits += 1;
        self.cumulative_allocated_bytes += size as u64;
    }

    pub(crate) fn record_cache_miss(&mut self, size: usize) {
        self.total_allocations += 1;
        self.cache_misses += 1;
        self.cumulative_allocated_bytes += size as u64;
    }

    pub(crate) fn record_oom(&mut self) {
        self.oom_count += 1;
    }

    pub(crate) fn record_deallocation(&mut self) {
        self.total_deallocations += 1;
    }

    pub(crate) fn update_peak(&mut self, live_bytes: usize) {
        self.peak_allocated_bytes = self.peak_allocated_bytes.max(live_bytes);
    }

    /// One-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        format!(
            "Allocations: {} total ({} hits, {} misses, {:.0}% hit rate), \
             {} OOMs, peak {:.1} KB, {} deallocations, {} live",
            self.total_allocations,
            self.cache_hits,
            self.cache_misses,
            self.cache_hit_ratio() * 100.0,
            self.oom_count,
            self.peak_allocated_bytes as f64 / 1024.0,
            self.total_deallocations,
            self.live_allocations(),
        )
    }
}
