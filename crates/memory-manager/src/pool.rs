// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Budget-enforced pool of aligned tensor buffers.
//!
//! The [`MemoryPool`] is the allocate/free primitive underneath every
//! tensor. It:
//!
//! 1. Charges each allocation its padded size against a hard
//!    [`MemoryBudget`]; requests that would exceed it fail with
//!    `OutOfMemory` and leave the pool untouched.
//! 2. Keeps returned buffers in a free list binned by power-of-two size
//!    class, so steady-state streaming execution stops hitting the global
//!    allocator after the first run.
//! 3. Tracks allocation statistics for leak accounting and profiling.
//!
//! # Thread Safety
//! `MemoryPool` is a cheap `Clone` handle over shared state. The live-byte
//! counter is updated with a compare-and-swap loop, so concurrent paths
//! can never jointly overshoot the budget.

use crate::guard::{padded_size, Block, ALIGNMENT};
use crate::{AllocationStats, BufferGuard, MemoryBudget, MemoryError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Smallest size class in bytes. Anything smaller is rounded up.
const MIN_SIZE_CLASS: usize = 64;

/// Pool state shared between the pool handles and outstanding guards.
pub struct PoolInner {
    budget: MemoryBudget,
    /// Live padded bytes (handed out, not yet returned).
    allocated_bytes: AtomicUsize,
    /// size_class → returned block vectors.
    free_buffers: Mutex<HashMap<usize, Vec<Vec<Block>>>>,
    free_list_bytes: AtomicUsize,
    stats: Mutex<AllocationStats>,
}

impl PoolInner {
    /// Called by `BufferGuard::drop`.
    pub(crate) fn return_buffer(&self, blocks: Vec<Block>, padded_bytes: usize) {
        self.allocated_bytes.fetch_sub(padded_bytes, Ordering::AcqRel);

        if let Ok(mut stats) = self.stats.lock() {
            stats.record_deallocation();
        }

        if blocks.is_empty() {
            return;
        }

        let held = blocks.len() * ALIGNMENT;
        let size_class = size_class_for(padded_bytes);
        if let Ok(mut free) = self.free_buffers.lock() {
            self.free_list_bytes.fetch_add(held, Ordering::AcqRel);
            free.entry(size_class).or_default().push(blocks);
        }
    }
}

/// The allocator for tensor buffers.
///
/// # Example
/// ```
/// use memory_manager::{MemoryBudget, MemoryPool};
///
/// let pool = MemoryPool::new(MemoryBudget::from_kb(64));
/// let guard = pool.allocate(1000).unwrap();
/// assert_eq!(pool.allocated_bytes(), 1008); // padded to 16 bytes
///
/// drop(guard);
/// assert_eq!(pool.allocated_bytes(), 0);
/// ```
#[derive(Clone)]
pub struct MemoryPool {
    inner: Arc<PoolInner>,
}

impl MemoryPool {
    /// Creates a new memory pool with the given budget.
    pub fn new(budget: MemoryBudget) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                budget,
                allocated_bytes: AtomicUsize::new(0),
                free_buffers: Mutex::new(HashMap::new()),
                free_list_bytes: AtomicUsize::new(0),
                stats: Mutex::new(AllocationStats::default()),
            }),
        }
    }

    /// Creates a pool that never rejects an allocation.
    pub fn unbounded() -> Self {
        Self::new(MemoryBudget::unlimited())
    }

    pub(crate) fn from_inner(inner: Arc<PoolInner>) -> Self {
        Self { inner }
    }

    /// Allocates a zero-filled, [`ALIGNMENT`]-aligned buffer of `size_bytes`.
    ///
    /// A zero-byte request is legal and yields an empty guard (it is still
    /// counted, so allocation and deallocation totals stay paired).
    pub fn allocate(&self, size_bytes: usize) -> Result<BufferGuard, MemoryError> {
        let padded = padded_size(size_bytes);
        let budget = self.inner.budget.as_bytes();

        let reserved = self.inner.allocated_bytes.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |current| current.checked_add(padded).filter(|&next| next <= budget),
        );

        let current = match reserved {
            Ok(previous) => previous + padded,
            Err(current) => {
                if let Ok(mut stats) = self.inner.stats.lock() {
                    stats.record_oom();
                }
                tracing::debug!(
                    requested = size_bytes,
                    allocated = current,
                    budget,
                    "allocation rejected by budget"
                );
                return Err(MemoryError::OutOfMemory {
                    requested_bytes: padded,
                    available_bytes: budget.saturating_sub(current),
                    budget_bytes: budget,
                });
            }
        };

        let needed = padded / ALIGNMENT;
        let reused = if needed == 0 { None } else { self.take_free(padded, needed) };
        let is_hit = reused.is_some();
        let blocks = reused.unwrap_or_else(|| vec![Block::ZERO; needed]);

        if let Ok(mut stats) = self.inner.stats.lock() {
            if is_hit {
                stats.record_cache_hit(padded);
            } else {
                stats.record_cache_miss(padded);
            }
            stats.update_peak(current);
        }

        Ok(BufferGuard::new(blocks, size_bytes, Arc::clone(&self.inner)))
    }

    /// Pops a cached buffer of the right size class and zeroes the part
    /// that will be handed out.
    fn take_free(&self, padded: usize, needed: usize) -> Option<Vec<Block>> {
        let size_class = size_class_for(padded);
        let mut free = self.inner.free_buffers.lock().ok()?;
        let mut blocks = free.get_mut(&size_class)?.pop()?;
        self.inner
            .free_list_bytes
            .fetch_sub(blocks.len() * ALIGNMENT, Ordering::AcqRel);

        if blocks.len() < needed {
            blocks.resize(needed, Block::ZERO);
        }
        blocks[..needed].fill(Block::ZERO);
        Some(blocks)
    }

    /// Returns the number of padded bytes currently handed out.
    pub fn allocated_bytes(&self) -> usize {
        self.inner.allocated_bytes.load(Ordering::Acquire)
    }

    /// Returns the number of bytes remaining before hitting the budget.
    pub fn available_bytes(&self) -> usize {
        self.inner
            .budget
            .as_bytes()
            .saturating_sub(self.allocated_bytes())
    }

    /// Returns the memory budget.
    pub fn budget(&self) -> MemoryBudget {
        self.inner.budget
    }

    /// Returns a snapshot of allocation statistics.
    pub fn stats(&self) -> AllocationStats {
        self.inner
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Drops every cached free buffer. Live buffers are unaffected.
    pub fn shrink(&self) {
        if let Ok(mut free) = self.inner.free_buffers.lock() {
            free.clear();
            self.inner.free_list_bytes.store(0, Ordering::Release);
        }
    }

    /// Returns the number of bytes held in the free list.
    pub fn free_list_bytes(&self) -> usize {
        self.inner.free_list_bytes.load(Ordering::Acquire)
    }

    /// Returns `true` if both handles refer to the same pool.
    pub fn same_pool(&self, other: &MemoryPool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Smallest power of two that is ≥ `size` and ≥ `MIN_SIZE_CLASS`.
fn size_class_for(size: usize) -> usize {
    size.max(MIN_SIZE_CLASS).next_power_of_two()
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("budget", &self.inner.budget)
            .field("allocated_bytes", &self.allocated_bytes())
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_drop() {
        let pool = MemoryPool::new(MemoryBudget::from_kb(4));

        let guard = pool.allocate(1024).unwrap();
        assert_eq!(pool.allocated_bytes(), 1024);
        assert_eq!(guard.len(), 1024);

        drop(guard);
        assert_eq!(pool.allocated_bytes(), 0);
    }

    #[test]
    fn test_alignment_and_padding() {
        let pool = MemoryPool::unbounded();
        for size in [1usize, 3, 15, 17, 100, 4097] {
            let guard = pool.allocate(size).unwrap();
            assert_eq!(guard.as_slice().as_ptr() as usize % ALIGNMENT, 0);
            assert_eq!(guard.len(), size);
            assert_eq!(guard.padded_len() % ALIGNMENT, 0);
        }
        assert_eq!(pool.allocated_bytes(), 0);
    }

    #[test]
    fn test_zero_sized_allocation() {
        let pool = MemoryPool::new(MemoryBudget::from_bytes(16));
        let guard = pool.allocate(0).unwrap();
        assert!(guard.is_empty());
        assert!(guard.as_slice().is_empty());
        assert_eq!(pool.allocated_bytes(), 0);
        drop(guard);

        let stats = pool.stats();
        assert_eq!(stats.total_allocations, 1);
        assert_eq!(stats.total_deallocations, 1);
    }

    #[test]
    fn test_buffer_contents() {
        let pool = MemoryPool::new(MemoryBudget::from_kb(1));

        let mut guard = pool.allocate(16).unwrap();
        assert!(guard.as_slice().iter().all(|&b| b == 0));

        guard.as_mut_slice()[0] = 42;
        assert_eq!(guard.as_slice()[0], 42);
    }

    #[test]
    fn test_oom() {
        let pool = MemoryPool::new(MemoryBudget::from_bytes(1024));

        let _g1 = pool.allocate(512).unwrap();
        let _g2 = pool.allocate(512).unwrap();

        let result = pool.allocate(1);
        assert!(matches!(result, Err(MemoryError::OutOfMemory { .. })));
        // A rejected request leaves the counter untouched.
        assert_eq!(pool.allocated_bytes(), 1024);
    }

    #[test]
    fn test_oom_charges_padded_size() {
        let pool = MemoryPool::new(MemoryBudget::from_bytes(20));
        // 17 bytes pad to 32, which exceeds the 20 byte budget.
        assert!(pool.allocate(17).is_err());
        assert!(pool.allocate(16).is_ok());
    }

    #[test]
    fn test_free_list_reuse() {
        let pool = MemoryPool::new(MemoryBudget::from_kb(16));

        let guard = pool.allocate(4096).unwrap();
        drop(guard);
        assert!(pool.free_list_bytes() >= 4096);

        let _guard2 = pool.allocate(4000).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(pool.free_list_bytes(), 0);
    }

    #[test]
    fn test_returned_buffer_is_zeroed() {
        let pool = MemoryPool::new(MemoryBudget::from_kb(16));

        let mut g = pool.allocate(4096).unwrap();
        g.as_mut_slice().fill(0xFF);
        drop(g);

        let g2 = pool.allocate(4096).unwrap();
        assert!(g2.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_multiple_allocations_balanced() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(1));

        let guards: Vec<_> = (0..10).map(|_| pool.allocate(100).unwrap()).collect();
        assert_eq!(pool.allocated_bytes(), 10 * 112);

        drop(guards);
        let stats = pool.stats();
        assert_eq!(pool.allocated_bytes(), 0);
        assert_eq!(stats.total_allocations, stats.total_deallocations);
        assert_eq!(stats.peak_allocated_bytes, 10 * 112);
    }

    #[test]
    fn test_concurrent_allocations_respect_budget() {
        let pool = MemoryPool::new(MemoryBudget::from_bytes(64 * 16));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    (0..32).filter_map(|_| pool.allocate(16).ok()).collect::<Vec<_>>()
                })
            })
            .collect();

        let held: Vec<Vec<BufferGuard>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let total: usize = held.iter().map(Vec::len).sum();
        assert_eq!(total, 64);
        assert_eq!(pool.allocated_bytes(), 64 * 16);
    }

    #[test]
    fn test_guard_reports_its_pool() {
        let pool = MemoryPool::unbounded();
        let guard = pool.allocate(8).unwrap();
        assert!(guard.pool().same_pool(&pool));
        assert!(!MemoryPool::unbounded().same_pool(&pool));
    }

    #[test]
    fn test_shrink() {
        let pool = MemoryPool::new(MemoryBudget::from_kb(16));
        drop(pool.allocate(8192).unwrap());
        assert!(pool.free_list_bytes() > 0);

        pool.shrink();
        assert_eq!(pool.free_list_bytes(), 0);
    }

    #[test]
    fn test_f32_slice() {
        let pool = MemoryPool::new(MemoryBudget::from_kb(1));
        let mut guard = pool.allocate(16).unwrap();

        let slice = guard.as_f32_slice_mut();
        assert_eq!(slice.len(), 4);
        slice[0] = 1.0;
        slice[3] = 4.0;

        assert_eq!(guard.as_f32_slice(), &[1.0, 0.0, 0.0, 4.0]);
    }

    #[test]
    fn test_size_class() {
        assert_eq!(size_class_for(1), MIN_SIZE_CLASS);
        assert_eq!(size_class_for(64), 64);
        assert_eq!(size_class_for(80), 128);
        assert_eq!(size_class_for(4096), 4096);
    }

    #[test]
    fn test_debug_format() {
        let pool = MemoryPool::new(MemoryBudget::from_kb(64));
        let debug = format!("{pool:?}");
        assert!(debug.contains("MemoryPool"));
        assert!(debug.contains("budget"));
    }
}
