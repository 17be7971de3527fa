// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! The allocate/free primitive under every tensor buffer: a budget-enforced
//! pool of aligned allocations for microcontroller-class memory limits.
//!
//! # Key Components
//!
//! - [`MemoryBudget`]: a hard ceiling on live bytes with human-readable
//!   parsing (`"256K"`, `"64M"`, `"unlimited"`).
//! - [`MemoryPool`]: the allocator. It hands out [`ALIGNMENT`]-aligned,
//!   zero-filled buffers, enforces the budget, and recycles returned
//!   buffers through a size-class free list.
//! - [`BufferGuard`]: the RAII owner of one buffer. Dropping it returns
//!   the storage to the pool.
//! - [`AllocationStats`]: allocation/deallocation totals, peak usage and
//!   cache behaviour.
//!
//! # Ownership Model
//!
//! ```text
//! MemoryPool::allocate(size)
//!       │
//!       ▼
//!   BufferGuard  ◄─── owns Vec<Block>, holds Arc<PoolInner>
//!       │
//!       │  drop()
//!       ▼
//!   PoolInner::return_buffer()  ──► free list
//! ```
//!
//! # Example
//! ```
//! use memory_manager::{MemoryBudget, MemoryPool};
//!
//! let pool = MemoryPool::new(MemoryBudget::parse("64K").unwrap());
//! let a = pool.allocate(1024).unwrap();
//! let b = pool.allocate(512).unwrap();
//! assert_eq!(pool.allocated_bytes(), 1536);
//!
//! drop(a);
//! assert_eq!(pool.allocated_bytes(), 512);
//! drop(b);
//!
//! let stats = pool.stats();
//! assert_eq!(stats.total_allocations, stats.total_deallocations);
//! ```

mod budget;
mod error;
mod guard;
pub mod pool;
mod stats;

pub use budget::MemoryBudget;
pub use error::MemoryError;
pub use guard::{padded_size, BufferGuard, ALIGNMENT};
pub use pool::MemoryPool;
pub use stats::AllocationStats;
