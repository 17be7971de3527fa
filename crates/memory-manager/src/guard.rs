// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII buffer guard that returns memory to the pool on drop.
//!
//! A [`BufferGuard`] owns one aligned allocation. The storage is a vector of
//! [`ALIGNMENT`]-aligned blocks, so the first byte of every buffer lands on
//! an alignment boundary and the usable length is padded up to a whole
//! number of blocks. Typed views (`f32`, `i64`, ...) over the bytes are
//! therefore always well aligned.

use crate::pool::PoolInner;
use crate::MemoryPool;
use std::sync::Arc;

/// Alignment boundary, in bytes, of every buffer handed out by the pool.
pub const ALIGNMENT: usize = 16;

/// Rounds `bytes` up to the next multiple of [`ALIGNMENT`].
pub fn padded_size(bytes: usize) -> usize {
    bytes.div_ceil(ALIGNMENT) * ALIGNMENT
}

/// One alignment unit of raw storage.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
pub(crate) struct Block([u8; ALIGNMENT]);

impl Block {
    pub(crate) const ZERO: Block = Block([0; ALIGNMENT]);
}

/// An RAII guard wrapping an aligned buffer.
///
/// When a `BufferGuard` is dropped its storage goes back to the
/// [`MemoryPool`] it came from and the pool's live-byte counter is
/// decremented by the padded size.
///
/// # Example
/// ```
/// use memory_manager::{MemoryBudget, MemoryPool, ALIGNMENT};
///
/// let pool = MemoryPool::new(MemoryBudget::from_kb(4));
/// let guard = pool.allocate(10).unwrap();
/// assert_eq!(guard.len(), 10);
/// assert_eq!(guard.padded_len(), ALIGNMENT);
/// assert_eq!(guard.as_slice().as_ptr() as usize % ALIGNMENT, 0);
/// ```
pub struct BufferGuard {
    /// Wrapped in `Option` so `drop()` can move it back to the pool.
    blocks: Option<Vec<Block>>,
    /// Requested length in bytes; never larger than the block storage.
    len: usize,
    pool: Arc<PoolInner>,
}

impl BufferGuard {
    pub(crate) fn new(blocks: Vec<Block>, len: usize, pool: Arc<PoolInner>) -> Self {
        debug_assert!(blocks.len() * ALIGNMENT >= len);
        Self {
            blocks: Some(blocks),
            len,
            pool,
        }
    }

    /// Returns an immutable view of the buffer.
    pub fn as_slice(&self) -> &[u8] {
        match &self.blocks {
            // SAFETY: `Block` is plain bytes with no padding, and the block
            // storage holds at least `len` bytes.
            Some(blocks) => unsafe {
                std::slice::from_raw_parts(blocks.as_ptr().cast::<u8>(), self.len)
            },
            None => &[],
        }
    }

    /// Returns a mutable view of the buffer.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let len = self.len;
        match &mut self.blocks {
            // SAFETY: see `as_slice`; the borrow is unique through `&mut self`.
            Some(blocks) => unsafe {
                std::slice::from_raw_parts_mut(blocks.as_mut_ptr().cast::<u8>(), len)
            },
            None => &mut [],
        }
    }

    /// Returns the requested length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for a zero-length buffer.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the length rounded up to the alignment boundary. This is the
    /// amount charged against the budget.
    pub fn padded_len(&self) -> usize {
        padded_size(self.len)
    }

    /// Returns a handle to the pool this buffer was allocated from.
    pub fn pool(&self) -> MemoryPool {
        MemoryPool::from_inner(Arc::clone(&self.pool))
    }

    /// Interprets the buffer as a slice of `f32`.
    ///
    /// # Panics
    /// Panics if the length is not a multiple of 4.
    pub fn as_f32_slice(&self) -> &[f32] {
        let bytes = self.as_slice();
        assert!(
            bytes.len() % 4 == 0,
            "buffer size {} is not a multiple of 4",
            bytes.len()
        );
        // SAFETY: the buffer start is ALIGNMENT-aligned, which satisfies f32.
        unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<f32>(), bytes.len() / 4) }
    }

    /// Interprets the buffer as a mutable slice of `f32`.
    ///
    /// # Panics
    /// Panics if the length is not a multiple of 4.
    pub fn as_f32_slice_mut(&mut self) -> &mut [f32] {
        let bytes = self.as_mut_slice();
        assert!(
            bytes.len() % 4 == 0,
            "buffer size {} is not a multiple of 4",
            bytes.len()
        );
        unsafe {
            std::slice::from_raw_parts_mut(bytes.as_mut_ptr().cast::<f32>(), bytes.len() / 4)
        }
    }
}

impl Drop for BufferGuard {
    fn drop(&mut self) {
        if let Some(blocks) = self.blocks.take() {
            self.pool.return_buffer(blocks, padded_size(self.len));
        }
    }
}

impl std::fmt::Debug for BufferGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferGuard")
            .field("len", &self.len)
            .field("padded_len", &self.padded_len())
            .finish()
    }
}
