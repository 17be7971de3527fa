// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Strided N-dimensional index iterator.
//!
//! An [`NdIterator`] walks the box `[start, stop)` with per-dimension
//! `step`, rightmost dimension fastest. It is a cursor, not a Rust
//! [`Iterator`]: the caller drives it with [`NdIterator::advance`] and
//! reads the current coordinate with [`NdIterator::index`] or feeds it to
//! [`crate::Tensor::get`] / [`crate::Tensor::set`].
//!
//! ```text
//! new([0,0], [2,3], [1,1])   index = [0,-1]   (sentinel)
//! advance() -> true          index = [0, 0]
//! advance() -> true          index = [0, 1]
//!   ...
//! advance() -> true          index = [1, 2]
//! advance() -> false         index = [0,-1]   (sentinel again)
//! ```
//!
//! After exhaustion the cursor is back at the sentinel, so the next
//! `advance()` starts a fresh pass.

use crate::{Shape, TensorError};
use std::fmt;

/// Cursor over a strided N-dimensional index box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdIterator {
    start: Vec<i64>,
    stop: Vec<i64>,
    step: Vec<i64>,
    index: Vec<i64>,
    /// Some dimension has `start >= stop`; the box is empty.
    empty: bool,
    /// Rank-0 only: the single coordinate of this pass was yielded.
    scalar_done: bool,
}

impl NdIterator {
    /// Creates an iterator over `[start, stop)` with the given steps.
    ///
    /// # Errors
    /// Returns [`TensorError::InvalidIterator`] if the vectors differ in
    /// length or any step is not positive.
    pub fn new(start: Vec<i64>, stop: Vec<i64>, step: Vec<i64>) -> Result<Self, TensorError> {
        if start.len() != stop.len() || start.len() != step.len() {
            return Err(TensorError::InvalidIterator(format!(
                "length mismatch: start {}, stop {}, step {}",
                start.len(),
                stop.len(),
                step.len()
            )));
        }
        if let Some(bad) = step.iter().position(|&s| s <= 0) {
            return Err(TensorError::InvalidIterator(format!(
                "step[{bad}] = {} must be positive",
                step[bad]
            )));
        }

        let empty = start.iter().zip(&stop).any(|(a, b)| a >= b);
        let mut iter = Self {
            index: start.clone(),
            start,
            stop,
            step,
            empty,
            scalar_done: false,
        };
        iter.rewind();
        Ok(iter)
    }

    /// Full-range, unit-step iterator over `shape`.
    pub fn full(shape: &Shape) -> Self {
        let stop: Vec<i64> = shape.dims().iter().map(|&d| d as i64).collect();
        let rank = stop.len();
        let mut iter = Self {
            start: vec![0; rank],
            index: vec![0; rank],
            step: vec![1; rank],
            empty: stop.iter().any(|&d| d == 0),
            stop,
            scalar_done: false,
        };
        iter.rewind();
        iter
    }

    /// Resets the cursor to the sentinel just before `start`.
    pub fn rewind(&mut self) {
        self.index.copy_from_slice(&self.start);
        if let (Some(last), Some(step)) = (self.index.last_mut(), self.step.last()) {
            *last -= step;
        }
        self.scalar_done = false;
    }

    /// Moves to the next coordinate.
    ///
    /// Returns `false` (and rewinds) once every coordinate has been visited.
    pub fn advance(&mut self) -> bool {
        if self.start.is_empty() {
            self.scalar_done = !self.scalar_done;
            return self.scalar_done;
        }
        if self.empty {
            return false;
        }

        for d in (0..self.index.len()).rev() {
            self.index[d] += self.step[d];
            if self.index[d] < self.stop[d] {
                return true;
            }
            self.index[d] = self.start[d];
        }

        self.rewind();
        false
    }

    /// Row-major element offset of the current index within `shape`.
    ///
    /// Returns `None` when the ranks differ or a coordinate falls outside
    /// the shape (including the sentinel position).
    pub fn offset(&self, shape: &Shape) -> Option<usize> {
        let dims = shape.dims();
        if dims.len() != self.index.len() {
            return None;
        }

        let mut offset = 0usize;
        let mut unit = 1usize;
        for (&i, &extent) in self.index.iter().zip(dims).rev() {
            let i = usize::try_from(i).ok().filter(|&i| i < extent)?;
            offset += unit * i;
            unit *= extent;
        }
        Some(offset)
    }

    /// Number of coordinates per pass.
    pub fn len(&self) -> usize {
        if self.empty {
            return 0;
        }
        self.start
            .iter()
            .zip(&self.stop)
            .zip(&self.step)
            .map(|((&a, &b), &s)| ((b - a + s - 1) / s) as usize)
            .product()
    }

    /// Returns `true` if a pass visits no coordinate.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ndim(&self) -> usize {
        self.start.len()
    }

    pub fn start(&self) -> &[i64] {
        &self.start
    }

    pub fn stop(&self) -> &[i64] {
        &self.stop
    }

    pub fn step(&self) -> &[i64] {
        &self.step
    }

    /// The current coordinate.
    pub fn index(&self) -> &[i64] {
        &self.index
    }
}

/// `index / start / stop / step`, one group per vector.
impl fmt::Display for NdIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups = [&self.index, &self.start, &self.stop, &self.step];
        for (g, values) in groups.iter().enumerate() {
            if g > 0 {
                write!(f, "/ ")?;
            }
            for v in values.iter() {
                write!(f, "{v} ")?;
            }
        }
        Ok(())
    }
}
