// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor extents.
//!
//! Extents arrive from untrusted model files, so sizing has checked
//! variants that report overflow instead of wrapping.

use std::fmt;

/// The extents of a [`crate::Tensor`], outermost first.
///
/// A tensor's shape never changes; a reshape produces a new tensor that
/// aliases the old buffer. Rank 0 is a scalar holding one element, and any
/// zero extent means the tensor holds no elements at all.
///
/// # Examples
/// ```
/// use tensor_core::{DType, Shape};
/// let s = Shape::new(vec![2, 3, 4]);
/// assert_eq!(s.num_elements(), 24);
/// assert_eq!(s.split_at_axis(1), (2, 3, 4));
/// assert_eq!(s.size_bytes(DType::F16), 48);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Extent of axis `index`, or `None` past the rank.
    pub fn dim(&self, index: usize) -> Option<usize> {
        self.dims.get(index).copied()
    }

    /// Product of the extents (1 for a scalar).
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Like [`num_elements`](Self::num_elements), `None` on overflow.
    pub fn checked_num_elements(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Payload bytes for elements of `dtype`.
    pub fn size_bytes(&self, dtype: crate::DType) -> usize {
        self.num_elements() * dtype.size_bytes()
    }

    /// Like [`size_bytes`](Self::size_bytes), `None` on overflow.
    pub fn checked_size_bytes(&self, dtype: crate::DType) -> Option<usize> {
        self.checked_num_elements()?.checked_mul(dtype.size_bytes())
    }

    /// Maps an ONNX-style axis (negative counts from the end) to an index.
    pub fn resolve_axis(&self, axis: i64) -> Option<usize> {
        let rank = self.rank() as i64;
        let axis = if axis < 0 { axis + rank } else { axis };
        (0..rank).contains(&axis).then_some(axis as usize)
    }

    /// `(outer, len, inner)` element counts around `axis`, for kernels that
    /// walk one axis of a row-major buffer.
    ///
    /// `axis` must be below the rank.
    pub fn split_at_axis(&self, axis: usize) -> (usize, usize, usize) {
        let outer = self.dims[..axis].iter().product();
        let inner = self.dims[axis + 1..].iter().product();
        (outer, self.dims[axis], inner)
    }

    /// The `[M, N]` result of `[M, K] x [K, N]`, or `None` when the
    /// operands are not matrices with agreeing inner extents.
    pub fn matmul_output(&self, rhs: &Shape) -> Option<Shape> {
        match (self.dims(), rhs.dims()) {
            ([m, k], [k2, n]) if k == k2 => Some(Shape::matrix(*m, *n)),
            _ => None,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{d}")?;
        }
        f.write_str("]")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DType;

    #[test]
    fn test_scalar_holds_one_element() {
        let s = Shape::scalar();
        assert!(s.is_scalar());
        assert_eq!(s.num_elements(), 1);
        assert_eq!(s.size_bytes(DType::F64), 8);
        assert_eq!(s.resolve_axis(0), None);
    }

    #[test]
    fn test_zero_extent_is_empty() {
        let s = Shape::new(vec![3, 0, 2]);
        assert_eq!(s.num_elements(), 0);
        assert_eq!(s.checked_size_bytes(DType::F32), Some(0));
    }

    #[test]
    fn test_checked_sizes_catch_overflow() {
        let huge = Shape::new(vec![usize::MAX / 2, 3]);
        assert_eq!(huge.checked_num_elements(), None);
        let wide = Shape::vector(usize::MAX / 4);
        assert!(wide.checked_num_elements().is_some());
        assert_eq!(wide.checked_size_bytes(DType::F64), None);
    }

    #[test]
    fn test_resolve_axis() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.resolve_axis(-1), Some(2));
        assert_eq!(s.resolve_axis(-3), Some(0));
        assert_eq!(s.resolve_axis(1), Some(1));
        assert_eq!(s.resolve_axis(3), None);
        assert_eq!(s.resolve_axis(-4), None);
    }

    #[test]
    fn test_split_at_axis() {
        let s = Shape::new(vec![2, 3, 4, 5]);
        assert_eq!(s.split_at_axis(0), (1, 2, 60));
        assert_eq!(s.split_at_axis(2), (6, 4, 5));
        assert_eq!(s.split_at_axis(3), (24, 5, 1));
    }

    #[test]
    fn test_matmul_output() {
        let a = Shape::matrix(3, 4);
        assert_eq!(a.matmul_output(&Shape::matrix(4, 5)), Some(Shape::matrix(3, 5)));
        assert_eq!(a.matmul_output(&Shape::matrix(5, 5)), None);
        assert_eq!(Shape::vector(4).matmul_output(&Shape::matrix(4, 5)), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::new(vec![1, 2, 1, 784]).to_string(), "[1, 2, 1, 784]");
        assert_eq!(Shape::scalar().to_string(), "[]");
    }

    #[test]
    fn test_size_bytes_by_dtype() {
        let s = Shape::new(vec![10, 20]);
        assert_eq!(s.size_bytes(DType::F16), 400);
        assert_eq!(s.size_bytes(DType::I8), 200);
        assert_eq!(s.size_bytes(DType::C128), 3200);
    }
}
