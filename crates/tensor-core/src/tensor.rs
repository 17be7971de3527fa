// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reference-counted tensors with zero-copy reshape views.
//!
//! A [`Tensor`] is a cheap handle. Cloning it takes a reference, dropping
//! it releases one; [`Tensor::ref_count`] reports how many handles are
//! live. The header (dtype, shape) is immutable.
//!
//! # Storage
//!
//! ```text
//!   root tensor                    view (reshape of root)
//!  ┌────────────────────┐        ┌────────────────────┐
//!  │ dtype, shape [2,3] │◄───────│ dtype, shape [6]   │
//!  │ Owned(RwLock<Buf>) │ parent │ View { parent }    │
//!  └────────────────────┘        └────────────────────┘
//! ```
//!
//! Only the root owns a buffer. A view holds a strong handle to its
//! parent, so the parent (and the buffer) stays alive while any view
//! exists, and releasing the last handle of a view releases the parent in
//! turn. Buffer bytes are guarded by a per-buffer `RwLock` on the root;
//! there is no global lock.

use crate::{DType, NdIterator, Shape, TensorError};
use memory_manager::{BufferGuard, MemoryPool};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// An n-dimensional tensor handle.
///
/// # Examples
/// ```
/// use memory_manager::MemoryPool;
/// use tensor_core::{DType, Shape, Tensor};
///
/// let pool = MemoryPool::unbounded();
/// let t = Tensor::from_f32(&pool, Shape::matrix(2, 3), &[1., 2., 3., 4., 5., 6.]).unwrap();
/// let flat = t.reshape(Shape::vector(6)).unwrap();
///
/// assert_eq!(t.ref_count(), 2); // the view holds its parent
/// assert_eq!(flat.to_f32_vec().unwrap()[5], 6.0);
/// drop(flat);
/// assert_eq!(t.ref_count(), 1);
/// ```
#[derive(Clone)]
pub struct Tensor {
    inner: Arc<TensorInner>,
}

struct TensorInner {
    dtype: DType,
    shape: Shape,
    storage: Storage,
}

enum Storage {
    Owned(RwLock<BufferGuard>),
    View { parent: Tensor },
}

impl Tensor {
    // ── Construction ────────────────────────────────────────────

    /// Allocates a zero-filled tensor from `pool`.
    ///
    /// A shape with a zero extent is legal and yields an empty buffer.
    ///
    /// # Errors
    /// [`TensorError::UnsupportedDType`] for `String`/`Undefined`, and
    /// [`TensorError::Allocation`] when the pool budget is exhausted.
    pub fn allocate(pool: &MemoryPool, dtype: DType, shape: Shape) -> Result<Self, TensorError> {
        if !dtype.is_supported() {
            return Err(TensorError::UnsupportedDType {
                op: "allocate",
                dtype,
            });
        }
        let buffer = pool.allocate(shape.size_bytes(dtype))?;
        Ok(Self {
            inner: Arc::new(TensorInner {
                dtype,
                shape,
                storage: Storage::Owned(RwLock::new(buffer)),
            }),
        })
    }

    /// Allocates a tensor and fills it with `data`.
    ///
    /// Returns an error if `data.len()` differs from `shape.size_bytes(dtype)`.
    pub fn from_bytes(
        pool: &MemoryPool,
        dtype: DType,
        shape: Shape,
        data: &[u8],
    ) -> Result<Self, TensorError> {
        let expected = shape.size_bytes(dtype);
        if data.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let tensor = Self::allocate(pool, dtype, shape)?;
        tensor.with_bytes_mut(|dst| dst.copy_from_slice(data));
        Ok(tensor)
    }

    /// Creates an `F32` tensor from a slice of values.
    pub fn from_f32(pool: &MemoryPool, shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self::from_bytes(pool, DType::F32, shape, &bytes)
    }

    /// Creates an `I64` tensor from a slice of values.
    pub fn from_i64(pool: &MemoryPool, shape: Shape, values: &[i64]) -> Result<Self, TensorError> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self::from_bytes(pool, DType::I64, shape, &bytes)
    }

    /// Allocates a zeroed tensor with the same dtype and shape, from the
    /// same pool.
    pub fn allocate_like(&self) -> Result<Self, TensorError> {
        Self::allocate(&self.pool(), self.dtype(), self.shape().clone())
    }

    /// Copies the contents into a fresh, independent buffer.
    pub fn deep_copy(&self) -> Result<Self, TensorError> {
        let copy = self.allocate_like()?;
        let bytes = self.with_bytes(<[u8]>::to_vec);
        copy.with_bytes_mut(|dst| dst.copy_from_slice(&bytes));
        Ok(copy)
    }

    /// Returns a view of the same buffer with a new shape.
    ///
    /// The view's parent is `self`, whose reference count goes up by one
    /// until the view is released.
    ///
    /// # Errors
    /// [`TensorError::ShapeMismatch`] if the element counts differ or the
    /// new extents overflow.
    pub fn reshape(&self, shape: Shape) -> Result<Self, TensorError> {
        if shape.checked_num_elements() != Some(self.num_elements()) {
            return Err(TensorError::ShapeMismatch {
                op: "reshape",
                lhs: self.shape().clone(),
                rhs: shape,
            });
        }
        Ok(Self {
            inner: Arc::new(TensorInner {
                dtype: self.dtype(),
                shape,
                storage: Storage::View {
                    parent: self.clone(),
                },
            }),
        })
    }

    // ── Header ──────────────────────────────────────────────────

    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.inner.shape
    }

    pub fn num_elements(&self) -> usize {
        self.inner.shape.num_elements()
    }

    /// Payload size in bytes (unpadded).
    pub fn size_bytes(&self) -> usize {
        self.inner.shape.size_bytes(self.inner.dtype)
    }

    /// Number of live handles to this tensor, including the strong handle
    /// each direct view holds.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Returns `true` if this tensor aliases another tensor's buffer.
    pub fn is_view(&self) -> bool {
        matches!(self.inner.storage, Storage::View { .. })
    }

    /// The tensor this one was reshaped from.
    pub fn parent(&self) -> Option<&Tensor> {
        match &self.inner.storage {
            Storage::Owned(_) => None,
            Storage::View { parent } => Some(parent),
        }
    }

    /// Returns `true` if both handles refer to the same tensor.
    pub fn ptr_eq(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns `true` if both tensors read and write the same bytes.
    pub fn shares_buffer(&self, other: &Tensor) -> bool {
        self.root().ptr_eq(other.root())
    }

    /// The tensor that owns the buffer (`self` unless this is a view).
    fn root(&self) -> &Tensor {
        let mut tensor = self;
        while let Storage::View { parent } = &tensor.inner.storage {
            tensor = parent;
        }
        tensor
    }

    fn buffer(&self) -> &RwLock<BufferGuard> {
        match &self.root().inner.storage {
            Storage::Owned(buffer) => buffer,
            Storage::View { parent } => parent.buffer(),
        }
    }

    /// Handle to the pool the buffer was drawn from.
    pub fn pool(&self) -> MemoryPool {
        self.buffer()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .pool()
    }

    // ── Buffer access ───────────────────────────────────────────

    /// Runs `f` over the raw bytes under the buffer's read lock.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.buffer().read().unwrap_or_else(PoisonError::into_inner);
        f(guard.as_slice())
    }

    /// Runs `f` over the raw bytes under the buffer's write lock.
    ///
    /// Must not be nested inside another access to the same buffer.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.buffer().write().unwrap_or_else(PoisonError::into_inner);
        f(guard.as_mut_slice())
    }

    /// Runs `f` over the contents as `f32`.
    pub fn with_f32<R>(&self, f: impl FnOnce(&[f32]) -> R) -> Result<R, TensorError> {
        self.expect_dtype("with_f32", DType::F32)?;
        let guard = self.buffer().read().unwrap_or_else(PoisonError::into_inner);
        Ok(f(guard.as_f32_slice()))
    }

    /// Runs `f` over the contents as mutable `f32`.
    pub fn with_f32_mut<R>(&self, f: impl FnOnce(&mut [f32]) -> R) -> Result<R, TensorError> {
        self.expect_dtype("with_f32_mut", DType::F32)?;
        let mut guard = self.buffer().write().unwrap_or_else(PoisonError::into_inner);
        Ok(f(guard.as_f32_slice_mut()))
    }

    /// Copies the contents out as `f32` values.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>, TensorError> {
        self.with_f32(<[f32]>::to_vec)
    }

    /// Copies the contents out as `i64` values.
    pub fn to_i64_vec(&self) -> Result<Vec<i64>, TensorError> {
        self.expect_dtype("to_i64_vec", DType::I64)?;
        Ok(self.with_bytes(|bytes| {
            bytes
                .chunks_exact(8)
                .map(|c| i64::from_ne_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect()
        }))
    }

    /// Overwrites the whole payload.
    pub fn copy_from_bytes(&self, data: &[u8]) -> Result<(), TensorError> {
        let expected = self.size_bytes();
        if data.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        self.with_bytes_mut(|dst| dst.copy_from_slice(data));
        Ok(())
    }

    fn expect_dtype(&self, op: &'static str, dtype: DType) -> Result<(), TensorError> {
        if self.dtype() == dtype {
            Ok(())
        } else {
            Err(TensorError::UnsupportedDType {
                op,
                dtype: self.dtype(),
            })
        }
    }

    // ── Element access ──────────────────────────────────────────

    /// Byte range of the element at the iterator's current index.
    fn element_range(&self, iter: &NdIterator) -> Result<std::ops::Range<usize>, TensorError> {
        let offset = iter
            .offset(self.shape())
            .ok_or_else(|| TensorError::IndexOutOfBounds {
                index: iter.index().to_vec(),
                shape: self.shape().clone(),
            })?;
        let width = self.dtype().size_bytes();
        Ok(offset * width..(offset + 1) * width)
    }

    /// Copies the element at the iterator's current index into `out`.
    ///
    /// `out` must be exactly one element wide.
    pub fn get(&self, iter: &NdIterator, out: &mut [u8]) -> Result<(), TensorError> {
        let range = self.element_range(iter)?;
        check_width(range.len(), out.len())?;
        self.with_bytes(|bytes| out.copy_from_slice(&bytes[range]));
        Ok(())
    }

    /// Writes `value` at the iterator's current index.
    pub fn set(&self, iter: &NdIterator, value: &[u8]) -> Result<(), TensorError> {
        let range = self.element_range(iter)?;
        check_width(range.len(), value.len())?;
        self.with_bytes_mut(|bytes| bytes[range].copy_from_slice(value));
        Ok(())
    }

    // ── Dump ────────────────────────────────────────────────────

    /// Writes the human-readable dump (same text as `Display`).
    pub fn dump<W: std::io::Write>(&self, out: &mut W) -> std::io::Result<()> {
        write!(out, "{self}")
    }
}

fn check_width(expected: usize, actual: usize) -> Result<(), TensorError> {
    if expected == actual {
        Ok(())
    } else {
        Err(TensorError::BufferSizeMismatch { expected, actual })
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("dtype", &self.dtype())
            .field("shape", self.shape())
            .field("ref_count", &self.ref_count())
            .field("is_view", &self.is_view())
            .finish()
    }
}

/// ```text
/// tensor < 2 3 > = 6
/// 1.000000 2.000000 3.000000
/// 4.000000 5.000000 6.000000
/// ```
///
/// Rows break on the last extent (every 8 elements for rank 1) and a blank
/// line separates matrices.
impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims = self.shape().dims();
        write!(f, "tensor < ")?;
        for d in dims {
            write!(f, "{d} ")?;
        }
        let total = self.num_elements();
        writeln!(f, "> = {total}")?;

        let width = self.dtype().size_bytes();
        if width == 0 {
            return writeln!(f, "unsupported dtype {}", self.dtype());
        }

        let (row, matrix) = match dims {
            [] => (1, None),
            [_] => (8, None),
            [.., rows, cols] => ((*cols).max(1), Some((rows * cols).max(1))),
        };

        let dtype = self.dtype();
        self.with_bytes(|bytes| {
            for (i, element) in bytes.chunks_exact(width).enumerate() {
                write_element(f, dtype, element)?;
                write!(f, " ")?;
                if (i + 1) % row == 0 {
                    writeln!(f)?;
                }
                if matrix.is_some_and(|m| (i + 1) % m == 0) {
                    writeln!(f)?;
                }
            }
            writeln!(f)
        })
    }
}

fn write_element(f: &mut fmt::Formatter<'_>, dtype: DType, b: &[u8]) -> fmt::Result {
    let a2 = || [b[0], b[1]];
    let a4 = |i: usize| [b[i], b[i + 1], b[i + 2], b[i + 3]];
    let a8 = |i: usize| {
        [
            b[i],
            b[i + 1],
            b[i + 2],
            b[i + 3],
            b[i + 4],
            b[i + 5],
            b[i + 6],
            b[i + 7],
        ]
    };
    match dtype {
        DType::U8 => write!(f, "{}", b[0]),
        DType::I8 => write!(f, "{}", b[0] as i8),
        DType::Bool => write!(f, "{}", b[0] != 0),
        DType::U16 => write!(f, "{}", u16::from_ne_bytes(a2())),
        DType::I16 => write!(f, "{}", i16::from_ne_bytes(a2())),
        DType::F16 => write!(f, "{:.6}", f16_to_f32(u16::from_ne_bytes(a2()))),
        DType::BF16 => write!(f, "{:.6}", bf16_to_f32(u16::from_ne_bytes(a2()))),
        DType::U32 => write!(f, "{}", u32::from_ne_bytes(a4(0))),
        DType::I32 => write!(f, "{}", i32::from_ne_bytes(a4(0))),
        DType::F32 => write!(f, "{:.6}", f32::from_ne_bytes(a4(0))),
        DType::U64 => write!(f, "{}", u64::from_ne_bytes(a8(0))),
        DType::I64 => write!(f, "{}", i64::from_ne_bytes(a8(0))),
        DType::F64 => write!(f, "{:.6}", f64::from_ne_bytes(a8(0))),
        DType::C64 => write!(
            f,
            "{:.6}{:+.6}i",
            f32::from_ne_bytes(a4(0)),
            f32::from_ne_bytes(a4(4))
        ),
        DType::C128 => write!(
            f,
            "{:.6}{:+.6}i",
            f64::from_ne_bytes(a8(0)),
            f64::from_ne_bytes(a8(8))
        ),
        DType::Undefined | DType::String => write!(f, "?"),
    }
}

/// IEEE 754 half precision to single precision.
pub fn f16_to_f32(half: u16) -> f32 {
    let sign = u32::from(half >> 15) << 31;
    let exp = u32::from((half >> 10) & 0x1f);
    let mant = u32::from(half & 0x3ff);
    let bits = match (exp, mant) {
        (0, 0) => sign,
        (0, m) => {
            // Subnormal: m × 2^-24.
            let magnitude = m as f32 / 16_777_216.0;
            return if sign == 0 { magnitude } else { -magnitude };
        }
        (0x1f, m) => sign | 0x7f80_0000 | (m << 13),
        (e, m) => sign | ((e + 112) << 23) | (m << 13),
    };
    f32::from_bits(bits)
}

/// bfloat16 is the upper half of an `f32`.
pub fn bf16_to_f32(bits: u16) -> f32 {
    f32::from_bits(u32::from(bits) << 16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_manager::MemoryBudget;

    fn pool() -> MemoryPool {
        MemoryPool::new(MemoryBudget::from_kb(64))
    }

    #[test]
    fn test_allocate_zeroed() {
        let pool = pool();
        let t = Tensor::allocate(&pool, DType::F32, Shape::matrix(2, 3)).unwrap();
        assert_eq!(t.size_bytes(), 24);
        assert_eq!(t.ref_count(), 1);
        assert!(!t.is_view());
        assert!(t.parent().is_none());
        assert!(t.to_f32_vec().unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_allocate_rejects_string() {
        let pool = pool();
        let result = Tensor::allocate(&pool, DType::String, Shape::vector(2));
        assert!(matches!(result, Err(TensorError::UnsupportedDType { .. })));
    }

    #[test]
    fn test_allocate_zero_elements() {
        let pool = pool();
        let t = Tensor::allocate(&pool, DType::I32, Shape::new(vec![4, 0])).unwrap();
        assert_eq!(t.size_bytes(), 0);
        t.with_bytes(|b| assert!(b.is_empty()));
    }

    #[test]
    fn test_allocation_failure() {
        let pool = MemoryPool::new(MemoryBudget::from_bytes(64));
        let result = Tensor::allocate(&pool, DType::F64, Shape::vector(100));
        assert!(matches!(result, Err(TensorError::Allocation(_))));
        assert_eq!(pool.allocated_bytes(), 0);
    }

    #[test]
    fn test_from_bytes_size_mismatch() {
        let pool = pool();
        let result = Tensor::from_bytes(&pool, DType::F32, Shape::matrix(2, 3), &[0u8; 10]);
        assert!(matches!(result, Err(TensorError::BufferSizeMismatch { .. })));
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let pool = pool();
        let a = Tensor::from_f32(&pool, Shape::vector(3), &[1.0, 2.0, 3.0]).unwrap();
        let b = a.deep_copy().unwrap();

        assert_eq!(b.dtype(), a.dtype());
        assert_eq!(b.shape(), a.shape());
        assert_eq!(b.to_f32_vec().unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(!a.shares_buffer(&b));
        assert_eq!(a.ref_count(), 1);
        assert_eq!(b.ref_count(), 1);

        b.with_f32_mut(|v| v[0] = 9.0).unwrap();
        assert_eq!(a.to_f32_vec().unwrap()[0], 1.0);
    }

    #[test]
    fn test_reshape_aliases_buffer() {
        let pool = pool();
        let a = Tensor::from_f32(&pool, Shape::matrix(2, 2), &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let v = a.reshape(Shape::vector(4)).unwrap();

        assert!(v.is_view());
        assert!(v.parent().unwrap().ptr_eq(&a));
        assert!(v.shares_buffer(&a));
        assert_eq!(a.ref_count(), 2);

        v.with_f32_mut(|x| x[3] = 40.0).unwrap();
        assert_eq!(a.to_f32_vec().unwrap(), vec![1.0, 2.0, 3.0, 40.0]);
    }

    #[test]
    fn test_reshape_of_view() {
        let pool = pool();
        let a = Tensor::allocate(&pool, DType::U8, Shape::new(vec![2, 3, 4])).unwrap();
        let v1 = a.reshape(Shape::matrix(6, 4)).unwrap();
        let v2 = v1.reshape(Shape::vector(24)).unwrap();

        assert!(v2.parent().unwrap().ptr_eq(&v1));
        assert!(v2.shares_buffer(&a));
        assert_eq!(v1.ref_count(), 2);
        assert_eq!(a.ref_count(), 2);
    }

    #[test]
    fn test_reshape_count_mismatch() {
        let pool = pool();
        let a = Tensor::allocate(&pool, DType::F32, Shape::matrix(2, 3)).unwrap();
        let result = a.reshape(Shape::vector(5));
        assert!(matches!(result, Err(TensorError::ShapeMismatch { .. })));
        assert_eq!(a.ref_count(), 1);
    }

    #[test]
    fn test_reshape_overflowing_extents() {
        let pool = pool();
        let a = Tensor::allocate(&pool, DType::F32, Shape::vector(4)).unwrap();
        let huge = Shape::new(vec![1 << 40, 1 << 40, 4]);
        let result = a.reshape(huge);
        assert!(matches!(result, Err(TensorError::ShapeMismatch { .. })));
        assert_eq!(a.ref_count(), 1);
    }

    #[test]
    fn test_release_in_any_order() {
        for view_first in [true, false] {
            let pool = pool();
            let a = Tensor::allocate(&pool, DType::F32, Shape::matrix(4, 4)).unwrap();
            let v = a.reshape(Shape::vector(16)).unwrap();
            assert_eq!(pool.stats().total_allocations, 1);

            if view_first {
                drop(v);
                assert_eq!(pool.allocated_bytes(), 64);
                drop(a);
            } else {
                drop(a);
                // The view keeps the buffer alive.
                assert_eq!(pool.allocated_bytes(), 64);
                assert_eq!(v.to_f32_vec().unwrap().len(), 16);
                drop(v);
            }

            let stats = pool.stats();
            assert_eq!(pool.allocated_bytes(), 0);
            assert_eq!(stats.total_allocations, 1);
            assert_eq!(stats.total_deallocations, 1);
        }
    }

    #[test]
    fn test_clone_and_drop_track_ref_count() {
        let pool = pool();
        let a = Tensor::allocate(&pool, DType::I8, Shape::vector(8)).unwrap();
        let b = a.clone();
        let c = b.clone();
        assert_eq!(a.ref_count(), 3);
        drop(b);
        drop(c);
        assert_eq!(a.ref_count(), 1);
    }

    #[test]
    fn test_set_get_roundtrip_ranks() {
        let pool = pool();
        for dims in [vec![5], vec![3, 4], vec![2, 3, 2, 2]] {
            let shape = Shape::new(dims);
            let t = Tensor::allocate(&pool, DType::I32, shape.clone()).unwrap();

            let mut it = NdIterator::full(&shape);
            let mut n = 0i32;
            while it.advance() {
                t.set(&it, &(n * 7).to_ne_bytes()).unwrap();
                n += 1;
            }

            let mut n = 0i32;
            let mut out = [0u8; 4];
            while it.advance() {
                t.get(&it, &mut out).unwrap();
                assert_eq!(i32::from_ne_bytes(out), n * 7);
                n += 1;
            }
            assert_eq!(n as usize, shape.num_elements());
        }
    }

    #[test]
    fn test_get_out_of_bounds() {
        let pool = pool();
        let t = Tensor::allocate(&pool, DType::F32, Shape::matrix(2, 2)).unwrap();
        let mut it = NdIterator::new(vec![0, 0], vec![3, 2], vec![1, 1]).unwrap();
        let mut out = [0u8; 4];

        // Sentinel position is outside the tensor.
        assert!(matches!(
            t.get(&it, &mut out),
            Err(TensorError::IndexOutOfBounds { .. })
        ));

        let mut seen = 0;
        while it.advance() {
            if it.index()[0] < 2 {
                t.get(&it, &mut out).unwrap();
            } else {
                assert!(t.get(&it, &mut out).is_err());
            }
            seen += 1;
        }
        assert_eq!(seen, 6);
    }

    #[test]
    fn test_set_wrong_width() {
        let pool = pool();
        let t = Tensor::allocate(&pool, DType::F32, Shape::vector(2)).unwrap();
        let mut it = NdIterator::full(t.shape());
        it.advance();
        assert!(matches!(
            t.set(&it, &[1, 2]),
            Err(TensorError::BufferSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_i64_roundtrip() {
        let pool = pool();
        let t = Tensor::from_i64(&pool, Shape::vector(3), &[-1, 0, 1 << 40]).unwrap();
        assert_eq!(t.to_i64_vec().unwrap(), vec![-1, 0, 1 << 40]);
        assert!(t.to_f32_vec().is_err());
    }

    #[test]
    fn test_display_matrix() {
        let pool = pool();
        let t = Tensor::from_f32(&pool, Shape::matrix(2, 2), &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let text = t.to_string();
        assert!(text.starts_with("tensor < 2 2 > = 4\n"));
        assert!(text.contains("1.000000 2.000000 \n3.000000 4.000000 \n"));
    }

    #[test]
    fn test_display_bool_and_vector_rows() {
        let pool = pool();
        let t = Tensor::from_bytes(
            &pool,
            DType::Bool,
            Shape::vector(9),
            &[1, 0, 0, 0, 0, 0, 0, 0, 1],
        )
        .unwrap();
        let text = t.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1].split_whitespace().count(), 8);
        assert_eq!(lines[2].trim(), "true");
    }

    #[test]
    fn test_half_conversions() {
        assert_eq!(f16_to_f32(0x3c00), 1.0);
        assert_eq!(f16_to_f32(0xc000), -2.0);
        assert_eq!(f16_to_f32(0x0000), 0.0);
        assert!(f16_to_f32(0x7c00).is_infinite());
        assert_eq!(bf16_to_f32(0x3f80), 1.0);
    }

    #[test]
    fn test_tensor_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Tensor>();
    }
}
