// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Matrix multiplication operation.

use super::{require_f32, require_shape};
use crate::{Tensor, TensorError};

/// Performs matrix multiplication: `output = lhs @ rhs`.
///
/// Both inputs must be 2-D tensors with compatible inner dimensions:
/// `lhs` is `[M, K]`, `rhs` is `[K, N]`, and `output` must be `[M, N]`.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if dimensions are incompatible.
/// Returns [`TensorError::UnsupportedDType`] if the dtype is not `F32`.
pub fn matmul(lhs: &Tensor, rhs: &Tensor, output: &Tensor) -> Result<(), TensorError> {
    require_f32("matmul", &[lhs, rhs, output])?;

    let out_shape = lhs
        .shape()
        .matmul_output(rhs.shape())
        .ok_or_else(|| TensorError::ShapeMismatch {
            op: "matmul",
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        })?;
    require_shape("matmul (output)", &out_shape, output)?;

    let (m, k) = (lhs.shape().dims()[0], lhs.shape().dims()[1]);
    let n = out_shape.dims()[1];

    let a = lhs.to_f32_vec()?;
    let b = rhs.to_f32_vec()?;
    output.with_f32_mut(|c| matmul_f32_generic(&a, &b, c, m, k, n))
}

/// Generic (portable) f32 matrix multiplication.
///
/// Uses an ikj loop order so the inner loop is a saxpy over a row of C,
/// which is sequential in memory.
fn matmul_f32_generic(a: &[f32], b: &[f32], c: &mut [f32], m: usize, k: usize, n: usize) {
    c.iter_mut().for_each(|x| *x = 0.0);

    for i in 0..m {
        for p in 0..k {
            let a_ip = a[i * k + p];
            let c_row = &mut c[i * n..(i + 1) * n];
            let b_row = &b[p * n..(p + 1) * n];
            for (c, &b) in c_row.iter_mut().zip(b_row) {
                *c += a_ip * b;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DType, Shape};
    use memory_manager::MemoryPool;

    #[test]
    fn test_matmul_2x3_times_3x2() {
        // A = [[1, 2, 3], [4, 5, 6]]
        // B = [[7, 8], [9, 10], [11, 12]]
        // C = [[58, 64], [139, 154]]
        let pool = MemoryPool::unbounded();
        let a = Tensor::from_f32(&pool, Shape::matrix(2, 3), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        let b = Tensor::from_f32(&pool, Shape::matrix(3, 2), &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0])
            .unwrap();
        let c = Tensor::allocate(&pool, DType::F32, Shape::matrix(2, 2)).unwrap();

        matmul(&a, &b, &c).unwrap();

        let result = c.to_f32_vec().unwrap();
        assert!((result[0] - 58.0).abs() < 1e-5);
        assert!((result[1] - 64.0).abs() < 1e-5);
        assert!((result[2] - 139.0).abs() < 1e-5);
        assert!((result[3] - 154.0).abs() < 1e-5);
    }

    #[test]
    fn test_matmul_identity() {
        let pool = MemoryPool::unbounded();
        let a = Tensor::from_f32(&pool, Shape::matrix(2, 2), &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let eye = Tensor::from_f32(&pool, Shape::matrix(2, 2), &[1.0, 0.0, 0.0, 1.0]).unwrap();
        let c = a.allocate_like().unwrap();

        matmul(&a, &eye, &c).unwrap();

        assert_eq!(c.to_f32_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_matmul_shape_mismatch() {
        let pool = MemoryPool::unbounded();
        let a = Tensor::allocate(&pool, DType::F32, Shape::matrix(2, 3)).unwrap();
        let b = Tensor::allocate(&pool, DType::F32, Shape::matrix(4, 2)).unwrap();
        let c = Tensor::allocate(&pool, DType::F32, Shape::matrix(2, 2)).unwrap();

        assert!(matmul(&a, &b, &c).is_err());
    }

    #[test]
    fn test_matmul_bad_output_shape() {
        let pool = MemoryPool::unbounded();
        let a = Tensor::allocate(&pool, DType::F32, Shape::matrix(2, 3)).unwrap();
        let b = Tensor::allocate(&pool, DType::F32, Shape::matrix(3, 2)).unwrap();
        let c = Tensor::allocate(&pool, DType::F32, Shape::matrix(3, 3)).unwrap();

        assert!(matches!(
            matmul(&a, &b, &c),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }
}
