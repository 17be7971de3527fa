// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reference tensor kernels.
//!
//! Each operation writes into a caller-provided output tensor so the
//! operator layer decides when to allocate and when to reuse. Inputs are
//! copied out before the output is locked for writing, which makes it
//! legal for the output to alias an input.

mod elementwise_op;
mod matmul_op;
mod softmax_op;

pub use elementwise_op::{add, mul, relu};
pub use matmul_op::matmul;
pub use softmax_op::softmax;

use crate::{DType, Tensor, TensorError};

/// Rejects any non-`F32` operand.
fn require_f32(op: &'static str, tensors: &[&Tensor]) -> Result<(), TensorError> {
    match tensors.iter().find(|t| t.dtype() != DType::F32) {
        Some(t) => Err(TensorError::UnsupportedDType {
            op,
            dtype: t.dtype(),
        }),
        None => Ok(()),
    }
}

/// Rejects an output whose shape differs from `expected`.
fn require_shape(
    op: &'static str,
    expected: &crate::Shape,
    output: &Tensor,
) -> Result<(), TensorError> {
    if output.shape() == expected {
        Ok(())
    } else {
        Err(TensorError::ShapeMismatch {
            op,
            lhs: expected.clone(),
            rhs: output.shape().clone(),
        })
    }
}
