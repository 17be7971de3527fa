// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Softmax activation operation.

use super::{require_f32, require_shape};
use crate::{Tensor, TensorError};

/// Computes softmax along `axis`:
/// `output[i] = exp(x[i] - max) / sum(exp(x - max))`.
///
/// Uses the numerically stable variant that subtracts the maximum value
/// before exponentiation. Negative axes count from the end; `-1` is the
/// last dimension. A scalar input yields `1.0`.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if input and output shapes differ
/// or the axis is out of range, and [`TensorError::UnsupportedDType`] if the
/// dtype is not `F32`.
pub fn softmax(input: &Tensor, output: &Tensor, axis: i64) -> Result<(), TensorError> {
    require_f32("softmax", &[input, output])?;
    require_shape("softmax", input.shape(), output)?;

    let shape = input.shape();
    if shape.is_scalar() {
        return output.with_f32_mut(|dst| dst[0] = 1.0);
    }
    let axis = shape.resolve_axis(axis).ok_or_else(|| TensorError::ShapeMismatch {
        op: "softmax (axis)",
        lhs: shape.clone(),
        rhs: crate::Shape::vector(axis.unsigned_abs() as usize),
    })?;

    let (outer, len, inner) = shape.split_at_axis(axis);
    if len == 0 || inner == 0 || outer == 0 {
        return Ok(());
    }

    let src = input.to_f32_vec()?;
    output.with_f32_mut(|dst| {
        for o in 0..outer {
            for i in 0..inner {
                let base = o * len * inner + i;
                let at = |j: usize| base + j * inner;

                let max_val = (0..len).map(|j| src[at(j)]).fold(f32::NEG_INFINITY, f32::max);

                let mut sum = 0.0f32;
                for j in 0..len {
                    let e = (src[at(j)] - max_val).exp();
                    dst[at(j)] = e;
                    sum += e;
                }

                if sum > 0.0 {
                    let inv_sum = 1.0 / sum;
                    for j in 0..len {
                        dst[at(j)] *= inv_sum;
                    }
                }
            }
        }
    })
}
