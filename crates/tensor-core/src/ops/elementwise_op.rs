// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-wise arithmetic and activations.

use super::{require_f32, require_shape};
use crate::{Tensor, TensorError};

/// `output = lhs + rhs`.
///
/// `rhs` must have the shape of `lhs` or hold a single element, which is
/// broadcast. `output` must have the shape of `lhs`.
pub fn add(lhs: &Tensor, rhs: &Tensor, output: &Tensor) -> Result<(), TensorError> {
    binary("add", lhs, rhs, output, |a, b| a + b)
}

/// `output = lhs * rhs`, with the same broadcasting rule as [`add`].
pub fn mul(lhs: &Tensor, rhs: &Tensor, output: &Tensor) -> Result<(), TensorError> {
    binary("mul", lhs, rhs, output, |a, b| a * b)
}

/// `output = max(input, 0)`.
pub fn relu(input: &Tensor, output: &Tensor) -> Result<(), TensorError> {
    require_f32("relu", &[input, output])?;
    require_shape("relu", input.shape(), output)?;

    let src = input.to_f32_vec()?;
    output.with_f32_mut(|dst| {
        for (d, s) in dst.iter_mut().zip(&src) {
            *d = s.max(0.0);
        }
    })
}

fn binary(
    op: &'static str,
    lhs: &Tensor,
    rhs: &Tensor,
    output: &Tensor,
    f: impl Fn(f32, f32) -> f32,
) -> Result<(), TensorError> {
    require_f32(op, &[lhs, rhs, output])?;
    if rhs.shape() != lhs.shape() && rhs.num_elements() != 1 {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        });
    }
    require_shape(op, lhs.shape(), output)?;

    let a = lhs.to_f32_vec()?;
    let b = rhs.to_f32_vec()?;
    output.with_f32_mut(|c| match b.as_slice() {
        [scalar] => {
            for (c, &a) in c.iter_mut().zip(&a) {
                *c = f(a, *scalar);
            }
        }
        _ => {
            for ((c, &a), &b) in c.iter_mut().zip(&a).zip(&b) {
                *c = f(a, b);
            }
        }
    })
}
