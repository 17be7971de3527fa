// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! The tensor memory model of the runtime.
//!
//! This crate provides:
//! - [`Tensor`]: a reference-counted handle over a pool-allocated, aligned
//!   buffer. Reshapes are zero-copy views that keep their parent alive.
//! - [`NdIterator`]: a restartable strided cursor over an index box, used
//!   for element access via [`Tensor::get`] / [`Tensor::set`].
//! - [`Shape`]: immutable dimension descriptors.
//! - [`DType`]: the element types, tagged with their ONNX numbers.
//! - [`ops`]: reference kernels (add, mul, relu, matmul, softmax).
//!
//! # Design Goals
//! - Zero-copy views wherever possible.
//! - Every buffer comes from a budgeted [`memory_manager::MemoryPool`].
//! - Thread-safe sharing: `Tensor` is `Send + Sync` and each buffer has its
//!   own lock.

mod dtype;
mod error;
mod iter;
pub mod ops;
mod shape;
mod tensor;

pub use dtype::DType;
pub use error::TensorError;
pub use iter::NdIterator;
pub use shape::Shape;
pub use tensor::{bf16_to_f32, f16_to_f32, Tensor};
