// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! Loads a connx model and executes its path graph.
//!
//! A model is a directory (or any [`ModelStore`]) holding:
//! - `main.cnx`: the graph text, parsed by `graph-ir`.
//! - `init.idx` + `init.db`: initializer tensors, loaded into the first
//!   variable slots.
//! - `attr.idx` + `attr.db`: opaque operator attributes.
//!
//! [`Backend`] resolves every call against an [`OperatorRegistry`], loads
//! the initializers through a budgeted `MemoryPool`, and runs the graph:
//! paths execute concurrently on `tokio`'s blocking pool, each one only
//! after all of its predecessors have finished.
//!
//! # Example
//! ```
//! use runtime::{ModelBuilder, RunOutput};
//! use tensor_core::{Shape, Tensor};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), runtime::RuntimeError> {
//! let graph = "\
//! paths 1
//! initializers 1
//! variables 2
//! stop 0
//! path 0
//! call Add 1 2 0 1 0 2
//! outputs
//! ";
//! let backend = ModelBuilder::new(graph)
//!     .initializer_f32(&[2], &[1.0, 2.0])
//!     .build()?;
//! let x = Tensor::from_f32(backend.pool(), Shape::vector(2), &[10.0, 20.0])?;
//! let out: RunOutput = backend.run(&[(2, x)]).await?;
//! assert_eq!(out.output(1).unwrap().to_f32_vec()?, vec![11.0, 22.0]);
//! # Ok(())
//! # }
//! ```

mod attributes;
mod backend;
mod builder;
mod builtins;
mod config;
mod error;
mod metrics;
mod operator;
mod scheduler;
pub mod store;
mod tensor_file;
mod variables;
mod weight_loader;

pub use attributes::{encode_attributes, Attribute, AttributeStore};
pub use backend::Backend;
pub use builder::ModelBuilder;
pub use builtins::{Add, Delete, Identity, MatMul, Mul, Relu, Reshape, Softmax};
pub use config::{EndpointMode, RuntimeConfig};
pub use error::{OperatorError, RuntimeError};
pub use metrics::{PathMetrics, RunMetrics};
pub use operator::{Arity, CallContext, Operator, OperatorRegistry};
pub use scheduler::RunOutput;
pub use store::{Blob, DirectoryStore, MemoryStore, ModelStore};
pub use tensor_file::{load_tensor_file, save_tensor_file, TensorFileName};
pub use variables::{SlotOutOfRange, VariableTable};
pub use weight_loader::{encode_initializers, encode_record, InitializerInfo, WeightLoader};
