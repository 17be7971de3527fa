// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for backend construction and execution.

use crate::variables::SlotOutOfRange;
use std::path::PathBuf;

/// Errors raised while building a backend or running it.
///
/// Everything except [`RuntimeError::Execution`], [`RuntimeError::MissingInput`],
/// [`RuntimeError::MissingOutput`] and [`RuntimeError::TaskFailed`] is a
/// load-time error.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A model file is missing, truncated or malformed.
    #[error("failed to load '{file}': {detail}")]
    Load { file: String, detail: String },

    /// Reading a file from disk failed.
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The graph description is invalid.
    #[error("graph error: {0}")]
    Graph(#[from] graph_ir::GraphError),

    /// A call names an operator the registry does not know.
    #[error("unknown operator '{name}' (path {path}, line {line})")]
    UnknownOperator { name: String, path: u32, line: usize },

    /// An operator rejected the section counts of a call.
    #[error("operator {op} at line {line}: {detail}")]
    Arity {
        op: String,
        line: usize,
        detail: String,
    },

    /// A tensor could not be created (e.g. the memory budget is exhausted).
    #[error("tensor error: {0}")]
    Tensor(#[from] tensor_core::TensorError),

    /// A variable id is outside the table.
    #[error(transparent)]
    Slot(#[from] SlotOutOfRange),

    /// `start`/`stop` do not fit the configured endpoint mode.
    #[error("invalid endpoints: {0}")]
    Endpoint(String),

    /// A call failed during a run. The rest of its path was skipped.
    #[error("path {path}, call {call} ({op}) failed: {source}")]
    Execution {
        path: u32,
        call: usize,
        op: String,
        #[source]
        source: OperatorError,
    },

    /// A `start` variable was not bound before the run.
    #[error("input variable {0} is not bound")]
    MissingInput(u32),

    /// A `stop` variable was empty when the run finished.
    #[error("output variable {0} is empty after the run")]
    MissingOutput(u32),

    /// A path task panicked or was cancelled.
    #[error("path task failed: {0}")]
    TaskFailed(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Errors an operator reports for a single call.
#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    /// An input slot is empty.
    #[error("input #{index} (variable {id}) is empty")]
    MissingInput { index: usize, id: u32 },

    /// An attribute is missing or cannot be decoded.
    #[error("attribute {id}: {detail}")]
    Attribute { id: u32, detail: String },

    /// The kernel failed.
    #[error(transparent)]
    Tensor(#[from] tensor_core::TensorError),

    /// A variable id is outside the table.
    #[error(transparent)]
    Slot(#[from] SlotOutOfRange),

    /// Any other operator-specific failure.
    #[error("{0}")]
    Invalid(String),
}
