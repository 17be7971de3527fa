// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph parsing and validation.

/// Errors raised while reading or checking a graph description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A line could not be parsed (unknown directive, arity, bad number).
    #[error("line {line}: {detail}")]
    Parse { line: usize, detail: String },

    /// The graph is structurally broken (cycle, asymmetric edges, ...).
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// An id exceeds the declared table size.
    #[error("{kind} id {id} out of range (limit {limit}) in {context}")]
    IdOutOfRange {
        kind: &'static str,
        id: u32,
        limit: u32,
        context: String,
    },
}

impl GraphError {
    pub(crate) fn parse(line: usize, detail: impl Into<String>) -> Self {
        Self::Parse {
            line,
            detail: detail.into(),
        }
    }
}
