// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Path and call definitions.
//!
//! A [`PathDef`] is an ordered list of [`CallDef`]s plus its dependency
//! edges. Calls only carry ids; the runtime resolves operator names and
//! binds variable slots.

use std::fmt;

/// What a call invokes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// A named operator (`call <opname> ...`).
    Op(String),
    /// The builtin release of variable slots (`delete <id>...`).
    Delete,
}

impl CallKind {
    /// Operator name as used for registry lookup.
    pub fn op_name(&self) -> &str {
        match self {
            CallKind::Op(name) => name,
            CallKind::Delete => "Delete",
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, CallKind::Delete)
    }
}

/// One operator invocation.
///
/// The parameter array of the text format (`outputs ∥ inputs ∥
/// attributes`) is kept split into its three sections.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CallDef {
    pub kind: CallKind,
    /// Variable ids written by the call.
    pub outputs: Vec<u32>,
    /// Variable ids read by the call (released, for `Delete`).
    pub inputs: Vec<u32>,
    /// Attribute ids.
    pub attributes: Vec<u32>,
    /// Source line, for diagnostics.
    pub line: usize,
}

impl CallDef {
    /// Creates a `Delete` call releasing `ids`.
    pub fn delete(ids: Vec<u32>, line: usize) -> Self {
        Self {
            kind: CallKind::Delete,
            outputs: Vec::new(),
            inputs: ids,
            attributes: Vec::new(),
            line,
        }
    }

    /// Every variable id the call touches.
    pub fn variable_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.outputs.iter().chain(&self.inputs).copied()
    }
}

impl fmt::Display for CallDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CallKind::Delete => write!(f, "delete {:?}", self.inputs),
            CallKind::Op(name) => write!(
                f,
                "{name} out={:?} in={:?} attr={:?}",
                self.outputs, self.inputs, self.attributes
            ),
        }
    }
}

/// A sequentially executed list of calls with dependency edges.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PathDef {
    pub id: u32,
    /// Paths that must complete before this one starts.
    pub input_paths: Vec<u32>,
    /// Paths this one unblocks.
    pub output_paths: Vec<u32>,
    pub calls: Vec<CallDef>,
    /// Value of the `calls` line, a capacity hint only.
    pub declared_calls: Option<u32>,
}

impl PathDef {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            id,
            input_paths: Vec::new(),
            output_paths: Vec::new(),
            calls: Vec::new(),
            declared_calls: None,
        }
    }

    /// Number of non-`Delete` calls.
    pub fn op_call_count(&self) -> usize {
        self.calls.iter().filter(|c| !c.kind.is_delete()).count()
    }

    /// Returns `true` if the path has no predecessors.
    pub fn is_root(&self) -> bool {
        self.input_paths.is_empty()
    }

    /// Single-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        format!(
            "path {:>3}: {:>3} calls ({} delete), in {:?}, out {:?}",
            self.id,
            self.calls.len(),
            self.calls.len() - self.op_call_count(),
            self.input_paths,
            self.output_paths,
        )
    }
}
