// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The graph description as a DAG of paths.
//!
//! # Type-State Pattern
//!
//! ```text
//! GraphDef<Parsed>     : text parsed, ids not yet cross-checked.
//!       │  .validate()
//!       ▼
//! GraphDef<Validated>  : ids in range, edges symmetric, acyclic.
//! ```
//!
//! The backend only accepts a `GraphDef<Validated>`, so the scheduler never
//! has to re-check ids or guard against cycles.

use crate::{GraphError, PathDef};
use std::collections::VecDeque;
use std::fmt;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph text has been parsed but not validated.
#[derive(Debug, Clone)]
pub struct Parsed;

/// Marker: graph has been validated and can be executed.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Parsed {}
impl GraphState for Validated {}

// ── GraphDef ───────────────────────────────────────────────────────

/// A parsed graph description.
#[derive(Debug, Clone)]
pub struct GraphDef<S: GraphState = Parsed> {
    /// Operator set version.
    pub opset: u32,
    /// Slots `0..initializer_count` are loaded from the weights database.
    pub initializer_count: u32,
    /// Total slots: initializers plus runtime variables.
    pub variable_count: u32,
    /// Indexed by path id.
    pub paths: Vec<PathDef>,
    pub start: Vec<u32>,
    pub stop: Vec<u32>,
    /// Variable ids released after each run.
    pub clean: Vec<u32>,
    _state: std::marker::PhantomData<S>,
}

/// Serializable overview for `inspect` output.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GraphSummary {
    pub opset: u32,
    pub paths: usize,
    pub calls: usize,
    pub delete_calls: usize,
    pub initializers: u32,
    pub variables: u32,
    pub max_attribute_id: Option<u32>,
    /// Length of the longest dependency chain, in paths.
    pub depth: usize,
    pub start: Vec<u32>,
    pub stop: Vec<u32>,
    pub clean: Vec<u32>,
}

// ── Parsed state ───────────────────────────────────────────────────

impl GraphDef<Parsed> {
    pub(crate) fn from_parts(
        opset: u32,
        initializer_count: u32,
        variable_count: u32,
        paths: Vec<PathDef>,
        start: Vec<u32>,
        stop: Vec<u32>,
        clean: Vec<u32>,
    ) -> Self {
        Self {
            opset,
            initializer_count,
            variable_count,
            paths,
            start,
            stop,
            clean,
            _state: std::marker::PhantomData,
        }
    }

    /// Checks the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - Path ids in `input_paths`/`output_paths` are in range.
    /// - Edges are symmetric: `Q ∈ P.output_paths` iff `P ∈ Q.input_paths`.
    /// - The dependency graph is acyclic.
    /// - Every variable id used by a call or listed in `clean` is below
    ///   `variable_count`.
    ///
    /// - `start` and `stop` list no id twice.
    ///
    /// `start`/`stop` ids are not range-checked here; their meaning depends
    /// on the runtime's endpoint mode.
    pub fn validate(self) -> Result<GraphDef<Validated>, GraphError> {
        let path_limit = self.paths.len() as u32;
        let var_limit = self.variable_count;

        for path in &self.paths {
            for &id in path.input_paths.iter().chain(&path.output_paths) {
                check_id("path", id, path_limit, || format!("path {} edges", path.id))?;
            }
            if has_duplicates(&path.input_paths) || has_duplicates(&path.output_paths) {
                return Err(GraphError::InvalidGraph(format!(
                    "path {} lists the same neighbour twice",
                    path.id
                )));
            }
            for call in &path.calls {
                for id in call.variable_ids() {
                    check_id("variable", id, var_limit, || {
                        format!("path {} line {} ({})", path.id, call.line, call.kind.op_name())
                    })?;
                }
            }
        }
        for &id in &self.clean {
            check_id("variable", id, var_limit, || "clean list".to_string())?;
        }
        for (name, ids) in [("start", &self.start), ("stop", &self.stop)] {
            if has_duplicates(ids) {
                return Err(GraphError::InvalidGraph(format!(
                    "'{name}' lists the same id twice: {ids:?}"
                )));
            }
        }

        for path in &self.paths {
            for &next in &path.output_paths {
                if !self.paths[next as usize].input_paths.contains(&path.id) {
                    return Err(GraphError::InvalidGraph(format!(
                        "path {} lists {next} as output, but {next} does not list {} as input",
                        path.id, path.id
                    )));
                }
            }
            for &prev in &path.input_paths {
                if !self.paths[prev as usize].output_paths.contains(&path.id) {
                    return Err(GraphError::InvalidGraph(format!(
                        "path {} lists {prev} as input, but {prev} does not list {} as output",
                        path.id, path.id
                    )));
                }
            }
        }

        topological_order(&self.paths)?;

        tracing::debug!(
            paths = self.paths.len(),
            variables = self.variable_count,
            "graph validated"
        );

        Ok(GraphDef {
            opset: self.opset,
            initializer_count: self.initializer_count,
            variable_count: self.variable_count,
            paths: self.paths,
            start: self.start,
            stop: self.stop,
            clean: self.clean,
            _state: std::marker::PhantomData,
        })
    }
}

fn check_id(
    kind: &'static str,
    id: u32,
    limit: u32,
    context: impl FnOnce() -> String,
) -> Result<(), GraphError> {
    if id < limit {
        Ok(())
    } else {
        Err(GraphError::IdOutOfRange {
            kind,
            id,
            limit,
            context: context(),
        })
    }
}

fn has_duplicates(ids: &[u32]) -> bool {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).any(|w| w[0] == w[1])
}

/// Kahn's algorithm over `input_paths`. Errors on a cycle.
fn topological_order(paths: &[PathDef]) -> Result<Vec<u32>, GraphError> {
    let mut pending: Vec<usize> = paths.iter().map(|p| p.input_paths.len()).collect();
    let mut ready: VecDeque<u32> = paths.iter().filter(|p| p.is_root()).map(|p| p.id).collect();
    let mut order = Vec::with_capacity(paths.len());

    while let Some(id) = ready.pop_front() {
        order.push(id);
        for &next in &paths[id as usize].output_paths {
            let count = &mut pending[next as usize];
            *count -= 1;
            if *count == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() != paths.len() {
        let stuck: Vec<u32> = paths
            .iter()
            .filter(|p| pending[p.id as usize] > 0)
            .map(|p| p.id)
            .collect();
        return Err(GraphError::InvalidGraph(format!(
            "dependency cycle among paths {stuck:?}"
        )));
    }
    Ok(order)
}

// ── Validated state ────────────────────────────────────────────────

impl GraphDef<Validated> {
    pub fn num_paths(&self) -> usize {
        self.paths.len()
    }

    /// Total number of calls, `Delete` included.
    pub fn num_calls(&self) -> usize {
        self.paths.iter().map(|p| p.calls.len()).sum()
    }

    pub fn path(&self, id: u32) -> Option<&PathDef> {
        self.paths.get(id as usize)
    }

    /// Returns an iterator over the paths in id order.
    pub fn iter_paths(&self) -> impl Iterator<Item = &PathDef> {
        self.paths.iter()
    }

    /// Paths with no predecessors.
    pub fn root_paths(&self) -> impl Iterator<Item = &PathDef> {
        self.paths.iter().filter(|p| p.is_root())
    }

    /// Path ids in a dependency-respecting order.
    pub fn topological_order(&self) -> Vec<u32> {
        // Acyclicity was established by `validate`.
        topological_order(&self.paths).unwrap_or_default()
    }

    /// Every path reachable from `seeds` through `output_paths`, seeds
    /// included, as a membership mask indexed by path id.
    pub fn reachable_from(&self, seeds: &[u32]) -> Vec<bool> {
        let mut seen = vec![false; self.paths.len()];
        let mut stack: Vec<u32> = seeds
            .iter()
            .copied()
            .filter(|&id| (id as usize) < self.paths.len())
            .collect();
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id as usize], true) {
                continue;
            }
            stack.extend(self.paths[id as usize].output_paths.iter().copied());
        }
        seen
    }

    /// Largest attribute id referenced by any call.
    pub fn max_attribute_id(&self) -> Option<u32> {
        self.paths
            .iter()
            .flat_map(|p| &p.calls)
            .flat_map(|c| c.attributes.iter().copied())
            .max()
    }

    /// Longest dependency chain, counted in paths.
    pub fn depth(&self) -> usize {
        let mut level = vec![0usize; self.paths.len()];
        for id in self.topological_order() {
            let own = level[id as usize] + 1;
            level[id as usize] = own;
            for &next in &self.paths[id as usize].output_paths {
                level[next as usize] = level[next as usize].max(own);
            }
        }
        level.into_iter().max().unwrap_or(0)
    }

    pub fn summary_data(&self) -> GraphSummary {
        let calls = self.num_calls();
        let ops: usize = self.paths.iter().map(PathDef::op_call_count).sum();
        GraphSummary {
            opset: self.opset,
            paths: self.num_paths(),
            calls,
            delete_calls: calls - ops,
            initializers: self.initializer_count,
            variables: self.variable_count,
            max_attribute_id: self.max_attribute_id(),
            depth: self.depth(),
            start: self.start.clone(),
            stop: self.stop.clone(),
            clean: self.clean.clone(),
        }
    }

    /// Returns a one-line summary describing the graph.
    pub fn summary(&self) -> String {
        let s = self.summary_data();
        format!(
            "Graph (opset {}): {} paths, {} calls ({} delete), {} variables ({} initializers), depth {}",
            s.opset, s.paths, s.calls, s.delete_calls, s.variables, s.initializers, s.depth,
        )
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: GraphState> fmt::Display for GraphDef<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "GraphDef opset {} ({} paths, {} variables):",
            self.opset,
            self.paths.len(),
            self.variable_count
        )?;
        for path in &self.paths {
            writeln!(f, "  {}", path.summary())?;
            for call in &path.calls {
                writeln!(f, "      {call}")?;
            }
        }
        writeln!(f, "  start {:?}", self.start)?;
        writeln!(f, "  stop  {:?}", self.stop)?;
        write!(f, "  clean {:?}", self.clean)
    }
}
