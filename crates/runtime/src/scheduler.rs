// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Path-DAG execution.
//!
//! Every ready path runs on the blocking pool via
//! [`tokio::task::JoinSet::spawn_blocking`]; calls inside a path run in
//! stored order on that one thread. Each path keeps a count of unfinished
//! predecessors and is spawned once the count hits zero, so a path starts
//! only after *all* of its `input_paths` have completed.
//!
//! After the first failure nothing new is spawned; paths already in
//! flight are drained and the first error is returned.

use crate::backend::BackendInner;
use crate::metrics::{PathMetrics, RunMetrics};
use crate::operator::CallContext;
use crate::variables::SlotOutOfRange;
use crate::{Backend, EndpointMode, RuntimeError};
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tensor_core::Tensor;
use tokio::task::JoinSet;

/// The result of one [`Backend::run`].
#[derive(Debug)]
pub struct RunOutput {
    /// Output tensors keyed by variable id, in endpoint order.
    pub outputs: Vec<(u32, Tensor)>,
    /// Path ids in completion order.
    pub completed_paths: Vec<u32>,
    pub metrics: RunMetrics,
}

impl RunOutput {
    /// The output bound to variable `id`.
    pub fn output(&self, id: u32) -> Option<&Tensor> {
        self.outputs.iter().find(|(v, _)| *v == id).map(|(_, t)| t)
    }
}

impl Backend {
    /// Binds `inputs`, executes the graph and collects its outputs.
    ///
    /// Runs on one backend are serialised. Slots listed in `clean` are
    /// emptied afterwards, whether or not the run succeeded; the returned
    /// outputs are independent handles and stay valid.
    pub async fn run(&self, inputs: &[(u32, Tensor)]) -> Result<RunOutput, RuntimeError> {
        let inner = &self.inner;
        let _exclusive = inner.run_lock.lock().await;
        let started = Instant::now();

        let count = inner.variables.len() as u32;
        if let Some(&(id, _)) = inputs.iter().find(|(id, _)| *id >= count) {
            return Err(SlotOutOfRange { id, count }.into());
        }
        for (id, tensor) in inputs {
            drop(inner.variables.set(*id, tensor.clone())?);
        }
        if inner.config.endpoints == EndpointMode::Variables {
            if let Some(&id) = inner.graph.start.iter().find(|&&id| !inner.variables.is_set(id)) {
                inner.release_clean();
                return Err(RuntimeError::MissingInput(id));
            }
        }

        let result = self.schedule().await.and_then(|(completed, metrics)| {
            let outputs = inner.collect_outputs()?;
            Ok((outputs, completed, metrics))
        });
        inner.release_clean();

        let (outputs, completed_paths, mut metrics) = result?;
        metrics.finalise(started.elapsed(), inner.pool.allocated_bytes());
        tracing::debug!("{}", metrics.summary());
        Ok(RunOutput {
            outputs,
            completed_paths,
            metrics,
        })
    }

    async fn schedule(&self) -> Result<(Vec<u32>, RunMetrics), RuntimeError> {
        let inner = &self.inner;
        let limit = inner.config.resolve_parallel_paths();
        let profiling = inner.config.enable_profiling;

        let mut pending = inner.initial_pending.clone();
        let mut ready: VecDeque<u32> = inner.seeds.iter().copied().collect();
        let mut tasks = JoinSet::new();
        let mut completed = Vec::new();
        let mut metrics = RunMetrics::new();
        let mut failure: Option<RuntimeError> = None;

        loop {
            while failure.is_none() && tasks.len() < limit {
                let Some(id) = ready.pop_front() else { break };
                let worker = Arc::clone(inner);
                tasks.spawn_blocking(move || worker.execute_path_guarded(id));
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let outcome = joined.unwrap_or_else(|e| Err(RuntimeError::TaskFailed(e.to_string())));
            match outcome {
                Ok(path_metrics) => {
                    let id = path_metrics.path;
                    completed.push(id);
                    metrics.record_path(path_metrics, profiling);
                    for &next in &inner.graph.paths[id as usize].output_paths {
                        if !inner.executed[next as usize] {
                            continue;
                        }
                        let count = &mut pending[next as usize];
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            ready.push_back(next);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("{e}");
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        let expected = inner.executed.iter().filter(|&&run| run).count();
        if completed.len() != expected {
            return Err(RuntimeError::TaskFailed(format!(
                "scheduler stalled: {} of {expected} paths completed",
                completed.len()
            )));
        }
        Ok((completed, metrics))
    }
}

impl BackendInner {
    /// Runs path `id`, turning a panic into an error.
    fn execute_path_guarded(&self, id: u32) -> Result<PathMetrics, RuntimeError> {
        std::panic::catch_unwind(AssertUnwindSafe(|| self.execute_path(id))).unwrap_or_else(
            |payload| {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                Err(RuntimeError::TaskFailed(format!("path {id} panicked: {msg}")))
            },
        )
    }

    fn execute_path(&self, id: u32) -> Result<PathMetrics, RuntimeError> {
        let started = Instant::now();
        let path = &self.graph.paths[id as usize];
        let operators = &self.operators[id as usize];
        let mut peak = self.pool.allocated_bytes();
        tracing::debug!("path {id}: start ({} calls)", path.calls.len());

        for (index, (call, op)) in path.calls.iter().zip(operators).enumerate() {
            tracing::trace!("path {id} call {index}: {call}");
            let ctx = CallContext {
                outputs: &call.outputs,
                inputs: &call.inputs,
                attributes: &call.attributes,
                variables: &self.variables,
                attribute_store: &self.attributes,
                pool: &self.pool,
            };
            op.execute(&ctx).map_err(|source| RuntimeError::Execution {
                path: id,
                call: index,
                op: op.name().to_string(),
                source,
            })?;
            peak = peak.max(self.pool.allocated_bytes());
        }

        let duration = started.elapsed();
        tracing::debug!("path {id}: done in {:.3}ms", duration.as_secs_f64() * 1000.0);
        Ok(PathMetrics {
            path: id,
            calls: path.calls.len(),
            duration,
            peak_memory_bytes: peak,
        })
    }

    fn collect_outputs(&self) -> Result<Vec<(u32, Tensor)>, RuntimeError> {
        match self.config.endpoints {
            EndpointMode::Variables => self
                .graph
                .stop
                .iter()
                .map(|&id| {
                    self.variables
                        .get(id)
                        .map(|t| (id, t))
                        .ok_or(RuntimeError::MissingOutput(id))
                })
                .collect(),
            EndpointMode::Paths => {
                let mut outputs: Vec<(u32, Tensor)> = Vec::new();
                let ids = self
                    .graph
                    .stop
                    .iter()
                    .flat_map(|&p| &self.graph.paths[p as usize].calls)
                    .filter(|call| !call.kind.is_delete())
                    .flat_map(|call| call.outputs.iter().copied());
                for id in ids {
                    if outputs.iter().any(|(seen, _)| *seen == id) {
                        continue;
                    }
                    if let Some(tensor) = self.variables.get(id) {
                        outputs.push((id, tensor));
                    }
                }
                Ok(outputs)
            }
        }
    }

    /// Empties the `clean` slots.
    fn release_clean(&self) {
        let released = self
            .graph
            .clean
            .iter()
            .filter(|&&id| self.variables.take(id).is_some())
            .count();
        if released > 0 {
            tracing::debug!("clean: released {released} variables");
        }
    }
}
