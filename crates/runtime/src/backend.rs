// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Backend construction and the accessor surface.
//!
//! ```text
//! ModelStore ──► main.cnx ──► GraphDef<Validated>
//!     │                          │ resolve op names (OperatorRegistry)
//!     ├──► init.idx/init.db ──► VariableTable[0..initializers]
//!     └──► attr.idx/attr.db ──► AttributeStore
//! ```
//!
//! A failed construction drops whatever it acquired so far; every tensor
//! goes back to the pool through its buffer guard.

use crate::attributes::{Attribute, AttributeStore};
use crate::operator::{Operator, OperatorRegistry};
use crate::store::{DirectoryStore, ModelStore, GRAPH_FILE};
use crate::variables::VariableTable;
use crate::{EndpointMode, RuntimeConfig, RuntimeError, WeightLoader};
use graph_ir::{GraphDef, Validated};
use memory_manager::MemoryPool;
use std::sync::Arc;
use tensor_core::Tensor;

/// A loaded model, ready to run.
///
/// Cloning is cheap and yields a handle to the same backend.
///
/// # Example
/// ```no_run
/// use runtime::{Backend, RuntimeConfig};
///
/// # async fn example() -> Result<(), runtime::RuntimeError> {
/// let backend = Backend::open(RuntimeConfig::for_model("./models/mnist"))?;
/// let output = backend.run(&[]).await?;
/// println!("{}", output.metrics.summary());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Backend {
    pub(crate) inner: Arc<BackendInner>,
}

pub(crate) struct BackendInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) graph: GraphDef<Validated>,
    /// `operators[path][call]`, resolved once at load.
    pub(crate) operators: Vec<Vec<Arc<dyn Operator>>>,
    pub(crate) variables: VariableTable,
    pub(crate) attributes: AttributeStore,
    pub(crate) pool: MemoryPool,
    /// Paths spawned first on every run.
    pub(crate) seeds: Vec<u32>,
    /// Membership mask of the paths every run executes.
    pub(crate) executed: Vec<bool>,
    /// Unfinished predecessors of each executed path at run start.
    pub(crate) initial_pending: Vec<usize>,
    pub(crate) run_lock: tokio::sync::Mutex<()>,
}

// ── Construction ───────────────────────────────────────────────────

impl Backend {
    /// Loads the model in `config.model_path` with a pool sized by
    /// `config.memory_budget` and the builtin operators.
    pub fn open(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let budget = config.parse_budget()?;
        tracing::info!("memory budget: {budget}");
        let store = DirectoryStore::new(&config.model_path);
        Self::from_store(
            config,
            &store,
            MemoryPool::new(budget),
            &OperatorRegistry::with_builtins(),
        )
    }

    /// Loads a model from any [`ModelStore`] into `pool`.
    pub fn from_store(
        config: RuntimeConfig,
        store: &dyn ModelStore,
        pool: MemoryPool,
        registry: &OperatorRegistry,
    ) -> Result<Self, RuntimeError> {
        tracing::info!("loading model from {}", store.describe());
        Self::build(config, store, pool, registry).map_err(|e| {
            tracing::error!("backend construction failed: {e}");
            e
        })
    }

    fn build(
        config: RuntimeConfig,
        store: &dyn ModelStore,
        pool: MemoryPool,
        registry: &OperatorRegistry,
    ) -> Result<Self, RuntimeError> {
        // 1. Graph.
        let text = store.load(GRAPH_FILE)?;
        let text = std::str::from_utf8(&text).map_err(|e| RuntimeError::Load {
            file: GRAPH_FILE.to_string(),
            detail: format!("not valid UTF-8: {e}"),
        })?;
        let graph = graph_ir::parse(text)?.validate()?;
        tracing::info!("{}", graph.summary());

        let (seeds, executed) = resolve_endpoints(&graph, config.endpoints)?;
        let initial_pending = graph
            .iter_paths()
            .map(|p| {
                p.input_paths
                    .iter()
                    .filter(|&&pred| executed[pred as usize])
                    .count()
            })
            .collect();

        // 2. Operators.
        let operators = resolve_operators(&graph, registry)?;

        // 3. Variable table and initializers.
        let variables = variable_table(graph.variable_count, &pool)?;
        let weights = WeightLoader::open(store)?;
        let initializers = weights.load_all(graph.initializer_count, &pool)?;
        for (id, tensor) in (0u32..).zip(initializers) {
            drop(variables.set(id, tensor)?);
        }
        tracing::info!(
            "loaded {} initializers ({:.1} KB in pool)",
            graph.initializer_count,
            pool.allocated_bytes() as f64 / 1024.0,
        );

        // 4. Attributes.
        let attributes = AttributeStore::open(store)?;
        if let Some(max) = graph.max_attribute_id() {
            if !attributes.contains(max) {
                return Err(RuntimeError::Load {
                    file: crate::store::ATTR_INDEX_FILE.to_string(),
                    detail: format!(
                        "graph references attribute {max}, store has {}",
                        attributes.len()
                    ),
                });
            }
        }

        tracing::info!(
            "backend ready: {} paths ({} per run), {} variables, {} attributes, endpoints = {}",
            graph.num_paths(),
            executed.iter().filter(|&&e| e).count(),
            graph.variable_count,
            attributes.len(),
            config.endpoints,
        );

        Ok(Self {
            inner: Arc::new(BackendInner {
                config,
                graph,
                operators,
                variables,
                attributes,
                pool,
                seeds,
                executed,
                initial_pending,
                run_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }
}

/// Allocates the slot table. A table larger than a bounded budget is
/// rejected before anything is allocated.
fn variable_table(count: u32, pool: &MemoryPool) -> Result<VariableTable, RuntimeError> {
    let load_error = |detail: String| RuntimeError::Load {
        file: GRAPH_FILE.to_string(),
        detail,
    };
    let budget = pool.budget();
    let bytes = VariableTable::footprint(count);
    if !budget.is_unlimited() && bytes > budget.as_bytes() {
        return Err(load_error(format!(
            "{count} variables need {bytes} bytes of slots, budget is {budget}"
        )));
    }
    VariableTable::try_new(count)
        .map_err(|e| load_error(format!("cannot allocate {count} variable slots: {e}")))
}

/// Computes the seed paths and the executed-path mask for `mode`.
fn resolve_endpoints(
    graph: &GraphDef<Validated>,
    mode: EndpointMode,
) -> Result<(Vec<u32>, Vec<bool>), RuntimeError> {
    let roots: Vec<u32> = graph.root_paths().map(|p| p.id).collect();
    match mode {
        EndpointMode::Variables => {
            for &id in graph.start.iter().chain(&graph.stop) {
                if id >= graph.variable_count {
                    return Err(RuntimeError::Endpoint(format!(
                        "variable {id} out of range ({} variables)",
                        graph.variable_count
                    )));
                }
            }
            Ok((roots, vec![true; graph.num_paths()]))
        }
        EndpointMode::Paths => {
            for &id in &graph.start {
                let path = graph.path(id).ok_or_else(|| {
                    RuntimeError::Endpoint(format!(
                        "start path {id} out of range ({} paths)",
                        graph.num_paths()
                    ))
                })?;
                if !path.is_root() {
                    return Err(RuntimeError::Endpoint(format!(
                        "start path {id} has input paths {:?}",
                        path.input_paths
                    )));
                }
            }
            let seeds = if graph.start.is_empty() {
                roots
            } else {
                graph.start.clone()
            };
            let executed = graph.reachable_from(&seeds);
            for &id in &graph.stop {
                if !executed.get(id as usize).copied().unwrap_or(false) {
                    return Err(RuntimeError::Endpoint(format!(
                        "stop path {id} is not reachable from the start paths"
                    )));
                }
            }
            Ok((seeds, executed))
        }
    }
}

fn resolve_operators(
    graph: &GraphDef<Validated>,
    registry: &OperatorRegistry,
) -> Result<Vec<Vec<Arc<dyn Operator>>>, RuntimeError> {
    graph
        .iter_paths()
        .map(|path| {
            path.calls
                .iter()
                .map(|call| {
                    let name = call.kind.op_name();
                    let op = registry
                        .get(name)
                        .ok_or_else(|| RuntimeError::UnknownOperator {
                            name: name.to_string(),
                            path: path.id,
                            line: call.line,
                        })?;
                    op.arity()
                        .check(call.outputs.len(), call.inputs.len(), call.attributes.len())
                        .map_err(|detail| RuntimeError::Arity {
                            op: name.to_string(),
                            line: call.line,
                            detail,
                        })?;
                    Ok(op)
                })
                .collect()
        })
        .collect()
}

// ── Accessors ──────────────────────────────────────────────────────

impl Backend {
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn graph(&self) -> &GraphDef<Validated> {
        &self.inner.graph
    }

    pub fn pool(&self) -> &MemoryPool {
        &self.inner.pool
    }

    pub fn opset(&self) -> u32 {
        self.inner.graph.opset
    }

    pub fn variable_count(&self) -> u32 {
        self.inner.graph.variable_count
    }

    pub fn initializer_count(&self) -> u32 {
        self.inner.graph.initializer_count
    }

    pub fn attribute_count(&self) -> usize {
        self.inner.attributes.len()
    }

    /// Returns `true` if slot `id` holds a tensor.
    pub fn has_variable(&self, id: u32) -> bool {
        self.inner.variables.is_set(id)
    }

    /// A new handle to the tensor in slot `id`.
    pub fn variable(&self, id: u32) -> Option<Tensor> {
        self.inner.variables.get(id)
    }

    /// Binds `tensor` to slot `id`, returning the previous occupant.
    pub fn set_variable(&self, id: u32, tensor: Tensor) -> Result<Option<Tensor>, RuntimeError> {
        Ok(self.inner.variables.set(id, tensor)?)
    }

    /// Empties slot `id`. Returns `false` if it was already empty.
    pub fn delete_variable(&self, id: u32) -> bool {
        self.inner.variables.take(id).is_some()
    }

    pub fn has_attribute(&self, id: u32) -> bool {
        self.inner.attributes.contains(id)
    }

    pub fn attribute(&self, id: u32) -> Option<Attribute<'_>> {
        self.inner.attributes.get(id)
    }

    /// Ids of the paths each run executes, ascending.
    pub fn executed_paths(&self) -> Vec<u32> {
        (0u32..)
            .zip(&self.inner.executed)
            .filter_map(|(id, &run)| run.then_some(id))
            .collect()
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = &self.inner;
        f.debug_struct("Backend")
            .field("opset", &inner.graph.opset)
            .field("paths", &inner.graph.num_paths())
            .field("variables", &inner.variables)
            .field("attributes", &inner.attributes.len())
            .field("endpoints", &inner.config.endpoints)
            .field("pool", &inner.pool)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelBuilder;

    const CHAIN: &str = "\
opset 13
paths 2
initializers 1
variables 2
start 0
stop 1
clean 1
path 0
output_paths 1
call Add 1 2 0 1 0 0
outputs
path 1
input_paths 0
call Relu 1 1 0 2 1
delete 1
outputs
";

    fn chain_model() -> ModelBuilder {
        ModelBuilder::new(CHAIN).initializer_f32(&[2], &[1.0, -5.0])
    }

    #[test]
    fn test_open_from_store_and_accessors() {
        let backend = chain_model().build().unwrap();
        assert_eq!(backend.opset(), 13);
        assert_eq!(backend.variable_count(), 3);
        assert_eq!(backend.initializer_count(), 1);
        assert_eq!(backend.attribute_count(), 0);
        assert!(backend.has_variable(0));
        assert!(!backend.has_variable(1));
        assert_eq!(backend.executed_paths(), vec![0, 1]);

        let w = backend.variable(0).unwrap();
        assert_eq!(w.to_f32_vec().unwrap(), vec![1.0, -5.0]);
        assert!(backend.delete_variable(0));
        assert!(!backend.delete_variable(0));
        assert!(backend.set_variable(0, w).unwrap().is_none());
        assert!(backend.set_variable(3, backend.variable(0).unwrap()).is_err());
    }

    #[test]
    fn test_unknown_operator_is_fatal() {
        let text = CHAIN.replace("call Relu", "call Gelu");
        let err = ModelBuilder::new(&text)
            .initializer_f32(&[2], &[0.0, 0.0])
            .build()
            .unwrap_err();
        match err {
            RuntimeError::UnknownOperator { name, path, line } => {
                assert_eq!(name, "Gelu");
                assert_eq!(path, 1);
                assert_eq!(line, 14);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_arity_rejected_at_load() {
        let text = CHAIN.replace("call Relu 1 1 0 2 1", "call Relu 1 2 0 2 1 1");
        let err = ModelBuilder::new(&text)
            .initializer_f32(&[2], &[0.0, 0.0])
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Arity { .. }), "{err}");
    }

    #[test]
    fn test_missing_initializer_index_is_fatal() {
        let err = ModelBuilder::new(CHAIN).build().unwrap_err();
        assert!(matches!(err, RuntimeError::Load { .. }));
    }

    #[test]
    fn test_start_path_must_be_root() {
        let text = CHAIN.replace("start 0", "start 1");
        let err = chain_text(&text).unwrap_err();
        assert!(matches!(err, RuntimeError::Endpoint(_)));
    }

    #[test]
    fn test_variables_mode_checks_ids() {
        let text = CHAIN.replace("stop 1", "stop 7");
        let err = ModelBuilder::new(&text)
            .initializer_f32(&[2], &[0.0, 0.0])
            .endpoints(EndpointMode::Variables)
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Endpoint(_)));
    }

    #[test]
    fn test_attribute_ids_bounds_checked() {
        let text = CHAIN.replace("call Relu 1 1 0 2 1", "call Softmax 1 1 1 2 1 0");
        let err = chain_text(&text).unwrap_err();
        assert!(err.to_string().contains("attribute 0"));

        let ok = ModelBuilder::new(&text)
            .initializer_f32(&[2], &[0.0, 0.0])
            .attribute(&(-1i32).to_le_bytes())
            .build()
            .unwrap();
        assert!(ok.has_attribute(0));
        assert_eq!(ok.attribute(0).unwrap().read_i32(0), Some(-1));
    }

    #[test]
    fn test_huge_variable_count_is_a_load_error() {
        let text = CHAIN.replace("variables 2", "variables 4294967000");
        let pool = MemoryPool::new(memory_manager::MemoryBudget::from_kb(64));
        let err = ModelBuilder::new(&text)
            .initializer_f32(&[2], &[0.0, 0.0])
            .build_in(pool.clone())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Load { .. }), "{err}");
        assert!(err.to_string().contains("4294967000 variables"));
        assert_eq!(pool.allocated_bytes(), 0);
    }

    #[test]
    fn test_repeated_endpoints_rejected() {
        for text in [
            CHAIN.replace("start 0", "start 0 0"),
            CHAIN.replace("stop 1", "stop 1 1"),
        ] {
            let err = chain_text(&text).unwrap_err();
            assert!(matches!(err, RuntimeError::Graph(_)), "{err}");
        }
    }

    fn chain_text(text: &str) -> Result<Backend, RuntimeError> {
        ModelBuilder::new(text)
            .initializer_f32(&[2], &[0.0, 0.0])
            .build()
    }
}
