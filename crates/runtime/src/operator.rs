// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operator trait, per-call context and the name → operator registry.

use crate::attributes::{Attribute, AttributeStore};
use crate::builtins;
use crate::variables::VariableTable;
use crate::OperatorError;
use memory_manager::MemoryPool;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tensor_core::{DType, Shape, Tensor};

/// Accepted section sizes of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arity {
    pub outputs: RangeInclusive<usize>,
    pub inputs: RangeInclusive<usize>,
    pub attributes: RangeInclusive<usize>,
}

impl Arity {
    pub fn exact(outputs: usize, inputs: usize, attributes: usize) -> Self {
        Self {
            outputs: outputs..=outputs,
            inputs: inputs..=inputs,
            attributes: attributes..=attributes,
        }
    }

    /// Returns a description of the first section whose size is rejected.
    pub fn check(&self, outputs: usize, inputs: usize, attributes: usize) -> Result<(), String> {
        for (section, range, got) in [
            ("outputs", &self.outputs, outputs),
            ("inputs", &self.inputs, inputs),
            ("attributes", &self.attributes, attributes),
        ] {
            if !range.contains(&got) {
                return Err(format!(
                    "expected {}..={} {section}, got {got}",
                    range.start(),
                    range.end()
                ));
            }
        }
        Ok(())
    }
}

/// A synchronous operator implementation.
pub trait Operator: Send + Sync {
    /// Name used in the graph text.
    fn name(&self) -> &str;

    /// Section sizes this operator accepts.
    fn arity(&self) -> Arity;

    /// Executes one call. Outputs are written into the variable table.
    fn execute(&self, ctx: &CallContext<'_>) -> Result<(), OperatorError>;
}

// ── CallContext ────────────────────────────────────────────────────

/// Everything one call can see.
pub struct CallContext<'a> {
    pub outputs: &'a [u32],
    pub inputs: &'a [u32],
    pub attributes: &'a [u32],
    pub variables: &'a VariableTable,
    pub attribute_store: &'a AttributeStore,
    pub pool: &'a MemoryPool,
}

impl<'a> CallContext<'a> {
    /// Handle to input `index`. An empty slot is an error.
    pub fn input(&self, index: usize) -> Result<Tensor, OperatorError> {
        let id = *self
            .inputs
            .get(index)
            .ok_or_else(|| OperatorError::Invalid(format!("call has no input #{index}")))?;
        self.variables
            .get(id)
            .ok_or(OperatorError::MissingInput { index, id })
    }

    /// Attribute `index` of the call.
    pub fn attribute(&self, index: usize) -> Result<Attribute<'a>, OperatorError> {
        let id = *self
            .attributes
            .get(index)
            .ok_or_else(|| OperatorError::Invalid(format!("call has no attribute #{index}")))?;
        self.attribute_store
            .get(id)
            .ok_or_else(|| OperatorError::Attribute {
                id,
                detail: "not present in the attribute store".into(),
            })
    }

    fn output_id(&self, index: usize) -> Result<u32, OperatorError> {
        self.outputs
            .get(index)
            .copied()
            .ok_or_else(|| OperatorError::Invalid(format!("call has no output #{index}")))
    }

    /// Returns a tensor to write output `index` into.
    ///
    /// The slot's current tensor is reused when nothing else holds it and
    /// it already has `dtype` and `shape`; otherwise a fresh zeroed tensor
    /// is allocated from the pool and stored in the slot.
    pub fn output(&self, index: usize, dtype: DType, shape: &Shape) -> Result<Tensor, OperatorError> {
        let id = self.output_id(index)?;
        if let Some(existing) = self.variables.get(id) {
            // Two handles: the slot's and `existing`.
            let exclusive = existing.ref_count() == 2 && !existing.is_view();
            if exclusive && existing.dtype() == dtype && existing.shape() == shape {
                return Ok(existing);
            }
        }
        let fresh = Tensor::allocate(self.pool, dtype, shape.clone())?;
        drop(self.variables.set(id, fresh.clone())?);
        Ok(fresh)
    }

    /// Stores `tensor` as output `index`, replacing the slot's occupant.
    pub fn set_output(&self, index: usize, tensor: Tensor) -> Result<(), OperatorError> {
        let id = self.output_id(index)?;
        drop(self.variables.set(id, tensor)?);
        Ok(())
    }
}

// ── OperatorRegistry ───────────────────────────────────────────────

/// Maps operator names to implementations.
#[derive(Clone)]
pub struct OperatorRegistry {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    /// A registry with no operators, not even `Delete`.
    pub fn empty() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// A registry holding `Delete` and the reference operators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        builtins::register_all(&mut registry);
        registry
    }

    /// Adds `op` under its name and returns the operator it replaced.
    pub fn register<O: Operator + 'static>(&mut self, op: O) -> Option<Arc<dyn Operator>> {
        self.register_arc(Arc::new(op))
    }

    pub fn register_arc(&mut self, op: Arc<dyn Operator>) -> Option<Arc<dyn Operator>> {
        self.operators.insert(op.name().to_string(), op)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operator>> {
        self.operators.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.names())
            .finish()
    }
}
