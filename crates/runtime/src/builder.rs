// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! In-memory model assembly.
//!
//! [`ModelBuilder`] turns a graph text plus initializer and attribute
//! payloads into a [`MemoryStore`], and optionally straight into a
//! [`Backend`]. Used by tests, benches and embedders that generate
//! models at runtime.

use crate::attributes::encode_attributes;
use crate::operator::OperatorRegistry;
use crate::store::{
    MemoryStore, ATTR_DATA_FILE, ATTR_INDEX_FILE, GRAPH_FILE, INIT_DATA_FILE, INIT_INDEX_FILE,
};
use crate::weight_loader::encode_record;
use crate::{Backend, EndpointMode, RuntimeConfig, RuntimeError};
use memory_manager::MemoryPool;
use tensor_core::DType;

struct Record {
    dtype: DType,
    dims: Vec<usize>,
    payload: Vec<u8>,
}

/// Builder for model files held in memory.
pub struct ModelBuilder {
    graph: String,
    initializers: Vec<Record>,
    attributes: Vec<Vec<u8>>,
    config: RuntimeConfig,
    registry: OperatorRegistry,
}

impl ModelBuilder {
    pub fn new(graph: impl Into<String>) -> Self {
        Self {
            graph: graph.into(),
            initializers: Vec::new(),
            attributes: Vec::new(),
            config: RuntimeConfig::for_model("<memory>"),
            registry: OperatorRegistry::with_builtins(),
        }
    }

    /// Appends an initializer record with a raw payload.
    pub fn initializer(mut self, dtype: DType, dims: &[usize], payload: Vec<u8>) -> Self {
        self.initializers.push(Record {
            dtype,
            dims: dims.to_vec(),
            payload,
        });
        self
    }

    pub fn initializer_f32(self, dims: &[usize], values: &[f32]) -> Self {
        let payload = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.initializer(DType::F32, dims, payload)
    }

    pub fn initializer_i64(self, dims: &[usize], values: &[i64]) -> Self {
        let payload = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.initializer(DType::I64, dims, payload)
    }

    /// Appends an attribute payload; ids are assigned in call order.
    pub fn attribute(mut self, bytes: &[u8]) -> Self {
        self.attributes.push(bytes.to_vec());
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn endpoints(mut self, mode: EndpointMode) -> Self {
        self.config.endpoints = mode;
        self
    }

    pub fn max_parallel_paths(mut self, limit: usize) -> Self {
        self.config.max_parallel_paths = Some(limit);
        self
    }

    pub fn registry(mut self, registry: OperatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Encodes all five model files.
    pub fn to_store(&self) -> MemoryStore {
        let mut init_index = Vec::with_capacity(self.initializers.len() * 4);
        let mut init_data = Vec::new();
        for record in &self.initializers {
            init_index.extend_from_slice(&(init_data.len() as u32).to_le_bytes());
            encode_record(&mut init_data, record.dtype, &record.dims, &record.payload);
        }
        let payloads: Vec<&[u8]> = self.attributes.iter().map(Vec::as_slice).collect();
        let (attr_index, attr_data) = encode_attributes(&payloads);

        MemoryStore::new()
            .with_file(GRAPH_FILE, self.graph.as_bytes().to_vec())
            .with_file(INIT_INDEX_FILE, init_index)
            .with_file(INIT_DATA_FILE, init_data)
            .with_file(ATTR_INDEX_FILE, attr_index)
            .with_file(ATTR_DATA_FILE, attr_data)
    }

    /// Builds a backend on an unbounded pool.
    pub fn build(self) -> Result<Backend, RuntimeError> {
        self.build_in(MemoryPool::unbounded())
    }

    /// Builds a backend whose tensors come from `pool`.
    pub fn build_in(self, pool: MemoryPool) -> Result<Backend, RuntimeError> {
        let store = self.to_store();
        Backend::from_store(self.config, &store, pool, &self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ModelStore;

    #[test]
    fn test_store_contains_all_files() {
        let store = ModelBuilder::new("opset 1\n")
            .initializer_f32(&[1], &[3.0])
            .attribute(&[1, 2, 3])
            .to_store();
        for name in [GRAPH_FILE, INIT_INDEX_FILE, INIT_DATA_FILE, ATTR_INDEX_FILE, ATTR_DATA_FILE] {
            assert!(store.contains(name), "{name}");
        }
        // tag + ndim + one extent + payload
        assert_eq!(store.load(INIT_DATA_FILE).unwrap().len(), 16);
        assert_eq!(&*store.load(ATTR_DATA_FILE).unwrap(), &[1, 2, 3]);
    }
}
