// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Initializer loading from the `init.idx` / `init.db` pair.
//!
//! `init.idx` is a little-endian `u32` offset per initializer. At each
//! offset `init.db` holds:
//!
//! ```text
//! u32 dtype tag | u32 ndim | ndim x u32 extents | row-major payload
//! ```
//!
//! Header fields are little-endian. The payload is copied byte for byte.

use crate::store::{decode_index, read_u32_le, Blob, ModelStore, INIT_DATA_FILE, INIT_INDEX_FILE};
use crate::RuntimeError;
use memory_manager::MemoryPool;
use tensor_core::{DType, Shape, Tensor};

/// Header of one initializer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerInfo {
    pub id: u32,
    pub dtype: DType,
    pub shape: Shape,
    /// Byte range of the payload inside `init.db`.
    pub payload: std::ops::Range<usize>,
}

impl InitializerInfo {
    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }
}

/// Reads initializer records from the weights database.
///
/// Records are decoded lazily; [`WeightLoader::load_all`] copies every
/// payload into pool-allocated tensors.
pub struct WeightLoader {
    offsets: Vec<u32>,
    data: Blob,
}

impl WeightLoader {
    /// Loads both database files from `store`. Either one missing is fatal.
    pub fn open(store: &dyn ModelStore) -> Result<Self, RuntimeError> {
        let index = store.load(INIT_INDEX_FILE)?;
        let data = store.load(INIT_DATA_FILE)?;
        let loader = Self::from_blobs(&index, data)?;
        tracing::info!(
            "weight loader: {} initializers, {:.2} KB of records",
            loader.len(),
            loader.data.len() as f64 / 1024.0,
        );
        Ok(loader)
    }

    pub fn from_blobs(index: &[u8], data: Blob) -> Result<Self, RuntimeError> {
        Ok(Self {
            offsets: decode_index(INIT_INDEX_FILE, index)?,
            data,
        })
    }

    /// Number of entries in the index.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Decodes the header of initializer `id` without copying its payload.
    pub fn info(&self, id: u32) -> Result<InitializerInfo, RuntimeError> {
        let offset = *self.offsets.get(id as usize).ok_or_else(|| {
            load_error(format!(
                "initializer {id} missing from index ({} entries)",
                self.offsets.len()
            ))
        })? as usize;
        let bytes: &[u8] = &self.data;
        let truncated = || load_error(format!("initializer {id}: truncated record at offset {offset}"));

        let tag = read_u32_le(bytes, offset).ok_or_else(truncated)?;
        let dtype = DType::from_tag(tag)
            .filter(|d| d.is_supported())
            .ok_or_else(|| load_error(format!("initializer {id}: unsupported dtype tag {tag}")))?;
        let ndim = read_u32_le(bytes, offset + 4).ok_or_else(truncated)? as usize;

        let mut cursor = offset + 8;
        let mut dims = Vec::with_capacity(ndim.min(16));
        for _ in 0..ndim {
            dims.push(read_u32_le(bytes, cursor).ok_or_else(truncated)? as usize);
            cursor += 4;
        }
        let shape = Shape::new(dims);
        let size = shape.checked_size_bytes(dtype).ok_or_else(|| {
            load_error(format!("initializer {id}: shape {shape} overflows"))
        })?;
        let end = cursor
            .checked_add(size)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(truncated)?;

        Ok(InitializerInfo {
            id,
            dtype,
            shape,
            payload: cursor..end,
        })
    }

    /// Allocates initializer `id` from `pool` and copies its payload.
    pub fn load(&self, id: u32, pool: &MemoryPool) -> Result<Tensor, RuntimeError> {
        let info = self.info(id)?;
        let tensor = Tensor::from_bytes(pool, info.dtype, info.shape, &self.data[info.payload])?;
        tracing::trace!("initializer {id}: {:?}", tensor);
        Ok(tensor)
    }

    /// Loads initializers `0..count`.
    ///
    /// On failure every tensor loaded so far is dropped, so the pool's
    /// accounting is back where it started.
    pub fn load_all(&self, count: u32, pool: &MemoryPool) -> Result<Vec<Tensor>, RuntimeError> {
        if self.offsets.len() < count as usize {
            return Err(load_error(format!(
                "index has {} entries, graph declares {count} initializers",
                self.offsets.len()
            )));
        }
        if self.offsets.len() > count as usize {
            tracing::warn!(
                "weight loader: index has {} entries, only {count} are used",
                self.offsets.len()
            );
        }
        (0..count).map(|id| self.load(id, pool)).collect()
    }

    /// Total payload bytes of initializers `0..count`, without allocating.
    pub fn estimated_bytes(&self, count: u32) -> Result<usize, RuntimeError> {
        (0..count).map(|id| self.info(id).map(|i| i.size_bytes())).sum()
    }
}

impl std::fmt::Debug for WeightLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightLoader")
            .field("initializers", &self.offsets.len())
            .field("data_bytes", &self.data.len())
            .finish()
    }
}

fn load_error(detail: String) -> RuntimeError {
    RuntimeError::Load {
        file: INIT_DATA_FILE.to_string(),
        detail,
    }
}

/// Appends one initializer record to `data`.
pub fn encode_record(data: &mut Vec<u8>, dtype: DType, dims: &[usize], payload: &[u8]) {
    data.extend_from_slice(&dtype.tag().to_le_bytes());
    data.extend_from_slice(&(dims.len() as u32).to_le_bytes());
    for &d in dims {
        data.extend_from_slice(&(d as u32).to_le_bytes());
    }
    data.extend_from_slice(payload);
}

/// Encodes tensors into `(init.idx, init.db)` contents.
pub fn encode_initializers(tensors: &[Tensor]) -> (Vec<u8>, Vec<u8>) {
    let mut index = Vec::with_capacity(tensors.len() * 4);
    let mut data = Vec::new();
    for tensor in tensors {
        index.extend_from_slice(&(data.len() as u32).to_le_bytes());
        tensor.with_bytes(|bytes| {
            encode_record(&mut data, tensor.dtype(), tensor.shape().dims(), bytes)
        });
    }
    (index, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_manager::MemoryBudget;

    fn loader_for(tensors: &[Tensor]) -> WeightLoader {
        let (index, data) = encode_initializers(tensors);
        WeightLoader::from_blobs(&index, Blob::Shared(data.into())).unwrap()
    }

    #[test]
    fn test_load_roundtrip_through_records() {
        let src_pool = MemoryPool::unbounded();
        let w = Tensor::from_f32(&src_pool, Shape::matrix(2, 2), &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let s = Tensor::from_i64(&src_pool, Shape::vector(2), &[-1, 4]).unwrap();
        let loader = loader_for(&[w, s]);
        assert_eq!(loader.len(), 2);

        let pool = MemoryPool::unbounded();
        let loaded = loader.load_all(2, &pool).unwrap();
        assert_eq!(loaded[0].shape(), &Shape::matrix(2, 2));
        assert_eq!(loaded[0].to_f32_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(loaded[1].dtype(), DType::I64);
        assert_eq!(loaded[1].to_i64_vec().unwrap(), vec![-1, 4]);
        assert_eq!(loader.estimated_bytes(2).unwrap(), 16 + 16);
    }

    #[test]
    fn test_scalar_record() {
        let src = MemoryPool::unbounded();
        let scalar = Tensor::from_f32(&src, Shape::scalar(), &[7.5]).unwrap();
        let loader = loader_for(&[scalar]);
        let info = loader.info(0).unwrap();
        assert_eq!(info.shape.rank(), 0);
        assert_eq!(info.size_bytes(), 4);
    }

    #[test]
    fn test_truncated_record_is_fatal() {
        let src = MemoryPool::unbounded();
        let w = Tensor::from_f32(&src, Shape::vector(4), &[0.0; 4]).unwrap();
        let (index, mut data) = encode_initializers(&[w]);
        data.truncate(data.len() - 1);
        let loader = WeightLoader::from_blobs(&index, Blob::Shared(data.into())).unwrap();

        let err = loader.load(0, &MemoryPool::unbounded()).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        let mut data = Vec::new();
        data.extend_from_slice(&99u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        let loader =
            WeightLoader::from_blobs(&0u32.to_le_bytes(), Blob::Shared(data.into())).unwrap();
        let err = loader.info(0).unwrap_err();
        assert!(err.to_string().contains("dtype tag 99"));
    }

    #[test]
    fn test_short_index_is_fatal() {
        let loader = loader_for(&[]);
        assert!(loader.load_all(1, &MemoryPool::unbounded()).is_err());
        assert!(WeightLoader::from_blobs(&[0, 0, 0], Blob::empty()).is_err());
    }

    #[test]
    fn test_budget_failure_releases_partial_load() {
        let src = MemoryPool::unbounded();
        let a = Tensor::from_f32(&src, Shape::vector(16), &[1.0; 16]).unwrap();
        let b = Tensor::from_f32(&src, Shape::vector(16), &[2.0; 16]).unwrap();
        let loader = loader_for(&[a, b]);

        // Room for the first tensor only.
        let pool = MemoryPool::new(MemoryBudget::from_bytes(64));
        let err = loader.load_all(2, &pool).unwrap_err();
        assert!(matches!(err, RuntimeError::Tensor(_)));
        assert_eq!(pool.allocated_bytes(), 0);
    }
}
