// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Opaque operator attributes from `attr.idx` / `attr.db`.
//!
//! Attribute `i` spans from `index[i]` to the next greater offset in the
//! index, or to the end of the blob. Nothing is decoded eagerly; operators
//! read the bytes through [`Attribute`]'s typed accessors.

use crate::store::{decode_index, Blob, ModelStore, ATTR_DATA_FILE, ATTR_INDEX_FILE};
use crate::RuntimeError;
use std::ops::Range;
use tensor_core::DType;

/// All attributes of a model.
pub struct AttributeStore {
    spans: Vec<Range<usize>>,
    data: Blob,
}

impl AttributeStore {
    /// Loads both attribute files from `store`. Either one missing is fatal.
    pub fn open(store: &dyn ModelStore) -> Result<Self, RuntimeError> {
        let index = store.load(ATTR_INDEX_FILE)?;
        let data = store.load(ATTR_DATA_FILE)?;
        let attrs = Self::from_blobs(&index, data)?;
        tracing::info!(
            "attributes: {} entries, {} bytes",
            attrs.len(),
            attrs.data.len()
        );
        Ok(attrs)
    }

    pub fn from_blobs(index: &[u8], data: Blob) -> Result<Self, RuntimeError> {
        let offsets = decode_index(ATTR_INDEX_FILE, index)?;
        let blob_len = data.len();

        if let Some((id, &bad)) = offsets
            .iter()
            .enumerate()
            .find(|&(_, &o)| o as usize > blob_len)
        {
            return Err(RuntimeError::Load {
                file: ATTR_INDEX_FILE.to_string(),
                detail: format!("attribute {id} starts at {bad}, past the {blob_len}-byte blob"),
            });
        }

        let mut sorted: Vec<usize> = offsets.iter().map(|&o| o as usize).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let spans = offsets
            .iter()
            .map(|&o| {
                let start = o as usize;
                let next = sorted.partition_point(|&s| s <= start);
                start..sorted.get(next).copied().unwrap_or(blob_len)
            })
            .collect();

        Ok(Self { spans, data })
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        (id as usize) < self.spans.len()
    }

    pub fn get(&self, id: u32) -> Option<Attribute<'_>> {
        let span = self.spans.get(id as usize)?;
        Some(Attribute {
            id,
            bytes: &self.data[span.clone()],
        })
    }
}

impl std::fmt::Debug for AttributeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeStore")
            .field("attributes", &self.spans.len())
            .field("data_bytes", &self.data.len())
            .finish()
    }
}

/// Borrowed bytes of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    id: u32,
    bytes: &'a [u8],
}

impl<'a> Attribute<'a> {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of whole `dtype` elements in the attribute.
    pub fn count(&self, dtype: DType) -> usize {
        match dtype.size_bytes() {
            0 => 0,
            width => self.bytes.len() / width,
        }
    }

    /// Raw bytes of element `index`, sized by the `dtype` width table.
    pub fn element(&self, dtype: DType, index: usize) -> Option<&'a [u8]> {
        let width = dtype.size_bytes();
        if width == 0 {
            return None;
        }
        let start = index.checked_mul(width)?;
        self.bytes.get(start..start.checked_add(width)?)
    }

    pub fn read_i32(&self, index: usize) -> Option<i32> {
        let raw = self.element(DType::I32, index)?;
        Some(i32::from_le_bytes(raw.try_into().ok()?))
    }

    pub fn read_u32(&self, index: usize) -> Option<u32> {
        let raw = self.element(DType::U32, index)?;
        Some(u32::from_le_bytes(raw.try_into().ok()?))
    }

    pub fn read_i64(&self, index: usize) -> Option<i64> {
        let raw = self.element(DType::I64, index)?;
        Some(i64::from_le_bytes(raw.try_into().ok()?))
    }

    pub fn read_f32(&self, index: usize) -> Option<f32> {
        let raw = self.element(DType::F32, index)?;
        Some(f32::from_le_bytes(raw.try_into().ok()?))
    }

    pub fn read_f64(&self, index: usize) -> Option<f64> {
        let raw = self.element(DType::F64, index)?;
        Some(f64::from_le_bytes(raw.try_into().ok()?))
    }

    pub fn to_i64_vec(&self) -> Vec<i64> {
        (0..self.count(DType::I64))
            .filter_map(|i| self.read_i64(i))
            .collect()
    }

    pub fn to_f32_vec(&self) -> Vec<f32> {
        (0..self.count(DType::F32))
            .filter_map(|i| self.read_f32(i))
            .collect()
    }

    /// Interprets the bytes as UTF-8 text, ignoring trailing NULs.
    pub fn as_str(&self) -> Option<&'a str> {
        let end = self
            .bytes
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |p| p + 1);
        std::str::from_utf8(&self.bytes[..end]).ok()
    }
}

/// Encodes attribute payloads into `(attr.idx, attr.db)` contents.
pub fn encode_attributes(payloads: &[&[u8]]) -> (Vec<u8>, Vec<u8>) {
    let mut index = Vec::with_capacity(payloads.len() * 4);
    let mut data = Vec::new();
    for payload in payloads {
        index.extend_from_slice(&(data.len() as u32).to_le_bytes());
        data.extend_from_slice(payload);
    }
    (index, data)
}
