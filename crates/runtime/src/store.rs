// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Access to the files that make up a model.
//!
//! A model is five named files: the graph text plus an index/blob pair
//! for initializers and another for attributes. [`ModelStore`] hides where
//! they come from. [`DirectoryStore`] memory-maps them from disk and
//! [`MemoryStore`] serves them from RAM (tests, embedded builds).

use crate::RuntimeError;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Graph description.
pub const GRAPH_FILE: &str = "main.cnx";
/// Initializer offset index (`u32` LE per initializer).
pub const INIT_INDEX_FILE: &str = "init.idx";
/// Initializer records.
pub const INIT_DATA_FILE: &str = "init.db";
/// Attribute offset index (`u32` LE per attribute).
pub const ATTR_INDEX_FILE: &str = "attr.idx";
/// Attribute payloads.
pub const ATTR_DATA_FILE: &str = "attr.db";

/// Read-only bytes of one model file.
pub enum Blob {
    Mapped(memmap2::Mmap),
    Shared(Arc<[u8]>),
}

impl Blob {
    pub fn empty() -> Self {
        Blob::Shared(Arc::from(Vec::new()))
    }
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Blob::Mapped(map) => map,
            Blob::Shared(bytes) => bytes,
        }
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Blob::Mapped(_) => "mapped",
            Blob::Shared(_) => "shared",
        };
        f.debug_struct("Blob")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

/// Source of model files.
pub trait ModelStore: Send + Sync {
    /// Returns the contents of `name`, or [`RuntimeError::Load`] when the
    /// file does not exist.
    fn load(&self, name: &str) -> Result<Blob, RuntimeError>;

    /// Where the files come from, for log messages.
    fn describe(&self) -> String;
}

// ── DirectoryStore ─────────────────────────────────────────────────

/// Model files in a directory on disk, memory-mapped on load.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ModelStore for DirectoryStore {
    fn load(&self, name: &str) -> Result<Blob, RuntimeError> {
        let path = self.root.join(name);
        let file = std::fs::File::open(&path).map_err(|e| RuntimeError::Load {
            file: path.display().to_string(),
            detail: format!("cannot open: {e}"),
        })?;
        let len = file
            .metadata()
            .map_err(|source| RuntimeError::Io {
                path: path.clone(),
                source,
            })?
            .len();
        // Zero-length mappings are rejected on some platforms.
        if len == 0 {
            return Ok(Blob::empty());
        }
        let map = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| RuntimeError::Load {
            file: path.display().to_string(),
            detail: format!("mmap failed: {e}"),
        })?;
        tracing::debug!("store: mmap'd {} ({} bytes)", path.display(), map.len());
        Ok(Blob::Mapped(map))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

// ── MemoryStore ────────────────────────────────────────────────────

/// Model files held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: HashMap<String, Arc<[u8]>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), Arc::from(bytes.into()));
    }

    /// Builder form of [`MemoryStore::insert`].
    pub fn with_file(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.files.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

impl ModelStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Blob, RuntimeError> {
        self.files
            .get(name)
            .map(|bytes| Blob::Shared(Arc::clone(bytes)))
            .ok_or_else(|| RuntimeError::Load {
                file: name.to_string(),
                detail: "not found in memory store".into(),
            })
    }

    fn describe(&self) -> String {
        format!("<memory: {} files>", self.files.len())
    }
}

/// Reads the little-endian `u32` at `offset`, if it fits.
pub(crate) fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let raw: [u8; 4] = bytes.get(offset..end)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}

/// Decodes an index file into its offsets.
pub(crate) fn decode_index(file: &str, bytes: &[u8]) -> Result<Vec<u32>, RuntimeError> {
    if bytes.len() % 4 != 0 {
        return Err(RuntimeError::Load {
            file: file.to_string(),
            detail: format!("length {} is not a multiple of 4", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_load() {
        let store = MemoryStore::new().with_file(GRAPH_FILE, b"opset 1\n".to_vec());
        assert_eq!(&*store.load(GRAPH_FILE).unwrap(), b"opset 1\n");
        assert!(store.contains(GRAPH_FILE));
        assert!(matches!(
            store.load(ATTR_DATA_FILE),
            Err(RuntimeError::Load { .. })
        ));
    }

    #[test]
    fn test_directory_store_maps_files() {
        let dir = std::env::temp_dir().join(format!("connx_store_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(INIT_DATA_FILE), [1u8, 2, 3, 4]).unwrap();
        std::fs::write(dir.join(INIT_INDEX_FILE), []).unwrap();

        let store = DirectoryStore::new(&dir);
        let blob = store.load(INIT_DATA_FILE).unwrap();
        assert_eq!(&*blob, &[1, 2, 3, 4]);
        assert!(matches!(blob, Blob::Mapped(_)));
        assert!(store.load(INIT_INDEX_FILE).unwrap().is_empty());

        let missing = store.load(ATTR_INDEX_FILE).unwrap_err();
        assert!(missing.to_string().contains(ATTR_INDEX_FILE));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_decode_index() {
        let bytes = [8u8, 0, 0, 0, 0, 1, 0, 0];
        assert_eq!(decode_index("x", &bytes).unwrap(), vec![8, 256]);
        assert!(decode_index("x", &bytes[..5]).is_err());
        assert_eq!(read_u32_le(&bytes, 4), Some(256));
        assert_eq!(read_u32_le(&bytes, 6), None);
        assert_eq!(read_u32_le(&bytes, usize::MAX), None);
    }
}
