// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Raw tensor files whose header lives in the file name.
//!
//! ```text
//! <name>_<dtype tag>_<ndim>_<d0>_..._<dn>.<ext>
//! input_1_2_1_784.data      F32 tensor [1, 784] called "input"
//! ```
//!
//! The file body is the row-major payload, nothing else.

use crate::RuntimeError;
use memory_manager::MemoryPool;
use std::fmt;
use std::path::{Path, PathBuf};
use tensor_core::{DType, Shape, Tensor};

/// Header decoded from a tensor file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorFileName {
    pub name: String,
    pub dtype: DType,
    pub shape: Shape,
}

impl TensorFileName {
    pub fn new(name: impl Into<String>, dtype: DType, shape: Shape) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape,
        }
    }

    /// Decodes the basename of `path`.
    ///
    /// The name itself may contain underscores; the shortest name that
    /// leaves a consistent `tag_ndim_dims` tail wins.
    pub fn parse(path: &Path) -> Result<Self, RuntimeError> {
        let invalid = |detail: String| RuntimeError::Load {
            file: path.display().to_string(),
            detail,
        };
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| invalid("file name is not valid UTF-8".into()))?;
        let tokens: Vec<&str> = stem.split('_').collect();

        for split in 1..tokens.len() {
            let tail = &tokens[split..];
            let Some((tag, ndim)) = tail.first().zip(tail.get(1)) else {
                break;
            };
            let (Ok(tag), Ok(ndim)) = (tag.parse::<u32>(), ndim.parse::<usize>()) else {
                continue;
            };
            if tail.len() - 2 != ndim {
                continue;
            }
            let Ok(dims) = tail[2..]
                .iter()
                .map(|d| d.parse::<usize>())
                .collect::<Result<Vec<_>, _>>()
            else {
                continue;
            };
            let dtype = DType::from_tag(tag)
                .filter(|d| d.is_supported())
                .ok_or_else(|| invalid(format!("unsupported dtype tag {tag}")))?;
            let shape = Shape::new(dims);
            if shape.checked_size_bytes(dtype).is_none() {
                return Err(invalid(format!("shape {shape} overflows")));
            }
            return Ok(Self {
                name: tokens[..split].join("_"),
                dtype,
                shape,
            });
        }
        Err(invalid(
            "expected <name>_<dtype>_<ndim>_<d0>_..._<dn>.<ext>".into(),
        ))
    }

    /// Payload size implied by the header.
    pub fn size_bytes(&self) -> usize {
        self.shape.size_bytes(self.dtype)
    }

    /// File name with the given extension.
    pub fn file_name(&self, ext: &str) -> String {
        format!("{self}.{ext}")
    }
}

impl fmt::Display for TensorFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.name, self.dtype.tag(), self.shape.rank())?;
        for d in self.shape.dims() {
            write!(f, "_{d}")?;
        }
        Ok(())
    }
}

/// Loads a tensor file into a tensor allocated from `pool`.
pub fn load_tensor_file(path: &Path, pool: &MemoryPool) -> Result<(TensorFileName, Tensor), RuntimeError> {
    let header = TensorFileName::parse(path)?;
    let bytes = std::fs::read(path).map_err(|source| RuntimeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let expected = header.size_bytes();
    if bytes.len() < expected {
        return Err(RuntimeError::Load {
            file: path.display().to_string(),
            detail: format!("payload is {} bytes, header needs {expected}", bytes.len()),
        });
    }
    if bytes.len() > expected {
        tracing::warn!(
            "{}: ignoring {} trailing bytes",
            path.display(),
            bytes.len() - expected
        );
    }
    let tensor = Tensor::from_bytes(pool, header.dtype, header.shape.clone(), &bytes[..expected])?;
    tracing::debug!("loaded {} from {}", header.name, path.display());
    Ok((header, tensor))
}

/// Writes `tensor` into `dir` under its encoded name and returns the path.
pub fn save_tensor_file(dir: &Path, name: &str, tensor: &Tensor) -> Result<PathBuf, RuntimeError> {
    let header = TensorFileName::new(name, tensor.dtype(), tensor.shape().clone());
    let path = dir.join(header.file_name("data"));
    tensor
        .with_bytes(|bytes| std::fs::write(&path, bytes))
        .map_err(|source| RuntimeError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}
