// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! model_path = "./models/mnist"
//! memory_budget = "256K"
//! endpoints = "paths"          # or "variables"
//! max_parallel_paths = 4
//! num_threads = 4
//! enable_profiling = true
//! ```

use crate::RuntimeError;
use memory_manager::MemoryBudget;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How the graph's `start` and `stop` lists are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointMode {
    /// `start` names the seed paths, `stop` the paths whose outputs are
    /// returned.
    #[default]
    Paths,
    /// `start` names the input variables, `stop` the output variables.
    /// Every path runs.
    Variables,
}

impl EndpointMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointMode::Paths => "paths",
            EndpointMode::Variables => "variables",
        }
    }
}

impl fmt::Display for EndpointMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointMode {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paths" | "path" => Ok(EndpointMode::Paths),
            "variables" | "vars" => Ok(EndpointMode::Variables),
            other => Err(RuntimeError::ConfigError(format!(
                "unknown endpoint mode '{other}'; expected 'paths' or 'variables'"
            ))),
        }
    }
}

/// Configuration for the graph runtime.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Directory holding `main.cnx`, `init.idx`/`init.db` and `attr.idx`/`attr.db`.
    pub model_path: PathBuf,
    /// Memory budget for all tensors (human-readable, e.g., `"256K"`).
    pub memory_budget: String,
    /// Meaning of the graph's `start`/`stop` lists.
    #[serde(default)]
    pub endpoints: EndpointMode,
    /// Upper bound on paths executing at once. `Some(1)` runs paths one at
    /// a time in a deterministic order.
    #[serde(default)]
    pub max_parallel_paths: Option<usize>,
    /// Number of worker threads (defaults to number of online CPU cores).
    pub num_threads: Option<usize>,
    /// Whether to record per-path metrics.
    #[serde(default = "default_true")]
    pub enable_profiling: bool,
}

fn default_true() -> bool {
    true
}

impl RuntimeConfig {
    /// Creates the default configuration for a model directory.
    pub fn for_model(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            ..Default::default()
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Parses the memory budget string into a [`MemoryBudget`].
    pub fn parse_budget(&self) -> Result<MemoryBudget, RuntimeError> {
        MemoryBudget::parse(&self.memory_budget)
            .map_err(|e| RuntimeError::ConfigError(format!("invalid budget: {e}")))
    }

    /// Resolves the number of worker threads.
    pub fn resolve_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// Resolves the path concurrency limit (at least 1).
    pub fn resolve_parallel_paths(&self) -> usize {
        self.max_parallel_paths
            .unwrap_or_else(|| self.resolve_threads())
            .max(1)
    }

    /// Rejects settings that cannot work at all.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        self.parse_budget()?;
        if self.max_parallel_paths == Some(0) {
            return Err(RuntimeError::ConfigError(
                "max_parallel_paths must be at least 1".into(),
            ));
        }
        if self.num_threads == Some(0) {
            return Err(RuntimeError::ConfigError(
                "num_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./model"),
            memory_budget: "64M".to_string(),
            endpoints: EndpointMode::Paths,
            max_parallel_paths: None,
            num_threads: None,
            enable_profiling: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = RuntimeConfig::default();
        assert_eq!(c.memory_budget, "64M");
        assert_eq!(c.endpoints, EndpointMode::Paths);
        assert!(c.enable_profiling);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_parse_budget() {
        let c = RuntimeConfig {
            memory_budget: "256K".into(),
            ..Default::default()
        };
        assert_eq!(c.parse_budget().unwrap().as_bytes(), 256 * 1024);

        let bad = RuntimeConfig {
            memory_budget: "lots".into(),
            ..Default::default()
        };
        assert!(matches!(bad.parse_budget(), Err(RuntimeError::ConfigError(_))));
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
model_path = "/tmp/model"
memory_budget = "1M"
endpoints = "variables"
max_parallel_paths = 2
num_threads = 2
enable_profiling = false
"#;
        let c = RuntimeConfig::from_toml(toml).unwrap();
        assert_eq!(c.model_path, PathBuf::from("/tmp/model"));
        assert_eq!(c.memory_budget, "1M");
        assert_eq!(c.endpoints, EndpointMode::Variables);
        assert_eq!(c.max_parallel_paths, Some(2));
        assert_eq!(c.num_threads, Some(2));
        assert!(!c.enable_profiling);
    }

    #[test]
    fn test_from_toml_defaults() {
        let c = RuntimeConfig::from_toml("model_path = \"m\"\nmemory_budget = \"64K\"\n").unwrap();
        assert_eq!(c.endpoints, EndpointMode::Paths);
        assert_eq!(c.max_parallel_paths, None);
        assert!(c.enable_profiling);
    }

    #[test]
    fn test_unknown_endpoint_mode_rejected() {
        let toml = "model_path = \"m\"\nmemory_budget = \"1M\"\nendpoints = \"both\"\n";
        assert!(RuntimeConfig::from_toml(toml).is_err());
        assert!("both".parse::<EndpointMode>().is_err());
        assert_eq!("Variables".parse::<EndpointMode>().unwrap(), EndpointMode::Variables);
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = RuntimeConfig {
            endpoints: EndpointMode::Variables,
            max_parallel_paths: Some(3),
            ..Default::default()
        };
        let back = RuntimeConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back.endpoints, EndpointMode::Variables);
        assert_eq!(back.max_parallel_paths, Some(3));
        assert_eq!(back.memory_budget, c.memory_budget);
    }

    #[test]
    fn test_resolve_threads_and_parallelism() {
        let c = RuntimeConfig {
            num_threads: Some(8),
            ..Default::default()
        };
        assert_eq!(c.resolve_threads(), 8);
        assert_eq!(c.resolve_parallel_paths(), 8);

        let c2 = RuntimeConfig {
            max_parallel_paths: Some(1),
            ..Default::default()
        };
        assert_eq!(c2.resolve_parallel_paths(), 1);
        assert!(RuntimeConfig::default().resolve_threads() >= 1);
    }

    #[test]
    fn test_validate_rejects_zero_parallelism() {
        let c = RuntimeConfig {
            max_parallel_paths: Some(0),
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }
}
