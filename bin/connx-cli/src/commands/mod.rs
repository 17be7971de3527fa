// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommands and the helpers they share.

pub mod benchmark;
pub mod inspect;
pub mod run;

use anyhow::Context;
use memory_manager::MemoryPool;
use runtime::{EndpointMode, RuntimeConfig};
use std::path::{Path, PathBuf};
use tensor_core::Tensor;
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Reads the `--config` file, or starts from defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(path) => {
            let config = RuntimeConfig::from_file(path)?;
            tracing::info!("config loaded from {}", path.display());
            Ok(config)
        }
        None => Ok(RuntimeConfig::default()),
    }
}

/// Command-line values that replace config file entries.
#[derive(Default)]
pub struct Overrides {
    pub model: Option<PathBuf>,
    pub budget: Option<String>,
    pub endpoints: Option<EndpointMode>,
    pub parallel: Option<usize>,
}

impl Overrides {
    pub fn apply(self, mut config: RuntimeConfig) -> RuntimeConfig {
        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(budget) = self.budget {
            config.memory_budget = budget;
        }
        if let Some(endpoints) = self.endpoints {
            config.endpoints = endpoints;
        }
        if self.parallel.is_some() {
            config.max_parallel_paths = self.parallel;
        }
        config
    }
}

/// Splits `SLOT=FILE`.
pub fn parse_binding(binding: &str) -> anyhow::Result<(u32, PathBuf)> {
    let (slot, file) = binding
        .split_once('=')
        .with_context(|| format!("input '{binding}' is not SLOT=FILE"))?;
    let slot = slot
        .trim()
        .parse()
        .with_context(|| format!("input '{binding}': slot must be a number"))?;
    Ok((slot, PathBuf::from(file.trim())))
}

/// Loads every `SLOT=FILE` binding into `pool`.
pub fn load_inputs(bindings: &[String], pool: &MemoryPool) -> anyhow::Result<Vec<(u32, Tensor)>> {
    bindings
        .iter()
        .map(|binding| {
            let (slot, path) = parse_binding(binding)?;
            let (header, tensor) = runtime::load_tensor_file(&path, pool)?;
            tracing::info!("input {slot} <- {} {:?}", header.name, tensor);
            Ok((slot, tensor))
        })
        .collect()
}

/// Truncates a string with ellipsis.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binding() {
        let (slot, path) = parse_binding("9=input_1_2_1_784.data").unwrap();
        assert_eq!(slot, 9);
        assert_eq!(path, PathBuf::from("input_1_2_1_784.data"));
        assert!(parse_binding("input.data").is_err());
        assert!(parse_binding("x=input.data").is_err());
    }

    #[test]
    fn test_overrides_replace_config() {
        let base = RuntimeConfig {
            memory_budget: "1M".into(),
            max_parallel_paths: Some(4),
            ..Default::default()
        };
        let config = Overrides {
            budget: Some("256K".into()),
            endpoints: Some(EndpointMode::Variables),
            ..Default::default()
        }
        .apply(base);
        assert_eq!(config.memory_budget, "256K");
        assert_eq!(config.endpoints, EndpointMode::Variables);
        assert_eq!(config.max_parallel_paths, Some(4));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a fairly long line", 10), "a fairl...");
    }
}
