// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `connx inspect` command: display graph structure and memory estimates.
//!
//! Reads `main.cnx` and the initializer index without allocating any
//! tensors, so it works on models larger than the intended budget.

use graph_ir::GraphSummary;
use memory_manager::padded_size;
use runtime::store::{DirectoryStore, ModelStore, GRAPH_FILE};
use runtime::{OperatorRegistry, RuntimeConfig, WeightLoader};

#[derive(serde::Serialize)]
struct InitializerRow {
    id: u32,
    dtype: String,
    shape: Vec<usize>,
    bytes: usize,
    padded_bytes: usize,
}

#[derive(serde::Serialize)]
struct InspectReport {
    graph: GraphSummary,
    initializers: Vec<InitializerRow>,
    initializer_bytes: usize,
    unknown_operators: Vec<String>,
}

pub async fn execute(config: RuntimeConfig, json: bool) -> anyhow::Result<()> {
    let model = &config.model_path;
    let store = DirectoryStore::new(model);

    let text = store.load(GRAPH_FILE)?;
    let text = std::str::from_utf8(&text)
        .map_err(|e| anyhow::anyhow!("{GRAPH_FILE} is not UTF-8: {e}"))?;
    let graph = graph_ir::parse(text)
        .and_then(|g| g.validate())
        .map_err(|e| anyhow::anyhow!("failed to load graph from '{}': {e}", model.display()))?;

    let loader = WeightLoader::open(&store)?;
    let initializers = (0..graph.initializer_count)
        .map(|id| {
            let info = loader.info(id)?;
            Ok(InitializerRow {
                id,
                dtype: info.dtype.to_string(),
                shape: info.shape.dims().to_vec(),
                bytes: info.size_bytes(),
                padded_bytes: padded_size(info.size_bytes()),
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let initializer_bytes: usize = initializers.iter().map(|r| r.padded_bytes).sum();

    let registry = OperatorRegistry::with_builtins();
    let mut unknown_operators: Vec<String> = graph
        .iter_paths()
        .flat_map(|p| p.calls.iter())
        .filter(|c| !c.kind.is_delete() && !registry.contains(c.kind.op_name()))
        .map(|c| c.kind.op_name().to_string())
        .collect();
    unknown_operators.sort();
    unknown_operators.dedup();

    if json {
        let report = InspectReport {
            graph: graph.summary_data(),
            initializers,
            initializer_bytes,
            unknown_operators,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║                connx · Graph Inspector               ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    // ── Summary ────────────────────────────────────────────────
    println!("  Model: {}", model.display());
    println!("  {}", graph.summary());
    println!("  Start: {:?}", graph.start);
    println!("  Stop:  {:?}", graph.stop);
    println!("  Clean: {:?}", graph.clean);
    println!();

    // ── Paths ──────────────────────────────────────────────────
    println!("  Paths:");
    for path in graph.iter_paths() {
        println!("   {}", path.summary());
    }
    println!();

    // ── Initializers ───────────────────────────────────────────
    println!("  {:<6} {:<6} {:<28} {:>12}", "Id", "DType", "Shape", "Memory");
    println!("  {}", "-".repeat(56));
    for row in &initializers {
        println!(
            "  {:<6} {:<6} {:<28} {:>9.1} KB",
            row.id,
            row.dtype,
            super::truncate(&format!("{:?}", row.shape), 28),
            row.padded_bytes as f64 / 1024.0,
        );
    }
    println!();
    println!(
        "  Minimum budget for initializers: {:.2} MB",
        initializer_bytes as f64 / (1024.0 * 1024.0),
    );

    if !unknown_operators.is_empty() {
        println!();
        println!("  Operators without an implementation:");
        for name in &unknown_operators {
            println!("   {name}");
        }
    }

    Ok(())
}
