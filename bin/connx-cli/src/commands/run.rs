// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `connx run` command: load a model, bind inputs and run the graph once.

use runtime::{Backend, RuntimeConfig};
use std::path::PathBuf;

/// Outputs with more elements than this are summarised instead of dumped.
const DUMP_LIMIT: usize = 64;

pub async fn execute(
    config: RuntimeConfig,
    inputs: Vec<String>,
    output_dir: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║                 connx · Graph Runner                 ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    println!("  Model:      {}", config.model_path.display());
    println!("  Budget:     {}", config.memory_budget);
    println!("  Endpoints:  {}", config.endpoints);
    println!("  Parallel:   {} paths", config.resolve_parallel_paths());
    println!();

    // ── Load ───────────────────────────────────────────────────
    let model_path = config.model_path.clone();
    let backend = Backend::open(config).map_err(|e| {
        anyhow::anyhow!("failed to load model from '{}': {e}", model_path.display())
    })?;
    println!(
        "  Loaded: opset {}, {} paths, {} variables ({} initializers), {} attributes",
        backend.opset(),
        backend.graph().num_paths(),
        backend.variable_count(),
        backend.initializer_count(),
        backend.attribute_count(),
    );

    let bound = super::load_inputs(&inputs, backend.pool())?;
    for (slot, tensor) in &bound {
        println!("  Input {slot:>4}: {tensor:?}");
    }
    println!();

    // ── Execute ────────────────────────────────────────────────
    let result = backend.run(&bound).await?;

    println!("  Outputs:");
    for (id, tensor) in &result.outputs {
        println!("   variable {id}: {tensor:?}");
        if tensor.num_elements() <= DUMP_LIMIT {
            println!("{tensor}");
        }
    }
    if result.outputs.is_empty() {
        println!("   (none)");
    }
    println!();

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(&dir)?;
        for (id, tensor) in &result.outputs {
            let path = runtime::save_tensor_file(&dir, &format!("output{id}"), tensor)?;
            println!("  Wrote {}", path.display());
        }
        println!();
    }

    // ── Metrics ────────────────────────────────────────────────
    if json {
        println!("{}", serde_json::to_string_pretty(&result.metrics)?);
    } else {
        println!("  {}", result.metrics.summary());
        if let Some(slowest) = result.metrics.slowest_path() {
            println!(
                "  Slowest path: {} ({} calls, {:.2}ms)",
                slowest.path,
                slowest.calls,
                slowest.duration.as_secs_f64() * 1000.0,
            );
        }
        println!("  {}", backend.pool().stats().summary());
    }

    Ok(())
}
