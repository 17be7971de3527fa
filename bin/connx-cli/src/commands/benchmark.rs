// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `connx benchmark` command: time repeated runs across memory budgets.

use runtime::{Backend, RuntimeConfig};
use std::time::Duration;

struct BudgetResult {
    budget: String,
    mean: Duration,
    min: Duration,
    max: Duration,
    peak_bytes: usize,
    hit_ratio: f64,
}

pub async fn execute(
    config: RuntimeConfig,
    iterations: usize,
    sweep_memory: Option<String>,
    inputs: Vec<String>,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║                connx · Benchmark Suite               ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let budgets: Vec<String> = match sweep_memory {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => vec![config.memory_budget.clone()],
    };
    let iterations = iterations.max(1);

    println!("  Model:      {}", config.model_path.display());
    println!("  Iterations: {iterations}");
    println!("  Parallel:   {} paths", config.resolve_parallel_paths());
    println!();

    println!(
        "  {:<10} {:>10} {:>10} {:>10} {:>12} {:>8}",
        "Budget", "Mean", "Min", "Max", "Peak", "Reuse",
    );
    println!("  {}", "-".repeat(66));

    let mut results = Vec::new();
    for budget in budgets {
        let config = RuntimeConfig {
            memory_budget: budget.clone(),
            ..config.clone()
        };
        match bench_budget(config, iterations, &inputs).await {
            Ok(r) => {
                println!(
                    "  {:<10} {:>8.2}ms {:>8.2}ms {:>8.2}ms {:>9.1} KB {:>7.1}%",
                    r.budget,
                    ms(r.mean),
                    ms(r.min),
                    ms(r.max),
                    r.peak_bytes as f64 / 1024.0,
                    r.hit_ratio * 100.0,
                );
                results.push(r);
            }
            Err(e) => {
                println!("  {budget:<10} FAILED: {e}");
            }
        }
    }
    println!();

    // ── Summary ────────────────────────────────────────────────
    if let Some(fastest) = results.iter().min_by_key(|r| r.mean) {
        println!("  Fastest:   {} ({:.2}ms mean)", fastest.budget, ms(fastest.mean));
    }
    if let Some(leanest) = results.iter().min_by_key(|r| r.peak_bytes) {
        println!(
            "  Smallest:  {} ({:.1} KB peak)",
            leanest.budget,
            leanest.peak_bytes as f64 / 1024.0,
        );
    }

    Ok(())
}

async fn bench_budget(
    config: RuntimeConfig,
    iterations: usize,
    inputs: &[String],
) -> anyhow::Result<BudgetResult> {
    let budget = config.memory_budget.clone();
    let backend = Backend::open(config)?;
    let bound = super::load_inputs(inputs, backend.pool())?;

    // Warm-up fills the pool's free lists.
    backend.run(&bound).await?;
    let warm = backend.pool().stats();

    let mut timings = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let result = backend.run(&bound).await?;
        timings.push(result.metrics.total_duration);
    }

    let total: Duration = timings.iter().sum();
    let stats = backend.pool().stats().since(&warm);
    Ok(BudgetResult {
        budget,
        mean: total / timings.len() as u32,
        min: timings.iter().copied().min().unwrap_or_default(),
        max: timings.iter().copied().max().unwrap_or_default(),
        peak_bytes: stats.peak_allocated_bytes,
        hit_ratio: stats.cache_hit_ratio(),
    })
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
