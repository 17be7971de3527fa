// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # connx
//!
//! Command-line interface for the connx graph runtime.
//!
//! ## Usage
//! ```bash
//! # Run a model with one bound input
//! connx run --model ./models/mnist --input 9=input_1_2_1_784.data
//!
//! # Inspect graph structure and initializer memory
//! connx inspect --model ./models/mnist
//!
//! # Benchmark across memory budgets
//! connx benchmark --model ./models/mnist --sweep-memory 256K,1M,4M
//! ```

mod commands;

use clap::{Parser, Subcommand};
use runtime::EndpointMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "connx",
    about = "Memory-bounded runtime for connx path graphs",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (flags override its values).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a model, bind inputs and run the graph once.
    Run {
        /// Path to the model directory.
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Memory budget (e.g., "256K", "64M").
        #[arg(short, long)]
        budget: Option<String>,

        /// How start/stop are read: paths or variables.
        #[arg(short, long)]
        endpoints: Option<EndpointMode>,

        /// Bind a tensor file to a variable slot (repeatable).
        #[arg(short, long = "input", value_name = "SLOT=FILE")]
        inputs: Vec<String>,

        /// Maximum number of paths executing at once.
        #[arg(short, long)]
        parallel: Option<usize>,

        /// Write each output as a tensor file into this directory.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Print run metrics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Benchmark repeated runs, optionally across memory budgets.
    Benchmark {
        /// Path to the model directory.
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Timed runs per configuration.
        #[arg(short = 'n', long, default_value_t = 10)]
        iterations: usize,

        /// Comma-separated memory budgets to sweep (e.g., "256K,1M,4M").
        #[arg(long)]
        sweep_memory: Option<String>,

        /// Bind a tensor file to a variable slot (repeatable).
        #[arg(short, long = "input", value_name = "SLOT=FILE")]
        inputs: Vec<String>,

        /// Maximum number of paths executing at once.
        #[arg(short, long)]
        parallel: Option<usize>,
    },

    /// Inspect a model: header, path table, endpoints and initializer memory.
    Inspect {
        /// Path to the model directory.
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    let base = commands::load_config(cli.config.as_deref())?;
    let threads = base.resolve_threads();
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(threads)
        .max_blocking_threads(threads)
        .enable_all()
        .build()?;

    rt.block_on(async move {
        match cli.command {
            Commands::Run {
                model,
                budget,
                endpoints,
                inputs,
                parallel,
                output_dir,
                json,
            } => {
                let config = commands::Overrides {
                    model,
                    budget,
                    endpoints,
                    parallel,
                }
                .apply(base);
                commands::run::execute(config, inputs, output_dir, json).await
            }
            Commands::Benchmark {
                model,
                iterations,
                sweep_memory,
                inputs,
                parallel,
            } => {
                let config = commands::Overrides {
                    model,
                    parallel,
                    ..Default::default()
                }
                .apply(base);
                commands::benchmark::execute(config, iterations, sweep_memory, inputs).await
            }
            Commands::Inspect { model, json } => {
                let config = commands::Overrides {
                    model,
                    ..Default::default()
                }
                .apply(base);
                commands::inspect::execute(config, json).await
            }
        }
    })
}
