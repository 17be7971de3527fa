// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: stream batches through a small two-layer perceptron.
//!
//! The model is assembled in memory, loaded under a tight budget, and run
//! once per input batch. Intermediates are released by `delete` calls and
//! the `clean` list, so pool usage returns to the weights after each run.
//!
//! ```bash
//! cargo run -p runtime --example streaming_graph
//! ```

use memory_manager::{MemoryBudget, MemoryPool};
use runtime::{EndpointMode, ModelBuilder};
use tensor_core::{Shape, Tensor};

/// x(5) → MatMul W1(0) + b1(1) → Relu → MatMul W2(2) + b2(3) → Softmax(4 axis)
const GRAPH: &str = "\
opset 13
paths 2
initializers 4
variables 5
start 5
stop 8
clean 5 8
path 0
output_paths 1
calls 3
call MatMul 1 2 0 6 5 0
call Add 1 2 0 6 6 1
call Relu 1 1 0 6 6
outputs
path 1
input_paths 0
calls 3
call MatMul 1 2 0 7 6 2
delete 6
call Add 1 2 0 7 7 3
call Softmax 1 1 1 8 7 0
delete 7
outputs
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let (input, hidden, classes) = (8usize, 16usize, 4usize);
    let w1: Vec<f32> = (0..input * hidden).map(|i| ((i % 5) as f32 - 2.0) * 0.1).collect();
    let w2: Vec<f32> = (0..hidden * classes).map(|i| ((i % 3) as f32 - 1.0) * 0.2).collect();

    let pool = MemoryPool::new(MemoryBudget::from_kb(16));
    let backend = ModelBuilder::new(GRAPH)
        .initializer_f32(&[input, hidden], &w1)
        .initializer_f32(&[1, hidden], &[0.05; 16])
        .initializer_f32(&[hidden, classes], &w2)
        .initializer_f32(&[1, classes], &[0.0; 4])
        .attribute(&(-1i32).to_le_bytes())
        .endpoints(EndpointMode::Variables)
        .build_in(pool.clone())?;
    println!("{}", backend.graph().summary());
    println!("weights resident: {} bytes\n", pool.allocated_bytes());

    let rt = tokio::runtime::Builder::new_multi_thread().build()?;
    for batch in 0..5 {
        let x: Vec<f32> = (0..input).map(|i| (i + batch) as f32 * 0.25).collect();
        let x = Tensor::from_f32(&pool, Shape::matrix(1, input), &x)?;

        let out = rt.block_on(backend.run(&[(5, x)]))?;
        let probs = out.output(8).ok_or("missing output")?.to_f32_vec()?;
        println!("batch {batch}: {probs:.3?}");
        println!("  {}", out.metrics.summary());
    }

    println!("\n{}", pool.stats().summary());
    Ok(())
}
