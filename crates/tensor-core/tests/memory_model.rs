// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor lifetime tests against pool accounting.

use memory_manager::{MemoryBudget, MemoryPool};
use std::sync::Arc;
use std::thread;
use tensor_core::{DType, NdIterator, Shape, Tensor};

fn assert_balanced(pool: &MemoryPool) {
    let stats = pool.stats();
    assert_eq!(pool.allocated_bytes(), 0, "bytes leaked: {}", stats.summary());
    assert_eq!(stats.total_allocations, stats.total_deallocations);
}

#[test]
fn deep_copy_matches_bit_for_bit() {
    let pool = MemoryPool::new(MemoryBudget::from_kb(16));
    {
        let shape = Shape::new(vec![2, 3, 5]);
        let src = Tensor::allocate(&pool, DType::U16, shape.clone()).unwrap();
        let mut it = NdIterator::full(&shape);
        let mut n = 0u16;
        while it.advance() {
            src.set(&it, &(n.wrapping_mul(257)).to_ne_bytes()).unwrap();
            n += 1;
        }

        let copy = src.deep_copy().unwrap();
        assert_eq!(copy.dtype(), src.dtype());
        assert_eq!(copy.shape(), src.shape());
        let a = src.with_bytes(<[u8]>::to_vec);
        let b = copy.with_bytes(<[u8]>::to_vec);
        assert_eq!(a, b);
        assert_eq!(src.ref_count(), 1);
        assert_eq!(copy.ref_count(), 1);
    }
    assert_balanced(&pool);
}

#[test]
fn view_chain_released_in_every_order() {
    // Three handles: root, view of root, view of view. Every drop order
    // must release the single buffer exactly once.
    let orders: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    for order in orders {
        let pool = MemoryPool::new(MemoryBudget::from_kb(4));
        let root = Tensor::allocate(&pool, DType::F32, Shape::new(vec![2, 2, 4])).unwrap();
        let v1 = root.reshape(Shape::matrix(4, 4)).unwrap();
        let v2 = v1.reshape(Shape::vector(16)).unwrap();

        let mut handles: Vec<Option<Tensor>> = vec![Some(root), Some(v1), Some(v2)];
        for (step, &i) in order.iter().enumerate() {
            handles[i] = None;
            if step < 2 {
                assert_eq!(pool.allocated_bytes(), 64, "order {order:?}");
            }
        }
        assert_balanced(&pool);
    }
}

#[test]
fn concurrent_clone_and_drop() {
    let pool = MemoryPool::new(MemoryBudget::from_kb(4));
    let root = Tensor::allocate(&pool, DType::F32, Shape::vector(64)).unwrap();
    let shared = Arc::new(root.reshape(Shape::matrix(8, 8)).unwrap());
    drop(root);

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for _ in 0..1000 {
                    let handle = (*shared).clone();
                    let flat = handle.reshape(Shape::vector(64)).unwrap();
                    drop(handle);
                    drop(flat);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(shared.ref_count(), 1);
    drop(shared);
    assert_balanced(&pool);
}

#[test]
fn set_get_round_trip_across_ranks() {
    let pool = MemoryPool::unbounded();
    for dims in [vec![7], vec![3, 5], vec![2, 2, 3, 2]] {
        let shape = Shape::new(dims);
        let t = Tensor::allocate(&pool, DType::F64, shape.clone()).unwrap();
        let mut it = NdIterator::full(&shape);

        let mut expected = Vec::new();
        let mut k = 0.0f64;
        while it.advance() {
            t.set(&it, &k.to_ne_bytes()).unwrap();
            expected.push(k);
            k += 0.5;
        }

        let mut read = Vec::new();
        let mut out = [0u8; 8];
        while it.advance() {
            t.get(&it, &mut out).unwrap();
            read.push(f64::from_ne_bytes(out));
        }
        assert_eq!(read, expected);
    }
}
