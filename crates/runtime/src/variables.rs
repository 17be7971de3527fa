// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The variable table: one optional tensor handle per slot.
//!
//! Slots `0..initializer_count` hold initializers after load; the rest are
//! filled by callers and operators during a run. Each slot has its own
//! mutex, so independent paths never contend on the table itself.

use std::collections::TryReserveError;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tensor_core::Tensor;

/// A variable id outside the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("variable {id} out of range (table has {count} slots)")]
pub struct SlotOutOfRange {
    pub id: u32,
    pub count: u32,
}

/// Fixed-size table of tensor slots.
pub struct VariableTable {
    slots: Vec<Mutex<Option<Tensor>>>,
}

impl VariableTable {
    /// Creates `count` empty slots.
    pub fn new(count: u32) -> Self {
        Self {
            slots: (0..count).map(|_| Mutex::new(None)).collect(),
        }
    }

    /// Like [`new`](Self::new), but reports a failed allocation instead of
    /// aborting. `count` comes from model files.
    pub fn try_new(count: u32) -> Result<Self, TryReserveError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(count as usize)?;
        slots.extend((0..count).map(|_| Mutex::new(None)));
        Ok(Self { slots })
    }

    /// Bytes of slot storage a `count`-slot table needs.
    pub fn footprint(count: u32) -> usize {
        (count as usize).saturating_mul(std::mem::size_of::<Mutex<Option<Tensor>>>())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, id: u32) -> Result<MutexGuard<'_, Option<Tensor>>, SlotOutOfRange> {
        self.slots
            .get(id as usize)
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner))
            .ok_or(SlotOutOfRange {
                id,
                count: self.slots.len() as u32,
            })
    }

    /// Returns a new handle to the tensor in slot `id`, if any.
    pub fn get(&self, id: u32) -> Option<Tensor> {
        self.slot(id).ok().and_then(|slot| slot.clone())
    }

    pub fn is_set(&self, id: u32) -> bool {
        self.slot(id).map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Stores `tensor` in slot `id` and returns the previous occupant.
    pub fn set(&self, id: u32, tensor: Tensor) -> Result<Option<Tensor>, SlotOutOfRange> {
        Ok(self.slot(id)?.replace(tensor))
    }

    /// Empties slot `id`, handing back its tensor.
    pub fn take(&self, id: u32) -> Option<Tensor> {
        self.slot(id).ok().and_then(|mut slot| slot.take())
    }

    /// Number of populated slots.
    pub fn populated(&self) -> usize {
        (0..self.slots.len() as u32).filter(|&id| self.is_set(id)).count()
    }

    /// Empties every slot.
    pub fn clear(&self) {
        for id in 0..self.slots.len() as u32 {
            drop(self.take(id));
        }
    }
}

impl std::fmt::Debug for VariableTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableTable")
            .field("slots", &self.slots.len())
            .field("populated", &self.populated())
            .finish()
    }
}
