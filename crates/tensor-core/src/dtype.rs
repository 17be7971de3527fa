// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Supported tensor element data types.
//!
//! The numeric tags are the ONNX `TensorProto.DataType` values. They are the
//! tags stored in the initializer database and encoded in tensor file names,
//! so they must never be renumbered.

/// Enumerates the element types a [`crate::Tensor`] can hold.
///
/// The runtime uses `DType` to size buffers, to decode database records and
/// to decide which kernels apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DType {
    /// Tag 0. Never valid for a tensor.
    Undefined,
    /// 32-bit IEEE 754 floating point.
    F32,
    U8,
    I8,
    U16,
    I16,
    I32,
    I64,
    /// Tag 8. Variable-length strings are not representable in a flat buffer.
    String,
    /// One byte per element, 0 or 1.
    Bool,
    /// 16-bit IEEE 754 floating point.
    F16,
    /// 64-bit IEEE 754 floating point.
    F64,
    U32,
    U64,
    /// Pair of `f32` (real, imaginary).
    C64,
    /// Pair of `f64` (real, imaginary).
    C128,
    /// 16-bit brain floating point.
    BF16,
}

impl DType {
    /// Every type, in tag order.
    pub const ALL: [DType; 17] = [
        DType::Undefined,
        DType::F32,
        DType::U8,
        DType::I8,
        DType::U16,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::String,
        DType::Bool,
        DType::F16,
        DType::F64,
        DType::U32,
        DType::U64,
        DType::C64,
        DType::C128,
        DType::BF16,
    ];

    /// Looks up a type by its ONNX tag.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::DType;
    /// assert_eq!(DType::from_tag(1), Some(DType::F32));
    /// assert_eq!(DType::from_tag(7), Some(DType::I64));
    /// assert_eq!(DType::from_tag(99), None);
    /// ```
    pub fn from_tag(tag: u32) -> Option<DType> {
        Self::ALL.get(tag as usize).copied()
    }

    /// Returns the ONNX tag.
    pub fn tag(self) -> u32 {
        match self {
            DType::Undefined => 0,
            DType::F32 => 1,
            DType::U8 => 2,
            DType::I8 => 3,
            DType::U16 => 4,
            DType::I16 => 5,
            DType::I32 => 6,
            DType::I64 => 7,
            DType::String => 8,
            DType::Bool => 9,
            DType::F16 => 10,
            DType::F64 => 11,
            DType::U32 => 12,
            DType::U64 => 13,
            DType::C64 => 14,
            DType::C128 => 15,
            DType::BF16 => 16,
        }
    }

    /// Returns the size of a single element in bytes.
    ///
    /// `Undefined` and `String` have no fixed width and report 0.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::Undefined | DType::String => 0,
            DType::U8 | DType::I8 | DType::Bool => 1,
            DType::U16 | DType::I16 | DType::F16 | DType::BF16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 | DType::F64 | DType::C64 => 8,
            DType::C128 => 16,
        }
    }

    /// Returns `true` if tensors of this type can be allocated.
    pub fn is_supported(self) -> bool {
        self.size_bytes() > 0
    }

    /// Returns a human-readable label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::Undefined => "undefined",
            DType::F32 => "f32",
            DType::U8 => "u8",
            DType::I8 => "i8",
            DType::U16 => "u16",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::String => "string",
            DType::Bool => "bool",
            DType::F16 => "f16",
            DType::F64 => "f64",
            DType::U32 => "u32",
            DType::U64 => "u64",
            DType::C64 => "c64",
            DType::C128 => "c128",
            DType::BF16 => "bf16",
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
