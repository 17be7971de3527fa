// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `Delete` and the reference operator set.
//!
//! The math lives in [`tensor_core::ops`]; these wrappers bind variable
//! slots, decode attributes and pick output tensors.

use crate::operator::{Arity, CallContext, Operator, OperatorRegistry};
use crate::OperatorError;
use tensor_core::{ops, DType, Shape, Tensor, TensorError};

pub(crate) fn register_all(registry: &mut OperatorRegistry) {
    registry.register(Delete);
    registry.register(Identity);
    registry.register(Add);
    registry.register(Mul);
    registry.register(Relu);
    registry.register(Reshape);
    registry.register(MatMul);
    registry.register(Softmax);
}

/// Empties every input slot. The buffer is released once no other handle
/// (another slot, a view) refers to it.
pub struct Delete;

impl Operator for Delete {
    fn name(&self) -> &str {
        "Delete"
    }

    fn arity(&self) -> Arity {
        Arity {
            outputs: 0..=0,
            inputs: 1..=usize::MAX,
            attributes: 0..=0,
        }
    }

    fn execute(&self, ctx: &CallContext<'_>) -> Result<(), OperatorError> {
        for &id in ctx.inputs {
            if let Some(tensor) = ctx.variables.take(id) {
                tracing::trace!("delete: variable {id} (refs {})", tensor.ref_count());
            }
        }
        Ok(())
    }
}

/// Binds the output slot to the input tensor without copying.
pub struct Identity;

impl Operator for Identity {
    fn name(&self) -> &str {
        "Identity"
    }

    fn arity(&self) -> Arity {
        Arity::exact(1, 1, 0)
    }

    fn execute(&self, ctx: &CallContext<'_>) -> Result<(), OperatorError> {
        let input = ctx.input(0)?;
        ctx.set_output(0, input)
    }
}

pub struct Add;

impl Operator for Add {
    fn name(&self) -> &str {
        "Add"
    }

    fn arity(&self) -> Arity {
        Arity::exact(1, 2, 0)
    }

    fn execute(&self, ctx: &CallContext<'_>) -> Result<(), OperatorError> {
        let (lhs, rhs) = (ctx.input(0)?, ctx.input(1)?);
        let out = ctx.output(0, lhs.dtype(), lhs.shape())?;
        Ok(ops::add(&lhs, &rhs, &out)?)
    }
}

pub struct Mul;

impl Operator for Mul {
    fn name(&self) -> &str {
        "Mul"
    }

    fn arity(&self) -> Arity {
        Arity::exact(1, 2, 0)
    }

    fn execute(&self, ctx: &CallContext<'_>) -> Result<(), OperatorError> {
        let (lhs, rhs) = (ctx.input(0)?, ctx.input(1)?);
        let out = ctx.output(0, lhs.dtype(), lhs.shape())?;
        Ok(ops::mul(&lhs, &rhs, &out)?)
    }
}

pub struct Relu;

impl Operator for Relu {
    fn name(&self) -> &str {
        "Relu"
    }

    fn arity(&self) -> Arity {
        Arity::exact(1, 1, 0)
    }

    fn execute(&self, ctx: &CallContext<'_>) -> Result<(), OperatorError> {
        let input = ctx.input(0)?;
        let out = ctx.output(0, input.dtype(), input.shape())?;
        Ok(ops::relu(&input, &out)?)
    }
}

/// `Reshape(data, shape)`: a zero-copy view of `data`.
///
/// `shape` is an `I64` tensor. An entry of `0` copies the matching
/// dimension of `data` and a single `-1` is inferred from the element
/// count.
pub struct Reshape;

impl Operator for Reshape {
    fn name(&self) -> &str {
        "Reshape"
    }

    fn arity(&self) -> Arity {
        Arity::exact(1, 2, 0)
    }

    fn execute(&self, ctx: &CallContext<'_>) -> Result<(), OperatorError> {
        let data = ctx.input(0)?;
        let requested = ctx.input(1)?;
        if requested.dtype() != DType::I64 {
            return Err(TensorError::UnsupportedDType {
                op: "reshape (shape input)",
                dtype: requested.dtype(),
            }
            .into());
        }
        let target = resolve_shape(data.shape(), &requested.to_i64_vec()?)?;
        let view = data.reshape(target)?;
        ctx.set_output(0, view)
    }
}

fn resolve_shape(input: &Shape, requested: &[i64]) -> Result<Shape, OperatorError> {
    let mut dims = Vec::with_capacity(requested.len());
    let mut inferred = None;
    for (i, &d) in requested.iter().enumerate() {
        let dim = match d {
            -1 if inferred.is_some() => {
                return Err(OperatorError::Invalid(
                    "reshape: more than one -1 in target shape".into(),
                ))
            }
            -1 => {
                inferred = Some(i);
                1
            }
            0 => input.dim(i).ok_or_else(|| {
                OperatorError::Invalid(format!("reshape: 0 at axis {i} has no input dimension"))
            })?,
            d if d < 0 => {
                return Err(OperatorError::Invalid(format!(
                    "reshape: invalid extent {d} at axis {i}"
                )))
            }
            d => d as usize,
        };
        dims.push(dim);
    }
    let known = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| {
            OperatorError::Invalid(format!("reshape: target shape {requested:?} overflows"))
        })?;
    if let Some(axis) = inferred {
        let total = input.num_elements();
        if known == 0 || total % known != 0 {
            return Err(OperatorError::Invalid(format!(
                "reshape: cannot infer axis {axis} of {:?} from {total} elements",
                requested
            )));
        }
        dims[axis] = total / known;
    }
    Ok(Shape::new(dims))
}

/// 2-D `F32` matrix product.
pub struct MatMul;

impl Operator for MatMul {
    fn name(&self) -> &str {
        "MatMul"
    }

    fn arity(&self) -> Arity {
        Arity::exact(1, 2, 0)
    }

    fn execute(&self, ctx: &CallContext<'_>) -> Result<(), OperatorError> {
        let (lhs, rhs) = (ctx.input(0)?, ctx.input(1)?);
        let out_shape = matmul_shape(&lhs, &rhs)?;
        let out = ctx.output(0, DType::F32, &out_shape)?;
        Ok(ops::matmul(&lhs, &rhs, &out)?)
    }
}

fn matmul_shape(lhs: &Tensor, rhs: &Tensor) -> Result<Shape, TensorError> {
    if let Some(t) = [lhs, rhs].into_iter().find(|t| t.dtype() != DType::F32) {
        return Err(TensorError::UnsupportedDType {
            op: "matmul",
            dtype: t.dtype(),
        });
    }
    lhs.shape()
        .matmul_output(rhs.shape())
        .ok_or_else(|| TensorError::ShapeMismatch {
            op: "matmul",
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        })
}

/// Softmax along one axis. The optional attribute is an `i32` axis,
/// defaulting to the last one.
pub struct Softmax;

impl Operator for Softmax {
    fn name(&self) -> &str {
        "Softmax"
    }

    fn arity(&self) -> Arity {
        Arity {
            outputs: 1..=1,
            inputs: 1..=1,
            attributes: 0..=1,
        }
    }

    fn execute(&self, ctx: &CallContext<'_>) -> Result<(), OperatorError> {
        let axis = if ctx.attributes.is_empty() {
            -1
        } else {
            let attr = ctx.attribute(0)?;
            attr.read_i32(0).ok_or_else(|| OperatorError::Attribute {
                id: attr.id(),
                detail: format!("axis needs 4 bytes, found {}", attr.len()),
            })?
        };
        let input = ctx.input(0)?;
        let out = ctx.output(0, input.dtype(), input.shape())?;
        Ok(ops::softmax(&input, &out, i64::from(axis))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{encode_attributes, AttributeStore};
    use crate::store::Blob;
    use crate::variables::VariableTable;
    use memory_manager::MemoryPool;

    struct Fixture {
        pool: MemoryPool,
        variables: VariableTable,
        attrs: AttributeStore,
    }

    impl Fixture {
        fn new(slots: u32, attrs: &[&[u8]]) -> Self {
            let (index, data) = encode_attributes(attrs);
            Self {
                pool: MemoryPool::unbounded(),
                variables: VariableTable::new(slots),
                attrs: AttributeStore::from_blobs(&index, Blob::Shared(data.into())).unwrap(),
            }
        }

        fn f32(&self, id: u32, shape: Shape, values: &[f32]) -> Tensor {
            let t = Tensor::from_f32(&self.pool, shape, values).unwrap();
            self.variables.set(id, t.clone()).unwrap();
            t
        }

        fn run(
            &self,
            op: &dyn Operator,
            outputs: &[u32],
            inputs: &[u32],
            attributes: &[u32],
        ) -> Result<(), OperatorError> {
            op.arity()
                .check(outputs.len(), inputs.len(), attributes.len())
                .map_err(OperatorError::Invalid)?;
            op.execute(&CallContext {
                outputs,
                inputs,
                attributes,
                variables: &self.variables,
                attribute_store: &self.attrs,
                pool: &self.pool,
            })
        }

        fn values(&self, id: u32) -> Vec<f32> {
            self.variables.get(id).unwrap().to_f32_vec().unwrap()
        }
    }

    #[test]
    fn test_add_mul_relu_chain() {
        let fx = Fixture::new(4, &[]);
        fx.f32(0, Shape::vector(3), &[1.0, -2.0, 3.0]);
        fx.f32(1, Shape::vector(3), &[1.0, 1.0, 1.0]);

        fx.run(&Add, &[2], &[0, 1], &[]).unwrap();
        assert_eq!(fx.values(2), vec![2.0, -1.0, 4.0]);

        fx.f32(3, Shape::scalar(), &[2.0]);
        fx.run(&Mul, &[2], &[2, 3], &[]).unwrap();
        assert_eq!(fx.values(2), vec![4.0, -2.0, 8.0]);

        fx.run(&Relu, &[2], &[2], &[]).unwrap();
        assert_eq!(fx.values(2), vec![4.0, 0.0, 8.0]);
    }

    #[test]
    fn test_delete_releases_at_last_reference() {
        let fx = Fixture::new(1, &[]);
        let t = fx.f32(0, Shape::vector(4), &[1.0; 4]);
        drop(t);
        let before = fx.pool.allocated_bytes();
        assert!(before > 0);

        fx.run(&Delete, &[], &[0], &[]).unwrap();
        assert!(!fx.variables.is_set(0));
        assert_eq!(fx.pool.allocated_bytes(), 0);

        // Deleting an empty slot is a no-op.
        fx.run(&Delete, &[], &[0], &[]).unwrap();
        assert!(fx.run(&Delete, &[], &[], &[]).is_err());
    }

    #[test]
    fn test_identity_shares_tensor() {
        let fx = Fixture::new(2, &[]);
        let t = fx.f32(0, Shape::vector(2), &[5.0, 6.0]);
        fx.run(&Identity, &[1], &[0], &[]).unwrap();
        assert!(fx.variables.get(1).unwrap().ptr_eq(&t));
    }

    #[test]
    fn test_reshape_target_overflow_is_an_error() {
        let err = resolve_shape(&Shape::vector(4), &[1 << 40, 1 << 40, -1]).unwrap_err();
        assert!(matches!(err, OperatorError::Invalid(ref m) if m.contains("overflows")), "{err}");
        assert!(resolve_shape(&Shape::vector(4), &[1 << 40, 1 << 40]).is_err());

        let fx = Fixture::new(3, &[]);
        fx.f32(0, Shape::vector(4), &[0.0; 4]);
        let requested =
            Tensor::from_i64(&fx.pool, Shape::vector(3), &[1 << 40, 1 << 40, -1]).unwrap();
        fx.variables.set(1, requested).unwrap();
        assert!(fx.run(&Reshape, &[2], &[0, 1], &[]).is_err());
        assert!(!fx.variables.is_set(2));
    }

    #[test]
    fn test_reshape_view_with_inferred_dim() {
        let fx = Fixture::new(3, &[]);
        let data = fx.f32(0, Shape::matrix(2, 6), &[1.0; 12]);
        let requested = Tensor::from_i64(&fx.pool, Shape::vector(3), &[0, -1, 2]).unwrap();
        fx.variables.set(1, requested).unwrap();

        fx.run(&Reshape, &[2], &[0, 1], &[]).unwrap();
        let view = fx.variables.get(2).unwrap();
        assert!(view.is_view());
        assert_eq!(view.shape(), &Shape::new(vec![2, 3, 2]));
        assert!(view.shares_buffer(&data));
    }

    #[test]
    fn test_reshape_rejects_bad_target() {
        assert!(resolve_shape(&Shape::vector(6), &[-1, -1]).is_err());
        assert!(resolve_shape(&Shape::vector(6), &[4, -1]).is_err());
        assert!(resolve_shape(&Shape::vector(6), &[-3]).is_err());
        assert!(resolve_shape(&Shape::vector(6), &[1, 0]).is_err());
        assert_eq!(
            resolve_shape(&Shape::vector(6), &[3, -1]).unwrap(),
            Shape::matrix(3, 2)
        );

        let fx = Fixture::new(3, &[]);
        fx.f32(0, Shape::vector(6), &[0.0; 6]);
        fx.f32(1, Shape::vector(1), &[6.0]);
        let err = fx.run(&Reshape, &[2], &[0, 1], &[]).unwrap_err();
        assert!(matches!(
            err,
            OperatorError::Tensor(TensorError::UnsupportedDType { .. })
        ));
    }

    #[test]
    fn test_matmul() {
        let fx = Fixture::new(3, &[]);
        fx.f32(0, Shape::matrix(2, 3), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        fx.f32(1, Shape::matrix(3, 1), &[1.0, 0.0, 1.0]);
        fx.run(&MatMul, &[2], &[0, 1], &[]).unwrap();
        assert_eq!(fx.variables.get(2).unwrap().shape(), &Shape::matrix(2, 1));
        assert_eq!(fx.values(2), vec![4.0, 10.0]);

        let err = fx.run(&MatMul, &[2], &[0, 0], &[]).unwrap_err();
        assert!(matches!(
            err,
            OperatorError::Tensor(TensorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_softmax_axis_attribute() {
        let axis0 = 0i32.to_le_bytes();
        let fx = Fixture::new(2, &[&axis0, &[1u8, 2]]);
        fx.f32(0, Shape::matrix(2, 2), &[0.0, 0.0, 0.0, 0.0]);

        fx.run(&Softmax, &[1], &[0], &[]).unwrap();
        assert_eq!(fx.values(1), vec![0.5; 4]);

        fx.run(&Softmax, &[1], &[0], &[0]).unwrap();
        assert_eq!(fx.values(1), vec![0.5; 4]);

        let err = fx.run(&Softmax, &[1], &[0], &[1]).unwrap_err();
        assert!(matches!(err, OperatorError::Attribute { id: 1, .. }));
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let fx = Fixture::new(2, &[]);
        let err = fx.run(&Relu, &[1], &[0], &[]).unwrap_err();
        assert!(matches!(err, OperatorError::MissingInput { index: 0, id: 0 }));
    }
}
