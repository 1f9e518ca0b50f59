//! Gradient synthesis (§4.5): given a node and the tensor holding its
//! output gradient, builds the graph nodes that compute each source
//! operand's contribution.
//!
//! Every contribution is itself built from ops already in [`crate::ops`] —
//! gradients are graph nodes the executor computes later, not values
//! derived eagerly here, since `build_backward` runs before
//! [`crate::graph::Graph::build_forward`]'s values exist.
//!
//! Only the ops the spec's backward table names get a rule; everything
//! else is [`GraphError::UnsupportedBackward`]. An op used *inside* a rule
//! here (e.g. `STEP` inside `RELU`'s rule) need not itself have a backward
//! rule — it is only ever used as a forward building block for someone
//! else's gradient.

use crate::Tensor;
use crate::error::{Error, GraphError};
use crate::ops::{OpKind, build};
use crate::tensor::TensorId;

/// Materializes a contiguous copy of `t` by copying it into a fresh,
/// identically-shaped tensor. Needed before `MUL_MAT` operands that come
/// from a `TRANSPOSE` view, since the kernel contract (§4.4) assumes
/// contiguous row access for its inner dot-product loop.
fn cont(t: &Tensor) -> Result<Tensor, Error> {
    let ne = t.shape();
    let fresh = t.context().new_tensor_4d(t.dtype(), ne[0], ne[1], ne[2], ne[3])?;
    build::cpy(t, &fresh)
}

/// Computes `(target_id, contribution)` pairs to accumulate into each
/// source operand's gradient, given `node`'s op and `grad` (the tensor
/// holding `d loss / d node`).
///
/// # Errors
///
/// [`GraphError::UnsupportedBackward`] if `node`'s op has no backward rule.
pub(crate) fn contributions(node: &Tensor, grad: &Tensor) -> Result<Vec<(TensorId, Tensor)>, Error> {
    let op = node.op();
    let src0 = node.src0();
    let src1 = node.src1();

    match op {
        OpKind::Dup => Ok(vec![(src0.expect("DUP has src0").id(), grad.clone())]),

        OpKind::Add => {
            let mut out = vec![(src0.expect("ADD has src0").id(), grad.clone())];
            if let Some(s1) = src1 {
                out.push((s1.id(), grad.clone()));
            }
            Ok(out)
        }

        OpKind::Sub => {
            let mut out = vec![(src0.expect("SUB has src0").id(), grad.clone())];
            if let Some(s1) = src1 {
                out.push((s1.id(), build::neg(grad)?));
            }
            Ok(out)
        }

        OpKind::Mul => {
            let s0 = src0.expect("MUL has src0");
            let s1 = src1.expect("MUL has src1");
            let d0 = build::mul(grad, &s1)?;
            let d1 = build::mul(grad, &s0)?;
            Ok(vec![(s0.id(), d0), (s1.id(), d1)])
        }

        OpKind::Div => {
            let s0 = src0.expect("DIV has src0");
            let s1 = src1.expect("DIV has src1");
            let d0 = build::div(grad, &s1)?;
            // grad_src1 -= grad_out * (self / src1), self = node (the DIV result)
            let ratio = build::div(node, &s1)?;
            let d1 = build::neg(&build::mul(grad, &ratio)?)?;
            Ok(vec![(s0.id(), d0), (s1.id(), d1)])
        }

        OpKind::Sqr => {
            let s0 = src0.expect("SQR has src0");
            let two = s0.context().new_scalar_f32(2.0)?;
            let two_a = build::scale(&s0, &two)?;
            let d0 = build::mul(grad, &two_a)?;
            Ok(vec![(s0.id(), d0)])
        }

        OpKind::Sqrt => {
            let s0 = src0.expect("SQRT has src0");
            let two = s0.context().new_scalar_f32(2.0)?;
            let two_sqrt = build::scale(node, &two)?;
            let d0 = build::div(grad, &two_sqrt)?;
            Ok(vec![(s0.id(), d0)])
        }

        OpKind::Sum => {
            let s0 = src0.expect("SUM has src0");
            let d0 = build::repeat(grad, &s0)?;
            Ok(vec![(s0.id(), d0)])
        }

        // §4.5's table gives REPEAT's gradient as a full reduction to a
        // scalar, the dual of SUM's "broadcast a scalar grad back out" —
        // correct when src0 is itself a scalar, the shape this op is
        // actually used with in the spec's worked scenarios. A non-scalar
        // src0 surfaces as a shape-mismatch error at accumulation time,
        // same as the reference behavior this table describes.
        OpKind::Repeat => {
            let s0 = src0.expect("REPEAT has src0");
            let d0 = build::sum(grad)?;
            Ok(vec![(s0.id(), d0)])
        }

        OpKind::Abs => {
            let s0 = src0.expect("ABS has src0");
            let sign = build::sgn(&s0)?;
            let d0 = build::mul(grad, &sign)?;
            Ok(vec![(s0.id(), d0)])
        }

        OpKind::Neg => {
            let s0 = src0.expect("NEG has src0");
            Ok(vec![(s0.id(), build::neg(grad)?)])
        }

        OpKind::Relu => {
            let s0 = src0.expect("RELU has src0");
            let mask = build::step(&s0)?;
            let d0 = build::mul(grad, &mask)?;
            Ok(vec![(s0.id(), d0)])
        }

        OpKind::MulMat => {
            let s0 = src0.expect("MUL_MAT has src0");
            let s1 = src1.expect("MUL_MAT has src1");

            // grad_src1 += mul_mat(cont(transpose(src0)), grad)
            let s0t = cont(&build::transpose(&s0)?)?;
            let d1 = build::mul_mat(&s0t, grad)?;

            // grad_src0 += mul_mat(cont(transpose(src1)), cont(transpose(grad)))
            let s1t = cont(&build::transpose(&s1)?)?;
            let gt = cont(&build::transpose(grad)?)?;
            let d0 = build::mul_mat(&s1t, &gt)?;

            Ok(vec![(s0.id(), d0), (s1.id(), d1)])
        }

        other => Err(GraphError::UnsupportedBackward(other).into()),
    }
}
