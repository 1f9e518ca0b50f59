//! Elementwise unary and binary kernels (§4.4 "Elementwise binary",
//! `SQR,SQRT,ABS,SGN,NEG,STEP,RELU,GELU`).
//!
//! Row-partitioned across `nth` workers; each worker owns whole rows of
//! `dst` (dimension-0-contiguous slices), never a partial row, so workers
//! never write overlapping bytes.

use super::backend::{KernelBackend, Scalar};
use super::{NodeJob, Phase, TaskParams, split_range};

#[derive(Clone, Copy)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Copy)]
pub(crate) enum UnOp {
    Sqr,
    Sqrt,
    Abs,
    Sgn,
    Neg,
    Step,
    Relu,
    Gelu,
}

fn apply_unary(op: UnOp, x: f32) -> f32 {
    match op {
        UnOp::Sqr => x * x,
        UnOp::Sqrt => x.sqrt(),
        UnOp::Abs => x.abs(),
        UnOp::Sgn => {
            if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                0.0
            }
        }
        UnOp::Neg => -x,
        UnOp::Step => f32::from(x > 0.0),
        UnOp::Relu => x.max(0.0),
        UnOp::Gelu => Scalar::gelu_f32(x),
    }
}

fn apply_bin(op: BinOp, a: f32, b: f32) -> f32 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
    }
}

/// Rows beyond dim 0: `ne[1] * ne[2] * ne[3]`, partitioned across workers.
fn row_count(ne: &[usize; crate::tensor::MAX_DIMS]) -> usize {
    ne[1] * ne[2] * ne[3]
}

fn row_coords(row: usize, ne: &[usize; crate::tensor::MAX_DIMS]) -> (usize, usize, usize) {
    let i1 = row % ne[1];
    let i2 = (row / ne[1]) % ne[2];
    let i3 = row / (ne[1] * ne[2]);
    (i1, i2, i3)
}

pub(crate) fn unary(job: &NodeJob, params: &mut TaskParams<'_>, op: UnOp) {
    if params.phase != Phase::Compute {
        return;
    }
    let src0 = job.src0.expect("unary op requires src0");
    let ne = job.dst.ne;
    let rows = split_range(row_count(&ne), params.ith, params.nth);
    for row in rows {
        let (i1, i2, i3) = row_coords(row, &ne);
        for i0 in 0..ne[0] {
            let x = src0.f32_at(i0, i1, i2, i3);
            job.dst.set_f32(i0, i1, i2, i3, apply_unary(op, x));
        }
    }
}

/// Elementwise binary: `dst row j = src0 row j OP src1 row j`. If `src1`'s
/// dim-0 stride isn't `sizeof(f32)` (a broadcast view, e.g. a per-row bias
/// tiled with `ne0 == 1`), fall back to reading `src1`'s single element per
/// row rather than indexing past its allocation (§4.4).
pub(crate) fn binary(job: &NodeJob, params: &mut TaskParams<'_>, op: BinOp) {
    if params.phase != Phase::Compute {
        return;
    }
    let src0 = job.src0.expect("binary op requires src0");
    let src1 = job.src1.expect("binary op requires src1");
    let ne = job.dst.ne;
    let broadcast0 = src1.nb[0] != std::mem::size_of::<f32>() || src1.ne[0] == 1;
    let rows = split_range(row_count(&ne), params.ith, params.nth);
    for row in rows {
        let (i1, i2, i3) = row_coords(row, &ne);
        let (s1_1, s1_2, s1_3) = (i1 % src1.ne[1], i2 % src1.ne[2], i3 % src1.ne[3]);
        if broadcast0 {
            let b = src1.f32_at(0, s1_1, s1_2, s1_3);
            for i0 in 0..ne[0] {
                let a = src0.f32_at(i0, i1, i2, i3);
                job.dst.set_f32(i0, i1, i2, i3, apply_bin(op, a, b));
            }
        } else {
            for i0 in 0..ne[0] {
                let a = src0.f32_at(i0, i1, i2, i3);
                let b = src1.f32_at(i0 % src1.ne[0], s1_1, s1_2, s1_3);
                job.dst.set_f32(i0, i1, i2, i3, apply_bin(op, a, b));
            }
        }
    }
}
