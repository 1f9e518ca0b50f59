//! `SOFT_MAX` kernel (§4.4, §8 S3): per-row softmax using the tabled `exp`.
//!
//! `-inf` inputs map to `0` in the output (so `DIAG_MASK_INF` composes with
//! `SOFT_MAX` to implement causal attention masking). Debug builds assert
//! the postconditions `sum > 0` and every output is finite, per §4.4.

use super::backend::exp_f16;
use super::{NodeJob, Phase, TaskParams, split_range};

pub(crate) fn soft_max(job: &NodeJob, params: &mut TaskParams<'_>) {
    if params.phase != Phase::Compute {
        return;
    }
    let src0 = job.src0.expect("SOFT_MAX requires src0");
    let ne = job.dst.ne;
    let rows = ne[1] * ne[2] * ne[3];
    for row in split_range(rows, params.ith, params.nth) {
        let i1 = row % ne[1];
        let i2 = (row / ne[1]) % ne[2];
        let i3 = row / (ne[1] * ne[2]);

        let mut max = f32::NEG_INFINITY;
        for i0 in 0..ne[0] {
            max = max.max(src0.f32_at(i0, i1, i2, i3));
        }

        let mut exps = vec![0.0_f32; ne[0]];
        let mut sum = 0.0_f32;
        for (i0, e) in exps.iter_mut().enumerate() {
            let x = src0.f32_at(i0, i1, i2, i3);
            *e = if x.is_finite() || max.is_finite() { exp_f16(x - max) } else { 0.0 };
            sum += *e;
        }

        debug_assert!(sum > 0.0, "SOFT_MAX row sum must be positive");
        for (i0, e) in exps.into_iter().enumerate() {
            let v = e / sum;
            debug_assert!(v.is_finite(), "SOFT_MAX output must be finite");
            job.dst.set_f32(i0, i1, i2, i3, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;
    use crate::dtype::DType;
    use crate::ops::build;

    /// S3 — SOFT_MAX of [1,2,3].
    #[test]
    fn matches_worked_example() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_tensor_1d(DType::F32, 3).unwrap();
        x.set_f32_1d(0, 1.0).unwrap();
        x.set_f32_1d(1, 2.0).unwrap();
        x.set_f32_1d(2, 3.0).unwrap();
        let y = build::soft_max(&x).unwrap();
        crate::graph::Graph::compute_single(&y).unwrap();
        let v = y.to_vec_f32().unwrap();
        let expected = [0.0900, 0.2447, 0.6652];
        for (a, b) in v.iter().zip(expected) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn rows_sum_to_one() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_tensor_2d(DType::F32, 4, 3).unwrap();
        for i in 0..12 {
            x.set_f32_1d(i, (i as f32).sin()).unwrap();
        }
        let y = build::soft_max(&x).unwrap();
        crate::graph::Graph::compute_single(&y).unwrap();
        let v = y.to_vec_f32().unwrap();
        for row in 0..3 {
            let s: f32 = v[row * 4..row * 4 + 4].iter().sum();
            assert!((s - 1.0).abs() < 1e-5);
        }
    }
}
