//! `SUM`/`MEAN` reduction kernels (§4.4 "Reductions").
//!
//! Single-threaded (`ith == 0` only) to avoid cross-thread accumulation
//! order nondeterminism; accumulates in `f64` per the spec.

use super::{NodeJob, Phase, TaskParams};

fn accumulate(src: &super::TensorView) -> f64 {
    let ne = src.ne;
    let mut acc = 0.0_f64;
    for i3 in 0..ne[3] {
        for i2 in 0..ne[2] {
            for i1 in 0..ne[1] {
                for i0 in 0..ne[0] {
                    acc += f64::from(src.f32_at(i0, i1, i2, i3));
                }
            }
        }
    }
    acc
}

pub(crate) fn sum(job: &NodeJob, params: &mut TaskParams<'_>) {
    if params.phase != Phase::Compute || params.ith != 0 {
        return;
    }
    let src0 = job.src0.expect("SUM requires src0");
    let total = accumulate(&src0);
    #[allow(clippy::cast_possible_truncation)]
    job.dst.set_f32(0, 0, 0, 0, total as f32);
}

pub(crate) fn mean(job: &NodeJob, params: &mut TaskParams<'_>) {
    if params.phase != Phase::Compute || params.ith != 0 {
        return;
    }
    let src0 = job.src0.expect("MEAN requires src0");
    let ne = src0.ne;
    for i3 in 0..ne[3] {
        for i2 in 0..ne[2] {
            for i1 in 0..ne[1] {
                let mut acc = 0.0_f64;
                for i0 in 0..ne[0] {
                    acc += f64::from(src0.f32_at(i0, i1, i2, i3));
                }
                #[allow(clippy::cast_possible_truncation)]
                let mean = (acc / ne[0] as f64) as f32;
                job.dst.set_f32(0, i1, i2, i3, mean);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;
    use crate::dtype::DType;
    use crate::ops::build;

    #[test]
    fn sum_repeat_adjoint() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_tensor_1d(DType::F32, 5).unwrap();
        for i in 0..5 {
            x.set_f32_1d(i, 1.0).unwrap();
        }
        let s = build::sum(&x).unwrap();
        crate::graph::Graph::compute_single(&s).unwrap();
        assert!((s.get_f32_1d(0).unwrap() - 5.0).abs() < 1e-6);
    }

    /// §4.3: MEAN's result shape is `{1, ne1, ne2, ne3}`, a per-row mean,
    /// not a full reduction to one scalar — a 3-row input must produce
    /// three means without touching out-of-bounds bytes.
    #[test]
    fn mean_is_per_row_not_a_single_scalar() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_tensor_2d(DType::F32, 4, 3).unwrap();
        let vals = [1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0, 100.0, 200.0, 300.0, 400.0];
        for (i, &v) in vals.iter().enumerate() {
            x.set_f32_1d(i, v).unwrap();
        }
        let m = build::mean(&x).unwrap();
        assert_eq!(m.shape(), [1, 3, 1, 1]);
        crate::graph::Graph::compute_single(&m).unwrap();
        assert!((m.get_f32_1d(0).unwrap() - 2.5).abs() < 1e-6);
        assert!((m.get_f32_1d(1).unwrap() - 25.0).abs() < 1e-6);
        assert!((m.get_f32_1d(2).unwrap() - 250.0).abs() < 1e-6);
    }
}
