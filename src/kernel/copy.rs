//! `DUP`, `CPY`, and `SCALE` kernels (§4.4).
//!
//! `DUP` and `CPY` both move data between tensors that may differ in
//! layout (a `CPY` destination is frequently a view with padded strides)
//! and, for `CPY`, in dtype — both go through [`TensorView::any_as_f32`]
//! and [`TensorViewMut::set_any_from_f32`] to support casts generically
//! rather than special-casing each dtype pair.

use super::{NodeJob, Phase, TaskParams, split_range};

fn copy_rows(job: &NodeJob, params: &mut TaskParams<'_>) {
    let src0 = job.src0.expect("copy requires src0");
    let ne = job.dst.ne;
    let rows = ne[1] * ne[2] * ne[3];
    for row in split_range(rows, params.ith, params.nth) {
        let i1 = row % ne[1];
        let i2 = (row / ne[1]) % ne[2];
        let i3 = row / (ne[1] * ne[2]);
        for i0 in 0..ne[0] {
            let v = src0.any_as_f32(i0, i1, i2, i3);
            job.dst.set_any_from_f32(i0, i1, i2, i3, v);
        }
    }
}

/// `DUP`: single-threaded per §5's task-count table.
pub(crate) fn dup(job: &NodeJob, params: &mut TaskParams<'_>) {
    if params.phase != Phase::Compute || params.ith != 0 {
        return;
    }
    copy_rows(job, &mut TaskParams { phase: params.phase, ith: 0, nth: 1, work: &mut *params.work });
}

/// `CPY`: row-partitioned per §5 (listed alongside the other `n_threads`
/// ops since the destination's layout, unlike `DUP`'s, is often a
/// padded/strided view where parallel row copies are still disjoint).
pub(crate) fn cpy(job: &NodeJob, params: &mut TaskParams<'_>) {
    if params.phase != Phase::Compute {
        return;
    }
    copy_rows(job, params);
}

/// `SCALE`: `dst = src0 * scalar`, `n_threads`-partitioned by row.
pub(crate) fn scale(job: &NodeJob, params: &mut TaskParams<'_>) {
    if params.phase != Phase::Compute {
        return;
    }
    let src0 = job.src0.expect("SCALE requires src0");
    let scalar_t = job.src1.expect("SCALE requires a scalar second operand");
    let scalar = scalar_t.f32_at(0, 0, 0, 0);
    let ne = job.dst.ne;
    let rows = ne[1] * ne[2] * ne[3];
    for row in split_range(rows, params.ith, params.nth) {
        let i1 = row % ne[1];
        let i2 = (row / ne[1]) % ne[2];
        let i3 = row / (ne[1] * ne[2]);
        for i0 in 0..ne[0] {
            let v = src0.f32_at(i0, i1, i2, i3) * scalar;
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

    #[test]
    fn scale_multiplies_every_element() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_tensor_1d(DType::F32, 3).unwrap();
        for i in 0..3 {
            x.set_f32_1d(i, (i + 1) as f32).unwrap();
        }
        let s = ctx.new_scalar_f32(2.0).unwrap();
        let y = build::scale(&x, &s).unwrap();
        crate::graph::Graph::compute_single(&y).unwrap();
        assert_eq!(y.to_vec_f32().unwrap(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn cpy_casts_f32_into_f16_destination() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_tensor_1d(DType::F32, 2).unwrap();
        x.set_f32_1d(0, 1.5).unwrap();
        x.set_f32_1d(1, -2.5).unwrap();
        let dst = ctx.new_tensor_1d(DType::F16, 2).unwrap();
        let y = build::cpy(&x, &dst).unwrap();
        crate::graph::Graph::compute_single(&y).unwrap();
        let v = y.to_vec_f32().unwrap();
        assert!((v[0] - 1.5).abs() < 1e-2);
        assert!((v[1] + 2.5).abs() < 1e-2);
    }
}
