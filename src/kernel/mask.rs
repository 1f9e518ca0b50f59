//! `DIAG_MASK_INF` kernel (§4.4, §8 S4): sets the upper-triangular tail of
//! each row above `n_past + row_index` to `-inf`.

use super::{NodeJob, Phase, TaskParams, split_range};

pub(crate) fn diag_mask_inf(job: &NodeJob, params: &mut TaskParams<'_>) {
    if params.phase != Phase::Compute {
        return;
    }
    let src0 = job.src0.expect("DIAG_MASK_INF requires src0");
    let n_past = job.opt[0].scalar().expect("DIAG_MASK_INF requires an n_past scalar");
    let ne = job.dst.ne;
    let rows = ne[1] * ne[2] * ne[3];
    for row in split_range(rows, params.ith, params.nth) {
        let i1 = row % ne[1];
        let i2 = (row / ne[1]) % ne[2];
        let i3 = row / (ne[1] * ne[2]);
        #[allow(clippy::cast_sign_loss)]
        let cutoff = (n_past.max(0) as usize) + i1;
        for i0 in 0..ne[0] {
            let v = if i0 > cutoff { f32::NEG_INFINITY } else { src0.f32_at(i0, i1, i2, i3) };
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

    /// S4 — DIAG_MASK_INF with n_past=0 on a 3x3 row.
    #[test]
    fn masks_upper_triangle_past_n_past_plus_row() {
        let ctx = Context::init(1 << 16);
        let a = ctx.new_tensor_2d(DType::F32, 3, 3).unwrap();
        for i in 0..9 {
            a.set_f32_1d(i, 1.0).unwrap();
        }
        let y = build::diag_mask_inf(&a, 0).unwrap();
        crate::graph::Graph::compute_single(&y).unwrap();
        let v = y.to_vec_f32().unwrap();
        // row 1 (j=1): i=0,1 are finite, i=2 is -inf.
        assert!(v[1 * 3].is_finite());
        assert!(v[1 * 3 + 1].is_finite());
        assert!(v[1 * 3 + 2].is_infinite());
    }
}
