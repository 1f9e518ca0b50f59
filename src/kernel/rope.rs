//! `ROPE` kernel (§4.4): rotary position embedding.
//!
//! Pairs `(x0, x1)` in the first `n_dims` elements of dim 0 are rotated by
//! `theta = p * 10000^(-i/n_dims)`, where `p` is the row's position
//! (`positions[i1]`) and `i` ranges over pair index `0, 2, 4, ...`.
//! Elements at or beyond `n_dims` pass through unchanged.

use super::{NodeJob, Phase, TaskParams, split_range};

pub(crate) fn rope(job: &NodeJob, params: &mut TaskParams<'_>) {
    if params.phase != Phase::Compute {
        return;
    }
    let src0 = job.src0.expect("ROPE requires src0");
    let positions = job.src1.expect("ROPE requires a positions tensor");
    let n_dims = job.opt[0].scalar().expect("ROPE requires n_dims") as usize;

    let ne = job.dst.ne;
    let rows = ne[1] * ne[2] * ne[3];
    for row in split_range(rows, params.ith, params.nth) {
        let i1 = row % ne[1];
        let i2 = (row / ne[1]) % ne[2];
        let i3 = row / (ne[1] * ne[2]);
        let p = f64::from(positions.i32_at(i1, 0, 0, 0));

        let mut i0 = 0;
        while i0 < n_dims.min(ne[0]) {
            let theta = p * 10000f64.powf(-(f64::from(i0 as u32)) / f64::from(n_dims as u32));
            let (sin, cos) = theta.sin_cos();
            #[allow(clippy::cast_possible_truncation)]
            let (sin, cos) = (sin as f32, cos as f32);

            let x0 = src0.f32_at(i0, i1, i2, i3);
            let x1 = src0.f32_at(i0 + 1, i1, i2, i3);
            job.dst.set_f32(i0, i1, i2, i3, x0 * cos - x1 * sin);
            job.dst.set_f32(i0 + 1, i1, i2, i3, x0 * sin + x1 * cos);
            i0 += 2;
        }
        for i0 in n_dims.min(ne[0])..ne[0] {
            job.dst.set_f32(i0, i1, i2, i3, src0.f32_at(i0, i1, i2, i3));
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
    fn zero_position_is_identity() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_tensor_2d(DType::F32, 4, 1).unwrap();
        for i in 0..4 {
            x.set_f32_1d(i, (i + 1) as f32).unwrap();
        }
        let pos = ctx.new_tensor_1d(DType::I32, 1).unwrap();
        pos.set_i32_1d(0, 0).unwrap();
        let y = build::rope(&x, &pos, 4, 0).unwrap();
        crate::graph::Graph::compute_single(&y).unwrap();
        let v = y.to_vec_f32().unwrap();
        for (a, b) in v.iter().zip([1.0, 2.0, 3.0, 4.0]) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn preserves_pair_norm() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_tensor_2d(DType::F32, 2, 1).unwrap();
        x.set_f32_1d(0, 3.0).unwrap();
        x.set_f32_1d(1, 4.0).unwrap();
        let pos = ctx.new_tensor_1d(DType::I32, 1).unwrap();
        pos.set_i32_1d(0, 7).unwrap();
        let y = build::rope(&x, &pos, 2, 0).unwrap();
        crate::graph::Graph::compute_single(&y).unwrap();
        let v = y.to_vec_f32().unwrap();
        let norm = (v[0] * v[0] + v[1] * v[1]).sqrt();
        assert!((norm - 5.0).abs() < 1e-3);
    }
}
