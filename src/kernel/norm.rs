//! `NORM` kernel (§4.4): per-row centre + RMS normalization.
//!
//! `y = (x - mean(x)) / sqrt(var(x) + eps)`, `eps = 1e-5`.

use super::{NodeJob, Phase, TaskParams, split_range};

const EPS: f32 = 1e-5;

pub(crate) fn norm(job: &NodeJob, params: &mut TaskParams<'_>) {
    if params.phase != Phase::Compute {
        return;
    }
    let src0 = job.src0.expect("NORM requires src0");
    let ne = job.dst.ne;
    let rows = ne[1] * ne[2] * ne[3];
    for row in split_range(rows, params.ith, params.nth) {
        let i1 = row % ne[1];
        let i2 = (row / ne[1]) % ne[2];
        let i3 = row / (ne[1] * ne[2]);

        let mut mean = 0.0_f64;
        for i0 in 0..ne[0] {
            mean += f64::from(src0.f32_at(i0, i1, i2, i3));
        }
        mean /= ne[0] as f64;

        let mut var = 0.0_f64;
        for i0 in 0..ne[0] {
            let d = f64::from(src0.f32_at(i0, i1, i2, i3)) - mean;
            var += d * d;
        }
        var /= ne[0] as f64;

        #[allow(clippy::cast_possible_truncation)]
        let inv_std = (1.0 / (var + f64::from(EPS)).sqrt()) as f32;
        #[allow(clippy::cast_possible_truncation)]
        let mean = mean as f32;

        for i0 in 0..ne[0] {
            let x = src0.f32_at(i0, i1, i2, i3);
            job.dst.set_f32(i0, i1, i2, i3, (x - mean) * inv_std);
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
    fn norm_row_has_zero_mean_unit_variance() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_tensor_2d(DType::F32, 4, 2).unwrap();
        for i1 in 0..2 {
            for i0 in 0..4 {
                x.set_f32_1d(i1 * 4 + i0, (i0 as f32) * 2.0 + i1 as f32).unwrap();
            }
        }
        let y = build::norm(&x).unwrap();
        crate::graph::Graph::compute_single(&y).unwrap();
        let v = y.to_vec_f32().unwrap();
        for row in 0..2 {
            let r = &v[row * 4..row * 4 + 4];
            let mean: f32 = r.iter().sum::<f32>() / 4.0;
            assert!(mean.abs() < 1e-3, "row {row} mean {mean}");
            let var: f32 = r.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / 4.0;
            assert!((var - 1.0).abs() < 1e-2, "row {row} var {var}");
        }
    }
}
