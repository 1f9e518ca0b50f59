//! `CONV_1D_{1S,2S}` kernels (§4.4): odd-width 1D convolution.
//!
//! `kernel` has shape `{nk, in_channels, out_channels, 1}`; `data` has
//! shape `{len, in_channels, 1, 1}`. Output cell `(i1, i0)` is
//! `sum_{k=-h..h} dot(kernel_row(i1, k), data_row_at(i0*stride + k))`,
//! with `h = nk / 2` and zero-padding at the sequence boundary.
//!
//! The work buffer isn't used by this scalar implementation (the spec's
//! INIT-phase repack into a padded work layout is an optimization for the
//! vector backend's contiguous access pattern; the scalar path reads
//! directly from `src0`/`src1` with explicit bounds checks instead).

use super::{NodeJob, Phase, TaskParams, split_range};

pub(crate) fn work_buffer_bytes(job: &NodeJob) -> usize {
    let kernel = job.src0.expect("CONV_1D requires src0");
    let data = job.src1.expect("CONV_1D requires src1");
    let nk = kernel.ne[0];
    let pad32 = |n: usize| n.div_ceil(32) * 32;
    std::mem::size_of::<f32>() * (nk * pad32(kernel.ne[1]) * kernel.ne[2] + (2 * (nk / 2) + data.ne[0]) * data.ne[1])
}

pub(crate) fn conv_1d(job: &NodeJob, params: &mut TaskParams<'_>, stride: usize) {
    if params.phase != Phase::Compute {
        return;
    }
    let kernel = job.src0.expect("CONV_1D requires src0");
    let data = job.src1.expect("CONV_1D requires src1");
    let nk = kernel.ne[0];
    let h = nk / 2;
    let channels = kernel.ne[1];
    let out_channels = kernel.ne[2];
    let out_len = job.dst.ne[0];

    let total = out_channels * out_len;
    for cell in split_range(total, params.ith, params.nth) {
        let i1 = cell % out_channels;
        let i0 = cell / out_channels;
        let center = i0 * stride;

        let mut acc = 0.0_f32;
        for c in 0..channels {
            for k in 0..nk {
                let src_pos = center as isize + k as isize - h as isize;
                if src_pos < 0 || src_pos as usize >= data.ne[0] {
                    continue;
                }
                #[allow(clippy::cast_sign_loss)]
                let src_pos = src_pos as usize;
                acc += kernel.f32_at(k, c, i1, 0) * data.f32_at(src_pos, c, 0, 0);
            }
        }
        job.dst.set_f32(i0, i1, 0, 0, acc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;
    use crate::dtype::DType;
    use crate::ops::build;

    #[test]
    fn stride_1_identity_kernel_passes_through_center() {
        let ctx = Context::init(1 << 16);
        // kernel width 1, 1 in-channel, 1 out-channel, weight = 2.0.
        let kernel = ctx.new_tensor_3d(DType::F32, 1, 1, 1).unwrap();
        kernel.set_f32_1d(0, 2.0).unwrap();
        let data = ctx.new_tensor_2d(DType::F32, 4, 1).unwrap();
        for i in 0..4 {
            data.set_f32_1d(i, (i + 1) as f32).unwrap();
        }
        let y = build::conv_1d_1s(&kernel, &data).unwrap();
        crate::graph::Graph::compute_single(&y).unwrap();
        assert_eq!(y.to_vec_f32().unwrap(), vec![2.0, 4.0, 6.0, 8.0]);
    }
}
