//! `MUL_MAT` kernel (§4.4): the hot path, with the three regimes the spec
//! names.
//!
//! - **BLAS regime**: delegated to [`crate::blas::BlasProvider`] when one
//!   is registered and the shapes clear the spec's `ne0,ne1,ne10 >= 32`
//!   threshold with a contiguous `src1`.
//! - **Row regime** (`src0` not transposed, `nb01 >= nb00`): parallelize
//!   over output rows; each cell is a vector dot product.
//! - **Column regime** (`src0` transposed, `nb00 > nb01`): parallelize
//!   over `src1`'s columns, each worker accumulating into its own slice of
//!   the work buffer, gathered into `dst` during `Finalize`.

use super::backend::{KernelBackend, Scalar};
use super::{NodeJob, Phase, TaskParams, TensorView, split_range};
use crate::blas;

/// Minimum dimension (§4.4) for the BLAS regime to be considered.
const BLAS_MIN_DIM: usize = 32;

fn blas_eligible(a: &TensorView, b: &TensorView) -> bool {
    a.ne[0] >= BLAS_MIN_DIM
        && a.ne[1] >= BLAS_MIN_DIM
        && b.ne[0] >= BLAS_MIN_DIM
        && b.nb[0] == std::mem::size_of::<f32>()
        && blas::provider().is_some()
}

/// `true` when `src0` is transposed relative to its natural row-major
/// layout (`nb00 > nb01`, the spec's "column regime" trigger).
fn is_transposed(a: &TensorView) -> bool {
    a.nb[0] > a.nb[1]
}

pub(crate) fn work_buffer_bytes(job: &NodeJob, n_tasks: usize) -> usize {
    let a = job.src0.expect("MUL_MAT requires src0");
    if is_transposed(&a) {
        job.dst.ne.iter().product::<usize>() * std::mem::size_of::<f32>() * n_tasks
    } else {
        0
    }
}

pub(crate) fn mul_mat(job: &NodeJob, params: &mut TaskParams<'_>) {
    let a = job.src0.expect("MUL_MAT requires src0");
    let b = job.src1.expect("MUL_MAT requires src1");

    if blas_eligible(&a, &b) {
        return mul_mat_blas(job, params, &a, &b);
    }

    if is_transposed(&a) {
        mul_mat_column_regime(job, params, &a, &b);
    } else {
        mul_mat_row_regime(job, params, &a, &b);
    }
}

/// BLAS regime: one `sgemm` call per `(i3,i2)` batch, single-threaded
/// (`ith == 0`) since the call itself is already fully utilizing BLAS's
/// own internal parallelism.
fn mul_mat_blas(job: &NodeJob, params: &mut TaskParams<'_>, a: &TensorView, b: &TensorView) {
    if params.phase != Phase::Compute || params.ith != 0 {
        return;
    }
    let provider = blas::provider().expect("blas_eligible checked Some");
    let (m, n, k) = (b.ne[1], a.ne[1], a.ne[0]);
    for i3 in 0..b.ne[3] {
        for i2 in 0..a.ne[2] {
            let mut y = vec![0.0_f32; a.ne[0] * a.ne[1]];
            for i1 in 0..a.ne[1] {
                for i0 in 0..a.ne[0] {
                    y[i1 * k + i0] = a.f32_at(i0, i1, i2, i3);
                }
            }
            let mut x = vec![0.0_f32; b.ne[0] * b.ne[1]];
            for i1 in 0..b.ne[1] {
                for i0 in 0..b.ne[0] {
                    x[i1 * k + i0] = b.f32_at(i0, i1, i2, i3);
                }
            }
            let mut d = vec![0.0_f32; m * n];
            provider.sgemm_row_major_no_trans_trans(m, n, k, &y, &x, &mut d);
            for i1 in 0..n {
                for i0 in 0..m {
                    job.dst.set_f32(i0, i1, i2, i3, d[i1 * m + i0]);
                }
            }
        }
    }
}

/// Row regime: parallelize over output rows `(i01, i02, i03)`; each output
/// cell is a single vector dot product.
fn mul_mat_row_regime(job: &NodeJob, params: &mut TaskParams<'_>, a: &TensorView, b: &TensorView) {
    if params.phase != Phase::Compute {
        return;
    }
    let total_rows = a.ne[1] * a.ne[2] * b.ne[3];
    for row in split_range(total_rows, params.ith, params.nth) {
        let rows_per_batch = a.ne[1];
        let i01 = row % rows_per_batch;
        let batch = row / rows_per_batch;
        let i02 = batch % a.ne[2];
        let i03 = batch / a.ne[2];

        let a_row: Vec<f32> = (0..a.ne[0]).map(|k| a.f32_at(k, i01, i02, i03)).collect();
        for i11 in 0..b.ne[1] {
            let b_row: Vec<f32> = (0..b.ne[0]).map(|k| b.f32_at(k, i11, i02 % b.ne[2], i03)).collect();
            let v = Scalar::dot_f32(&a_row, &b_row);
            job.dst.set_f32(i01, i11, i02, i03, v);
        }
    }
}

/// Column regime: parallelize over `src1`'s columns; each worker
/// accumulates into its own slice of the work buffer, gathered into `dst`
/// by worker 0 during `Finalize`.
fn mul_mat_column_regime(job: &NodeJob, params: &mut TaskParams<'_>, a: &TensorView, b: &TensorView) {
    let dst_elems = job.dst.ne.iter().product::<usize>();
    let slice_len = dst_elems * std::mem::size_of::<f32>();

    match params.phase {
        Phase::Init => {}
        Phase::Compute => {
            let my_slice_start = params.ith * slice_len;
            let my_slice = &mut params.work[my_slice_start..my_slice_start + slice_len];
            let acc: &mut [f32] = bytemuck::cast_slice_mut(my_slice);
            for v in acc.iter_mut() {
                *v = 0.0;
            }

            let cols = split_range(b.ne[1] * b.ne[2] * b.ne[3], params.ith, params.nth);
            for col in cols {
                let i11 = col % b.ne[1];
                let batch = col / b.ne[1];
                let i12 = batch % b.ne[2];
                let i13 = batch / b.ne[2];
                for i01 in 0..a.ne[1] {
                    let mut sum = 0.0_f32;
                    for k in 0..a.ne[0] {
                        sum += a.f32_at(k, i01, i12 % a.ne[2], i13 % a.ne[3]) * b.f32_at(k, i11, i12, i13);
                    }
                    let dst_idx = i01 + i11 * a.ne[1] + i12 * a.ne[1] * b.ne[1] + i13 * a.ne[1] * b.ne[1] * a.ne[2];
                    acc[dst_idx] = sum;
                }
            }
        }
        Phase::Finalize => {
            if params.ith != 0 {
                return;
            }
            for w in 0..params.nth {
                let start = w * slice_len;
                let acc: &[f32] = bytemuck::cast_slice(&params.work[start..start + slice_len]);
                for (idx, &v) in acc.iter().enumerate() {
                    if v != 0.0 {
                        let i01 = idx % a.ne[1];
                        let rest = idx / a.ne[1];
                        let i11 = rest % b.ne[1];
                        let rest2 = rest / b.ne[1];
                        let i12 = rest2 % a.ne[2];
                        let i13 = rest2 / a.ne[2];
                        job.dst.set_f32(i01, i11, i12, i13, v);
                    }
                }
            }
        }
    }
}
