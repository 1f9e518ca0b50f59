//! `FLASH_ATTN`/`FLASH_FF` kernels (§4.4): fused attention and
//! fused feed-forward blocks.

use super::backend::{KernelBackend, Scalar, exp_f16};
use super::{NodeJob, Phase, TaskParams, TensorView, split_range};

/// Per-query-row scratch needed by `FLASH_ATTN`: one `f32` score per key
/// position, times `n_tasks` workers (§5's work-buffer table).
pub(crate) fn flash_attn_work_buffer_bytes(job: &NodeJob, n_tasks: usize) -> usize {
    let k = job.src1.expect("FLASH_ATTN requires src1 (k)");
    2 * std::mem::size_of::<f32>() * k.ne[1] * n_tasks
}

/// `FLASH_ATTN`: fused scaled dot-product attention.
///
/// For each query row `iq1`: score every key position, scale by
/// `1/sqrt(D)`, optionally causal-mask positions beyond `P + iq1` (`P` is
/// the cache offset `nek1 - neq1`), softmax via the tabled `exp`, then
/// accumulate `V^T . scores` into the output row.
pub(crate) fn flash_attn(job: &NodeJob, params: &mut TaskParams<'_>) {
    if params.phase != Phase::Compute {
        return;
    }
    let q = job.src0.expect("FLASH_ATTN requires q");
    let k = job.src1.expect("FLASH_ATTN requires k");
    let v = job.opt[0].tensor().expect("FLASH_ATTN requires v in opt[0]");
    let masked = job.opt[1].scalar().unwrap_or(0) != 0;

    let d = q.ne[0];
    #[allow(clippy::cast_possible_truncation)]
    let scale = 1.0_f32 / (d as f32).sqrt();
    let p = k.ne[1].saturating_sub(q.ne[1]);

    let rows = q.ne[1] * q.ne[2] * q.ne[3];
    for row in split_range(rows, params.ith, params.nth) {
        let iq1 = row % q.ne[1];
        let i2 = (row / q.ne[1]) % q.ne[2];
        let i3 = row / (q.ne[1] * q.ne[2]);

        let mut scores = vec![0.0_f32; k.ne[1]];
        for (ic, s) in scores.iter_mut().enumerate() {
            let mut dot = 0.0_f32;
            for i0 in 0..d {
                dot += q.f32_at(i0, iq1, i2, i3) * k.f32_at(i0, ic, i2, i3);
            }
            *s = dot * scale;
            if masked && ic > p + iq1 {
                *s = f32::NEG_INFINITY;
            }
        }

        softmax_row(&mut scores);

        for i0 in 0..d {
            let mut acc = 0.0_f32;
            for (ic, &s) in scores.iter().enumerate() {
                acc += v.f32_at(i0, ic, i2, i3) * s;
            }
            job.dst.set_f32(i0, iq1, i2, i3, acc);
        }
    }
}

fn softmax_row(row: &mut [f32]) {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0_f32;
    for x in row.iter_mut() {
        *x = if x.is_finite() || max.is_finite() { exp_f16(*x - max) } else { 0.0 };
        sum += *x;
    }
    if sum > 0.0 {
        for x in row.iter_mut() {
            *x /= sum;
        }
    }
}

fn mat_vec_row(mat: &TensorView, row: &[f32], out_row: usize, i2: usize, i3: usize) -> f32 {
    let mut acc = 0.0_f32;
    for (k, &x) in row.iter().enumerate() {
        acc += mat.f32_at(k, out_row, i2 % mat.ne[2], i3 % mat.ne[3]) * x;
    }
    acc
}

/// `FLASH_FF`: `gelu(a . b0^T + b1) . c0^T + c1`. The header's `opt` slots
/// carry `w1`/`bias` (the second matmul's weight and the combined bias,
/// see `build::flash_ff`'s doc comment for why this is a two-weight,
/// one-bias fusion rather than the four-operand ggml original).
pub(crate) fn flash_ff(job: &NodeJob, params: &mut TaskParams<'_>) {
    if params.phase != Phase::Compute {
        return;
    }
    let a = job.src0.expect("FLASH_FF requires a");
    let w0 = job.src1.expect("FLASH_FF requires w0");
    let w1 = job.opt[0].tensor().expect("FLASH_FF requires w1 in opt[0]");
    let bias = job.opt[1].tensor().expect("FLASH_FF requires bias in opt[1]");

    let rows = a.ne[1] * a.ne[2] * a.ne[3];
    for row in split_range(rows, params.ith, params.nth) {
        let i1 = row % a.ne[1];
        let i2 = (row / a.ne[1]) % a.ne[2];
        let i3 = row / (a.ne[1] * a.ne[2]);

        let a_row: Vec<f32> = (0..a.ne[0]).map(|i0| a.f32_at(i0, i1, i2, i3)).collect();

        let hidden: Vec<f32> = (0..w0.ne[1])
            .map(|h| Scalar::gelu_f32(mat_vec_row(&w0, &a_row, h, i2, i3)))
            .collect();

        for o in 0..w1.ne[1] {
            let mut acc = mat_vec_row(&w1, &hidden, o, i2, i3);
            acc += bias.f32_at(o, 0, 0, 0);
            job.dst.set_f32(o, i1, i2, i3, acc);
        }
    }
}
