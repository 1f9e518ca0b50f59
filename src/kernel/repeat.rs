//! `REPEAT` kernel (§4.4): tiles `src0` so it covers `dst`'s shape.
//!
//! Single-threaded, matching the spec's policy for this op (§5 task-count
//! table lists gather-shaped ops as task count `1`; `REPEAT`'s dividing
//! work evenly by dimension is cheap enough that a single pass over `dst`
//! is simplest and the source treats it the same way).

use super::{NodeJob, Phase, TaskParams};

pub(crate) fn repeat(job: &NodeJob, params: &mut TaskParams<'_>) {
    if params.phase != Phase::Compute || params.ith != 0 {
        return;
    }
    let src0 = job.src0.expect("REPEAT requires src0");
    let ne = job.dst.ne;
    for i3 in 0..ne[3] {
        for i2 in 0..ne[2] {
            for i1 in 0..ne[1] {
                for i0 in 0..ne[0] {
                    let v = src0.f32_at(i0 % src0.ne[0], i1 % src0.ne[1], i2 % src0.ne[2], i3 % src0.ne[3]);
                    job.dst.set_f32(i0, i1, i2, i3, v);
                }
            }
        }
    }
}
