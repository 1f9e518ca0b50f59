//! Resolves a built [`super::Graph`]'s nodes into [`crate::kernel`] jobs and
//! drives them through the worker pool (§5).
//!
//! This is the crate's one `unsafe` boundary outside `TensorView` itself:
//! every operand is resolved to a raw pointer into the context's arena
//! *before* any worker thread is spawned, and the context's lock is never
//! touched again until every worker has finished a node's `Finalize` phase.
//! See `DESIGN.md`'s "Unsafe code" section.

use std::sync::Arc;

use crate::Context;
use crate::error::Error;
use crate::kernel::{self, NodeJob, OptOperand, Phase, TaskParams, TensorView, TensorViewMut};
use crate::ops::OpKind;
use crate::tensor::TensorId;

use super::barrier::Barrier;

fn view_of(ctx: &Context, id: TensorId, base: *mut u8) -> TensorView {
    let h = ctx.header(id);
    TensorView {
        dtype: h.dtype,
        ne: h.ne,
        nb: h.nb,
        // SAFETY: `base` is the arena's live backing buffer for `ctx`, and
        // `h.data` is a byte range that allocation returned within it.
        ptr: unsafe { base.add(h.data.start) },
        len: h.data.end - h.data.start,
    }
}

fn view_mut_of(ctx: &Context, id: TensorId, base: *mut u8) -> TensorViewMut {
    let h = ctx.header(id);
    TensorViewMut {
        dtype: h.dtype,
        ne: h.ne,
        nb: h.nb,
        ptr: unsafe { base.add(h.data.start) },
        len: h.data.end - h.data.start,
    }
}

/// Whether an `opt` slot is a scalar read eagerly here, or a tensor operand
/// that rides along in the job. Mirrors exactly how `ops::build` populates
/// each op's `opt` array.
fn resolve_opt(ctx: &Context, op: OpKind, slot: usize, opt_id: Option<TensorId>, base: *mut u8) -> OptOperand {
    let Some(id) = opt_id else {
        return OptOperand::None;
    };
    let as_scalar = matches!((op, slot), (OpKind::DiagMaskInf, 0) | (OpKind::Rope, 0 | 1) | (OpKind::FlashAttn, 1));
    if as_scalar {
        OptOperand::Scalar(ctx.get_i32_1d(id, 0).unwrap_or(0))
    } else {
        OptOperand::Tensor(view_of(ctx, id, base))
    }
}

fn resolve_job(ctx: &Context, id: TensorId, base: *mut u8) -> NodeJob {
    let h = ctx.header(id);
    NodeJob {
        op: h.op,
        src0: h.src0.map(|s| view_of(ctx, s, base)),
        src1: h.src1.map(|s| view_of(ctx, s, base)),
        opt: [
            resolve_opt(ctx, h.op, 0, h.opt[0], base),
            resolve_opt(ctx, h.op, 1, h.opt[1], base),
        ],
        dst: view_mut_of(ctx, id, base),
    }
}

fn run_inline(job: &NodeJob, work: &mut [u8]) {
    let mut params = TaskParams { phase: Phase::Init, ith: 0, nth: 1, work };
    kernel::dispatch(job, &mut params);
    params.phase = Phase::Compute;
    kernel::dispatch(job, &mut params);
    params.phase = Phase::Finalize;
    kernel::dispatch(job, &mut params);
}

/// Resolves every node in `nodes` and runs them in order.
///
/// `n_threads == 1` runs every node inline on the calling thread with no
/// barrier at all. `n_threads > 1` spawns `n_threads - 1` helper threads
/// for the duration of this call, synchronized per node through a
/// [`Barrier`], and joins them before returning. Single-task kernels (SUM,
/// MEAN, REPEAT, GET_ROWS, DUP, ...) still run inside the barrier's
/// `(ith, nth)` protocol; they simply no-op for every `ith != 0`, per each
/// kernel's own guard (§5's task-count table is therefore enforced inside
/// the kernel layer, not by the executor picking a smaller `nth`).
pub(crate) fn compute(ctx: &Context, nodes: &[TensorId], n_threads: usize) -> Result<(), Error> {
    let base = ctx.arena_base_ptr();
    let jobs: Vec<NodeJob> = nodes.iter().map(|&id| resolve_job(ctx, id, base)).collect();

    let max_work = jobs.iter().map(|job| kernel::work_buffer_bytes(job, n_threads)).max().unwrap_or(0);
    let mut work = vec![0u8; max_work];

    if n_threads <= 1 {
        for job in &jobs {
            run_inline(job, &mut work);
        }
        return Ok(());
    }

    let barrier = Arc::new(Barrier::new(n_threads));
    let handles: Vec<_> = (1..n_threads)
        .map(|ith| {
            let b = Arc::clone(&barrier);
            std::thread::spawn(move || b.worker_loop(ith))
        })
        .collect();

    for job in &jobs {
        barrier.run_node(job, &mut work);
    }

    barrier.request_stop();
    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}
