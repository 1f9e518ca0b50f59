//! Forward kernels (§4.4): the operator-dispatch half of the engine.
//!
//! [`Context`](crate::Context) and [`crate::ops::build`] build the graph;
//! [`crate::graph::executor`] walks it node by node and, for each node,
//! calls [`dispatch`] once per [`Phase`] with a worker's `(ith, nth)`
//! identity. Every kernel function here honors the same contract as the
//! spec's §4.4 table: touch only the slice of `dst` this worker owns, and
//! return immediately during `Init`/`Finalize` unless the op owns
//! work-buffer preparation.
//!
//! Kernels read/write tensor data through [`TensorView`]/[`TensorViewMut`]
//! rather than through [`crate::Context`] — the executor resolves every
//! operand to a raw pointer + shape once per node, outside the hot loop,
//! so kernels never take the context's arena lock (see `DESIGN.md`'s
//! "Unsafe code" section for why that's sound here).

pub(crate) mod backend;
mod conv;
mod copy;
mod elementwise;
mod flash;
mod gather;
mod mask;
mod matmul;
mod norm;
mod reduce;
mod repeat;
mod rope;
mod softmax;

use crate::dtype::DType;
use crate::ops::OpKind;
use crate::tensor::MAX_DIMS;

/// Which of the three phases a node is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Work-buffer preparation; most kernels no-op here.
    Init,
    /// The actual elementwise/reduction/matmul work.
    Compute,
    /// Gathering per-worker scratch into `dst`; most kernels no-op here.
    Finalize,
}

/// A read-only view of one tensor operand, resolved to a raw pointer once
/// per node by the executor.
///
/// # Safety
///
/// `ptr` must stay valid and the bytes `[ptr, ptr+len)` must not be
/// mutated by anyone else for the lifetime of the node's three phases.
/// The executor upholds this by resolving views from the context's arena
/// before dispatching any worker and never touching the arena again until
/// every worker has finished `Finalize`.
#[derive(Clone, Copy)]
pub(crate) struct TensorView {
    pub dtype: DType,
    pub ne: [usize; MAX_DIMS],
    pub nb: [usize; MAX_DIMS],
    pub ptr: *const u8,
    pub len: usize,
}

unsafe impl Send for TensorView {}
unsafe impl Sync for TensorView {}

impl TensorView {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        // SAFETY: see the struct's safety comment; `len` was computed from
        // the same header `ptr` was resolved from.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub(crate) fn row_ptr(&self, i1: usize, i2: usize, i3: usize) -> *const u8 {
        unsafe { self.ptr.add(i1 * self.nb[1] + i2 * self.nb[2] + i3 * self.nb[3]) }
    }

    pub(crate) fn f32_at(&self, i0: usize, i1: usize, i2: usize, i3: usize) -> f32 {
        debug_assert_eq!(self.dtype, DType::F32);
        let off = i0 * self.nb[0] + i1 * self.nb[1] + i2 * self.nb[2] + i3 * self.nb[3];
        let bytes = self.as_bytes();
        f32::from_le_bytes(bytes[off..off + 4].try_into().unwrap())
    }

    pub(crate) fn f16_at(&self, i0: usize, i1: usize, i2: usize, i3: usize) -> crate::dtype::F16 {
        debug_assert_eq!(self.dtype, DType::F16);
        let off = i0 * self.nb[0] + i1 * self.nb[1] + i2 * self.nb[2] + i3 * self.nb[3];
        let bytes = self.as_bytes();
        crate::dtype::F16(u16::from_le_bytes([bytes[off], bytes[off + 1]]))
    }

    pub(crate) fn i32_at(&self, i0: usize, i1: usize, i2: usize, i3: usize) -> i32 {
        debug_assert_eq!(self.dtype, DType::I32);
        let off = i0 * self.nb[0] + i1 * self.nb[1] + i2 * self.nb[2] + i3 * self.nb[3];
        let bytes = self.as_bytes();
        i32::from_le_bytes(bytes[off..off + 4].try_into().unwrap())
    }

    /// Generic element read, upcast to `f32`, for ops that don't care which
    /// numeric dtype an operand carries (e.g. `CPY`'s dtype-casting copy).
    pub(crate) fn any_as_f32(&self, i0: usize, i1: usize, i2: usize, i3: usize) -> f32 {
        match self.dtype {
            DType::F32 => self.f32_at(i0, i1, i2, i3),
            DType::F16 => self.f16_at(i0, i1, i2, i3).to_f32(),
            DType::I32 => self.i32_at(i0, i1, i2, i3) as f32,
            DType::I16 => {
                let off = i0 * self.nb[0] + i1 * self.nb[1] + i2 * self.nb[2] + i3 * self.nb[3];
                let bytes = self.as_bytes();
                f32::from(i16::from_le_bytes([bytes[off], bytes[off + 1]]))
            }
            DType::I8 => {
                let off = i0 * self.nb[0] + i1 * self.nb[1] + i2 * self.nb[2] + i3 * self.nb[3];
                f32::from(self.as_bytes()[off] as i8)
            }
        }
    }
}

/// A mutable view of the destination tensor, resolved once per node.
///
/// Workers share one `TensorViewMut` for a node and are trusted (by the
/// op's partitioning contract) to write disjoint byte ranges — see
/// `DESIGN.md`'s "Unsafe code" section.
#[derive(Clone, Copy)]
pub(crate) struct TensorViewMut {
    pub dtype: DType,
    pub ne: [usize; MAX_DIMS],
    pub nb: [usize; MAX_DIMS],
    pub ptr: *mut u8,
    pub len: usize,
}

unsafe impl Send for TensorViewMut {}
unsafe impl Sync for TensorViewMut {}

impl TensorViewMut {
    #[allow(clippy::mut_from_ref)]
    pub(crate) fn as_bytes_mut(&self) -> &mut [u8] {
        // SAFETY: see `TensorView`'s safety comment; callers partition by
        // row/column per the op's task-count policy so concurrent writers
        // never touch the same bytes.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    pub(crate) fn set_f32(&self, i0: usize, i1: usize, i2: usize, i3: usize, value: f32) {
        debug_assert_eq!(self.dtype, DType::F32);
        let off = i0 * self.nb[0] + i1 * self.nb[1] + i2 * self.nb[2] + i3 * self.nb[3];
        self.as_bytes_mut()[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn set_any_from_f32(&self, i0: usize, i1: usize, i2: usize, i3: usize, value: f32) {
        let off = i0 * self.nb[0] + i1 * self.nb[1] + i2 * self.nb[2] + i3 * self.nb[3];
        let bytes = self.as_bytes_mut();
        match self.dtype {
            DType::F32 => bytes[off..off + 4].copy_from_slice(&value.to_le_bytes()),
            DType::F16 => {
                let h = crate::dtype::F16::from_f32(value);
                bytes[off..off + 2].copy_from_slice(&h.0.to_le_bytes());
            }
            #[allow(clippy::cast_possible_truncation)]
            DType::I32 => bytes[off..off + 4].copy_from_slice(&(value as i32).to_le_bytes()),
            #[allow(clippy::cast_possible_truncation)]
            DType::I16 => bytes[off..off + 2].copy_from_slice(&(value as i16).to_le_bytes()),
            #[allow(clippy::cast_possible_truncation)]
            DType::I8 => bytes[off] = value as i8 as u8,
        }
    }

    pub(crate) fn row_ptr(&self, i1: usize, i2: usize, i3: usize) -> *mut u8 {
        unsafe { self.ptr.add(i1 * self.nb[1] + i2 * self.nb[2] + i3 * self.nb[3]) }
    }
}

/// A non-tensor operand: either absent, a scalar read eagerly by the
/// executor (`DIAG_MASK_INF`'s `n_past`, `ROPE`'s `n_dims`/`mode`), or a
/// full tensor operand riding in an `opt` slot (`FLASH_ATTN`'s `v`,
/// `FLASH_FF`'s second weight and bias).
#[derive(Clone, Copy)]
pub(crate) enum OptOperand {
    None,
    Scalar(i32),
    Tensor(TensorView),
}

impl OptOperand {
    pub(crate) fn scalar(self) -> Option<i32> {
        match self {
            OptOperand::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn tensor(self) -> Option<TensorView> {
        match self {
            OptOperand::Tensor(v) => Some(v),
            _ => None,
        }
    }
}

/// Everything a node's forward kernel needs, resolved once by the executor
/// before any worker runs.
pub(crate) struct NodeJob {
    pub op: OpKind,
    pub src0: Option<TensorView>,
    pub src1: Option<TensorView>,
    pub opt: [OptOperand; 2],
    pub dst: TensorViewMut,
}

/// Per-call context handed to every kernel invocation.
pub(crate) struct TaskParams<'a> {
    pub phase: Phase,
    pub ith: usize,
    pub nth: usize,
    pub work: &'a mut [u8],
}

/// Splits `n` items evenly across `nth` workers, last worker taking the
/// remainder — the row/column partitioning rule every kernel in §4.4 uses.
pub(crate) fn split_range(n: usize, ith: usize, nth: usize) -> std::ops::Range<usize> {
    let chunk = n.div_ceil(nth);
    let start = (ith * chunk).min(n);
    let end = if ith + 1 == nth { n } else { (start + chunk).min(n) };
    start..end
}

/// Dispatches one `(op, phase, ith, nth)` call to the matching kernel.
///
/// This is the executor's single entry point into the kernel layer; the
/// `match` is exhaustive over every op the graph can contain (views,
/// reshapes, permutes and transposes carry no kernel work of their own —
/// their "computation" already happened at graph-build time as an aliasing
/// header, §4.3).
pub(crate) fn dispatch(job: &NodeJob, params: &mut TaskParams<'_>) {
    match job.op {
        OpKind::None | OpKind::Reshape | OpKind::View | OpKind::Permute | OpKind::Transpose => {}

        OpKind::Dup => copy::dup(job, params),
        OpKind::Add => elementwise::binary(job, params, elementwise::BinOp::Add),
        OpKind::Sub => elementwise::binary(job, params, elementwise::BinOp::Sub),
        OpKind::Mul => elementwise::binary(job, params, elementwise::BinOp::Mul),
        OpKind::Div => elementwise::binary(job, params, elementwise::BinOp::Div),

        OpKind::Sqr => elementwise::unary(job, params, elementwise::UnOp::Sqr),
        OpKind::Sqrt => elementwise::unary(job, params, elementwise::UnOp::Sqrt),
        OpKind::Abs => elementwise::unary(job, params, elementwise::UnOp::Abs),
        OpKind::Sgn => elementwise::unary(job, params, elementwise::UnOp::Sgn),
        OpKind::Neg => elementwise::unary(job, params, elementwise::UnOp::Neg),
        OpKind::Step => elementwise::unary(job, params, elementwise::UnOp::Step),
        OpKind::Relu => elementwise::unary(job, params, elementwise::UnOp::Relu),
        OpKind::Gelu => elementwise::unary(job, params, elementwise::UnOp::Gelu),

        OpKind::Sum => reduce::sum(job, params),
        OpKind::Mean => reduce::mean(job, params),
        OpKind::Repeat => repeat::repeat(job, params),
        OpKind::Norm => norm::norm(job, params),
        OpKind::MulMat => matmul::mul_mat(job, params),
        OpKind::Scale => copy::scale(job, params),
        OpKind::Cpy => copy::cpy(job, params),
        OpKind::GetRows => gather::get_rows(job, params),
        OpKind::DiagMaskInf => mask::diag_mask_inf(job, params),
        OpKind::SoftMax => softmax::soft_max(job, params),
        OpKind::Rope => rope::rope(job, params),
        OpKind::Conv1d1s => conv::conv_1d(job, params, 1),
        OpKind::Conv1d2s => conv::conv_1d(job, params, 2),
        OpKind::FlashAttn => flash::flash_attn(job, params),
        OpKind::FlashFf => flash::flash_ff(job, params),

        _ => {}
    }
}

/// `nelements(dst) * n_tasks`-shaped scratch sizes, §5's "Work buffer"
/// table. Returns the byte count the executor must reserve in the shared
/// work tensor for this node, given its resolved `n_tasks`.
pub(crate) fn work_buffer_bytes(job: &NodeJob, n_tasks: usize) -> usize {
    match job.op {
        OpKind::MulMat => matmul::work_buffer_bytes(job, n_tasks),
        OpKind::Conv1d1s | OpKind::Conv1d2s => conv::work_buffer_bytes(job),
        OpKind::FlashAttn => flash::flash_attn_work_buffer_bytes(job, n_tasks),
        OpKind::FlashFf => 0,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_range_covers_all_with_last_taking_remainder() {
        let ranges: Vec<_> = (0..3).map(|i| split_range(10, i, 3)).collect();
        assert_eq!(ranges[0], 0..4);
        assert_eq!(ranges[1], 4..8);
        assert_eq!(ranges[2], 8..10);
    }

    #[test]
    fn split_range_single_worker_takes_everything() {
        assert_eq!(split_range(7, 0, 1), 0..7);
    }
}
