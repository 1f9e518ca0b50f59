//! Tensor header and the public tensor handle.
//!
//! A [`Tensor`] is a thin, `Clone`-able handle — a [`crate::Context`] plus a
//! [`TensorId`] — mirroring the teacher's `Tensor<T> { buffer, layout, ctx }`
//! split of "data owner" vs. "shape/view" vs. "where it lives", except the
//! dtype lives on the header at runtime instead of as a generic parameter:
//! §4.3's op table routinely mixes dtypes in one graph (`GET_ROWS` takes an
//! `I32` index tensor and produces `F32`), which a single `Tensor<T>` cannot
//! express without either an enum payload or a second generic per op.

pub mod shape;

use crate::Context;
use crate::dtype::DType;
use crate::error::{Error, TensorError};
use crate::ops::OpKind;

/// Hard cap on tensor rank. Unused trailing dimensions are `1`, never
/// dropped from the `ne`/`nb` arrays.
pub const MAX_DIMS: usize = 4;

/// Opaque reference to a tensor living in a specific [`Context`]'s arena.
///
/// Carries the owning context's id so that using a `TensorId` against the
/// wrong `Context` is caught as [`TensorError::InvalidContext`] instead of
/// silently indexing someone else's arena — the Rust replacement for the
/// source's raw `ggml_tensor*` graph edges (see `DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorId {
    pub(crate) ctx_id: u32,
    pub(crate) index: u32,
}

/// Per-node wall-clock performance counters, zeroed until the node runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfCounters {
    /// Number of times this node has been computed.
    pub runs: u64,
    /// Accumulated CPU cycles (best-effort, via [`std::time::Instant`]-derived ns / clock estimate).
    pub cycles: u64,
    /// Accumulated wall-clock microseconds.
    pub micros: u64,
}

/// Internal tensor header stored in a [`Context`]'s arena.
#[derive(Debug, Clone)]
pub(crate) struct TensorHeader {
    pub(crate) dtype: DType,
    pub(crate) n_dims: usize,
    pub(crate) ne: [usize; MAX_DIMS],
    pub(crate) nb: [usize; MAX_DIMS],
    pub(crate) op: OpKind,
    pub(crate) is_param: bool,
    pub(crate) data: std::ops::Range<usize>,
    pub(crate) grad: Option<TensorId>,
    pub(crate) src0: Option<TensorId>,
    pub(crate) src1: Option<TensorId>,
    pub(crate) opt: [Option<TensorId>; 2],
    pub(crate) name: Option<String>,
    pub(crate) perf: PerfCounters,
}

impl TensorHeader {
    pub(crate) fn leaf(dtype: DType, ne: [usize; MAX_DIMS], data: std::ops::Range<usize>) -> Self {
        let n_dims = (1..MAX_DIMS).rev().find(|&i| ne[i] != 1).map_or(1, |i| i + 1);
        Self {
            dtype,
            n_dims,
            ne,
            nb: shape::contiguous_strides(&ne, dtype.size()),
            op: OpKind::None,
            is_param: false,
            data,
            grad: None,
            src0: None,
            src1: None,
            opt: [None, None],
            name: None,
            perf: PerfCounters::default(),
        }
    }

    pub(crate) fn numel(&self) -> usize {
        shape::numel(&self.ne)
    }

    pub(crate) fn nbytes(&self) -> usize {
        self.numel() * self.dtype.size()
    }

    pub(crate) fn is_contiguous(&self) -> bool {
        shape::is_contiguous(&self.ne, &self.nb, self.dtype.size())
    }
}

/// A handle to a tensor: shape, dtype, and a link into its owning
/// [`Context`]'s arena. Cheap to clone (an `Arc` bump and an index copy).
#[derive(Debug, Clone)]
pub struct Tensor {
    ctx: Context,
    id: TensorId,
}

impl Tensor {
    pub(crate) fn new(ctx: Context, id: TensorId) -> Self {
        Self { ctx, id }
    }

    /// This tensor's opaque id within its owning context.
    #[must_use]
    pub fn id(&self) -> TensorId {
        self.id
    }

    /// The context this tensor was allocated in.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    fn header(&self) -> TensorHeader {
        self.ctx.header(self.id)
    }

    /// Element dtype.
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.header().dtype
    }

    /// Number of non-unit leading dimensions (rank), `1..=4`.
    #[must_use]
    pub fn n_dims(&self) -> usize {
        self.header().n_dims
    }

    /// Shape, padded with trailing `1`s to [`MAX_DIMS`].
    #[must_use]
    pub fn shape(&self) -> [usize; MAX_DIMS] {
        self.header().ne
    }

    /// Byte strides, padded to [`MAX_DIMS`].
    #[must_use]
    pub fn strides(&self) -> [usize; MAX_DIMS] {
        self.header().nb
    }

    /// Total element count.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.header().numel()
    }

    /// The op that produced this tensor, or [`OpKind::None`] for a leaf.
    #[must_use]
    pub fn op(&self) -> OpKind {
        self.header().op
    }

    /// `true` if this tensor is a leaf (no producing op).
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.op() == OpKind::None
    }

    /// `true` if this tensor was marked trainable via [`Context::set_param`].
    #[must_use]
    pub fn is_param(&self) -> bool {
        self.header().is_param
    }

    /// This tensor's gradient tensor, if one was allocated.
    #[must_use]
    pub fn grad(&self) -> Option<Tensor> {
        self.header().grad.map(|id| Tensor::new(self.ctx.clone(), id))
    }

    /// The first source operand, if this is a non-leaf tensor.
    #[must_use]
    pub fn src0(&self) -> Option<Tensor> {
        self.header().src0.map(|id| Tensor::new(self.ctx.clone(), id))
    }

    /// The second source operand, if this op is binary or ternary.
    #[must_use]
    pub fn src1(&self) -> Option<Tensor> {
        self.header().src1.map(|id| Tensor::new(self.ctx.clone(), id))
    }

    /// Auxiliary operand slots (used by views, ROPE, `DIAG_MASK_INF`, ...).
    #[must_use]
    pub fn opt(&self, i: usize) -> Option<Tensor> {
        self.header().opt[i].map(|id| Tensor::new(self.ctx.clone(), id))
    }

    /// Debug label, used by [`crate::diagnostics`].
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.header().name.clone()
    }

    /// Sets a debug label on this tensor.
    pub fn set_name(&self, name: impl Into<String>) {
        self.ctx.set_name(self.id, name.into());
    }

    #[must_use]
    pub(crate) fn is_contiguous(&self) -> bool {
        self.header().is_contiguous()
    }

    /// Reads the linear-indexed `f32` element `i`.
    ///
    /// # Errors
    ///
    /// [`TensorError::InvalidDType`] if this tensor is not `F32`.
    /// [`TensorError::InvalidIndex`] if `i >= numel()`.
    pub fn get_f32_1d(&self, i: usize) -> Result<f32, Error> {
        self.ctx.get_f32_1d(self.id, i)
    }

    /// Writes the linear-indexed `f32` element `i`.
    ///
    /// # Errors
    ///
    /// Same as [`Tensor::get_f32_1d`].
    pub fn set_f32_1d(&self, i: usize, value: f32) -> Result<(), Error> {
        self.ctx.set_f32_1d(self.id, i, value)
    }

    /// Reads the linear-indexed `i32` element `i` (valid for `I8/I16/I32`).
    ///
    /// # Errors
    ///
    /// Same as [`Tensor::get_f32_1d`], but for integer dtypes.
    pub fn get_i32_1d(&self, i: usize) -> Result<i32, Error> {
        self.ctx.get_i32_1d(self.id, i)
    }

    /// Writes the linear-indexed `i32` element `i` (valid for `I8/I16/I32`).
    ///
    /// # Errors
    ///
    /// Same as [`Tensor::get_i32_1d`].
    pub fn set_i32_1d(&self, i: usize, value: i32) -> Result<(), Error> {
        self.ctx.set_i32_1d(self.id, i, value)
    }

    /// Fills this tensor's gradient with a constant `f32` value, allocating
    /// one first if [`Tensor::grad`] is `None`.
    ///
    /// Used to seed the scalar loss's gradient to `1.0` before
    /// [`crate::graph::Graph::build_backward`]'s graph is executed (§8, S5) —
    /// the one gradient value that has no producing op to derive it from.
    ///
    /// # Errors
    ///
    /// [`TensorError::InvalidDType`] if this tensor's grad is not `F32`.
    pub fn seed_grad(&self, value: f32) -> Result<(), Error> {
        let grad = match self.grad() {
            Some(g) => g,
            None => {
                let ne = self.shape();
                let g = self.ctx.new_tensor_4d(self.dtype(), ne[0], ne[1], ne[2], ne[3])?;
                self.ctx.set_grad(self.id, g.id());
                g
            }
        };
        for i in 0..grad.numel() {
            grad.set_f32_1d(i, value)?;
        }
        Ok(())
    }

    /// Copies this tensor's data out as a contiguous `Vec<f32>` in row-major
    /// order, converting from the source dtype where needed.
    ///
    /// # Errors
    ///
    /// [`TensorError::InvalidDType`] for non-numeric dtypes (there are
    /// none yet, but the check exists so a future dtype addition fails
    /// loudly rather than silently reinterpreting bytes).
    pub fn to_vec_f32(&self) -> Result<Vec<f32>, Error> {
        self.ctx.to_vec_f32(self.id)
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.ctx.id() == other.ctx.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tensor_reports_leaf_shape_and_dtype() {
        let ctx = Context::init(1 << 16);
        let t = ctx.new_tensor_2d(DType::F32, 4, 3).unwrap();
        assert_eq!(t.shape()[..2], [4, 3]);
        assert_eq!(t.dtype(), DType::F32);
        assert_eq!(t.n_dims(), 2);
        assert_eq!(t.numel(), 12);
        assert!(t.is_leaf());
        assert!(!t.is_param());
        assert_eq!(t.op(), OpKind::None);
        assert!(t.grad().is_none());
        assert!(t.src0().is_none());
        assert!(t.src1().is_none());
    }

    #[test]
    fn set_name_round_trips_through_name() {
        let ctx = Context::init(1 << 16);
        let t = ctx.new_tensor_1d(DType::F32, 3).unwrap();
        assert!(t.name().is_none());
        t.set_name("logits");
        assert_eq!(t.name().as_deref(), Some("logits"));
    }

    #[test]
    fn seed_grad_allocates_a_matching_gradient_tensor() {
        let ctx = Context::init(1 << 16);
        let t = ctx.new_tensor_1d(DType::F32, 4).unwrap();
        assert!(t.grad().is_none());
        t.seed_grad(2.0).unwrap();
        let g = t.grad().unwrap();
        assert_eq!(g.shape(), t.shape());
        for i in 0..g.numel() {
            assert_eq!(g.get_f32_1d(i).unwrap(), 2.0);
        }
    }

    #[test]
    fn seed_grad_overwrites_an_existing_gradient() {
        let ctx = Context::init(1 << 16);
        let t = ctx.new_tensor_1d(DType::F32, 2).unwrap();
        t.seed_grad(1.0).unwrap();
        t.seed_grad(5.0).unwrap();
        let g = t.grad().unwrap();
        assert_eq!(g.get_f32_1d(0).unwrap(), 5.0);
        assert_eq!(g.get_f32_1d(1).unwrap(), 5.0);
    }

    #[test]
    fn equality_requires_same_context_and_id() {
        let ctx_a = Context::init(1 << 16);
        let ctx_b = Context::init(1 << 16);
        let a = ctx_a.new_tensor_1d(DType::F32, 2).unwrap();
        let b = ctx_a.new_tensor_1d(DType::F32, 2).unwrap();
        let a_again = Tensor::new(ctx_a.clone(), a.id());
        let a_in_other_ctx = ctx_b.new_tensor_1d(DType::F32, 2).unwrap();

        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_ne!(a, a_in_other_ctx);
    }

    #[test]
    fn to_vec_f32_reads_back_every_element_in_order() {
        let ctx = Context::init(1 << 16);
        let t = ctx.new_tensor_1d(DType::F32, 4).unwrap();
        for i in 0..4 {
            t.set_f32_1d(i, i as f32 * 1.5).unwrap();
        }
        assert_eq!(t.to_vec_f32().unwrap(), vec![0.0, 1.5, 3.0, 4.5]);
    }
}
