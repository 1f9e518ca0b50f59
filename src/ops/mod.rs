//! The op taxonomy (§4.3) and the per-op tensor builders that wire a new
//! node's `src0`/`src1`/`opt` edges and infer its output shape.
//!
//! `OpKind` is a closed sum type rather than the teacher's trait-object
//! kernel dispatch (`dyn Kernel`): the graph executor needs to match on the
//! op to decide task-count policy (§5.3) and the backward pass needs to
//! match on it to pick a gradient rule (§4.5) — a fixed enum makes both
//! matches exhaustive and `#[non_exhaustive]`-checked by the compiler,
//! where a trait object would need a fallback arm that could silently
//! swallow a missing case.

pub mod build;

/// Every computation the graph can express. Mirrors §4.3 exactly; the
/// backward table in [`crate::backward`] is keyed off this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OpKind {
    /// Leaf tensor: no producing op.
    None,
    /// Identity copy of `src0` into a fresh tensor.
    Dup,
    /// Elementwise `src0 + src1`.
    Add,
    /// Elementwise `src0 - src1`.
    Sub,
    /// Elementwise `src0 * src1`.
    Mul,
    /// Elementwise `src0 / src1`.
    Div,
    /// Elementwise `src0^2`.
    Sqr,
    /// Elementwise `sqrt(src0)`.
    Sqrt,
    /// Elementwise `|src0|`.
    Abs,
    /// Elementwise sign: `-1, 0, 1`.
    Sgn,
    /// Elementwise `-src0`.
    Neg,
    /// Elementwise unit step: `x > 0 ? 1 : 0`.
    Step,
    /// Elementwise ReLU: `max(x, 0)`.
    Relu,
    /// Elementwise GELU (table-driven, §3.5).
    Gelu,
    /// Reduces all elements of `src0` to a scalar sum.
    Sum,
    /// Reduces all elements of `src0` to a scalar mean.
    Mean,
    /// Tiles `src0` to the shape of `src1`.
    Repeat,
    /// Row-wise L2 normalization.
    Norm,
    /// Matrix multiplication `src0 @ src1^T` (ggml convention, §4.3).
    MulMat,
    /// Elementwise `src0 * scalar(src1)`.
    Scale,
    /// Copies `src0`'s data into `src1`'s layout (supports dtype cast).
    Cpy,
    /// Reinterprets `src0`'s data under a new contiguous shape.
    Reshape,
    /// Non-owning view into `src0`'s data at a byte offset with an
    /// arbitrary shape/stride, recorded in `opt[0]`/`opt[1]`.
    View,
    /// Permutes `src0`'s axis order (recorded via the output strides).
    Permute,
    /// Swaps dimensions 0 and 1 of `src0`.
    Transpose,
    /// Gathers rows of `src0` indexed by the `I32` tensor `src1`.
    GetRows,
    /// Masks the upper triangle of `src0` (above `opt[0]`'s scalar) to `-inf`.
    DiagMaskInf,
    /// Row-wise softmax of `src0`.
    SoftMax,
    /// Rotary position embedding over `src0`, positions given by `src1`.
    Rope,
    /// 1D convolution, stride 1.
    Conv1d1s,
    /// 1D convolution, stride 2.
    Conv1d2s,
    /// Fused scaled-dot-product attention.
    FlashAttn,
    /// Fused feed-forward block (matmul + activation + matmul).
    FlashFf,
}

impl OpKind {
    /// `true` for ops with no backward rule (§4.5): views/reshapes that are
    /// pure data-layout aliases propagate gradients by aliasing instead.
    #[must_use]
    pub const fn is_leaf_op(self) -> bool {
        matches!(self, OpKind::None)
    }
}
