//! Error types for the tensor graph engine.
//!
//! - [`Error`] — top-level error type returned by every fallible public API.
//! - [`TensorError`] — shape/dtype/index errors raised while building tensors.
//! - [`GraphError`] — errors raised while building or executing a graph.
//! - [`ContextError`] — arena/context lifecycle errors.

/// Top-level error type for the tensor graph engine.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Tensor construction or shape error.
    #[error(transparent)]
    Tensor(#[from] TensorError),

    /// Graph construction or execution error.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Context or arena lifecycle error.
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Errors from tensor construction and shape checks.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TensorError {
    /// A tensor id was used against a context that did not create it.
    #[error("invalid context: tensor belongs to context {owner}, used against {used}")]
    InvalidContext {
        /// Id of the context that actually owns the tensor.
        owner: u32,
        /// Id of the context the tensor was used against.
        used: u32,
    },

    /// Op preconditions on shape were violated.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An axis, rank, or linear index was out of bounds.
    #[error("invalid index: {0}")]
    InvalidIndex(String),

    /// An operation was applied to a tensor of the wrong dtype.
    #[error("invalid dtype: {0}")]
    InvalidDType(String),

    /// More than `MAX_DIMS` dimensions were requested.
    #[error("too many dimensions: {0} (max {max})", max = crate::tensor::MAX_DIMS)]
    TooManyDims(usize),
}

/// Errors from graph construction and execution.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GraphError {
    /// `build_forward` visited more nodes than `MAX_NODES` allows.
    #[error("graph exceeds MAX_NODES ({max})", max = crate::graph::MAX_NODES)]
    TooManyNodes,

    /// Gradient was requested for an op with no backward rule.
    #[error("unsupported backward for op {0:?}")]
    UnsupportedBackward(crate::ops::OpKind),

    /// An operation references a tensor that is not part of this graph.
    #[error("tensor is not part of this graph")]
    NotInGraph,

    /// A gradient was read before `build_backward` was called.
    #[error("backward graph was not built")]
    BackwardNotBuilt,
}

/// Errors from context/arena lifecycle operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ContextError {
    /// All process-wide context slots are in use.
    #[error("no free context slots (max {max})", max = crate::context::MAX_CONTEXTS)]
    NoFreeContext,

    /// The arena's backing buffer cannot satisfy an allocation.
    #[error("out of arena memory: requested {requested} bytes, {available} available")]
    OutOfArena {
        /// Bytes requested by the failed allocation.
        requested: usize,
        /// Bytes remaining in the arena before the request.
        available: usize,
    },
}
