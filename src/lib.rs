//! A CPU tensor computation engine: a symbolic computation graph over
//! arena-allocated tensors, reverse-mode automatic differentiation, and a
//! fixed-size worker pool that executes a graph's nodes in topological
//! order (see `DESIGN.md` for how this maps onto the engine this was
//! grounded on).
//!
//! # Types
//!
//! - [`Context`] — arena-backed tensor store and the public tensor constructors.
//! - [`Tensor`] — a handle into a [`Context`]'s arena: shape, dtype, and graph edges.
//! - [`graph::Graph`] — topological node order, backward synthesis, and execution.
//! - [`Error`] — top-level error type for every fallible public API.
//!
//! # Example
//!
//! ```
//! use tensorgraph::{Context, ops::build};
//!
//! let ctx = Context::init(1 << 20);
//! let x = ctx.new_tensor_1d(tensorgraph::dtype::DType::F32, 3).unwrap();
//! for i in 0..3 {
//!     x.set_f32_1d(i, i as f32).unwrap();
//! }
//! let y = build::sum(&build::sqr(&x).unwrap()).unwrap();
//! tensorgraph::graph::Graph::compute_single(&y).unwrap();
//! assert_eq!(y.get_f32_1d(0).unwrap(), 5.0);
//! ```

#![warn(missing_docs)]

mod backward;
mod context;
pub mod diagnostics;
pub mod dtype;
pub mod error;
pub mod graph;
pub(crate) mod kernel;
pub mod ops;
mod tensor;

pub mod blas;

pub use context::Context;
pub use error::Error;
pub use tensor::{PerfCounters, Tensor, TensorId};
