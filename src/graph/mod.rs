//! The computation graph: topological construction, reverse-mode backward
//! synthesis, and the worker-pool executor (§4.2, §4.5, §5).

mod barrier;
mod builder;
mod executor;

pub use builder::{Graph, MAX_NODES};
