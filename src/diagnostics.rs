//! Graph introspection (§7): human-readable dumps and CPU feature detection,
//! neither of which feed back into execution.

use std::fmt::Write as _;

use crate::Tensor;
use crate::graph::Graph;

/// Prints one line per node and leaf to stderr via the `log` facade:
/// index, op, shape, and name (if set). Mirrors the source's
/// `ggml_graph_print` debug dump.
pub fn print_graph(graph: &Graph) {
    log::info!("graph: {} node(s), {} leaf(s)", graph.n_nodes(), graph.n_leafs());
    for i in 0..graph.n_nodes() {
        let t = graph.node(i);
        log::info!(
            "  node {i:>4}: {:<10?} shape={:?} name={}",
            t.op(),
            t.shape(),
            t.name().unwrap_or_default()
        );
    }
    for i in 0..graph.n_leafs() {
        let t = graph.leaf(i);
        log::info!("  leaf {i:>4}: shape={:?} name={}", t.shape(), t.name().unwrap_or_default());
    }
}

fn node_label(t: &Tensor) -> String {
    t.name().unwrap_or_else(|| format!("{:?}", t.op()))
}

/// Renders `graph` as a Graphviz `digraph` source string, one edge per
/// `src0`/`src1`/`opt` link. Leaves are drawn as boxes, computed nodes as
/// ellipses, mirroring the source's `ggml_graph_dump_dot`.
#[must_use]
pub fn dump_dot(graph: &Graph) -> String {
    let mut out = String::from("digraph G {\n");
    for i in 0..graph.n_leafs() {
        let t = graph.leaf(i);
        let _ = writeln!(out, "  \"leaf{i}\" [shape=box, label=\"{}\"];", node_label(&t));
    }
    for i in 0..graph.n_nodes() {
        let t = graph.node(i);
        let _ = writeln!(out, "  \"node{i}\" [shape=ellipse, label=\"{}\"];", node_label(&t));
        for (slot, src) in [t.src0(), t.src1()].into_iter().enumerate() {
            let Some(src) = src else { continue };
            let from = edge_id(graph, &src);
            let _ = writeln!(out, "  \"{from}\" -> \"node{i}\" [label=\"src{slot}\"];");
        }
    }
    out.push_str("}\n");
    out
}

fn edge_id(graph: &Graph, t: &Tensor) -> String {
    if let Some(i) = graph.find(t) {
        format!("node{i}")
    } else {
        format!("leaf{}", t.name().unwrap_or_else(|| format!("{:?}", t.id())))
    }
}

/// CPU SIMD feature detection (§6's "CPU feature detection" collaborator).
///
/// Stubbed to report no optional features available: the kernel layer
/// ships only [`crate::kernel::backend::Scalar`], so nothing in this crate
/// currently branches on AVX/NEON/etc. A vectorized `KernelBackend` would
/// read this to pick itself over `Scalar` at runtime, same as the source's
/// `ggml_cpu_has_avx`-style probes gate its SIMD kernel variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuFeatures {
    /// `true` if an AVX2-capable backend is available. Always `false`.
    pub avx2: bool,
    /// `true` if a NEON-capable backend is available. Always `false`.
    pub neon: bool,
}

/// Returns this process's detected CPU features. Always the all-`false`
/// default until a vectorized backend exists to report against.
#[must_use]
pub fn cpu_features() -> CpuFeatures {
    CpuFeatures::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;
    use crate::dtype::DType;
    use crate::ops::build;

    #[test]
    fn dump_dot_includes_every_node_and_leaf() {
        let ctx = Context::init(1 << 16);
        let a = ctx.new_tensor_1d(DType::F32, 2).unwrap();
        let b = ctx.new_tensor_1d(DType::F32, 2).unwrap();
        let y = build::add(&a, &b).unwrap();
        let graph = Graph::build_forward(&y, std::num::NonZeroUsize::new(1).unwrap()).unwrap();
        let dot = dump_dot(&graph);
        assert!(dot.starts_with("digraph G {"));
        assert!(dot.contains("node0"));
        assert!(dot.contains("leaf0"));
    }

    #[test]
    fn cpu_features_reports_scalar_only() {
        let features = cpu_features();
        assert!(!features.avx2);
        assert!(!features.neon);
    }
}
