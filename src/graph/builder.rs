//! Graph construction (§4.2, §4.5): DFS-order topological sort from one or
//! more roots, and reverse-mode backward graph synthesis.

use std::num::NonZeroUsize;

use crate::Context;
use crate::Tensor;
use crate::backward;
use crate::error::{Error, GraphError};
use crate::ops::OpKind;
use crate::tensor::TensorId;

use super::executor;

/// Hard cap on the number of computed nodes one [`Graph`] can hold.
pub const MAX_NODES: usize = 4096;

/// A topologically-sorted computation graph: the non-leaf `nodes` in an
/// order where every operand precedes its consumer, plus the `leafs` they
/// bottom out at.
///
/// Cheap to build repeatedly — a `Graph` borrows no tensor data, it only
/// records which [`TensorId`]s to visit and in what order.
pub struct Graph {
    ctx: Context,
    nodes: Vec<TensorId>,
    leafs: Vec<TensorId>,
    n_threads: NonZeroUsize,
}

impl Graph {
    /// Builds a forward graph rooted at `root`, to be executed with
    /// `n_threads` worker threads (the executor spawns `n_threads - 1`
    /// helpers and runs the `ith == 0` share itself).
    ///
    /// There is no implicit thread count: the spec's reference
    /// implementation defaults to `8` when the caller passes `<= 0`, which
    /// silently picks a number unrelated to the machine it runs on. This
    /// API requires a [`NonZeroUsize`] instead (see `DESIGN.md`'s Open
    /// Questions).
    ///
    /// # Errors
    ///
    /// [`GraphError::TooManyNodes`] if the graph reachable from `root`
    /// exceeds [`MAX_NODES`].
    pub fn build_forward(root: &Tensor, n_threads: NonZeroUsize) -> Result<Self, Error> {
        let mut graph = Self {
            ctx: root.context().clone(),
            nodes: Vec::new(),
            leafs: Vec::new(),
            n_threads,
        };
        graph.build_forward_expand(root)?;
        Ok(graph)
    }

    /// Extends this graph to also cover `root`, skipping any node already
    /// visited by a prior call.
    ///
    /// # Errors
    ///
    /// [`GraphError::TooManyNodes`] if the extended graph exceeds [`MAX_NODES`].
    pub fn build_forward_expand(&mut self, root: &Tensor) -> Result<(), Error> {
        self.visit(root.id())
    }

    fn visit(&mut self, id: TensorId) -> Result<(), Error> {
        if self.nodes.contains(&id) || self.leafs.contains(&id) {
            return Ok(());
        }
        let header = self.ctx.header(id);
        if let Some(src0) = header.src0 {
            self.visit(src0)?;
        }
        if let Some(src1) = header.src1 {
            self.visit(src1)?;
        }
        for opt in header.opt.into_iter().flatten() {
            self.visit(opt)?;
        }
        if header.op == OpKind::None {
            self.leafs.push(id);
        } else {
            if self.nodes.len() >= MAX_NODES {
                return Err(GraphError::TooManyNodes.into());
            }
            self.nodes.push(id);
        }
        Ok(())
    }

    /// Builds the backward graph for `forward`: for each node in reverse
    /// topological order, synthesizes its sources' gradient contributions
    /// (§4.5) and accumulates them into each source's `grad` tensor,
    /// allocating one the first time a target receives a contribution.
    ///
    /// The returned `Graph` is the set of newly created gradient-computing
    /// nodes, rooted at every parameter leaf's `grad` tensor — executing it
    /// populates every [`Tensor::grad`] reachable from `forward`'s params.
    ///
    /// `keep`, `false`: every node's and leaf's existing `grad` tensor (if
    /// any, from a prior `build_backward` call) is zeroed before
    /// accumulating, so this call's gradients aren't added on top of a
    /// previous call's. `true`: previously accumulated gradients are left
    /// alone and this call's contributions accumulate on top of them
    /// (gradient accumulation across multiple forward passes before an
    /// optimizer step).
    ///
    /// # Errors
    ///
    /// [`GraphError::UnsupportedBackward`] if any node in `forward` uses an
    /// op with no backward rule. [`GraphError::TooManyNodes`] if the
    /// backward graph itself exceeds [`MAX_NODES`].
    pub fn build_backward(ctx: &Context, forward: &Graph, keep: bool) -> Result<Graph, Error> {
        if !keep {
            for &id in forward.nodes.iter().chain(forward.leafs.iter()) {
                if let Some(grad) = ctx.header(id).grad {
                    ctx.zero_data(grad);
                }
            }
        }

        for &id in forward.nodes.iter().rev() {
            let node = Tensor::new(ctx.clone(), id);
            let Some(grad) = node.grad() else {
                continue;
            };
            for (target, contribution) in backward::contributions(&node, &grad)? {
                accumulate(ctx, target, contribution)?;
            }
        }

        let mut backward_graph = Graph {
            ctx: ctx.clone(),
            nodes: Vec::new(),
            leafs: Vec::new(),
            n_threads: forward.n_threads,
        };
        for &id in &forward.leafs {
            let header = ctx.header(id);
            if header.is_param {
                if let Some(grad) = header.grad {
                    backward_graph.build_forward_expand(&Tensor::new(ctx.clone(), grad))?;
                }
            }
        }
        Ok(backward_graph)
    }

    /// Zeroes every grad tensor reachable from this graph's nodes and
    /// leafs, without reallocating them.
    pub fn reset(&self) {
        for &id in self.nodes.iter().chain(self.leafs.iter()) {
            if let Some(grad) = self.ctx.header(id).grad {
                self.ctx.zero_data(grad);
            }
        }
    }

    /// The position of `t` in this graph's topological node order, if present.
    #[must_use]
    pub fn find(&self, t: &Tensor) -> Option<usize> {
        self.nodes.iter().position(|&id| id == t.id())
    }

    /// The node whose gradient tensor is `grad`, if any — the inverse of
    /// [`Tensor::grad`].
    #[must_use]
    pub fn parent_of(&self, grad: &Tensor) -> Option<Tensor> {
        self.nodes
            .iter()
            .chain(self.leafs.iter())
            .find(|&&id| self.ctx.header(id).grad == Some(grad.id()))
            .map(|&id| Tensor::new(self.ctx.clone(), id))
    }

    /// Number of non-leaf nodes in topological order.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaf tensors.
    #[must_use]
    pub fn n_leafs(&self) -> usize {
        self.leafs.len()
    }

    /// The `i`-th non-leaf node in topological order.
    #[must_use]
    pub fn node(&self, i: usize) -> Tensor {
        Tensor::new(self.ctx.clone(), self.nodes[i])
    }

    /// The `i`-th leaf tensor.
    #[must_use]
    pub fn leaf(&self, i: usize) -> Tensor {
        Tensor::new(self.ctx.clone(), self.leafs[i])
    }

    /// Executes every node in this graph in topological order, using the
    /// thread count it was built with (§5).
    ///
    /// # Errors
    ///
    /// Propagates any error from resolving or running a node.
    pub fn compute(&self) -> Result<(), Error> {
        executor::compute(&self.ctx, &self.nodes, self.n_threads.get())
    }

    /// Convenience for computing a single tensor's full dependency graph
    /// with one thread — builds a forward graph rooted at `t` and runs it.
    ///
    /// # Errors
    ///
    /// Same as [`Graph::build_forward`] and [`Graph::compute`].
    pub fn compute_single(t: &Tensor) -> Result<(), Error> {
        let one = NonZeroUsize::new(1).expect("1 is non-zero");
        Graph::build_forward(t, one)?.compute()
    }
}

fn accumulate(ctx: &Context, target: TensorId, contribution: Tensor) -> Result<(), Error> {
    match ctx.header(target).grad {
        Some(existing) => {
            let existing = Tensor::new(ctx.clone(), existing);
            let summed = crate::ops::build::add(&existing, &contribution)?;
            ctx.set_grad(target, summed.id());
        }
        None => ctx.set_grad(target, contribution.id()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::dtype::DType;
    use crate::ops::build;

    fn one() -> NonZeroUsize {
        NonZeroUsize::new(1).unwrap()
    }

    /// Every source of every node must appear earlier in `nodes` or in
    /// `leafs` (§8 invariant 3): a diamond `x -> {sqr, neg} -> add` visits
    /// `x` once (as a leaf) and orders `sqr`/`neg` before `add`.
    #[test]
    fn topological_order_respects_dependencies() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_scalar_f32(2.0).unwrap();
        let a = build::sqr(&x).unwrap();
        let b = build::neg(&x).unwrap();
        let y = build::add(&a, &b).unwrap();

        let graph = Graph::build_forward(&y, one()).unwrap();
        assert_eq!(graph.n_leafs(), 1);
        assert_eq!(graph.n_nodes(), 3);

        let pos_a = graph.find(&a).unwrap();
        let pos_b = graph.find(&b).unwrap();
        let pos_y = graph.find(&y).unwrap();
        assert!(pos_a < pos_y);
        assert!(pos_b < pos_y);
    }

    #[test]
    fn build_forward_expand_does_not_revisit_shared_nodes() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_scalar_f32(1.0).unwrap();
        let shared = build::sqr(&x).unwrap();
        let y1 = build::add(&shared, &x).unwrap();
        let y2 = build::sub(&shared, &x).unwrap();

        let mut graph = Graph::build_forward(&y1, one()).unwrap();
        graph.build_forward_expand(&y2).unwrap();

        // `shared` must appear exactly once even though both roots depend on it.
        let occurrences = (0..graph.n_nodes()).filter(|&i| graph.node(i) == shared).count();
        assert_eq!(occurrences, 1);
        assert_eq!(graph.n_nodes(), 3); // shared, y1, y2
    }

    #[test]
    fn reset_zeroes_every_reachable_grad() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_tensor_1d(DType::F32, 3).unwrap();
        for i in 0..3 {
            x.set_f32_1d(i, i as f32).unwrap();
        }
        ctx.set_param(&x).unwrap();
        let loss = build::sum(&build::sqr(&x).unwrap()).unwrap();

        let fwd = Graph::build_forward(&loss, one()).unwrap();
        fwd.compute().unwrap();
        loss.seed_grad(1.0).unwrap();
        let bwd = Graph::build_backward(&ctx, &fwd, false).unwrap();
        bwd.compute().unwrap();

        let grad = x.grad().unwrap();
        assert!(grad.to_vec_f32().unwrap().iter().any(|&v| v != 0.0));

        fwd.reset();
        let grad = x.grad().unwrap();
        assert!(grad.to_vec_f32().unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn parent_of_is_the_inverse_of_tensor_grad() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_scalar_f32(3.0).unwrap();
        ctx.set_param(&x).unwrap();
        let loss = build::sqr(&x).unwrap();

        let fwd = Graph::build_forward(&loss, one()).unwrap();
        fwd.compute().unwrap();
        loss.seed_grad(1.0).unwrap();
        let bwd = Graph::build_backward(&ctx, &fwd, false).unwrap();
        bwd.compute().unwrap();

        let grad = x.grad().unwrap();
        let parent = bwd.parent_of(&grad).unwrap_or_else(|| fwd.parent_of(&grad).unwrap());
        assert_eq!(parent, x);
    }

    #[test]
    fn backward_on_op_with_no_rule_is_unsupported() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_tensor_1d(DType::F32, 4).unwrap();
        ctx.set_param(&x).unwrap();
        let y = build::soft_max(&x).unwrap();

        let fwd = Graph::build_forward(&y, one()).unwrap();
        fwd.compute().unwrap();
        y.seed_grad(1.0).unwrap();
        let err = Graph::build_backward(&ctx, &fwd, false).unwrap_err();
        assert!(matches!(err, Error::Graph(GraphError::UnsupportedBackward(_))));
    }

    #[test]
    fn compute_single_runs_the_full_dependency_graph() {
        let ctx = Context::init(1 << 16);
        let x = ctx.new_tensor_1d(DType::F32, 3).unwrap();
        for i in 0..3 {
            x.set_f32_1d(i, i as f32).unwrap();
        }
        let y = build::sum(&build::sqr(&x).unwrap()).unwrap();
        Graph::compute_single(&y).unwrap();
        assert_eq!(y.get_f32_1d(0).unwrap(), 0.0 + 1.0 + 4.0);
    }
}
