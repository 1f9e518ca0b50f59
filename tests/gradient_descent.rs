//! Hand-rolled gradient descent driving a single scalar parameter toward
//! the minimum of `(x - 5)^2`, exercising graph construction, forward and
//! backward passes, and in-place parameter updates across many iterations.
//!
//! There is no optimizer type in this crate (gradient descent, Adam,
//! L-BFGS, ...) — an external collaborator per the crate's scope. This
//! test plays that role itself, the way `demos/linreg.rs` and
//! `demos/xor.rs` do.

use std::num::NonZeroUsize;

use tensorgraph::Context;
use tensorgraph::dtype::DType;
use tensorgraph::graph::Graph;
use tensorgraph::ops::build;

#[test]
fn gradient_descent_converges_to_the_minimum() {
    let ctx = Context::init(1 << 20);
    let x = ctx.new_scalar_f32(0.0).unwrap();
    ctx.set_param(&x).unwrap();

    let one = NonZeroUsize::new(1).unwrap();
    let lr = 0.1_f32;

    for _ in 0..60 {
        let target = ctx.new_scalar_f32(5.0).unwrap();
        let err = build::sub(&x, &target).unwrap();
        let loss = build::sqr(&err).unwrap();

        let fwd = Graph::build_forward(&loss, one).unwrap();
        fwd.compute().unwrap();

        loss.seed_grad(1.0).unwrap();
        let bwd = Graph::build_backward(&ctx, &fwd, false).unwrap();
        bwd.compute().unwrap();

        let g = x.grad().unwrap().get_f32_1d(0).unwrap();
        let updated = x.get_f32_1d(0).unwrap() - lr * g;
        x.set_f32_1d(0, updated).unwrap();
    }

    assert!((x.get_f32_1d(0).unwrap() - 5.0).abs() < 1e-2);
}

/// Same descent, but over a length-3 vector parameter, to confirm the loop
/// generalizes past scalars (the backward rules for `SUM`/`SQR` both have
/// to hold elementwise, not just at rank 0).
#[test]
fn gradient_descent_converges_on_a_vector_parameter() {
    let ctx = Context::init(1 << 20);
    let x = ctx.new_tensor_1d(DType::F32, 3).unwrap();
    for i in 0..3 {
        x.set_f32_1d(i, 0.0).unwrap();
    }
    ctx.set_param(&x).unwrap();

    let targets = [1.0_f32, -2.0, 3.0];
    let one = NonZeroUsize::new(1).unwrap();
    let lr = 0.1_f32;

    for _ in 0..80 {
        let target = ctx.new_tensor_1d(DType::F32, 3).unwrap();
        for (i, &v) in targets.iter().enumerate() {
            target.set_f32_1d(i, v).unwrap();
        }
        let err = build::sub(&x, &target).unwrap();
        let loss = build::sum(&build::sqr(&err).unwrap()).unwrap();

        let fwd = Graph::build_forward(&loss, one).unwrap();
        fwd.compute().unwrap();
        loss.seed_grad(1.0).unwrap();
        let bwd = Graph::build_backward(&ctx, &fwd, false).unwrap();
        bwd.compute().unwrap();

        let grad = x.grad().unwrap();
        for i in 0..3 {
            let g = grad.get_f32_1d(i).unwrap();
            let updated = x.get_f32_1d(i).unwrap() - lr * g;
            x.set_f32_1d(i, updated).unwrap();
        }
    }

    for (i, &t) in targets.iter().enumerate() {
        assert!((x.get_f32_1d(i).unwrap() - t).abs() < 1e-2, "index {i}");
    }
}
