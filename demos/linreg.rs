//! Fits `y = w*x + b` to a noiseless line by hand-rolled gradient descent.
//!
//! This crate deliberately ships no optimizer (Adam, L-BFGS, ...): a caller
//! reads `Tensor::grad()` after `Graph::build_backward` and writes the
//! updated parameter value back with `set_f32_1d`, same as this example
//! does. See `DESIGN.md`'s Open Questions for why that line is drawn here.

use std::num::NonZeroUsize;

use tensorgraph::Context;
use tensorgraph::graph::Graph;
use tensorgraph::ops::build;

fn main() {
    env_logger::init();

    let ctx = Context::init(1 << 22);

    let xs = [0.0_f32, 1.0, 2.0, 3.0, 4.0];
    let ys: Vec<f32> = xs.iter().map(|&x| 3.0 * x + 1.0).collect();

    let w = ctx.new_scalar_f32(0.0).unwrap();
    let b = ctx.new_scalar_f32(0.0).unwrap();
    ctx.set_param(&w).unwrap();
    ctx.set_param(&b).unwrap();

    let one_thread = NonZeroUsize::new(1).unwrap();
    let lr = 0.02_f32;

    for epoch in 0..200 {
        let mut epoch_loss = 0.0_f32;
        for (&x, &y) in xs.iter().zip(&ys) {
            let x_t = ctx.new_scalar_f32(x).unwrap();
            let y_t = ctx.new_scalar_f32(y).unwrap();

            let pred = build::add(&build::scale(&x_t, &w).unwrap(), &b).unwrap();
            let err = build::sub(&pred, &y_t).unwrap();
            let loss = build::sum(&build::sqr(&err).unwrap()).unwrap();

            let forward = Graph::build_forward(&loss, one_thread).unwrap();
            forward.compute().unwrap();
            epoch_loss += loss.get_f32_1d(0).unwrap();

            loss.seed_grad(1.0).unwrap();
            let backward = Graph::build_backward(&ctx, &forward, false).unwrap();
            backward.compute().unwrap();

            let gw = w.grad().unwrap().get_f32_1d(0).unwrap();
            let gb = b.grad().unwrap().get_f32_1d(0).unwrap();
            let new_w = w.get_f32_1d(0).unwrap() - lr * gw;
            let new_b = b.get_f32_1d(0).unwrap() - lr * gb;
            w.set_f32_1d(0, new_w).unwrap();
            b.set_f32_1d(0, new_b).unwrap();
        }
        if epoch % 50 == 0 {
            println!(
                "epoch {epoch:>3}: loss={epoch_loss:.5} w={:.4} b={:.4}",
                w.get_f32_1d(0).unwrap(),
                b.get_f32_1d(0).unwrap()
            );
        }
    }

    println!("final: w={:.4} b={:.4} (target: w=3.0 b=1.0)", w.get_f32_1d(0).unwrap(), b.get_f32_1d(0).unwrap());
}
