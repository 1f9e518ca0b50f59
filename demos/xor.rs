//! Learns XOR with a 2-hidden-unit ReLU network, trained by hand-rolled
//! gradient descent (see `linreg.rs` for why there's no optimizer call
//! here).

use std::num::NonZeroUsize;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use tensorgraph::Context;
use tensorgraph::Tensor;
use tensorgraph::graph::Graph;
use tensorgraph::ops::build;

struct Params {
    w11: Tensor,
    w12: Tensor,
    b1: Tensor,
    w21: Tensor,
    w22: Tensor,
    b2: Tensor,
    v1: Tensor,
    v2: Tensor,
    c: Tensor,
}

impl Params {
    fn random(ctx: &Context, rng: &mut StdRng) -> Self {
        let mut scalar = || ctx.new_scalar_f32(rng.random_range(-1.0_f32..1.0)).unwrap();
        let params = Self {
            w11: scalar(),
            w12: scalar(),
            b1: scalar(),
            w21: scalar(),
            w22: scalar(),
            b2: scalar(),
            v1: scalar(),
            v2: scalar(),
            c: scalar(),
        };
        for p in params.all() {
            ctx.set_param(p).unwrap();
        }
        params
    }

    fn all(&self) -> [&Tensor; 9] {
        [&self.w11, &self.w12, &self.b1, &self.w21, &self.w22, &self.b2, &self.v1, &self.v2, &self.c]
    }
}

fn forward(ctx: &Context, p: &Params, x1: f32, x2: f32) -> Tensor {
    let x1_t = ctx.new_scalar_f32(x1).unwrap();
    let x2_t = ctx.new_scalar_f32(x2).unwrap();

    let h1_pre = build::add(&build::add(&build::mul(&p.w11, &x1_t).unwrap(), &build::mul(&p.w12, &x2_t).unwrap()).unwrap(), &p.b1).unwrap();
    let h1 = build::relu(&h1_pre).unwrap();

    let h2_pre = build::add(&build::add(&build::mul(&p.w21, &x1_t).unwrap(), &build::mul(&p.w22, &x2_t).unwrap()).unwrap(), &p.b2).unwrap();
    let h2 = build::relu(&h2_pre).unwrap();

    build::add(&build::add(&build::mul(&p.v1, &h1).unwrap(), &build::mul(&p.v2, &h2).unwrap()).unwrap(), &p.c).unwrap()
}

fn main() {
    env_logger::init();

    let ctx = Context::init(1 << 24);
    let mut rng = StdRng::seed_from_u64(7);
    let params = Params::random(&ctx, &mut rng);

    let examples = [(0.0_f32, 0.0_f32, 0.0_f32), (0.0, 1.0, 1.0), (1.0, 0.0, 1.0), (1.0, 1.0, 0.0)];
    let one_thread = NonZeroUsize::new(1).unwrap();
    let lr = 0.05_f32;

    for epoch in 0..2000 {
        let mut epoch_loss = 0.0_f32;
        for &(x1, x2, target) in &examples {
            let y_t = ctx.new_scalar_f32(target).unwrap();
            let pred = forward(&ctx, &params, x1, x2);
            let err = build::sub(&pred, &y_t).unwrap();
            let loss = build::sum(&build::sqr(&err).unwrap()).unwrap();

            let fwd = Graph::build_forward(&loss, one_thread).unwrap();
            fwd.compute().unwrap();
            epoch_loss += loss.get_f32_1d(0).unwrap();

            loss.seed_grad(1.0).unwrap();
            let bwd = Graph::build_backward(&ctx, &fwd, false).unwrap();
            bwd.compute().unwrap();

            for p in params.all() {
                let g = p.grad().unwrap().get_f32_1d(0).unwrap();
                let updated = p.get_f32_1d(0).unwrap() - lr * g;
                p.set_f32_1d(0, updated).unwrap();
            }
        }
        if epoch % 500 == 0 {
            println!("epoch {epoch:>4}: loss={epoch_loss:.5}");
        }
    }

    println!("predictions:");
    for &(x1, x2, target) in &examples {
        let pred = forward(&ctx, &params, x1, x2);
        Graph::compute_single(&pred).unwrap();
        println!("  xor({x1}, {x2}) = {:.3} (target {target})", pred.get_f32_1d(0).unwrap());
    }
}
