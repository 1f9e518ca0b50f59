//! `GET_ROWS` kernel (§4.4): gathers rows of a matrix by an `I32` index
//! vector. Single-threaded per §5's task-count table.

use super::{NodeJob, Phase, TaskParams};

pub(crate) fn get_rows(job: &NodeJob, params: &mut TaskParams<'_>) {
    if params.phase != Phase::Compute || params.ith != 0 {
        return;
    }
    let src0 = job.src0.expect("GET_ROWS requires src0");
    let idx = job.src1.expect("GET_ROWS requires an index tensor");
    for (out_row, _) in (0..idx.ne[0]).enumerate() {
        let row = idx.i32_at(out_row, 0, 0, 0);
        debug_assert!(row >= 0, "GET_ROWS index must be non-negative");
        #[allow(clippy::cast_sign_loss)]
        let row = row as usize;
        for i0 in 0..src0.ne[0] {
            let v = src0.f32_at(i0, row, 0, 0);
            job.dst.set_f32(i0, out_row, 0, 0, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Context;
    use crate::dtype::DType;
    use crate::ops::build;

    #[test]
    fn get_rows_gathers_requested_rows() {
        let ctx = Context::init(1 << 16);
        let a = ctx.new_tensor_2d(DType::F32, 2, 3).unwrap();
        for i in 0..6 {
            a.set_f32_1d(i, i as f32).unwrap();
        }
        let idx = ctx.new_tensor_1d(DType::I32, 2).unwrap();
        idx.set_i32_1d(0, 2).unwrap();
        idx.set_i32_1d(1, 0).unwrap();
        let y = build::get_rows(&a, &idx).unwrap();
        crate::graph::Graph::compute_single(&y).unwrap();
        assert_eq!(y.to_vec_f32().unwrap(), vec![4.0, 5.0, 0.0, 1.0]);
    }
}
