//! The external BLAS hook (§4.4/§6): the contract `MUL_MAT`'s BLAS regime
//! calls into for large matrix multiplies. No implementation ships by
//! default — the row/column regimes in [`crate::kernel::matmul`] are
//! always available, matching the spec's "scalar implementation is
//! mandatory" for the kernel layer generally.

use std::sync::OnceLock;

/// A row-major `sgemm`-shaped hook: `D = alpha * Y . X^T + beta * D`, with
/// `alpha = 1`, `beta = 0` fixed (the only configuration `MUL_MAT` needs).
///
/// `y` is `M x K` row-major, `x` is `N x K` row-major, `d` is `M x N`
/// row-major — exactly the `NoTrans, Trans` call the spec names in §6's
/// "External collaborator contracts".
pub trait BlasProvider: Send + Sync {
    /// Computes `d = y . x^T` for `y: [m, k]`, `x: [n, k]`, `d: [m, n]`,
    /// all row-major.
    fn sgemm_row_major_no_trans_trans(&self, m: usize, n: usize, k: usize, y: &[f32], x: &[f32], d: &mut [f32]);
}

static PROVIDER: OnceLock<Box<dyn BlasProvider>> = OnceLock::new();

/// Registers the process-wide BLAS provider. Only the first call takes
/// effect; later calls are ignored (mirrors [`OnceLock`]'s semantics —
/// there is exactly one provider for the life of the process, matching
/// the one external-library link the source assumes).
pub fn register(provider: Box<dyn BlasProvider>) {
    let _ = PROVIDER.set(provider);
}

/// The registered provider, if any.
pub(crate) fn provider() -> Option<&'static dyn BlasProvider> {
    PROVIDER.get().map(std::convert::AsRef::as_ref)
}
