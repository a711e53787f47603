//! Execution backend seam (spec §1a, §4.G, §5).
//!
//! Only a CPU backend ships; the trait exists at the seam where a GPU
//! backend would plug in (Non-goal: no custom GPU kernels in this crate —
//! GPU execution would reuse the same high-level views through this trait).

use ndarray::{ArrayView2, ArrayViewMut2};

use crate::float::SignatureFloat;

pub mod cpu;

/// Applies the fused kernel (component D) to one stream step, with the
/// freedom to fan the batch axis out across threads.
pub trait Backend: Send + Sync + std::fmt::Debug {
    fn max_threads(&self) -> usize;

    /// `prev <- prev ⊗ exp(next)` (or its `inverse` counterpart), optionally
    /// parallelized over the batch axis.
    fn fused_step<F: SignatureFloat>(
        &self,
        prev: &mut [ArrayViewMut2<F>],
        next: ArrayView2<F>,
        r: &[F],
        inverse: bool,
        parallel: bool,
    );
}
