//! Scalar-type bound for the numeric core.
//!
//! Single vs. double precision is the only runtime-dtype axis this crate
//! supports (spec §9 "Polymorphism"); it is realized as a Rust generic
//! bound rather than a dynamic-dispatch enum, so the kernels below are
//! monomorphized once per concrete float.

use ndarray::NdFloat;
use num_traits::Float;

/// Blanket bound satisfied by `f32` and `f64`.
pub trait SignatureFloat: NdFloat + Float + Send + Sync + std::iter::Sum + 'static {}

impl<T> SignatureFloat for T where T: NdFloat + Float + Send + Sync + std::iter::Sum + 'static {}

/// `r[i] = 1 / (i + 2)` for `i = 0 .. depth - 1`, i.e. `[1/2, 1/3, ..., 1/depth]`.
///
/// Empty when `depth == 1`. Recomputed per top-level call rather than
/// cached process-wide (spec §3.5: the core owns no long-lived state).
pub fn reciprocals<F: SignatureFloat>(depth: usize) -> Vec<F> {
    (2..=depth)
        .map(|k| F::one() / F::from(k).expect("k fits in F"))
        .collect()
}
