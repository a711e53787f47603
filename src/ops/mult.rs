//! Tensor-algebra product, forward and backward (spec §4.E).
//!
//! `mult(arg1, arg2)` performs the in-place concatenation-product
//! `arg1 <- arg1 ⊗ arg2` for two truncated elements with an implicit scalar
//! term of `1`. This is Chen's identity's workhorse: the streaming driver's
//! chunked-parallel mode and the signature-combine primitive (§4.H) are
//! both thin callers of this one routine.

use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use crate::float::SignatureFloat;
use crate::ops::outer::{outer_bwd, outer_fwd};

/// `arg1[d] <- arg1[d] + sum_{j+k=d-1} arg1[j] ⊗ arg2[k] + arg2[d]`, for
/// `d` descending so that each `arg1[d]` is updated only after every
/// `arg1[j]` it depends on (`j < d`) has been read.
#[tracing::instrument(level = "trace", skip_all, fields(depth = arg1.len()))]
pub fn mult_fwd<F: SignatureFloat>(arg1: &mut [ArrayViewMut2<F>], arg2: &[ArrayView2<F>]) {
    let depth = arg1.len();
    debug_assert_eq!(depth, arg2.len());

    for d in (0..depth).rev() {
        let mut acc = arg2[d].to_owned();
        for j in 0..d {
            let k = d - 1 - j;
            acc = acc + outer_fwd(arg1[j].view(), arg2[k]);
        }
        arg1[d] += &acc;
    }
}

/// `mult_partial`: zeroes `arg1[d]` before the inner sum, scales the
/// `arg2[d]` contribution by `alpha`, and skips the top `skip` depths.
/// Used by the logsignature power series (not otherwise specified).
pub fn mult_partial_fwd<F: SignatureFloat>(
    arg1: &mut [ArrayViewMut2<F>],
    arg2: &[ArrayView2<F>],
    alpha: F,
    skip: usize,
) {
    let depth = arg1.len();
    debug_assert_eq!(depth, arg2.len());
    debug_assert!(skip <= depth);

    for d in (0..depth - skip).rev() {
        let mut acc = arg2[d].to_owned() * alpha;
        for j in 0..d {
            let k = d - 1 - j;
            acc = acc + outer_fwd(arg1[j].view(), arg2[k]);
        }
        arg1[d].assign(&acc);
    }
}

/// Backward of [`mult_fwd`]. `arg1` is the pre-update left operand (saved
/// forward input); `grad_arg1_after` is the incoming gradient on the
/// post-update `arg1`. Returns `(grad_arg1_before, grad_arg2)`.
#[tracing::instrument(level = "trace", skip_all, fields(depth = arg1.len()))]
pub fn mult_bwd<F: SignatureFloat>(
    arg1: &[Array2<F>],
    arg2: &[Array2<F>],
    grad_arg1_after: &[Array2<F>],
) -> (Vec<Array2<F>>, Vec<Array2<F>>) {
    let depth = arg1.len();
    let mut grad_arg1_before: Vec<Array2<F>> = grad_arg1_after.to_vec();
    let mut grad_arg2: Vec<Array2<F>> = grad_arg1_after.to_vec();

    for d in 0..depth {
        for j in 0..d {
            let k = d - 1 - j;
            let (grad_aj, grad_bk) = outer_bwd(grad_arg1_after[d].view(), arg1[j].view(), arg2[k].view());
            grad_arg1_before[j] = &grad_arg1_before[j] + &grad_aj;
            grad_arg2[k] = &grad_arg2[k] + &grad_bk;
        }
    }

    (grad_arg1_before, grad_arg2)
}
