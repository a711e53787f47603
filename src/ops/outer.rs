//! Batched outer product, the one primitive shared by §4.C, §4.D and §4.E.
//!
//! `outer_fwd(a, b)` with `a: (B, L)`, `b: (B, R)` returns `(B, L*R)` with
//! `a` the slow-varying (leading) index and `b` the fast-varying (trailing)
//! one — i.e. the flat buffer for `a ⊗ b` in row-major tensor-algebra
//! convention. Every grade-`k` view already holds a flattened `k`-fold
//! multi-index in that same row-major order, so treating it as an opaque
//! `(B, C^k)` operand here is exactly the right level of abstraction: the
//! concatenation just appends one more (possibly composite) index block.

use ndarray::{Array2, ArrayView2};

use crate::float::SignatureFloat;

pub fn outer_fwd<F: SignatureFloat>(a: ArrayView2<F>, b: ArrayView2<F>) -> Array2<F> {
    let (batch, l) = a.dim();
    let (batch_b, r) = b.dim();
    debug_assert_eq!(batch, batch_b, "outer_fwd: batch mismatch");
    let mut out = Array2::<F>::zeros((batch, l * r));
    for bi in 0..batch {
        for li in 0..l {
            let av = a[[bi, li]];
            for ri in 0..r {
                out[[bi, li * r + ri]] = av * b[[bi, ri]];
            }
        }
    }
    out
}

/// Reverse-mode VJP of [`outer_fwd`]: given `grad_z: (B, L*R)` and the
/// original operands, returns `(grad_a, grad_b)`.
pub fn outer_bwd<F: SignatureFloat>(
    grad_z: ArrayView2<F>,
    a: ArrayView2<F>,
    b: ArrayView2<F>,
) -> (Array2<F>, Array2<F>) {
    let (batch, l) = a.dim();
    let (_, r) = b.dim();
    debug_assert_eq!(grad_z.dim(), (batch, l * r));

    let mut grad_a = Array2::<F>::zeros((batch, l));
    let mut grad_b = Array2::<F>::zeros((batch, r));

    for bi in 0..batch {
        for li in 0..l {
            let mut acc = F::zero();
            for ri in 0..r {
                let g = grad_z[[bi, li * r + ri]];
                acc = acc + g * b[[bi, ri]];
                grad_b[[bi, ri]] = grad_b[[bi, ri]] + g * a[[bi, li]];
            }
            grad_a[[bi, li]] = grad_a[[bi, li]] + acc;
        }
    }

    (grad_a, grad_b)
}

/// Chooses operand order for a Horner step of the fused kernel (§4.D):
/// `inverse == false` computes `left ⊗ right` (`s ⊗ next[...]`),
/// `inverse == true` computes `right ⊗ left` (`next[...] ⊗ s`), realizing
/// "the outer-product unsqueezes are transposed" without a separate code
/// path.
pub fn outer_step_fwd<F: SignatureFloat>(
    inverse: bool,
    left: ArrayView2<F>,
    right: ArrayView2<F>,
) -> Array2<F> {
    if inverse {
        outer_fwd(right, left)
    } else {
        outer_fwd(left, right)
    }
}

/// Backward counterpart of [`outer_step_fwd`]; returns `(grad_left, grad_right)`
/// regardless of `inverse`.
pub fn outer_step_bwd<F: SignatureFloat>(
    inverse: bool,
    grad_z: ArrayView2<F>,
    left: ArrayView2<F>,
    right: ArrayView2<F>,
) -> (Array2<F>, Array2<F>) {
    if inverse {
        let (grad_right, grad_left) = outer_bwd(grad_z, right, left);
        (grad_left, grad_right)
    } else {
        outer_bwd(grad_z, left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn outer_fwd_matches_hand_computation() {
        let a = array![[1.0, 0.0]];
        let b = array![[1.0, 0.0]];
        let z = outer_fwd(a.view(), b.view());
        assert_eq!(z, array![[1.0, 0.0, 0.0, 0.0]]);
    }

    #[test]
    fn outer_bwd_is_bilinear_vjp() {
        let a = array![[1.0, 2.0]];
        let b = array![[3.0, 4.0]];
        let grad_z = array![[1.0, 1.0, 1.0, 1.0]];
        let (ga, gb) = outer_bwd(grad_z.view(), a.view(), b.view());
        // grad_a[l] = sum_r grad_z[l,r] * b[r]
        assert_eq!(ga, array![[7.0, 7.0]]);
        // grad_b[r] = sum_l grad_z[l,r] * a[l]
        assert_eq!(gb, array![[3.0, 3.0]]);
    }
}
