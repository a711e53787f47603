//! Restricted exponential, forward and backward (spec §4.C).

use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use crate::float::SignatureFloat;
use crate::ops::outer::{outer_bwd, outer_fwd};

/// `out[k-1] <- exp(x)` truncated to depth `D`, `x: (B, C)`.
///
/// `out` must hold exactly `D` mutable views, the `k`-th of shape
/// `(B, C^k)` (as produced by [`crate::layout::TermLayout::slice_by_term_mut`]).
#[tracing::instrument(level = "trace", skip_all, fields(depth = out.len()))]
pub fn restricted_exp_fwd<F: SignatureFloat>(x: ArrayView2<F>, r: &[F], out: &mut [ArrayViewMut2<F>]) {
    let depth = out.len();
    out[0].assign(&x);
    for k in 1..depth {
        let prev = out[k - 1].view().to_owned();
        let term = outer_fwd(prev.view(), x) * r[k - 1];
        out[k].assign(&term);
    }
}

/// Backward of [`restricted_exp_fwd`]. `grad_out[k-1]` is the incoming
/// gradient on `out[k-1]`; `out` is the saved forward output. Returns
/// `grad_x`.
#[tracing::instrument(level = "trace", skip_all, fields(depth = out.len()))]
pub fn restricted_exp_bwd<F: SignatureFloat>(
    x: ArrayView2<F>,
    r: &[F],
    out: &[Array2<F>],
    grad_out: &[Array2<F>],
) -> Array2<F> {
    let depth = out.len();
    let (batch, channels) = x.dim();
    let mut grad_x = Array2::<F>::zeros((batch, channels));

    if depth == 1 {
        grad_x.assign(&grad_out[0]);
        return grad_x;
    }

    let mut grad_out_scaled: Vec<Array2<F>> = grad_out.to_vec();
    for k in (1..depth).rev() {
        grad_out_scaled[k] = &grad_out_scaled[k] * r[k - 1];
        let (grad_prev, grad_x_contrib) = outer_bwd(grad_out_scaled[k].view(), out[k - 1].view(), x);
        grad_out_scaled[k - 1] = &grad_out_scaled[k - 1] + &grad_prev;
        grad_x = grad_x + grad_x_contrib;
    }
    grad_x = grad_x + &grad_out_scaled[0];
    grad_x
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn scalar_channel_matches_taylor_series() {
        // C = 1, D = 3, x = 2: depth-k entry is 2^k / k!
        let x = array![[2.0]];
        let r: Vec<f64> = crate::float::reciprocals(3);
        let mut g0 = Array2::<f64>::zeros((1, 1));
        let mut g1 = Array2::<f64>::zeros((1, 1));
        let mut g2 = Array2::<f64>::zeros((1, 1));
        {
            let mut views = [g0.view_mut(), g1.view_mut(), g2.view_mut()];
            restricted_exp_fwd(x.view(), &r, &mut views);
        }
        assert!((g0[[0, 0]] - 2.0).abs() < 1e-12);
        assert!((g1[[0, 0]] - 2.0).abs() < 1e-12);
        assert!((g2[[0, 0]] - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn two_channel_depth_two_matches_spec_example() {
        // S1's first term: x = [1, 0], D = 2 -> depth1=[1,0], depth2=[0.5,0,0,0]
        let x = array![[1.0, 0.0]];
        let r: Vec<f64> = crate::float::reciprocals(2);
        let mut g0 = Array2::<f64>::zeros((1, 2));
        let mut g1 = Array2::<f64>::zeros((1, 4));
        {
            let mut views = [g0.view_mut(), g1.view_mut()];
            restricted_exp_fwd(x.view(), &r, &mut views);
        }
        assert_eq!(g0.row(0).to_vec(), vec![1.0, 0.0]);
        assert_eq!(g1.row(0).to_vec(), vec![0.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn backward_matches_finite_difference() {
        let x = array![[0.3, -0.2]];
        let r: Vec<f64> = crate::float::reciprocals(3);
        let depth = 3;
        let channels = 2;

        let run = |x: ArrayView2<f64>| -> Vec<Array2<f64>> {
            let mut outs: Vec<Array2<f64>> = (1..=depth).map(|k| Array2::zeros((1, channels.pow(k as u32)))).collect();
            {
                let mut views: Vec<_> = outs.iter_mut().map(|o| o.view_mut()).collect();
                restricted_exp_fwd(x, &r, &mut views);
            }
            outs
        };

        let out = run(x.view());
        let grad_out: Vec<Array2<f64>> = out.iter().map(|o| Array2::ones(o.dim())).collect();
        let grad_x = restricted_exp_bwd(x.view(), &r, &out, &grad_out);

        let eps = 1e-6;
        for c in 0..channels {
            let mut x_plus = x.clone();
            x_plus[[0, c]] += eps;
            let mut x_minus = x.clone();
            x_minus[[0, c]] -= eps;
            let out_plus = run(x_plus.view());
            let out_minus = run(x_minus.view());
            let mut numeric = 0.0f64;
            for k in 0..depth {
                let diff = &out_plus[k] - &out_minus[k];
                numeric += diff.sum() / (2.0 * eps);
            }
            assert!((numeric - grad_x[[0, c]]).abs() < 1e-3, "c={c} numeric={numeric} analytic={}", grad_x[[0, c]]);
        }
    }
}
