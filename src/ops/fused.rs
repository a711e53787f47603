//! Fused multiply-by-restricted-exponential, forward and backward
//! (spec §4.D). This is the hot inner loop of the streaming driver: it
//! updates `prev <- prev ⊗ exp(next)` (or, with `inverse`, `exp(next) ⊗ prev`)
//! in place, one grade at a time, without ever materializing `exp(next)`.

use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use crate::float::SignatureFloat;
use crate::ops::outer::{outer_step_bwd, outer_step_fwd};

fn next_divided<F: SignatureFloat>(next: ArrayView2<F>, r: &[F]) -> Vec<Array2<F>> {
    r.iter().map(|&ri| next.to_owned() * ri).collect()
}

/// `prev <- prev ⊗ exp(next)` (forward `inverse == false`) or
/// `exp(next) ⊗ prev` (`inverse == true`), truncated to depth `D = prev.len()`.
#[tracing::instrument(level = "trace", skip_all, fields(depth = prev.len(), inverse))]
pub fn fused_mul_exp_fwd<F: SignatureFloat>(
    prev: &mut [ArrayViewMut2<F>],
    next: ArrayView2<F>,
    r: &[F],
    inverse: bool,
) {
    let depth = prev.len();
    let nd = next_divided(next, r);

    for d in (1..depth).rev() {
        let mut s = prev[0].to_owned() + &nd[d - 1];
        for m in 1..d {
            let k = d - 1 - m;
            let step = outer_step_fwd(inverse, s.view(), nd[k].view());
            s = prev[m].to_owned() + &step;
        }
        let add = outer_step_fwd(inverse, s.view(), next);
        prev[d] += &add;
    }
    prev[0] += &next;
}

/// Backward of [`fused_mul_exp_fwd`]. `prev` is the signature *before* this
/// increment was applied (the replay strategy of spec §9 needs the
/// pre-update values to reconstruct every Horner scratch). `grad_prev_after`
/// is the incoming gradient on the post-update `prev`. Returns
/// `(grad_prev_before, grad_next)`, both matching `prev`'s and `next`'s
/// shapes.
#[tracing::instrument(level = "trace", skip_all, fields(depth = prev.len(), inverse))]
pub fn fused_mul_exp_bwd<F: SignatureFloat>(
    prev: &[Array2<F>],
    next: ArrayView2<F>,
    r: &[F],
    inverse: bool,
    grad_prev_after: &[Array2<F>],
) -> (Vec<Array2<F>>, Array2<F>) {
    let depth = prev.len();
    let (batch, channels) = next.dim();
    let nd = next_divided(next, r);

    let mut grad_prev_before: Vec<Array2<F>> = grad_prev_after.to_vec();
    let mut grad_next = grad_prev_after[0].clone();
    let mut grad_nd: Vec<Array2<F>> = (0..nd.len()).map(|_| Array2::zeros((batch, channels))).collect();

    for d in 1..depth {
        // Replay the forward scratch chain for this level using the
        // pre-update `prev`.
        let mut scratch: Vec<Array2<F>> = Vec::with_capacity(d);
        scratch.push(prev[0].clone() + &nd[d - 1]);
        for m in 1..d {
            let k = d - 1 - m;
            let step = outer_step_fwd(inverse, scratch[m - 1].view(), nd[k].view());
            scratch.push(prev[m].clone() + &step);
        }

        // Unwind the final accumulation: prev[d] += outer_step(s_last, next).
        let s_last = scratch[d - 1].clone();
        let grad_final = grad_prev_after[d].clone();
        let (grad_s, grad_next_contrib) = outer_step_bwd(inverse, grad_final.view(), s_last.view(), next);
        grad_next = grad_next + grad_next_contrib;
        let mut grad_s_running = grad_s;

        // Walk the inner Horner chain backwards.
        for m in (1..d).rev() {
            let k = d - 1 - m;
            grad_prev_before[m] = &grad_prev_before[m] + &grad_s_running;
            let prev_scratch = scratch[m - 1].view();
            let (grad_prev_m, grad_nd_k) = outer_step_bwd(inverse, grad_s_running.view(), prev_scratch, nd[k].view());
            grad_nd[k] = &grad_nd[k] + &grad_nd_k;
            grad_s_running = grad_prev_m;
        }

        grad_prev_before[0] = &grad_prev_before[0] + &grad_s_running;
        grad_nd[d - 1] = &grad_nd[d - 1] + &grad_s_running;
    }

    // Collapse grad_next_divided back onto grad_next: next_divided[i] = next * r[i].
    for (i, g) in grad_nd.iter().enumerate() {
        grad_next = grad_next + &(g * r[i]);
    }

    (grad_prev_before, grad_next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float::reciprocals;
    use crate::layout::TermLayout;
    use ndarray::array;

    #[test]
    fn matches_spec_s1_two_steps() {
        // C=2, D=2, path = [[0,0],[1,0],[1,1]], no basepoint, no inverse.
        let layout = TermLayout::new(2, 2).unwrap();
        let r: Vec<f64> = reciprocals(2);
        let inc0 = array![[1.0, 0.0]];
        let inc1 = array![[0.0, 1.0]];

        let mut buf = ndarray::Array2::<f64>::zeros((1, layout.width()));
        {
            let mut views = layout.slice_by_term_mut(buf.view_mut());
            crate::ops::exp::restricted_exp_fwd(inc0.view(), &r, &mut views);
        }
        {
            let mut views = layout.slice_by_term_mut(buf.view_mut());
            fused_mul_exp_fwd(&mut views, inc1.view(), &r, false);
        }

        assert_eq!(buf.row(0).to_vec(), vec![1.0, 1.0, 0.5, 1.0, 0.0, 0.5]);
    }

    #[test]
    fn matches_spec_s2_inverse() {
        // Same path, inverse=true: increments via the inverse table.
        let layout = TermLayout::new(2, 2).unwrap();
        let r: Vec<f64> = reciprocals(2);
        let inc0 = array![[-1.0, 0.0]]; // path[0]-path[1]
        let inc1 = array![[0.0, -1.0]]; // path[1]-path[2]

        let mut buf = ndarray::Array2::<f64>::zeros((1, layout.width()));
        {
            let mut views = layout.slice_by_term_mut(buf.view_mut());
            crate::ops::exp::restricted_exp_fwd(inc0.view(), &r, &mut views);
        }
        {
            let mut views = layout.slice_by_term_mut(buf.view_mut());
            fused_mul_exp_fwd(&mut views, inc1.view(), &r, true);
        }

        assert_eq!(buf.row(0).to_vec(), vec![-1.0, -1.0, 0.5, 0.0, 1.0, 0.5]);
    }

    #[test]
    fn backward_matches_finite_difference() {
        let channels = 2;
        let depth = 3;
        let layout = TermLayout::new(channels, depth).unwrap();
        let r: Vec<f64> = reciprocals(depth);

        let prev0 = array![[0.2, -0.1]];
        let prev_init: Vec<ndarray::Array2<f64>> = {
            let mut buf = ndarray::Array2::<f64>::zeros((1, layout.width()));
            {
                let mut views = layout.slice_by_term_mut(buf.view_mut());
                crate::ops::exp::restricted_exp_fwd(prev0.view(), &r, &mut views);
            }
            layout.slice_by_term(buf.view()).iter().map(|v| v.to_owned()).collect()
        };

        let next = array![[0.05, 0.3]];

        let run = |prev: &[ndarray::Array2<f64>], next: ArrayView2<f64>| -> Vec<ndarray::Array2<f64>> {
            let mut owned: Vec<_> = prev.iter().cloned().collect();
            {
                let mut views: Vec<_> = owned.iter_mut().map(|o| o.view_mut()).collect();
                fused_mul_exp_fwd(&mut views, next, &r, false);
            }
            owned
        };

        let out = run(&prev_init, next.view());
        let grad_out: Vec<_> = out.iter().map(|o| ndarray::Array2::ones(o.dim())).collect();
        let (grad_prev, grad_next) = fused_mul_exp_bwd(&prev_init, next.view(), &r, false, &grad_out);

        let eps = 1e-6;
        for c in 0..channels {
            let mut next_plus = next.clone();
            next_plus[[0, c]] += eps;
            let mut next_minus = next.clone();
            next_minus[[0, c]] -= eps;
            let out_plus = run(&prev_init, next_plus.view());
            let out_minus = run(&prev_init, next_minus.view());
            let mut numeric = 0.0;
            for k in 0..depth {
                numeric += (&out_plus[k] - &out_minus[k]).sum() / (2.0 * eps);
            }
            assert!((numeric - grad_next[[0, c]]).abs() < 1e-3, "next c={c}");
        }

        for k in 0..depth {
            for idx in 0..prev_init[k].len() {
                let mut prev_plus = prev_init.clone();
                prev_plus[k].as_slice_mut().unwrap()[idx] += eps;
                let mut prev_minus = prev_init.clone();
                prev_minus[k].as_slice_mut().unwrap()[idx] -= eps;
                let out_plus = run(&prev_plus, next.view());
                let out_minus = run(&prev_minus, next.view());
                let mut numeric = 0.0;
                for kk in 0..depth {
                    numeric += (&out_plus[kk] - &out_minus[kk]).sum() / (2.0 * eps);
                }
                assert!((numeric - grad_prev[k].as_slice().unwrap()[idx]).abs() < 1e-3, "prev[{k}][{idx}]");
            }
        }
    }
}
