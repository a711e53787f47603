//! Path-increment extraction, forward and backward (spec §4.F).
//!
//! Four sign/basepoint cases, computed without ever materializing a
//! concatenated `[basepoint, path...]` array. The `inverse` flag turns out
//! to be a pure elementwise negation of the same-position difference (not
//! a reordering) — the path-reversal effect lives entirely in the fused
//! kernel's `inverse` flag (spec §4.D), which changes which side of the
//! product the new term lands on as the driver walks the stream forward.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::float::SignatureFloat;

/// `(N, B, C) -> (S, B, C)` successive differences, `S = N - (basepoint ? 0 : 1)`.
pub fn increments_fwd<F: SignatureFloat>(
    path: ArrayView3<F>,
    basepoint: Option<ArrayView2<F>>,
    inverse: bool,
) -> Array3<F> {
    let (n, batch, channels) = path.dim();
    let stream_len = if basepoint.is_some() { n } else { n - 1 };
    let mut out = Array3::<F>::zeros((stream_len, batch, channels));

    match basepoint {
        None => {
            for s in 0..stream_len {
                let diff = &path.index_axis(Axis(0), s + 1) - &path.index_axis(Axis(0), s);
                out.index_axis_mut(Axis(0), s).assign(&diff);
            }
        }
        Some(bp) => {
            let diff0 = &path.index_axis(Axis(0), 0) - &bp;
            out.index_axis_mut(Axis(0), 0).assign(&diff0);
            for s in 1..stream_len {
                let diff = &path.index_axis(Axis(0), s) - &path.index_axis(Axis(0), s - 1);
                out.index_axis_mut(Axis(0), s).assign(&diff);
            }
        }
    }

    if inverse {
        out.mapv_inplace(|v| -v);
    }
    out
}

/// Backward of [`increments_fwd`]. `n` is the original path length; returns
/// `(grad_path, grad_basepoint)`, with `grad_basepoint` only populated when
/// `has_basepoint` is set.
pub fn increments_bwd<F: SignatureFloat>(
    grad_increments: ArrayView3<F>,
    n: usize,
    batch: usize,
    channels: usize,
    has_basepoint: bool,
    inverse: bool,
) -> (Array3<F>, Option<Array2<F>>) {
    let stream_len = grad_increments.dim().0;
    let sign = if inverse { -F::one() } else { F::one() };

    let mut grad_path = Array3::<F>::zeros((n, batch, channels));
    let mut grad_basepoint = if has_basepoint {
        Some(Array2::<F>::zeros((batch, channels)))
    } else {
        None
    };

    if !has_basepoint {
        for s in 0..stream_len {
            let g = grad_increments.index_axis(Axis(0), s).mapv(|v| v * sign);
            let mut gp1 = grad_path.index_axis_mut(Axis(0), s + 1);
            gp1 += &g;
            let mut gp0 = grad_path.index_axis_mut(Axis(0), s);
            gp0 -= &g;
        }
    } else {
        let g0 = grad_increments.index_axis(Axis(0), 0).mapv(|v| v * sign);
        {
            let mut gp0 = grad_path.index_axis_mut(Axis(0), 0);
            gp0 += &g0;
        }
        if let Some(gb) = grad_basepoint.as_mut() {
            *gb -= &g0;
        }
        for s in 1..stream_len {
            let g = grad_increments.index_axis(Axis(0), s).mapv(|v| v * sign);
            {
                let mut gps = grad_path.index_axis_mut(Axis(0), s);
                gps += &g;
            }
            let mut gprev = grad_path.index_axis_mut(Axis(0), s - 1);
            gprev -= &g;
        }
    }

    (grad_path, grad_basepoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn path_s1() -> ndarray::Array3<f64> {
        // (N=3, B=1, C=2)
        let mut p = ndarray::Array3::<f64>::zeros((3, 1, 2));
        p.index_axis_mut(Axis(0), 0).assign(&array![[0.0, 0.0]]);
        p.index_axis_mut(Axis(0), 1).assign(&array![[1.0, 0.0]]);
        p.index_axis_mut(Axis(0), 2).assign(&array![[1.0, 1.0]]);
        p
    }

    #[test]
    fn no_basepoint_no_inverse() {
        let p = path_s1();
        let inc = increments_fwd(p.view(), None, false);
        assert_eq!(inc.index_axis(Axis(0), 0).row(0).to_vec(), vec![1.0, 0.0]);
        assert_eq!(inc.index_axis(Axis(0), 1).row(0).to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn no_basepoint_inverse() {
        let p = path_s1();
        let inc = increments_fwd(p.view(), None, true);
        assert_eq!(inc.index_axis(Axis(0), 0).row(0).to_vec(), vec![-1.0, 0.0]);
        assert_eq!(inc.index_axis(Axis(0), 1).row(0).to_vec(), vec![0.0, -1.0]);
    }

    #[test]
    fn basepoint_equivalence_increments() {
        let p = path_s1();
        let bp = p.index_axis(Axis(0), 0).to_owned();
        let sub = p.slice(ndarray::s![1.., .., ..]).to_owned();
        let inc_bp = increments_fwd(sub.view(), Some(bp.view()), false);
        let inc_plain = increments_fwd(p.view(), None, false);
        assert_eq!(inc_bp.shape(), inc_plain.shape());
        for s in 0..inc_bp.dim().0 {
            assert_eq!(
                inc_bp.index_axis(Axis(0), s).row(0).to_vec(),
                inc_plain.index_axis(Axis(0), s).row(0).to_vec()
            );
        }
    }
}
