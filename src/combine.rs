//! Signature-combine primitive (spec §4.H): concatenating two paths'
//! signatures is the tensor-algebra product of the two signatures
//! (Chen's identity). Thin wrapper over `ops::mult`.

use ndarray::Array2;

use crate::error::{SigResult, SignatureError};
use crate::float::SignatureFloat;
use crate::layout::TermLayout;
use crate::ops::mult::{mult_bwd, mult_fwd};

fn check_combine_shapes<F: SignatureFloat>(
    sig1: &Array2<F>,
    sig2: &Array2<F>,
    layout: &TermLayout,
) -> SigResult<()> {
    let expected = vec![sig1.dim().0, layout.width()];
    if sig1.shape() != expected.as_slice() {
        return Err(SignatureError::IncompatibleShapes { expected, found: sig1.shape().to_vec() });
    }
    if sig2.dim().0 != sig1.dim().0 {
        return Err(SignatureError::BatchMismatch {
            name: "sig2",
            expected: sig1.dim().0,
            found: sig2.dim().0,
        });
    }
    let expected2 = vec![sig2.dim().0, layout.width()];
    if sig2.shape() != expected2.as_slice() {
        return Err(SignatureError::IncompatibleShapes { expected: expected2, found: sig2.shape().to_vec() });
    }
    Ok(())
}

/// `combine(sig1, sig2, C, D) = sig1 ⊗ sig2`.
pub fn signature_combine_forward<F: SignatureFloat>(
    sig1: &Array2<F>,
    sig2: &Array2<F>,
    channels: usize,
    depth: usize,
) -> SigResult<Array2<F>> {
    let layout = TermLayout::new(channels, depth)?;
    check_combine_shapes(sig1, sig2, &layout)?;

    let mut out = sig1.clone();
    {
        let mut out_views = layout.slice_by_term_mut(out.view_mut());
        let sig2_views = layout.slice_by_term(sig2.view());
        mult_fwd(&mut out_views, &sig2_views);
    }
    Ok(out)
}

/// Backward of [`signature_combine_forward`]: `grad_sig1 = grad`, then the
/// tensor-product backward sweep accumulates into both operands.
pub fn signature_combine_backward<F: SignatureFloat>(
    grad: &Array2<F>,
    sig1: &Array2<F>,
    sig2: &Array2<F>,
    channels: usize,
    depth: usize,
) -> SigResult<(Array2<F>, Array2<F>)> {
    let layout = TermLayout::new(channels, depth)?;
    check_combine_shapes(sig1, sig2, &layout)?;

    let sig1_grades: Vec<Array2<F>> = layout.slice_by_term(sig1.view()).into_iter().map(|v| v.to_owned()).collect();
    let sig2_grades: Vec<Array2<F>> = layout.slice_by_term(sig2.view()).into_iter().map(|v| v.to_owned()).collect();
    let grad_grades: Vec<Array2<F>> = layout.slice_by_term(grad.view()).into_iter().map(|v| v.to_owned()).collect();

    let (grad_sig1_grades, grad_sig2_grades) = mult_bwd(&sig1_grades, &sig2_grades, &grad_grades);

    let mut grad_sig1 = Array2::<F>::zeros(sig1.dim());
    let mut grad_sig2 = Array2::<F>::zeros(sig2.dim());
    {
        let mut views1 = layout.slice_by_term_mut(grad_sig1.view_mut());
        for (view, g) in views1.iter_mut().zip(grad_sig1_grades.iter()) {
            view.assign(g);
        }
        let mut views2 = layout.slice_by_term_mut(grad_sig2.view_mut());
        for (view, g) in views2.iter_mut().zip(grad_sig2_grades.iter()) {
            view.assign(g);
        }
    }

    Ok((grad_sig1, grad_sig2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rejects_batch_mismatch() {
        let channels = 2;
        let depth = 2;
        let layout = TermLayout::new(channels, depth).unwrap();
        let sig1 = Array2::<f64>::zeros((2, layout.width()));
        let sig2 = Array2::<f64>::zeros((3, layout.width()));
        let err = signature_combine_forward(&sig1, &sig2, channels, depth).unwrap_err();
        assert!(matches!(err, SignatureError::BatchMismatch { .. }));
    }

    #[test]
    fn backward_matches_finite_difference() {
        let channels = 2;
        let depth = 2;
        let layout = TermLayout::new(channels, depth).unwrap();
        let sig1 = array![[0.1, -0.2, 0.05, 0.3, -0.1, 0.2]];
        let sig2 = array![[-0.05, 0.15, 0.2, -0.1, 0.05, 0.1]];
        assert_eq!(sig1.dim().1, layout.width());

        let out = signature_combine_forward(&sig1, &sig2, channels, depth).unwrap();
        let grad = Array2::<f64>::ones(out.dim());
        let (grad_sig1, grad_sig2) = signature_combine_backward(&grad, &sig1, &sig2, channels, depth).unwrap();

        let eps = 1e-6;
        for idx in 0..sig1.len() {
            let mut plus = sig1.clone();
            plus.as_slice_mut().unwrap()[idx] += eps;
            let mut minus = sig1.clone();
            minus.as_slice_mut().unwrap()[idx] -= eps;
            let out_plus = signature_combine_forward(&plus, &sig2, channels, depth).unwrap();
            let out_minus = signature_combine_forward(&minus, &sig2, channels, depth).unwrap();
            let numeric = (&out_plus - &out_minus).sum() / (2.0 * eps);
            assert!((numeric - grad_sig1.as_slice().unwrap()[idx]).abs() < 1e-3);
        }
        for idx in 0..sig2.len() {
            let mut plus = sig2.clone();
            plus.as_slice_mut().unwrap()[idx] += eps;
            let mut minus = sig2.clone();
            minus.as_slice_mut().unwrap()[idx] -= eps;
            let out_plus = signature_combine_forward(&sig1, &plus, channels, depth).unwrap();
            let out_minus = signature_combine_forward(&sig1, &minus, channels, depth).unwrap();
            let numeric = (&out_plus - &out_minus).sum() / (2.0 * eps);
            assert!((numeric - grad_sig2.as_slice().unwrap()[idx]).abs() < 1e-3);
        }
    }
}
