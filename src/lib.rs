//! Truncated signature transform of piecewise-linear paths: the tensor
//! algebra, the fused restricted-exponential kernel, the streaming driver
//! (serial, batch-parallel and chunked-parallel), and the Chen's-identity
//! combine primitive — forward and reverse-mode, over a generic float type.

pub mod backend;
pub mod combine;
pub mod config;
pub mod error;
pub mod float;
pub mod increments;
pub mod layout;
pub mod ops;
pub mod stream;
pub mod validate;

pub use backend::cpu::CpuBackend;
pub use backend::Backend;
pub use combine::{signature_combine_backward, signature_combine_forward};
pub use config::{max_parallelism, set_max_parallelism};
pub use error::{SigResult, SignatureError};
pub use float::SignatureFloat;
pub use layout::{signature_channels, TermLayout};
pub use stream::Signature;

use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

/// `signature_forward` (spec §6.2), dispatched to the default CPU backend.
#[allow(clippy::too_many_arguments)]
pub fn signature_forward<F: SignatureFloat>(
    path: ArrayView3<F>,
    depth: usize,
    stream: bool,
    basepoint_value: Option<ArrayView2<F>>,
    inverse: bool,
    initial_value: Option<ArrayView2<F>>,
) -> SigResult<(Signature<F>, Array3<F>)> {
    validate::signature_checkargs(
        path.view().into_dyn(),
        depth,
        basepoint_value.map(|v| v.into_dyn()),
        initial_value.map(|v| v.into_dyn()),
    )?;
    let backend = CpuBackend;
    stream::signature_forward(&backend, path, depth, stream, basepoint_value, inverse, initial_value)
}

/// `signature_backward` (spec §6.2).
#[allow(clippy::too_many_arguments)]
pub fn signature_backward<F: SignatureFloat>(
    grad_signature: &Signature<F>,
    signature: &Signature<F>,
    saved_path_increments: ArrayView3<F>,
    depth: usize,
    has_basepoint: bool,
    inverse: bool,
    initial_value: Option<ArrayView2<F>>,
) -> SigResult<(Array3<F>, Option<Array2<F>>, Option<Array2<F>>)> {
    stream::signature_backward(
        grad_signature,
        signature,
        saved_path_increments,
        depth,
        has_basepoint,
        inverse,
        initial_value,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_matches_closed_form_property() {
        assert_eq!(signature_channels(2, 2), 6);
        assert_eq!(signature_channels(1, 5), 5);
    }

    #[test]
    fn top_level_forward_rejects_bad_shapes() {
        let path = Array3::<f64>::zeros((0, 1, 2));
        let err = signature_forward(path.view(), 2, false, None, false, None).unwrap_err();
        assert!(matches!(err, SignatureError::ZeroSizedAxis { .. }));
    }
}
