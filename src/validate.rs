//! Argument validation (spec §6.4). Synchronous, allocation-free, run
//! before any buffer is touched — the Non-goal excluding a full
//! configuration/CLI surface does not cover this one named entry point.

use ndarray::ArrayViewD;

use crate::error::{SigResult, SignatureError};
use crate::float::SignatureFloat;

pub fn signature_checkargs<F: SignatureFloat>(
    path: ArrayViewD<F>,
    depth: usize,
    basepoint_value: Option<ArrayViewD<F>>,
    initial_value: Option<ArrayViewD<F>>,
) -> SigResult<()> {
    if path.ndim() != 3 {
        return Err(SignatureError::PathNotThreeDimensional { ndim: path.ndim() });
    }
    let shape = path.shape().to_vec();
    if shape.iter().any(|&d| d == 0) {
        return Err(SignatureError::ZeroSizedAxis { shape });
    }
    let (n, batch, channels) = (shape[0], shape[1], shape[2]);

    if depth == 0 {
        return Err(SignatureError::InvalidDepth { depth });
    }

    if n < 2 && basepoint_value.is_none() {
        return Err(SignatureError::StreamTooShort { stream_len: n });
    }

    if let Some(bp) = basepoint_value {
        if bp.ndim() != 2 {
            return Err(SignatureError::IncompatibleShapes {
                expected: vec![batch, channels],
                found: bp.shape().to_vec(),
            });
        }
        if bp.shape()[0] != batch {
            return Err(SignatureError::BatchMismatch { name: "basepoint", expected: batch, found: bp.shape()[0] });
        }
        if bp.shape()[1] != channels {
            return Err(SignatureError::ChannelMismatch {
                name: "basepoint",
                expected: channels,
                found: bp.shape()[1],
            });
        }
    }

    if let Some(init) = initial_value {
        let width = crate::layout::signature_channels(channels, depth);
        if init.ndim() != 2 {
            return Err(SignatureError::IncompatibleShapes {
                expected: vec![batch, width],
                found: init.shape().to_vec(),
            });
        }
        if init.shape()[0] != batch {
            return Err(SignatureError::BatchMismatch { name: "initial_value", expected: batch, found: init.shape()[0] });
        }
        if init.shape()[1] != width {
            return Err(SignatureError::ChannelMismatch {
                name: "initial_value",
                expected: width,
                found: init.shape()[1],
            });
        }
    }

    Ok(())
}
