use thiserror::Error;

/// Errors surfaced at the public boundary of `signature-core`.
///
/// Argument/shape problems are caught synchronously, before any allocation
/// (spec §7). Arithmetic propagation (NaN/Inf) is never an error. Internal
/// invariant violations are asserted via `debug_assert!` at the call site
/// instead of being routed through this enum.
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("path must have 3 dimensions (stream, batch, channel), found {ndim} (did you mean to add a batch axis?)")]
    PathNotThreeDimensional { ndim: usize },

    #[error("path has a zero-sized axis: shape {shape:?}")]
    ZeroSizedAxis { shape: Vec<usize> },

    #[error("stream length {stream_len} is too short: need at least 2 points, or 1 with a basepoint")]
    StreamTooShort { stream_len: usize },

    #[error("depth must be at least 1, found {depth}")]
    InvalidDepth { depth: usize },

    #[error("incompatible shapes: expected {expected:?}, found {found:?}")]
    IncompatibleShapes { expected: Vec<usize>, found: Vec<usize> },

    #[error("batch size mismatch: {name} has batch {found}, expected {expected}")]
    BatchMismatch { name: &'static str, expected: usize, found: usize },

    #[error("{name} has channel width {found}, expected {expected}")]
    ChannelMismatch { name: &'static str, expected: usize, found: usize },
}

pub type SigResult<T> = Result<T, SignatureError>;
