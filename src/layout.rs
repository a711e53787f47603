//! Term layout & buffer slicing (spec §4.A).
//!
//! A truncated tensor-algebra element of depth `D` over `C` channels is
//! stored as one contiguous `(B, W)` buffer. `TermLayout` is the immutable
//! descriptor, computed once from `(channels, depth)`, that knows how to
//! carve that buffer into its `D` per-grade views without ever copying.

use ndarray::{Array3, ArrayView2, ArrayView3, ArrayViewMut2, ArrayViewMut3, Axis};

use crate::error::{SigResult, SignatureError};

/// Signature width `W(C, D) = C + C^2 + ... + C^D`.
pub fn signature_channels(channels: usize, depth: usize) -> usize {
    if channels == 1 {
        return depth;
    }
    let mut width = 0usize;
    let mut power = 1usize;
    for _ in 0..depth {
        power = power.saturating_mul(channels);
        width = width.saturating_add(power);
    }
    width
}

/// Immutable descriptor of how a `(..., W)` buffer splits into `D` grade
/// views, the `k`-th of width `C^k`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TermLayout {
    channels: usize,
    depth: usize,
    /// `offsets[k]` is the start of grade `k+1`; `offsets[depth]` is `width`.
    offsets: Vec<usize>,
}

impl TermLayout {
    pub fn new(channels: usize, depth: usize) -> SigResult<Self> {
        if depth == 0 {
            return Err(SignatureError::InvalidDepth { depth });
        }
        let mut offsets = Vec::with_capacity(depth + 1);
        offsets.push(0);
        let mut power = 1usize;
        for _ in 0..depth {
            power = power.saturating_mul(channels);
            offsets.push(offsets.last().unwrap() + power);
        }
        Ok(Self { channels, depth, offsets })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn width(&self) -> usize {
        *self.offsets.last().unwrap()
    }

    /// Width `C^k` of grade `k` (1-indexed: `k = 1 ..= depth`).
    pub fn grade_width(&self, k: usize) -> usize {
        self.offsets[k] - self.offsets[k - 1]
    }

    /// `[start, end)` sub-range of the last axis covered by grade `k`
    /// (1-indexed).
    pub fn grade_range(&self, k: usize) -> std::ops::Range<usize> {
        self.offsets[k - 1]..self.offsets[k]
    }

    /// Split a `(B, W)` view into its `D` grade views, the `k`-th of shape
    /// `(B, C^k)`. Zero-copy: every returned view aliases `buf`.
    pub fn slice_by_term<'a, F>(&self, buf: ArrayView2<'a, F>) -> Vec<ArrayView2<'a, F>> {
        let mut rest = buf;
        let mut out = Vec::with_capacity(self.depth);
        for k in 1..=self.depth {
            let width = self.grade_width(k);
            let (head, tail) = rest.split_at(Axis(1), width);
            out.push(head);
            rest = tail;
        }
        out
    }

    /// Mutable counterpart of [`slice_by_term`](Self::slice_by_term).
    pub fn slice_by_term_mut<'a, F>(&self, buf: ArrayViewMut2<'a, F>) -> Vec<ArrayViewMut2<'a, F>> {
        let mut rest = buf;
        let mut out = Vec::with_capacity(self.depth);
        for k in 1..=self.depth {
            let width = self.grade_width(k);
            let (head, tail) = rest.split_at(Axis(1), width);
            out.push(head);
            rest = tail;
        }
        out
    }

    /// Fixed-stream sub-sequence: index a `(S, B, W)` stream buffer at a
    /// single stream position, returning the `(B, W)` slice at that index.
    pub fn slice_at_stream<F>(stream_buf: ArrayView3<'_, F>, s: usize) -> ArrayView2<'_, F> {
        stream_buf.index_axis_move(Axis(0), s)
    }

    pub fn slice_at_stream_mut<F>(stream_buf: ArrayViewMut3<'_, F>, s: usize) -> ArrayViewMut2<'_, F> {
        stream_buf.index_axis_move(Axis(0), s)
    }

    /// Allocate a zeroed `(stream_len, batch, width)` buffer for stream-mode
    /// output, or its `(batch, width)` counterpart when `stream_len` is `1`
    /// and the caller collapses the leading axis themselves.
    pub fn zeros_stream<F: num_traits::Zero + Clone>(&self, stream_len: usize, batch: usize) -> Array3<F> {
        Array3::zeros((stream_len, batch, self.width()))
    }
}
