//! Streaming signature driver, forward and backward (spec §4.G).
//!
//! Drives the fused kernel (component D) along the time axis, starting
//! from the restricted exponential (component C) or a supplied `initial`
//! signature. Two forward drivers exist for the remaining increments:
//! serial/batch-parallel (always available) and chunked-parallel (only
//! `stream == false`, via Chen's identity and component E).

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::backend::Backend;
use crate::error::SigResult;
use crate::float::{reciprocals, SignatureFloat};
use crate::increments::{increments_bwd, increments_fwd};
use crate::layout::TermLayout;
use crate::ops::exp::{restricted_exp_bwd, restricted_exp_fwd};
use crate::ops::fused::{fused_mul_exp_bwd, fused_mul_exp_fwd};
use crate::ops::mult::mult_fwd;

/// Reference-hardware heuristic (spec §9b): batch-axis parallelism only
/// pays for itself above this many scalar elements. Worth re-tuning on
/// target hardware; not re-derived here.
pub const PARALLEL_THRESHOLD: usize = 1_392_640;

/// The two possible shapes a signature can take, depending on `stream`.
#[derive(Clone, Debug)]
pub enum Signature<F: SignatureFloat> {
    Whole(Array2<F>),
    Stream(Array3<F>),
}

impl<F: SignatureFloat> Signature<F> {
    pub fn is_stream(&self) -> bool {
        matches!(self, Signature::Stream(_))
    }

    pub fn whole(&self) -> Option<&Array2<F>> {
        match self {
            Signature::Whole(a) => Some(a),
            Signature::Stream(_) => None,
        }
    }

    pub fn stream(&self) -> Option<&Array3<F>> {
        match self {
            Signature::Whole(_) => None,
            Signature::Stream(a) => Some(a),
        }
    }
}

fn grades_owned<F: SignatureFloat>(view: ArrayView2<F>, layout: &TermLayout) -> Vec<Array2<F>> {
    layout.slice_by_term(view).into_iter().map(|v| v.to_owned()).collect()
}

/// `signature_forward` (spec §6.2). Returns the signature and the path
/// increments that were computed along the way (needed unchanged by
/// `signature_backward`).
#[allow(clippy::too_many_arguments)]
pub fn signature_forward<F: SignatureFloat, B: Backend>(
    backend: &B,
    path: ArrayView3<F>,
    depth: usize,
    stream: bool,
    basepoint: Option<ArrayView2<F>>,
    inverse: bool,
    initial: Option<ArrayView2<F>>,
) -> SigResult<(Signature<F>, Array3<F>)> {
    let (_, batch, channels) = path.dim();
    let layout = TermLayout::new(channels, depth)?;
    let r: Vec<F> = reciprocals(depth);
    let increments = increments_fwd(path, basepoint, inverse);
    let stream_len = increments.dim().0;

    if stream {
        let mut out = layout.zeros_stream::<F>(stream_len, batch);
        {
            let mut first = out.index_axis_mut(Axis(0), 0);
            if let Some(init) = initial {
                first.assign(&init);
                let mut views = layout.slice_by_term_mut(first);
                fused_mul_exp_fwd(&mut views, increments.index_axis(Axis(0), 0), &r, inverse);
            } else {
                let mut views = layout.slice_by_term_mut(first);
                restricted_exp_fwd(increments.index_axis(Axis(0), 0), &r, &mut views);
            }
        }
        for s in 1..stream_len {
            let prev = out.index_axis(Axis(0), s - 1).to_owned();
            out.index_axis_mut(Axis(0), s).assign(&prev);
            let current = out.index_axis_mut(Axis(0), s);
            let mut views = layout.slice_by_term_mut(current);
            backend.fused_step(&mut views, increments.index_axis(Axis(0), s), &r, inverse, false);
        }
        return Ok((Signature::Stream(out), increments));
    }

    // stream == false: either chunked-parallel or serial/batch-parallel.
    let user_max = crate::config::max_parallelism();
    let chunk_count = chunked_plan(stream_len, backend.max_threads(), user_max);

    let mut whole = Array2::<F>::zeros((batch, layout.width()));
    {
        let mut first = whole.view_mut();
        if let Some(init) = initial {
            first.assign(&init);
            let mut views = layout.slice_by_term_mut(first);
            fused_mul_exp_fwd(&mut views, increments.index_axis(Axis(0), 0), &r, inverse);
        } else {
            let mut views = layout.slice_by_term_mut(first);
            restricted_exp_fwd(increments.index_axis(Axis(0), 0), &r, &mut views);
        }
    }

    if let Some(chunks) = chunk_count.filter(|&t| t > 1) {
        drive_chunked(&mut whole, increments.view(), &layout, &r, inverse, chunks);
    } else {
        let total_elems = batch * stream_len * layout.width();
        let parallel = total_elems >= PARALLEL_THRESHOLD;
        for s in 1..stream_len {
            let mut views = layout.slice_by_term_mut(whole.view_mut());
            backend.fused_step(&mut views, increments.index_axis(Axis(0), s), &r, inverse, parallel);
        }
    }

    Ok((Signature::Whole(whole), increments))
}

/// `T = min(max_threads, (S+1)/3, user_max_parallelism)`, or `None` if the
/// stream is too short to partition at all.
fn chunked_plan(stream_len: usize, max_threads: usize, user_max: usize) -> Option<usize> {
    if stream_len < 2 {
        return None;
    }
    let by_length = (stream_len + 1) / 3;
    if by_length == 0 {
        return None;
    }
    Some(max_threads.min(by_length).min(user_max).max(1))
}

fn drive_chunked<F: SignatureFloat>(
    global: &mut Array2<F>,
    increments: ArrayView3<F>,
    layout: &TermLayout,
    r: &[F],
    inverse: bool,
    chunk_count: usize,
) {
    let stream_len = increments.dim().0;
    let batch = increments.dim().1;
    // Partition [1, stream_len) into `chunk_count` contiguous chunks.
    let span = stream_len - 1;
    let base = span / chunk_count;
    let extra = span % chunk_count;
    let mut bounds = Vec::with_capacity(chunk_count + 1);
    bounds.push(1usize);
    for t in 0..chunk_count {
        let size = base + if t < extra { 1 } else { 0 };
        bounds.push(bounds[t] + size);
    }

    let chunk_sigs: Vec<Array2<F>> = bounds
        .windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| {
            let (start, end) = (w[0], w[1]);
            let mut chunk = Array2::<F>::zeros((batch, layout.width()));
            {
                let mut views = layout.slice_by_term_mut(chunk.view_mut());
                restricted_exp_fwd(increments.index_axis(Axis(0), start), r, &mut views);
            }
            for s in (start + 1)..end {
                let mut views = layout.slice_by_term_mut(chunk.view_mut());
                fused_mul_exp_fwd(&mut views, increments.index_axis(Axis(0), s), r, inverse);
            }
            chunk
        })
        .collect();

    // Each chunk's own forward already left-multiplied its increments when
    // `inverse`, so chunk_t (as a standalone signature) reads
    // exp(inc[end-1]) ⊗ ... ⊗ exp(inc[start]) instead of the other way
    // round. Composing left-to-right in ascending chunk order (as the
    // non-inverse case does) would then put the whole chunk sequence in
    // the wrong order relative to `first_term`; composing each new chunk
    // onto the *left* of the running accumulator restores the same
    // right-to-left order the serial driver produces.
    if inverse {
        for chunk in &chunk_sigs {
            let mut acc = chunk.clone();
            {
                let mut acc_views = layout.slice_by_term_mut(acc.view_mut());
                let global_views: Vec<_> = layout.slice_by_term(global.view());
                mult_fwd(&mut acc_views, &global_views);
            }
            *global = acc;
        }
    } else {
        for chunk in &chunk_sigs {
            let mut global_views = layout.slice_by_term_mut(global.view_mut());
            let chunk_views: Vec<_> = layout.slice_by_term(chunk.view());
            mult_fwd(&mut global_views, &chunk_views);
        }
    }
}

/// `signature_backward` (spec §6.2). `has_basepoint` and `batch`/`channels`
/// describe the original `path` that produced `saved_path_increments`.
#[allow(clippy::too_many_arguments)]
pub fn signature_backward<F: SignatureFloat>(
    grad_signature: &Signature<F>,
    signature: &Signature<F>,
    saved_path_increments: ArrayView3<F>,
    depth: usize,
    has_basepoint: bool,
    inverse: bool,
    initial: Option<ArrayView2<F>>,
) -> SigResult<(Array3<F>, Option<Array2<F>>, Option<Array2<F>>)> {
    let (stream_len, batch, channels) = saved_path_increments.dim();
    let layout = TermLayout::new(channels, depth)?;
    let r: Vec<F> = reciprocals(depth);

    let stream_mode = grad_signature.is_stream();

    let mut grad_path_increments = Array3::<F>::zeros((stream_len, batch, channels));

    let mut grad_at_stream: Array2<F> = match (grad_signature, stream_mode) {
        (Signature::Stream(g), true) => g.index_axis(Axis(0), stream_len - 1).to_owned(),
        (Signature::Whole(g), false) => g.clone(),
        _ => unreachable!("grad_signature stream-ness must match its own shape"),
    };

    // Scratch used to roll the non-stream signature backward in place.
    let mut scratch: Option<Array2<F>> = match signature {
        Signature::Whole(s) => Some(s.clone()),
        Signature::Stream(_) => None,
    };

    for s in (1..stream_len).rev() {
        let prev_owned: Vec<Array2<F>> = match signature {
            Signature::Stream(sig) => grades_owned(sig.index_axis(Axis(0), s - 1), &layout),
            Signature::Whole(_) => {
                let buf = scratch.as_mut().expect("scratch present when stream == false");
                {
                    let mut views = layout.slice_by_term_mut(buf.view_mut());
                    let negated = saved_path_increments.index_axis(Axis(0), s).mapv(|v| -v);
                    fused_mul_exp_fwd(&mut views, negated.view(), &r, inverse);
                }
                grades_owned(buf.view(), &layout)
            }
        };

        let grad_prev_after: Vec<Array2<F>> = grades_owned(grad_at_stream.view(), &layout);
        let (grad_prev_before, grad_next) = fused_mul_exp_bwd(
            &prev_owned,
            saved_path_increments.index_axis(Axis(0), s),
            &r,
            inverse,
            &grad_prev_after,
        );

        grad_path_increments.index_axis_mut(Axis(0), s).assign(&grad_next);

        let mut rebuilt = Array2::<F>::zeros((batch, layout.width()));
        {
            let mut views = layout.slice_by_term_mut(rebuilt.view_mut());
            for (view, grad) in views.iter_mut().zip(grad_prev_before.iter()) {
                view.assign(grad);
            }
        }
        grad_at_stream = rebuilt;

        if let Signature::Stream(g) = grad_signature {
            grad_at_stream += &g.index_axis(Axis(0), s - 1);
        }
    }

    let grad_initial_value = if let Some(init) = initial {
        let init_owned: Vec<Array2<F>> = grades_owned(init, &layout);
        let grad_prev_after: Vec<Array2<F>> = grades_owned(grad_at_stream.view(), &layout);
        let (grad_initial, grad_inc0) = fused_mul_exp_bwd(
            &init_owned,
            saved_path_increments.index_axis(Axis(0), 0),
            &r,
            inverse,
            &grad_prev_after,
        );
        grad_path_increments.index_axis_mut(Axis(0), 0).assign(&grad_inc0);

        let mut packed = Array2::<F>::zeros((batch, layout.width()));
        {
            let mut views = layout.slice_by_term_mut(packed.view_mut());
            for (view, grad) in views.iter_mut().zip(grad_initial.iter()) {
                view.assign(grad);
            }
        }
        Some(packed)
    } else {
        let first_out: Vec<Array2<F>> = match signature {
            Signature::Stream(sig) => grades_owned(sig.index_axis(Axis(0), 0), &layout),
            Signature::Whole(_) => {
                let buf = scratch.as_ref().expect("scratch present when stream == false");
                grades_owned(buf.view(), &layout)
            }
        };
        let grad_prev_after: Vec<Array2<F>> = grades_owned(grad_at_stream.view(), &layout);
        let grad_inc0 = restricted_exp_bwd(
            saved_path_increments.index_axis(Axis(0), 0),
            &r,
            &first_out,
            &grad_prev_after,
        );
        grad_path_increments.index_axis_mut(Axis(0), 0).assign(&grad_inc0);
        None
    };

    let (grad_path, grad_basepoint) =
        increments_bwd(grad_path_increments.view(), stream_len + usize::from(!has_basepoint), batch, channels, has_basepoint, inverse);

    Ok((grad_path, grad_basepoint, grad_initial_value))
}
