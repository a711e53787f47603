use ndarray::{Axis, ArrayView2, ArrayViewMut2};

use crate::backend::Backend;
use crate::float::SignatureFloat;
use crate::ops::fused::fused_mul_exp_fwd;

#[derive(Debug, Default)]
pub struct CpuBackend;

impl Backend for CpuBackend {
    fn max_threads(&self) -> usize {
        #[cfg(feature = "rayon")]
        {
            rayon::current_num_threads()
        }
        #[cfg(not(feature = "rayon"))]
        {
            1
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(parallel, depth = prev.len()))]
    fn fused_step<F: SignatureFloat>(
        &self,
        prev: &mut [ArrayViewMut2<F>],
        next: ArrayView2<F>,
        r: &[F],
        inverse: bool,
        parallel: bool,
    ) {
        #[cfg(feature = "rayon")]
        {
            if parallel {
                let batch = next.dim().0;
                let threads = self.max_threads().max(1).min(batch.max(1));
                if threads > 1 {
                    let chunk_len = (batch + threads - 1) / threads;
                    let mut prev_chunks = split_batch_mut(prev, chunk_len);
                    let next_chunks: Vec<_> = next.axis_chunks_iter(Axis(0), chunk_len).collect();
                    let tasks: Vec<_> = prev_chunks.drain(..).zip(next_chunks.into_iter()).collect();
                    rayon::scope(|scope| {
                        for (mut prev_chunk, next_chunk) in tasks {
                            scope.spawn(move |_| {
                                fused_mul_exp_fwd(&mut prev_chunk, next_chunk, r, inverse);
                            });
                        }
                    });
                    return;
                }
            }
        }
        let _ = parallel;
        fused_mul_exp_fwd(prev, next, r, inverse);
    }
}

/// Splits each grade view's batch axis into chunks of `chunk_len` rows,
/// transposing the per-grade iterators into one `Vec<ArrayViewMut2>` per
/// chunk. Every returned chunk aliases a disjoint batch slice of `views`,
/// so the chunks can be handed to independent threads safely.
#[cfg(feature = "rayon")]
fn split_batch_mut<'a, 'b: 'a, F: SignatureFloat>(
    views: &'a mut [ArrayViewMut2<'b, F>],
    chunk_len: usize,
) -> Vec<Vec<ArrayViewMut2<'a, F>>> {
    let mut iters: Vec<_> = views
        .iter_mut()
        .map(|v| v.axis_chunks_iter_mut(Axis(0), chunk_len))
        .collect();
    let mut out = Vec::new();
    'outer: loop {
        let mut chunk = Vec::with_capacity(iters.len());
        for it in iters.iter_mut() {
            match it.next() {
                Some(v) => chunk.push(v),
                None => break 'outer,
            }
        }
        out.push(chunk);
    }
    out
}
