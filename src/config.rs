//! Process-wide configuration (spec §6.3): a single `max_parallelism`
//! ceiling on the stream-axis thread count.

use std::sync::atomic::{AtomicUsize, Ordering};

static MAX_PARALLELISM: AtomicUsize = AtomicUsize::new(0);

fn default_max_parallelism() -> usize {
    #[cfg(feature = "rayon")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "rayon"))]
    {
        1
    }
}

/// Current `max_parallelism` ceiling, defaulting to the host's thread count
/// the first time it is read.
pub fn max_parallelism() -> usize {
    let current = MAX_PARALLELISM.load(Ordering::Relaxed);
    if current != 0 {
        return current;
    }
    let default = default_max_parallelism().max(1);
    MAX_PARALLELISM.compare_exchange(0, default, Ordering::Relaxed, Ordering::Relaxed).ok();
    default
}

/// Overrides the `max_parallelism` ceiling. `0` is clamped to `1`.
pub fn set_max_parallelism(value: usize) {
    MAX_PARALLELISM.store(value.max(1), Ordering::Relaxed);
}
