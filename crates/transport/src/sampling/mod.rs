//! Deterministic random sampling for dispersion.
//!
//! Every worker thread owns its own source so the hot sampling path never
//! synchronizes. Two flavours exist:
//!
//! - [`RandomGenerator`]: a live `ChaCha8Rng` stream with Box–Muller normals.
//! - [`RandomArray`]: a fixed cache of precomputed values cycled with
//!   wraparound. Cheaper per draw, but values repeat once the cache wraps,
//!   which is counted in a shared [`WrapCounter`].

mod array;
mod generator;
#[cfg(test)]
mod tests;

pub use array::{RandomArray, WrapCounter};
pub use generator::{box_muller_pair, RandomGenerator};

/// Common interface over the sampling flavours.
pub trait RandomSource {
    /// Seed this source was built from; fixed after construction.
    fn seed(&self) -> u64;

    /// Uniform draw in `[0, 1)`.
    fn next_double(&mut self) -> f64;

    /// Standard normal draw (mean 0, variance 1).
    fn next_gaussian(&mut self) -> f64;

    /// Rewind to the first value this seed produces.
    fn reset(&mut self);
}

/// Per-worker source selected by configuration.
#[derive(Debug, Clone)]
pub enum WorkerRng {
    Live(RandomGenerator),
    Cached(RandomArray),
}

impl WorkerRng {
    pub fn live(seed: u64) -> Self {
        WorkerRng::Live(RandomGenerator::new(seed))
    }

    pub fn cached(seed: u64, cache_size: usize, counter: WrapCounter) -> Self {
        WorkerRng::Cached(RandomArray::with_counter(seed, cache_size, counter))
    }
}

impl RandomSource for WorkerRng {
    fn seed(&self) -> u64 {
        match self {
            WorkerRng::Live(g) => g.seed(),
            WorkerRng::Cached(a) => a.seed(),
        }
    }

    fn next_double(&mut self) -> f64 {
        match self {
            WorkerRng::Live(g) => g.next_double(),
            WorkerRng::Cached(a) => a.next_double(),
        }
    }

    fn next_gaussian(&mut self) -> f64 {
        match self {
            WorkerRng::Live(g) => g.next_gaussian(),
            WorkerRng::Cached(a) => a.next_gaussian(),
        }
    }

    fn reset(&mut self) {
        match self {
            WorkerRng::Live(g) => g.reset(),
            WorkerRng::Cached(a) => a.reset(),
        }
    }
}
