//! Precomputed random cache cycled with wraparound.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{RandomGenerator, RandomSource};

/// Shared diagnostic count of cache wraps across all arrays of a run.
///
/// Frequent wraps relative to particles x steps mean dispersion draws are
/// being reused.
#[derive(Debug, Clone, Default)]
pub struct WrapCounter(Arc<AtomicU64>);

impl WrapCounter {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct RandomArray {
    seed: u64,
    uniforms: Vec<f64>,
    gaussians: Vec<f64>,
    uniform_index: usize,
    gaussian_index: usize,
    uniform_wraps: u64,
    gaussian_wraps: u64,
    counter: WrapCounter,
}

impl RandomArray {
    pub fn new(seed: u64, cache_size: usize) -> Self {
        Self::with_counter(seed, cache_size, WrapCounter::default())
    }

    /// Build the caches from a fresh `RandomGenerator`: first `cache_size`
    /// uniforms, then `cache_size` normals from the same stream.
    pub fn with_counter(seed: u64, cache_size: usize, counter: WrapCounter) -> Self {
        let cache_size = cache_size.max(1);
        let mut source = RandomGenerator::new(seed);
        let uniforms = (0..cache_size).map(|_| source.next_double()).collect();
        let gaussians = (0..cache_size).map(|_| source.next_gaussian()).collect();
        Self {
            seed,
            uniforms,
            gaussians,
            uniform_index: 0,
            gaussian_index: 0,
            uniform_wraps: 0,
            gaussian_wraps: 0,
            counter,
        }
    }

    pub fn cache_size(&self) -> usize {
        self.uniforms.len()
    }

    /// Wraps of this array since construction or the last reset.
    pub fn wraps(&self) -> u64 {
        self.uniform_wraps + self.gaussian_wraps
    }

    /// How many times the more heavily used cache has been consumed. Each
    /// stream is counted against its own length; values above 1.0 mean
    /// draws are repeating.
    pub fn cycles(&self) -> f64 {
        let n = self.cache_size() as f64;
        let uniform = self.uniform_wraps as f64 + self.uniform_index as f64 / n;
        let gaussian = self.gaussian_wraps as f64 + self.gaussian_index as f64 / n;
        uniform.max(gaussian)
    }

    fn advance(index: &mut usize, len: usize, wraps: &mut u64, counter: &WrapCounter) {
        *index += 1;
        if *index >= len {
            *index = 0;
            *wraps += 1;
            counter.increment();
        }
    }
}

impl RandomSource for RandomArray {
    fn seed(&self) -> u64 {
        self.seed
    }

    fn next_double(&mut self) -> f64 {
        let value = self.uniforms[self.uniform_index];
        Self::advance(
            &mut self.uniform_index,
            self.uniforms.len(),
            &mut self.uniform_wraps,
            &self.counter,
        );
        value
    }

    fn next_gaussian(&mut self) -> f64 {
        let value = self.gaussians[self.gaussian_index];
        Self::advance(
            &mut self.gaussian_index,
            self.gaussians.len(),
            &mut self.gaussian_wraps,
            &self.counter,
        );
        value
    }

    fn reset(&mut self) {
        self.uniform_index = 0;
        self.gaussian_index = 0;
        self.uniform_wraps = 0;
        self.gaussian_wraps = 0;
    }
}
