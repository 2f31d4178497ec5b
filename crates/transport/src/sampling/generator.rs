//! Seeded uniform/Gaussian generator.
//!
//! Wraps `ChaCha8Rng` for cross-platform deterministic randomness. Normal
//! deviates come in Box–Muller pairs: the cosine branch is returned and the
//! sine branch is cached for the following call.

use std::f64::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::RandomSource;

/// Box–Muller transform of two uniform draws into two standard normals.
///
/// `u1 == 0` yields infinities; callers accept that boundary.
#[inline]
pub fn box_muller_pair(u1: f64, u2: f64) -> (f64, f64) {
    let r = (-2.0 * u1.ln()).sqrt();
    let angle = TAU * u2;
    (r * angle.cos(), r * angle.sin())
}

#[derive(Debug, Clone)]
pub struct RandomGenerator {
    seed: u64,
    rng: ChaCha8Rng,
    cached_gaussian: Option<f64>,
}

impl RandomGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            cached_gaussian: None,
        }
    }

    /// Whether a second Box–Muller deviate is waiting to be returned.
    pub fn has_cached_gaussian(&self) -> bool {
        self.cached_gaussian.is_some()
    }

    /// Whether both seeds produce the same streams: the first `samples`
    /// uniform and Gaussian draws of fresh generators built from each seed
    /// are compared bit for bit. The current position of either generator
    /// plays no part.
    pub fn has_equal_values(&self, other: &RandomGenerator, samples: usize) -> bool {
        let mut a = RandomGenerator::new(self.seed);
        let mut b = RandomGenerator::new(other.seed);
        let uniforms_equal =
            (0..samples).all(|_| a.next_double().to_bits() == b.next_double().to_bits());
        uniforms_equal
            && (0..samples).all(|_| a.next_gaussian().to_bits() == b.next_gaussian().to_bits())
    }
}

impl RandomSource for RandomGenerator {
    fn seed(&self) -> u64 {
        self.seed
    }

    fn next_double(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn next_gaussian(&mut self) -> f64 {
        if let Some(cached) = self.cached_gaussian.take() {
            return cached;
        }
        let u1 = self.next_double();
        let u2 = self.next_double();
        let (first, second) = box_muller_pair(u1, u2);
        self.cached_gaussian = Some(second);
        first
    }

    fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.cached_gaussian = None;
    }
}
