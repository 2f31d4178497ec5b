use super::*;

// -------------------------------------------------------------------------
// RandomGenerator
// -------------------------------------------------------------------------

#[test]
fn test_same_seed_same_sequences() {
    for seed in [0u64, 1, 42, 12_345, u64::MAX] {
        let mut a = RandomGenerator::new(seed);
        let mut b = RandomGenerator::new(seed);
        let ua: Vec<u64> = (0..200).map(|_| a.next_double().to_bits()).collect();
        let ub: Vec<u64> = (0..200).map(|_| b.next_double().to_bits()).collect();
        assert_eq!(ua, ub, "uniform streams differ for seed {seed}");
        let ga: Vec<u64> = (0..200).map(|_| a.next_gaussian().to_bits()).collect();
        let gb: Vec<u64> = (0..200).map(|_| b.next_gaussian().to_bits()).collect();
        assert_eq!(ga, gb, "gaussian streams differ for seed {seed}");
    }
}

#[test]
fn test_different_seeds_differ() {
    let mut a = RandomGenerator::new(1);
    let mut b = RandomGenerator::new(2);
    let ua: Vec<f64> = (0..10).map(|_| a.next_double()).collect();
    let ub: Vec<f64> = (0..10).map(|_| b.next_double()).collect();
    assert_ne!(ua, ub);
}

#[test]
fn test_uniform_range() {
    let mut g = RandomGenerator::new(99);
    for _ in 0..10_000 {
        let u = g.next_double();
        assert!((0.0..1.0).contains(&u), "uniform draw {u} outside [0,1)");
    }
}

#[test]
fn test_reset_reproduces_sequence() {
    let mut g = RandomGenerator::new(7);
    let first: Vec<f64> = (0..50).map(|_| g.next_double()).collect();
    let first_normals: Vec<f64> = (0..51).map(|_| g.next_gaussian()).collect();
    assert!(g.has_cached_gaussian(), "odd number of normals leaves one cached");

    g.reset();
    assert!(!g.has_cached_gaussian(), "reset clears the cached deviate");
    let again: Vec<f64> = (0..50).map(|_| g.next_double()).collect();
    let again_normals: Vec<f64> = (0..51).map(|_| g.next_gaussian()).collect();
    assert_eq!(first, again);
    assert_eq!(first_normals, again_normals);
}

#[test]
fn test_seed_accessor() {
    let g = RandomGenerator::new(314);
    assert_eq!(g.seed(), 314);
}

#[test]
fn test_box_muller_pairing_matches_uniform_stream() {
    let k = 100;
    let mut normals = RandomGenerator::new(2024);
    let mut uniforms = RandomGenerator::new(2024);

    for _ in 0..k {
        let first = normals.next_gaussian();
        let second = normals.next_gaussian();
        let u1 = uniforms.next_double();
        let u2 = uniforms.next_double();
        let (c, s) = box_muller_pair(u1, u2);
        assert_eq!(first.to_bits(), c.to_bits());
        assert_eq!(second.to_bits(), s.to_bits());
    }
}

#[test]
fn test_gaussian_moments() {
    let mut g = RandomGenerator::new(5);
    let n = 200_000;
    let draws: Vec<f64> = (0..n).map(|_| g.next_gaussian()).collect();
    let mean = draws.iter().sum::<f64>() / n as f64;
    let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    assert!(mean.abs() < 0.01, "mean {mean} should be near 0");
    assert!((var - 1.0).abs() < 0.02, "variance {var} should be near 1");
}

#[test]
fn test_box_muller_zero_uniform_is_infinite() {
    let (c, _) = box_muller_pair(0.0, 0.0);
    assert!(c.is_infinite());
}

#[test]
fn test_has_equal_values() {
    let a = RandomGenerator::new(77);
    let mut b = RandomGenerator::new(77);
    let c = RandomGenerator::new(78);
    // Perturbing b does not matter: fresh replays are compared.
    b.next_double();
    assert!(a.has_equal_values(&b, 500));
    assert!(!a.has_equal_values(&c, 500));
}

// -------------------------------------------------------------------------
// RandomArray
// -------------------------------------------------------------------------

#[test]
fn test_array_matches_generator_prefix() {
    let mut array = RandomArray::new(11, 64);
    let mut generator = RandomGenerator::new(11);
    for _ in 0..64 {
        assert_eq!(array.next_double().to_bits(), generator.next_double().to_bits());
    }
}

#[test]
fn test_array_wraps_and_counts() {
    let counter = WrapCounter::default();
    let mut array = RandomArray::with_counter(3, 10, counter.clone());
    let first: Vec<f64> = (0..10).map(|_| array.next_double()).collect();
    assert_eq!(array.wraps(), 1);
    assert_eq!(counter.get(), 1);

    let second: Vec<f64> = (0..10).map(|_| array.next_double()).collect();
    assert_eq!(first, second, "cache replays after a wrap");
    assert_eq!(array.wraps(), 2);

    for _ in 0..10 {
        array.next_gaussian();
    }
    assert_eq!(counter.get(), 3, "gaussian stream wraps are counted too");
}

#[test]
fn test_array_counter_is_shared() {
    let counter = WrapCounter::default();
    let mut a = RandomArray::with_counter(1, 4, counter.clone());
    let mut b = RandomArray::with_counter(2, 4, counter.clone());
    for _ in 0..8 {
        a.next_double();
        b.next_double();
    }
    assert_eq!(counter.get(), 4);
}

#[test]
fn test_array_reset() {
    let mut array = RandomArray::new(9, 16);
    let first: Vec<f64> = (0..5).map(|_| array.next_gaussian()).collect();
    array.next_double();
    array.reset();
    assert_eq!(array.wraps(), 0);
    let again: Vec<f64> = (0..5).map(|_| array.next_gaussian()).collect();
    assert_eq!(first, again);
}

#[test]
fn test_array_cycles() {
    let mut array = RandomArray::new(9, 10);
    assert_eq!(array.cycles(), 0.0);
    for _ in 0..25 {
        array.next_double();
    }
    assert!((array.cycles() - 2.5).abs() < 1e-12);
}

#[test]
fn test_cycles_counts_streams_separately() {
    let mut array = RandomArray::new(9, 10);
    for _ in 0..6 {
        array.next_double();
        array.next_gaussian();
    }
    // 60% of each cache used: nothing has repeated yet.
    assert!((array.cycles() - 0.6).abs() < 1e-12, "got {}", array.cycles());
    assert_eq!(array.wraps(), 0);

    for _ in 0..6 {
        array.next_gaussian();
    }
    assert!((array.cycles() - 1.2).abs() < 1e-12, "got {}", array.cycles());
    assert_eq!(array.wraps(), 1);
}

#[test]
fn test_zero_cache_size_is_clamped() {
    let mut array = RandomArray::new(1, 0);
    assert_eq!(array.cache_size(), 1);
    let a = array.next_double();
    let b = array.next_double();
    assert_eq!(a, b);
}

// -------------------------------------------------------------------------
// WorkerRng
// -------------------------------------------------------------------------

#[test]
fn test_worker_rng_dispatch() {
    let mut live = WorkerRng::live(21);
    let mut reference = RandomGenerator::new(21);
    assert_eq!(live.seed(), 21);
    assert_eq!(live.next_gaussian(), reference.next_gaussian());

    let mut cached = WorkerRng::cached(21, 32, WrapCounter::default());
    let mut reference = RandomGenerator::new(21);
    assert_eq!(cached.next_double(), reference.next_double());
    cached.reset();
    let mut reference = RandomGenerator::new(21);
    assert_eq!(cached.next_double(), reference.next_double());
}
