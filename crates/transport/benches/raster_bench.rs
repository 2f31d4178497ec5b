//! Criterion benchmarks for measurement writes and whole-domain steps.
//!
//! - `raster_measure`: single-threaded `measure_particle` throughput on the
//!   lazily allocated and the dense raster.
//! - `raster_contention`: 4 threads writing into a small raster, with and
//!   without per-cell locking.
//! - `step`: one controller step over 20K surface particles at several
//!   thread counts.
//!
//! Run with: cargo bench -p transport --bench raster_bench

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use bevy::math::DVec3;

use transport::config::{MeasurementConfig, SimulationConfig};
use transport::measurement::{
    PipeMeasurementTimeline, RectangularMeasurementRaster, SurfaceMeasurementRaster,
    TimeIndexContainer, TriangleMeasurementRaster,
};
use transport::network::Network;
use transport::particle::{
    Capacity, Injection, MaterialSet, Particle, ParticleArena, ParticleId, RoutingPolicy,
};
use transport::stepping::{StepController, TransportDomain};
use transport::surface::{CellId, RectangularGrid, SurfaceTopology};

const GRID: usize = 128;
const CELL: f64 = 10.0;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn grid() -> RectangularGrid {
    let mut grid = RectangularGrid::new(DVec3::ZERO, CELL, GRID, GRID);
    grid.set_uniform_velocity(DVec3::new(0.3, 0.1, 0.0));
    grid
}

fn times() -> TimeIndexContainer {
    TimeIndexContainer::uniform(0.0, 3600.0, 12).unwrap()
}

/// Active surface particles scattered over the grid.
fn scattered_particles(count: usize, seed: u64) -> Vec<Particle> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut materials = MaterialSet::new();
    let m = materials.add("tracer", 0.0, 0.0, RoutingPolicy::Homogeneous);
    (0..count)
        .map(|i| {
            let cell = CellId(rng.gen_range(0..GRID * GRID));
            let mut p = Particle::new(
                ParticleId(i as u32),
                Arc::clone(&m),
                1.0,
                Injection {
                    capacity: Capacity::Surface(cell),
                    offset_1d: 0.0,
                    time: 0.0,
                    position: DVec3::ZERO,
                },
            );
            p.schedule().unwrap();
            p.activate(0.0).unwrap();
            p
        })
        .collect()
}

fn measure_all(raster: &dyn SurfaceMeasurementRaster, particles: &mut [Particle], thread: usize) {
    for (i, p) in particles.iter_mut().enumerate() {
        black_box(raster.measure_particle(i as f64 % 3600.0, p, 1.0, thread));
    }
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_measure(c: &mut Criterion) {
    let mut group = c.benchmark_group("raster_measure");
    group.sample_size(30);

    let mut particles = scattered_particles(10_000, 7);
    let topology: Arc<dyn SurfaceTopology> = Arc::new(grid());

    group.bench_function("lazy_10k", |b| {
        let raster =
            TriangleMeasurementRaster::new(Arc::clone(&topology), MeasurementConfig::default(), times(), 1);
        b.iter(|| measure_all(&raster, &mut particles, 0));
    });

    group.bench_function("dense_10k", |b| {
        let raster = RectangularMeasurementRaster::new(grid(), MeasurementConfig::default(), times(), 1);
        b.iter(|| measure_all(&raster, &mut particles, 0));
    });

    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("raster_contention");
    group.sample_size(20);

    // A 4 x 4 hot spot so threads collide on the same cells.
    let topology: Arc<dyn SurfaceTopology> = Arc::new(RectangularGrid::new(DVec3::ZERO, CELL, 4, 4));
    for synchronized in [true, false] {
        let config = MeasurementConfig {
            synchronize_writes: synchronized,
            ..Default::default()
        };
        let raster = TriangleMeasurementRaster::new(Arc::clone(&topology), config, times(), 1);
        let mut batches: Vec<Vec<Particle>> = (0..4)
            .map(|t| {
                let mut ps = scattered_particles(5_000, 100 + t);
                for p in &mut ps {
                    let cell = CellId(p.id().index() % 16);
                    p.move_on_surface(DVec3::ZERO, cell);
                }
                ps
            })
            .collect();
        let label = if synchronized { "locked" } else { "unlocked" };
        group.bench_function(BenchmarkId::new("4_threads", label), |b| {
            b.iter(|| {
                std::thread::scope(|s| {
                    for (t, batch) in batches.iter_mut().enumerate() {
                        let raster = &raster;
                        s.spawn(move || measure_all(raster, batch, t));
                    }
                });
            });
        });
    }

    group.finish();
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    group.sample_size(10);

    for threads in [1usize, 2, 4, 8] {
        let config = SimulationConfig {
            threads,
            end_time: f64::MAX / 2.0,
            ..Default::default()
        };
        let mut materials = MaterialSet::new();
        let m = materials.add("tracer", 0.05, 0.0, RoutingPolicy::Homogeneous);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut particles = ParticleArena::new();
        let g = grid();
        for _ in 0..20_000 {
            let x = rng.gen_range(0.0..(GRID as f64 * CELL * 0.5));
            let y = rng.gen_range(0.0..(GRID as f64 * CELL));
            let Some((gx, gy)) = g.world_to_grid(DVec3::new(x, y, 0.0)) else {
                continue;
            };
            let Some(cell) = g.cell_at(gx, gy) else {
                continue;
            };
            particles.spawn(
                Arc::clone(&m),
                1.0,
                Injection {
                    capacity: Capacity::Surface(cell),
                    offset_1d: 0.0,
                    time: 0.0,
                    position: DVec3::new(x, y, 0.0),
                },
            )
            .unwrap();
        }
        let topology: Arc<dyn SurfaceTopology> = Arc::new(grid());
        let raster =
            TriangleMeasurementRaster::new(Arc::clone(&topology), config.surface_measurement.clone(), times(), 1);
        let domain = TransportDomain {
            network: Network::new(),
            surface: topology,
            particles,
            raster: Box::new(raster),
            pipe_timeline: PipeMeasurementTimeline::new(0, config.pipe_measurement.clone(), times(), 1),
        };
        let Ok(mut controller) = StepController::new(config, domain) else {
            continue;
        };

        group.bench_with_input(BenchmarkId::new("surface_20k", threads), &threads, |b, _| {
            b.iter(|| black_box(controller.step()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_measure, bench_contention, bench_step);
criterion_main!(benches);
