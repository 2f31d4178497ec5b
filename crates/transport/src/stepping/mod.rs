//! Fixed worker pool that advances all particles one step at a time.
//!
//! Each step the particle arena is split into contiguous partitions, one per
//! worker, and each worker advances its partition with its own random source
//! (seeded `seed + worker`). Results therefore depend on the partitioning,
//! which depends only on the particle count and the thread count.
//!
//! Conduit queues are not touched by workers: pipe transfers are collected
//! per worker and applied here once every worker has finished the step.

mod worker;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bevy::log::{error, info, warn};
use bevy::tasks::{TaskPool, TaskPoolBuilder};

use crate::conduit::ConduitQueue;
use crate::config::SimulationConfig;
use crate::error::TransportError;
use crate::measurement::{PipeMeasurementTimeline, SurfaceMeasurementRaster};
use crate::network::{Network, PipeId};
use crate::particle::{Particle, ParticleArena};
use crate::sampling::{WorkerRng, WrapCounter};
use crate::surface::SurfaceTopology;

pub use worker::{Handoff, OutcomeCounts};
use worker::{advance_partition, StepContext, WorkerReport};

/// Cooperative cancellation shared with whoever drives the run. Workers
/// check it between particles.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Everything a run advances and measures.
pub struct TransportDomain {
    pub network: Network,
    pub surface: Arc<dyn SurfaceTopology>,
    pub particles: ParticleArena,
    pub raster: Box<dyn SurfaceMeasurementRaster>,
    pub pipe_timeline: PipeMeasurementTimeline,
}

/// Summary of one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub step: u64,
    /// Start time of the step (s).
    pub time: f64,
    pub activated: usize,
    pub left: usize,
    pub active: usize,
    pub handoffs: usize,
    pub outcomes: OutcomeCounts,
    pub aborted: bool,
    pub failed_workers: usize,
    /// Cells whose locks were recovered after an abort or worker failure.
    pub broken_locks: usize,
}

pub struct StepController {
    config: SimulationConfig,
    pool: TaskPool,
    rngs: Vec<WorkerRng>,
    wraps: WrapCounter,
    abort: AbortHandle,
    domain: TransportDomain,
    queues: Vec<ConduitQueue>,
    time: f64,
    step: u64,
    halted: bool,
    warned_cache_reuse: bool,
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl StepController {
    pub fn new(config: SimulationConfig, domain: TransportDomain) -> Result<Self, TransportError> {
        config.validate()?;
        let pool = TaskPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name("transport worker".to_string())
            .build();
        let wraps = WrapCounter::default();
        let rngs = (0..config.threads)
            .map(|i| {
                let seed = config.seed.wrapping_add(i as u64);
                if config.use_random_array {
                    WorkerRng::cached(seed, config.random_cache_size, wraps.clone())
                } else {
                    WorkerRng::live(seed)
                }
            })
            .collect();
        let queues = vec![ConduitQueue::new(); domain.network.pipe_count()];
        info!(
            "Transport controller ready: {} particles, {} pipes, {} surface cells, {} workers",
            domain.particles.len(),
            domain.network.pipe_count(),
            domain.surface.cell_count(),
            config.threads
        );
        Ok(Self {
            config,
            pool,
            rngs,
            wraps,
            abort: AbortHandle::default(),
            domain,
            queues,
            time: 0.0,
            step: 0,
            halted: false,
            warned_cache_reuse: false,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn domain(&self) -> &TransportDomain {
        &self.domain
    }

    pub fn particles(&self) -> &ParticleArena {
        &self.domain.particles
    }

    pub fn raster(&self) -> &dyn SurfaceMeasurementRaster {
        self.domain.raster.as_ref()
    }

    pub fn pipe_timeline(&self) -> &PipeMeasurementTimeline {
        &self.domain.pipe_timeline
    }

    pub fn queue(&self, pipe: PipeId) -> Option<&ConduitQueue> {
        self.queues.get(pipe.0)
    }

    /// Clone of the cancellation flag for another thread or system.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Current simulation time (s).
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steps_taken(&self) -> u64 {
        self.step
    }

    /// Total random cache wraps across workers.
    pub fn cache_wraps(&self) -> u64 {
        self.wraps.get()
    }

    /// Switch snapshot sampling on or off for the coming steps.
    pub fn set_sampling_active(&self, active: bool) {
        self.domain.raster.set_sampling_active(active);
        self.domain.pipe_timeline.set_sampling_active(active);
    }

    /// Whether no further step will run: end time reached, every particle
    /// left, or the run was halted by an abort or a failed worker.
    pub fn is_finished(&self) -> bool {
        self.halted || self.step >= self.config.step_count() || self.domain.particles.all_left()
    }

    /// Advance every particle by one time step.
    pub fn step(&mut self) -> StepReport {
        #[cfg(feature = "trace")]
        let _span = bevy::log::info_span!("transport_step", step = self.step).entered();

        let time = self.time;
        let dt = self.config.time_step;
        if self.domain.raster.core().is_sampling() {
            self.domain.raster.record_sampling_interval(time, dt);
        }
        if self.domain.pipe_timeline.core().is_sampling() {
            self.domain.pipe_timeline.record_sampling_interval(time, dt);
        }

        let results = self.run_workers(time, dt);

        let mut report = StepReport {
            step: self.step,
            time,
            ..Default::default()
        };
        let mut handoffs = Vec::new();
        for (worker, result) in results.into_iter().enumerate() {
            match result {
                Ok(r) => {
                    report.activated += r.activated;
                    report.left += r.left;
                    report.aborted |= r.aborted;
                    report.outcomes.merge(&r.outcomes);
                    handoffs.extend(r.handoffs);
                }
                Err(msg) => {
                    error!("Transport worker {worker} failed at t={time}s: {msg}");
                    report.failed_workers += 1;
                }
            }
        }
        report.handoffs = handoffs.len();
        self.apply_handoffs(&handoffs);

        if report.aborted || report.failed_workers > 0 {
            report.broken_locks = self.domain.raster.break_all_locks()
                + self.domain.pipe_timeline.break_all_locks();
            warn!(
                "Transport halted at step {} (aborted: {}, failed workers: {}, recovered locks: {})",
                self.step, report.aborted, report.failed_workers, report.broken_locks
            );
            self.halted = true;
        }

        self.step += 1;
        self.time = self.step as f64 * dt;
        report.active = self.domain.particles.active_count();
        self.check_cache_reuse();
        report
    }

    /// Step until [`Self::is_finished`]; returns the report of every step.
    pub fn run_to_end(&mut self) -> Vec<StepReport> {
        let mut reports = Vec::new();
        while !self.is_finished() {
            reports.push(self.step());
        }
        info!(
            "Transport run finished after {} steps at t={}s, {} particles still active",
            self.step,
            self.time,
            self.domain.particles.active_count()
        );
        reports
    }

    fn run_workers(&mut self, time: f64, dt: f64) -> Vec<Result<WorkerReport, String>> {
        #[cfg(feature = "trace")]
        let _span = bevy::log::info_span!("transport_workers").entered();

        let domain = &mut self.domain;
        let ctx = StepContext {
            time,
            dt,
            network: &domain.network,
            surface: domain.surface.as_ref(),
            raster: domain.raster.as_ref(),
            pipe_timeline: &domain.pipe_timeline,
            abort: &self.abort,
        };
        let jobs: Vec<(&mut [Particle], &mut WorkerRng)> = domain
            .particles
            .partitions_mut(self.config.threads)
            .into_iter()
            .zip(self.rngs.iter_mut())
            .collect();
        let ctx = &ctx;

        self.pool.scope(|scope| {
            for (worker, (part, rng)) in jobs.into_iter().enumerate() {
                scope.spawn(async move {
                    catch_unwind(AssertUnwindSafe(|| advance_partition(ctx, part, rng, worker)))
                        .map_err(panic_message)
                });
            }
        })
    }

    /// Apply conduit transfers in worker order, then restore queue order.
    fn apply_handoffs(&mut self, handoffs: &[Handoff]) {
        #[cfg(feature = "trace")]
        let _span = bevy::log::info_span!("transport_handoffs").entered();

        let particles: &[Particle] = self.domain.particles.as_slice();
        for handoff in handoffs {
            if let Some(queue) = handoff.from.and_then(|p| self.queues.get_mut(p.0)) {
                queue.remove(handoff.particle);
            }
            if let Some(queue) = handoff.to.and_then(|p| self.queues.get_mut(p.0)) {
                if let Err(e) = queue.insert(handoff.particle, particles) {
                    error!("Conduit handoff of particle {} failed: {e}", handoff.particle);
                }
            }
        }
        for queue in self.queues.iter_mut().filter(|q| !q.is_empty()) {
            queue.sort(particles);
        }
    }

    fn check_cache_reuse(&mut self) {
        if self.warned_cache_reuse {
            return;
        }
        let cycles = self
            .rngs
            .iter()
            .filter_map(|rng| match rng {
                WorkerRng::Cached(array) => Some(array.cycles()),
                WorkerRng::Live(_) => None,
            })
            .fold(0.0_f64, f64::max);
        if cycles > 1.0 {
            warn!(
                "Random cache of {} values reused {:.1} times; dispersion draws repeat (total wraps: {})",
                self.config.random_cache_size,
                cycles,
                self.wraps.get()
            );
            self.warned_cache_reuse = true;
        }
    }
}
