use bevy::log::warn;
use bevy::math::DVec3;

use super::AbortHandle;
use crate::error::TransportError;
use crate::measurement::{MeasureOutcome, PipeMeasurementTimeline, SurfaceMeasurementRaster};
use crate::network::{Network, NodeId, Outflow, PipeId};
use crate::particle::{Capacity, Particle, ParticleId, ParticleStatus};
use crate::sampling::{RandomSource, WorkerRng};
use crate::surface::SurfaceTopology;

/// Read-only view of the domain shared by all workers of one step.
pub(crate) struct StepContext<'a> {
    pub time: f64,
    pub dt: f64,
    pub network: &'a Network,
    pub surface: &'a dyn SurfaceTopology,
    pub raster: &'a dyn SurfaceMeasurementRaster,
    pub pipe_timeline: &'a PipeMeasurementTimeline,
    pub abort: &'a AbortHandle,
}

/// A particle changing conduit queues, applied by the controller after the
/// step barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    pub particle: ParticleId,
    pub from: Option<PipeId>,
    pub to: Option<PipeId>,
}

/// Measurement outcomes of one step, summed over particles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub recorded: usize,
    pub skipped: usize,
    pub out_of_range: usize,
    pub lock_timeouts: usize,
}

impl OutcomeCounts {
    pub fn add(&mut self, outcome: MeasureOutcome) {
        match outcome {
            MeasureOutcome::Recorded => self.recorded += 1,
            MeasureOutcome::OutOfRange => self.out_of_range += 1,
            MeasureOutcome::LockTimeout => self.lock_timeouts += 1,
            MeasureOutcome::SkippedInactive
            | MeasureOutcome::SkippedShortTravel
            | MeasureOutcome::SkippedStaying
            | MeasureOutcome::NotOnSurface => self.skipped += 1,
        }
    }

    pub fn merge(&mut self, other: &OutcomeCounts) {
        self.recorded += other.recorded;
        self.skipped += other.skipped;
        self.out_of_range += other.out_of_range;
        self.lock_timeouts += other.lock_timeouts;
    }
}

#[derive(Debug, Default)]
pub(crate) struct WorkerReport {
    pub handoffs: Vec<Handoff>,
    pub outcomes: OutcomeCounts,
    pub activated: usize,
    pub left: usize,
    pub aborted: bool,
}

/// Advance one partition by one step. Only this worker touches `particles`
/// during the step.
pub(crate) fn advance_partition(
    ctx: &StepContext<'_>,
    particles: &mut [Particle],
    rng: &mut WorkerRng,
    worker: usize,
) -> WorkerReport {
    let mut report = WorkerReport::default();
    for particle in particles.iter_mut() {
        if ctx.abort.is_requested() {
            report.aborted = true;
            break;
        }
        if let Err(e) = advance_particle(ctx, particle, rng, worker, &mut report) {
            warn!("Worker {worker} skipped particle {}: {e}", particle.id());
        }
    }
    report
}

fn advance_particle(
    ctx: &StepContext<'_>,
    particle: &mut Particle,
    rng: &mut WorkerRng,
    worker: usize,
    report: &mut WorkerReport,
) -> Result<(), TransportError> {
    if particle.is_due(ctx.time) {
        particle.activate(ctx.time)?;
        report.activated += 1;
        if let Some(Capacity::Pipe(pipe)) = particle.capacity() {
            report.handoffs.push(Handoff {
                particle: particle.id(),
                from: None,
                to: Some(pipe),
            });
        }
    }

    match (particle.status(), particle.capacity()) {
        (ParticleStatus::OnSurface, Some(Capacity::Surface(_))) => {
            advance_on_surface(ctx, particle, rng, worker, report)
        }
        (ParticleStatus::InPipe, Some(Capacity::Pipe(pipe))) => {
            advance_in_pipe(ctx, particle, pipe, rng, worker, report)
        }
        (ParticleStatus::InPipe, Some(Capacity::Manhole(node))) => {
            leave_node(ctx, particle, node, None, rng, report)
        }
        // No soil transport; waiting and retired particles do not move.
        _ => Ok(()),
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn advance_on_surface(
    ctx: &StepContext<'_>,
    particle: &mut Particle,
    rng: &mut WorkerRng,
    worker: usize,
    report: &mut WorkerReport,
) -> Result<(), TransportError> {
    let Some(cell) = particle.surface_cell() else {
        return Ok(());
    };

    // An inlet only captures while water drains away from its manhole.
    if let Some(node) = ctx.network.inlet_at(cell) {
        if !ctx.network.outgoing_pipes(node)?.is_empty() {
            let policy = particle.material().routing;
            let draw = rng.next_double();
            if let Some(outflow) = ctx.network.choose_outflow(node, None, policy, draw)? {
                particle.enter_manhole(node)?;
                let id = particle.id();
                let routed = enter_outflow(ctx, particle, outflow);
                return record_exit(id, None, routed, report);
            }
        }
    }

    let v = ctx.surface.velocity(cell);
    let v = DVec3::new(finite_or_zero(v.x), finite_or_zero(v.y), 0.0);
    let mut delta = v * ctx.dt;
    let dispersion = particle.material().surface_dispersion;
    if dispersion > 0.0 {
        let spread = (2.0 * dispersion * ctx.dt).sqrt();
        delta += DVec3::new(rng.next_gaussian(), rng.next_gaussian(), 0.0) * spread;
    }

    let target = particle.position + delta;
    match ctx.surface.locate(target, Some(cell)) {
        Some(next) => {
            particle.move_on_surface(delta, next);
            let outcome = ctx.raster.measure_particle(ctx.time, particle, ctx.dt, worker);
            report.outcomes.add(outcome);
        }
        None => {
            particle.move_on_surface(delta, cell);
            particle.leave_simulation()?;
            report.left += 1;
        }
    }
    Ok(())
}

fn advance_in_pipe(
    ctx: &StepContext<'_>,
    particle: &mut Particle,
    pipe_id: PipeId,
    rng: &mut WorkerRng,
    worker: usize,
    report: &mut WorkerReport,
) -> Result<(), TransportError> {
    let pipe = ctx.network.pipe(pipe_id)?;
    let velocity = finite_or_zero(pipe.velocity());
    particle.velocity_1d = velocity;

    let mut delta = velocity * ctx.dt;
    let dispersion = particle.material().pipe_dispersion;
    if dispersion > 0.0 {
        delta += rng.next_gaussian() * (2.0 * dispersion * ctx.dt).sqrt();
    }
    particle.move_along(delta);

    let exit = if particle.position_1d > pipe.length {
        Some(pipe.end)
    } else if particle.position_1d < 0.0 {
        Some(pipe.start)
    } else {
        None
    };
    match exit {
        Some(node) => {
            particle.enter_manhole(node)?;
            leave_node(ctx, particle, node, Some(pipe_id), rng, report)
        }
        None => {
            let outcome = ctx
                .pipe_timeline
                .measure_particle(ctx.time, particle, ctx.dt, worker);
            report.outcomes.add(outcome);
            Ok(())
        }
    }
}

/// Route a particle sitting in manhole `node` into its next pipe. A dead end
/// spills onto the coupled surface cell, or is an outlet. `from` is the pipe
/// the particle arrived through, if it is still queued there.
fn leave_node(
    ctx: &StepContext<'_>,
    particle: &mut Particle,
    node: NodeId,
    from: Option<PipeId>,
    rng: &mut WorkerRng,
    report: &mut WorkerReport,
) -> Result<(), TransportError> {
    let policy = particle.material().routing;
    let draw = rng.next_double();
    let id = particle.id();
    let routed = match ctx.network.choose_outflow(node, from, policy, draw) {
        Ok(Some(outflow)) => enter_outflow(ctx, particle, outflow),
        Ok(None) => leave_dead_end(ctx, particle, node, report).map(|()| None),
        Err(e) => Err(e),
    };
    record_exit(id, from, routed, report)
}

fn enter_outflow(
    ctx: &StepContext<'_>,
    particle: &mut Particle,
    outflow: Outflow,
) -> Result<Option<PipeId>, TransportError> {
    let pipe = ctx.network.pipe(outflow.pipe)?;
    particle.enter_pipe(outflow.pipe, outflow.entry_position(pipe))?;
    Ok(Some(outflow.pipe))
}

fn leave_dead_end(
    ctx: &StepContext<'_>,
    particle: &mut Particle,
    node: NodeId,
    report: &mut WorkerReport,
) -> Result<(), TransportError> {
    let manhole = ctx.network.manhole(node)?;
    match manhole.surface_cell {
        Some(cell) => {
            particle.position = manhole.position;
            particle.enter_surface(cell)
        }
        None => {
            particle.leave_simulation()?;
            report.left += 1;
            Ok(())
        }
    }
}

/// Queue bookkeeping for a particle that left pipe `from` (if any) and was
/// routed to `routed`. On a routing error the particle still sits in its
/// manhole, so it is dequeued from `from` and the error is returned.
pub(super) fn record_exit(
    particle: ParticleId,
    from: Option<PipeId>,
    routed: Result<Option<PipeId>, TransportError>,
    report: &mut WorkerReport,
) -> Result<(), TransportError> {
    let (to, result) = match routed {
        Ok(to) => (to, Ok(())),
        Err(e) => (None, Err(e)),
    };
    if from.is_some() || to.is_some() {
        report.handoffs.push(Handoff { particle, from, to });
    }
    result
}
