use bevy::prelude::*;

pub mod conduit;
pub mod config;
pub mod error;
pub mod hydraulics;
pub mod measurement;
pub mod network;
pub mod particle;
pub mod sampling;
pub mod stepping;
pub mod surface;

use config::SimulationConfig;
use stepping::{StepController, StepReport};

/// The running transport simulation, if one has been set up.
///
/// Insert a controller with [`TransportSimulation::new`]; the plugin's
/// fixed-step system advances it until it finishes.
#[derive(Resource, Default)]
pub struct TransportSimulation {
    pub controller: Option<StepController>,
    /// Report of the most recent step.
    pub last_report: Option<StepReport>,
    /// Set once the run has finished and [`TransportFinished`] was sent.
    pub summary: Option<TransportFinished>,
}

impl TransportSimulation {
    pub fn new(controller: StepController) -> Self {
        Self {
            controller: Some(controller),
            last_report: None,
            summary: None,
        }
    }
}

/// Sent once when the controller stops stepping.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct TransportFinished {
    pub steps: u64,
    /// Simulation time at the end of the run (s).
    pub time: f64,
    pub particles: usize,
    pub still_active: usize,
    pub aborted: bool,
    /// Mass x dwell summed over all surface cells, per material.
    pub surface_raw_mass: Vec<f64>,
    /// Mass x dwell summed over all pipes, per material.
    pub pipe_raw_mass: Vec<f64>,
}

/// Advance the controller by one step per fixed tick.
pub fn step_transport(
    mut sim: ResMut<TransportSimulation>,
    mut finished: EventWriter<TransportFinished>,
) {
    let sim = &mut *sim;
    if sim.summary.is_some() {
        return;
    }
    let Some(controller) = sim.controller.as_mut() else {
        return;
    };
    let report = if controller.is_finished() {
        None
    } else {
        Some(controller.step())
    };
    if !controller.is_finished() {
        sim.last_report = report;
        return;
    }

    let aborted = report
        .as_ref()
        .or(sim.last_report.as_ref())
        .is_some_and(|r| r.aborted || r.failed_workers > 0);
    let materials = controller.raster().core().materials();
    let summary = TransportFinished {
        steps: controller.steps_taken(),
        time: controller.time(),
        particles: controller.particles().len(),
        still_active: controller.particles().active_count(),
        aborted,
        surface_raw_mass: (0..materials)
            .map(|m| controller.raster().total_raw_mass(m))
            .collect(),
        pipe_raw_mass: (0..materials)
            .map(|m| controller.pipe_timeline().total_raw_mass(m))
            .collect(),
    };
    info!(
        "Transport finished after {} steps (t={}s), {}/{} particles still active",
        summary.steps, summary.time, summary.still_active, summary.particles
    );
    if report.is_some() {
        sim.last_report = report;
    }
    finished.send(summary.clone());
    sim.summary = Some(summary);
}

pub struct TransportPlugin;

impl Plugin for TransportPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimulationConfig>()
            .init_resource::<TransportSimulation>()
            .add_event::<TransportFinished>()
            .add_systems(FixedUpdate, step_transport);
    }
}
