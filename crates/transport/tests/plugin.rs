//! `TransportPlugin` driven through a Bevy `App`.
//!
//! Ticks run the `FixedUpdate` schedule directly so the test does not depend
//! on virtual time advancing between updates.

use std::sync::Arc;

use bevy::math::DVec3;
use bevy::prelude::*;

use transport::config::SimulationConfig;
use transport::measurement::{
    PipeMeasurementTimeline, RectangularMeasurementRaster, TimeIndexContainer,
};
use transport::network::Network;
use transport::particle::{Capacity, Injection, MaterialSet, ParticleArena, RoutingPolicy};
use transport::stepping::{StepController, TransportDomain};
use transport::surface::{CellId, RectangularGrid};
use transport::{TransportFinished, TransportPlugin, TransportSimulation};

fn tick(app: &mut App, n: u32) {
    for _ in 0..n {
        app.world_mut().run_schedule(FixedUpdate);
    }
}

/// One particle crossing a 3-cell strip at 1 m/s, leaving after 30 steps.
fn strip_controller() -> StepController {
    let mut grid = RectangularGrid::new(DVec3::ZERO, 10.0, 3, 1);
    grid.set_uniform_velocity(DVec3::new(1.0, 0.0, 0.0));

    let mut materials = MaterialSet::new();
    let m = materials.add("dye", 0.0, 0.0, RoutingPolicy::Homogeneous);
    let mut particles = ParticleArena::new();
    particles.spawn(
        m,
        2.0,
        Injection {
            capacity: Capacity::Surface(CellId(0)),
            offset_1d: 0.0,
            time: 0.0,
            position: DVec3::new(0.5, 5.0, 0.0),
        },
    )
    .unwrap();

    let config = SimulationConfig {
        threads: 2,
        end_time: 100.0,
        ..Default::default()
    };
    let times = TimeIndexContainer::uniform(0.0, 100.0, 1).unwrap();
    let raster =
        RectangularMeasurementRaster::new(grid.clone(), config.surface_measurement.clone(), times.clone(), 1);
    let domain = TransportDomain {
        network: Network::new(),
        surface: Arc::new(grid),
        particles,
        raster: Box::new(raster),
        pipe_timeline: PipeMeasurementTimeline::new(0, config.pipe_measurement.clone(), times, 1),
    };
    StepController::new(config, domain).unwrap()
}

fn app_with_controller() -> App {
    let mut app = App::new();
    app.add_plugins(TransportPlugin);
    app.insert_resource(TransportSimulation::new(strip_controller()));
    app
}

#[test]
fn test_plugin_registers_resources() {
    let mut app = App::new();
    app.add_plugins(TransportPlugin);
    assert!(app.world().contains_resource::<SimulationConfig>());
    let sim = app.world().resource::<TransportSimulation>();
    assert!(sim.controller.is_none());

    // Without a controller the system is a no-op.
    tick(&mut app, 3);
    assert!(app.world().resource::<TransportSimulation>().summary.is_none());
}

#[test]
fn test_plugin_steps_once_per_tick() {
    let mut app = app_with_controller();
    tick(&mut app, 5);
    let sim = app.world().resource::<TransportSimulation>();
    let controller = sim.controller.as_ref().unwrap();
    assert_eq!(controller.steps_taken(), 5);
    assert_eq!(controller.time(), 5.0);
    assert_eq!(sim.last_report.as_ref().map(|r| r.step), Some(4));
    assert!(sim.summary.is_none());
}

#[test]
fn test_plugin_reports_finish_once() {
    let mut app = app_with_controller();
    // x = 0.5 + t leaves the 30 m strip during the step starting at t = 29.
    tick(&mut app, 40);

    let sim = app.world().resource::<TransportSimulation>();
    let summary = sim.summary.clone().expect("run should have finished");
    assert_eq!(summary.steps, 30);
    assert_eq!(summary.particles, 1);
    assert_eq!(summary.still_active, 0);
    assert!(!summary.aborted);
    // Measured on steps 0..=28 with mass 2 and dwell 1.
    assert_eq!(summary.surface_raw_mass, vec![58.0]);
    assert_eq!(summary.pipe_raw_mass, vec![0.0]);

    let events = app.world().resource::<Events<TransportFinished>>();
    assert_eq!(events.len(), 1);
}
