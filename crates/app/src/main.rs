//! Headless transport run.
//!
//! Usage: `transport-sim [--config path/to/config.json]`
//!
//! Builds the synthetic catchment from [`scenario`], steps it through
//! `TransportPlugin` on the fixed timestep and logs a summary of the
//! measured contamination before exiting.

mod scenario;

use bevy::log::LogPlugin;
use bevy::prelude::*;

use transport::config::SimulationConfig;
use transport::{TransportFinished, TransportPlugin, TransportSimulation};

/// Fixed ticks per wall-clock second; one tick is one transport step.
const TICK_RATE_HZ: f64 = 1_000.0;

/// Most contaminated cells listed in the final summary.
const SUMMARY_CELLS: usize = 5;

fn load_config() -> Result<SimulationConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let Some(i) = args.iter().position(|a| a == "--config") else {
        return Ok(SimulationConfig::default());
    };
    let path = args
        .get(i + 1)
        .ok_or_else(|| "--config needs a file path".to_string())?;
    let json = std::fs::read_to_string(path).map_err(|e| format!("cannot read {path}: {e}"))?;
    SimulationConfig::from_json(&json).map_err(|e| format!("invalid config {path}: {e}"))
}

fn main() -> AppExit {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, LogPlugin::default()))
        .insert_resource(Time::<Fixed>::from_hz(TICK_RATE_HZ))
        .add_plugins(TransportPlugin)
        .add_systems(Startup, setup_simulation)
        .add_systems(Update, report_finished);

    match load_config() {
        Ok(config) => {
            app.insert_resource(config);
        }
        Err(e) => {
            error!("{e}");
            return AppExit::error();
        }
    }

    app.run()
}

fn setup_simulation(
    mut commands: Commands,
    config: Res<SimulationConfig>,
    mut exit: EventWriter<AppExit>,
) {
    match scenario::build(&config) {
        Ok(controller) => {
            info!(
                "Running {} steps of {}s on {} workers",
                config.step_count(),
                config.time_step,
                config.threads
            );
            commands.insert_resource(TransportSimulation::new(controller));
        }
        Err(e) => {
            error!("Scenario setup failed: {e}");
            exit.send(AppExit::error());
        }
    }
}

fn report_finished(
    mut finished: EventReader<TransportFinished>,
    sim: Res<TransportSimulation>,
    mut exit: EventWriter<AppExit>,
) {
    let Some(summary) = finished.read().last() else {
        return;
    };
    for (m, (surface, pipes)) in summary
        .surface_raw_mass
        .iter()
        .zip(&summary.pipe_raw_mass)
        .enumerate()
    {
        info!("Material {m}: surface mass x dwell {surface:.4}, pipe mass x dwell {pipes:.4}");
    }

    if let Some(controller) = sim.controller.as_ref() {
        let raster = controller.raster();
        let mut cells: Vec<_> = raster
            .cells()
            .map(|(cell, record)| (cell, record.total_mass(0)))
            .filter(|(_, mass)| *mass > 0.0)
            .collect();
        cells.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (cell, mass) in cells.into_iter().take(SUMMARY_CELLS) {
            let at = raster.cell_centroid(cell).unwrap_or_default();
            info!("{cell} at ({:.1}, {:.1}): {mass:.4}", at.x, at.y);
        }
        info!(
            "{} of {} surface cells measured",
            raster.measured_cell_count(),
            raster.cell_count()
        );
    }

    exit.send(if summary.aborted {
        AppExit::error()
    } else {
        AppExit::Success
    });
}
