//! Synthetic catchment used by the headless runner.
//!
//! A 40 x 20 triangulated surface drains eastward into a sewer trunk that
//! runs below the middle row. Two side branches join the trunk, and the
//! trunk ends in an outlet with no surface coupling. Particles of a solute
//! and a sediment are released on the surface and in the upstream manhole.

use std::sync::Arc;

use bevy::log::info;
use bevy::math::DVec3;

use transport::config::SimulationConfig;
use transport::error::TransportError;
use transport::hydraulics::Profile;
use transport::measurement::{
    PipeMeasurementTimeline, TimeIndexContainer, TriangleMeasurementRaster,
};
use transport::network::{FlowState, Network, NodeId};
use transport::particle::{Capacity, Injection, MaterialSet, ParticleArena, RoutingPolicy};
use transport::stepping::{StepController, TransportDomain};
use transport::surface::{CellId, SurfaceTopology, TriangleMesh};

const COLUMNS: usize = 40;
const ROWS: usize = 20;
const CELL_SIZE: f64 = 5.0;
const TIME_BINS: usize = 10;
const SURFACE_PARTICLES: usize = 2_000;
const MANHOLE_PARTICLES: usize = 200;
/// Releases are spread over this many seconds from the start.
const RELEASE_WINDOW: f64 = 300.0;

fn surface_mesh() -> Result<TriangleMesh, TransportError> {
    let mut points = Vec::with_capacity((COLUMNS + 1) * (ROWS + 1));
    for y in 0..=ROWS {
        for x in 0..=COLUMNS {
            let ground = 10.0 - x as f64 * 0.05;
            points.push(DVec3::new(x as f64 * CELL_SIZE, y as f64 * CELL_SIZE, ground));
        }
    }
    let corner = |x: usize, y: usize| y * (COLUMNS + 1) + x;
    let mut triangles = Vec::with_capacity(COLUMNS * ROWS * 2);
    for y in 0..ROWS {
        for x in 0..COLUMNS {
            triangles.push([corner(x, y), corner(x + 1, y), corner(x + 1, y + 1)]);
            triangles.push([corner(x, y), corner(x + 1, y + 1), corner(x, y + 1)]);
        }
    }
    let mut mesh = TriangleMesh::new(points, triangles)?;

    // Overland flow runs east and converges on the middle row.
    let middle = ROWS as f64 * CELL_SIZE / 2.0;
    for i in 0..mesh.cell_count() {
        let cell = CellId(i);
        let Some(c) = mesh.centroid(cell) else {
            continue;
        };
        let toward_middle = ((middle - c.y) / middle * 0.1).clamp(-0.1, 0.1);
        mesh.set_velocity(cell, DVec3::new(0.15, toward_middle, 0.0))?;
    }
    Ok(mesh)
}

fn sewer(mesh: &TriangleMesh) -> Result<(Network, NodeId), TransportError> {
    let mut network = Network::new();
    let middle = ROWS as f64 * CELL_SIZE / 2.0;

    let trunk: Vec<NodeId> = (0..6)
        .map(|i| {
            let x = 20.0 + i as f64 * 35.0;
            network.add_manhole(format!("T{i}"), DVec3::new(x, middle, 8.0), 6.0 - i as f64 * 0.2)
        })
        .collect();
    let north = network.add_manhole("N0", DVec3::new(90.0, middle + 30.0, 8.0), 6.0);
    let south = network.add_manhole("S0", DVec3::new(125.0, middle - 30.0, 8.0), 5.8);
    let outlet = network.add_manhole("OUT", DVec3::new(215.0, middle, 6.0), 4.5);

    // Every manhole except the outlet takes in surface water.
    let inlets: Vec<NodeId> = trunk.iter().copied().chain([north, south]).collect();
    for node in inlets {
        let position = network.manhole(node)?.position;
        if let Some(cell) = mesh.locate(position, None) {
            network.connect_surface(node, cell)?;
        }
    }

    let mut discharge = 0.05;
    for pair in trunk.windows(2) {
        let pipe = network.add_pipe(pair[0], pair[1], 35.0, Profile::circular(0.6))?;
        if pair[1] == trunk[2] || pair[1] == trunk[3] {
            discharge += 0.03;
        }
        network.set_flow(
            pipe,
            FlowState {
                water_level: 0.25,
                discharge,
            },
        )?;
    }
    let last = trunk[trunk.len() - 1];
    let out = network.add_pipe(last, outlet, 10.0, Profile::rectangular(1.0, 1.0))?;
    network.set_flow(
        out,
        FlowState {
            water_level: 0.3,
            discharge,
        },
    )?;

    for (branch, joins) in [(north, trunk[2]), (south, trunk[3])] {
        let pipe = network.add_pipe(branch, joins, 32.0, Profile::circular(0.4))?;
        network.set_flow(
            pipe,
            FlowState {
                water_level: 0.12,
                discharge: 0.03,
            },
        )?;
    }

    Ok((network, trunk[0]))
}

/// Low-discrepancy point in the unit square, so releases cover the upstream
/// area evenly without a random source.
fn release_point(i: usize) -> (f64, f64) {
    const G1: f64 = 0.754_877_666_246_692_7;
    const G2: f64 = 0.569_840_290_998_053_2;
    ((0.5 + G1 * i as f64).fract(), (0.5 + G2 * i as f64).fract())
}

fn particles(
    mesh: &TriangleMesh,
    source: NodeId,
    source_position: DVec3,
) -> Result<(ParticleArena, usize), TransportError> {
    let mut materials = MaterialSet::new();
    let solute = materials.add("solute", 0.02, 0.05, RoutingPolicy::Homogeneous);
    let sediment = materials.add("sediment", 0.005, 0.01, RoutingPolicy::Heterogeneous);

    let mut arena = ParticleArena::new();
    let width = COLUMNS as f64 * CELL_SIZE * 0.4;
    let height = ROWS as f64 * CELL_SIZE;
    for i in 0..SURFACE_PARTICLES {
        let (u, v) = release_point(i);
        let position = DVec3::new(u * width, v * height, 0.0);
        let Some(cell) = mesh.locate(position, None) else {
            continue;
        };
        let material = if i % 4 == 0 { &sediment } else { &solute };
        arena.spawn(
            Arc::clone(material),
            0.001,
            Injection {
                capacity: Capacity::Surface(cell),
                offset_1d: 0.0,
                time: (i as f64 / SURFACE_PARTICLES as f64 * RELEASE_WINDOW).floor(),
                position,
            },
        )?;
    }
    for i in 0..MANHOLE_PARTICLES {
        arena.spawn(
            Arc::clone(&solute),
            0.005,
            Injection {
                capacity: Capacity::Manhole(source),
                offset_1d: 0.0,
                time: (i as f64 / MANHOLE_PARTICLES as f64 * RELEASE_WINDOW).floor(),
                position: source_position,
            },
        )?;
    }
    Ok((arena, materials.len()))
}

/// Assemble the catchment and a controller for `config`.
pub fn build(config: &SimulationConfig) -> Result<StepController, TransportError> {
    let mesh = surface_mesh()?;
    let (network, source) = sewer(&mesh)?;
    let source_position = network.manhole(source)?.position;
    let (particles, materials) = particles(&mesh, source, source_position)?;
    info!(
        "Scenario: {} surface cells, {} manholes, {} pipes, {} particles",
        mesh.cell_count(),
        network.node_count(),
        network.pipe_count(),
        particles.len()
    );

    let end = config.end_time.max(config.time_step);
    let times = TimeIndexContainer::uniform(0.0, end, TIME_BINS)?;
    let surface: Arc<dyn SurfaceTopology> = Arc::new(mesh);
    let raster = TriangleMeasurementRaster::new(
        Arc::clone(&surface),
        config.surface_measurement.clone(),
        times.clone(),
        materials,
    );
    let pipe_timeline = PipeMeasurementTimeline::new(
        network.pipe_count(),
        config.pipe_measurement.clone(),
        times,
        materials,
    );
    StepController::new(
        config.clone(),
        TransportDomain {
            network,
            surface,
            particles,
            raster: Box::new(raster),
            pipe_timeline,
        },
    )
}
