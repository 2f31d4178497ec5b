//! Thread-safe spatio-temporal accumulation of particle dwell.
//!
//! Every measured particle adds `mass × dwell` and `dwell` to the cell it
//! occupies, in the time bin of the step and the table of its material.
//! Workers write concurrently; each cell has its own mutex so contention
//! follows spatial co-occurrence, not particle count.
//!
//! Policy (snapshot vs continuous sampling, re-counting of staying
//! particles, lock use, minimum travel) comes from a [`MeasurementConfig`]
//! fixed at construction.

mod cell;
mod pipe;
mod rectangular;
mod shared;
mod time_index;
mod triangle;

use bevy::log::warn;
use bevy::math::DVec3;
use serde::{Deserialize, Serialize};

use crate::config::MeasurementConfig;
use crate::particle::Particle;
use crate::surface::CellId;

pub use cell::{AtomicF64, BrokenLock, CellMeasurement, Sample};
pub use pipe::PipeMeasurementTimeline;
pub use rectangular::RectangularMeasurementRaster;
pub use shared::RasterCore;
pub use time_index::TimeIndexContainer;
pub use triangle::TriangleMeasurementRaster;

/// What happened to one measurement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasureOutcome {
    Recorded,
    /// Snapshot mode and the controller has sampling switched off.
    SkippedInactive,
    /// Particle has not yet travelled the configured minimum length.
    SkippedShortTravel,
    /// Particle stayed in its last measured cell and staying particles are
    /// not re-counted.
    SkippedStaying,
    /// Particle is not on the surface (or not in a pipe, for pipe timelines).
    NotOnSurface,
    /// Time, material or cell outside the raster; logged and dropped.
    OutOfRange,
    /// Cell lock not obtained within the timeout; logged and dropped.
    LockTimeout,
}

impl MeasureOutcome {
    pub fn is_recorded(self) -> bool {
        self == MeasureOutcome::Recorded
    }
}

/// Cell layout of a surface raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RasterKind {
    Triangle,
    Rectangular,
}

/// Surface raster shared by all workers of a run.
pub trait SurfaceMeasurementRaster: Send + Sync {
    fn kind(&self) -> RasterKind;

    fn core(&self) -> &RasterCore;

    /// Number of addressable cells.
    fn cell_count(&self) -> usize;

    /// Existing record of `cell`; never allocates.
    fn cell(&self, cell: CellId) -> Option<&CellMeasurement>;

    /// Record of `cell`, allocated on first use exactly once even when
    /// several workers touch the cell at the same moment. `None` when the
    /// cell is outside the raster.
    fn create_measurement(&self, cell: CellId) -> Option<&CellMeasurement>;

    /// All allocated records with their ids.
    fn cells(&self) -> Box<dyn Iterator<Item = (CellId, &CellMeasurement)> + '_>;

    fn cell_centroid(&self, cell: CellId) -> Option<DVec3>;

    /// Replace the time bins. Every cell is kept but its values are reset.
    fn set_time_container(&mut self, times: TimeIndexContainer);

    /// Resize the material tables. Every cell is kept but its values are
    /// reset.
    fn set_number_of_materials(&mut self, materials: usize);

    fn config(&self) -> &MeasurementConfig {
        self.core().config()
    }

    fn set_sampling_active(&self, active: bool) {
        self.core().set_sampling_active(active);
    }

    fn record_sampling_interval(&self, time: f64, duration: f64) -> bool {
        self.core().record_sampling_interval(time, duration)
    }

    /// Record `particle`'s dwell in its current cell.
    ///
    /// Gates, in order: snapshot switch, minimum travel length, staying
    /// particle. The particle's last-measured cell is updated whether or not
    /// the staying gate skips it.
    fn measure_particle(
        &self,
        time: f64,
        particle: &mut Particle,
        dwell: f64,
        thread_index: usize,
    ) -> MeasureOutcome {
        let core = self.core();
        if let Err(outcome) = core.admit(particle) {
            return outcome;
        }
        let Some(cell) = particle.surface_cell() else {
            return MeasureOutcome::NotOnSurface;
        };
        let staying = particle.last_measured_cell() == Some(cell);
        particle.set_last_measured_cell(Some(cell));
        if staying && !core.config().count_staying_particles {
            return MeasureOutcome::SkippedStaying;
        }

        let material = particle.material_index();
        let bin = match core.resolve(time, material, cell) {
            Ok(bin) => bin,
            Err(outcome) => return outcome,
        };
        let Some(target) = self.create_measurement(cell) else {
            warn!(
                "Measurement skipped: {} outside the raster ({} cells)",
                cell,
                self.cell_count()
            );
            return MeasureOutcome::OutOfRange;
        };
        let sample = Sample {
            material,
            bin,
            mass: particle.mass(),
            dwell,
        };
        core.write(target, cell, &sample, thread_index)
    }

    /// Recovery after an abort or a panicked worker: clears poisoned cell
    /// locks and reports locks still held. Returns the number of affected
    /// cells. Never called during normal stepping.
    fn break_all_locks(&self) -> usize {
        let mut affected = 0;
        for (id, cell) in self.cells() {
            if let Some(state) = cell.break_lock() {
                shared::report_broken_lock(id, state);
                affected += 1;
            }
        }
        affected
    }

    /// Σ mass × dwell in a cell divided by the sampled seconds of the bin;
    /// 0 before any sampling.
    fn mass_in_cell(&self, cell: CellId, bin: usize, material: usize) -> f64 {
        let seconds = self.core().sampled_seconds(bin);
        if seconds <= 0.0 {
            return 0.0;
        }
        self.raw_mass_in_cell(cell, bin, material) / seconds
    }

    fn raw_mass_in_cell(&self, cell: CellId, bin: usize, material: usize) -> f64 {
        self.cell(cell).map_or(0.0, |c| c.mass(material, bin))
    }

    fn raw_residence_in_cell(&self, cell: CellId, bin: usize, material: usize) -> f64 {
        self.cell(cell).map_or(0.0, |c| c.residence(material, bin))
    }

    fn is_contaminated(&self, cell: CellId, bin: usize, material: usize) -> bool {
        self.raw_mass_in_cell(cell, bin, material) > 0.0
    }

    /// Cells holding at least one sample.
    fn measured_cell_count(&self) -> usize {
        self.cells().filter(|(_, c)| c.has_samples()).count()
    }

    /// Σ mass × dwell of `material` over all cells and bins.
    fn total_raw_mass(&self, material: usize) -> f64 {
        self.cells().map(|(_, c)| c.total_mass(material)).sum()
    }
}
