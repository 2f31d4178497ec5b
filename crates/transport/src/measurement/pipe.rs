use std::sync::OnceLock;

use bevy::log::warn;

use super::shared::report_broken_lock;
use super::{CellMeasurement, MeasureOutcome, RasterCore, Sample, TimeIndexContainer};
use crate::config::MeasurementConfig;
use crate::network::PipeId;
use crate::particle::{Capacity, Particle};

/// Dwell accumulation per pipe, the 1D counterpart of the surface rasters.
/// Staying particles are always counted: a pipe is a single cell.
pub struct PipeMeasurementTimeline {
    core: RasterCore,
    pipes: Vec<OnceLock<CellMeasurement>>,
}

impl PipeMeasurementTimeline {
    pub fn new(
        pipe_count: usize,
        config: MeasurementConfig,
        times: TimeIndexContainer,
        materials: usize,
    ) -> Self {
        Self {
            core: RasterCore::new(config, times, materials),
            pipes: (0..pipe_count).map(|_| OnceLock::new()).collect(),
        }
    }

    pub fn core(&self) -> &RasterCore {
        &self.core
    }

    pub fn pipe_count(&self) -> usize {
        self.pipes.len()
    }

    pub fn set_sampling_active(&self, active: bool) {
        self.core.set_sampling_active(active);
    }

    pub fn record_sampling_interval(&self, time: f64, duration: f64) -> bool {
        self.core.record_sampling_interval(time, duration)
    }

    /// Record `particle`'s dwell in the pipe it currently occupies.
    pub fn measure_particle(
        &self,
        time: f64,
        particle: &Particle,
        dwell: f64,
        thread_index: usize,
    ) -> MeasureOutcome {
        if let Err(outcome) = self.core.admit(particle) {
            return outcome;
        }
        let Some(Capacity::Pipe(pipe)) = particle.capacity() else {
            return MeasureOutcome::NotOnSurface;
        };
        let material = particle.material_index();
        let bin = match self.core.resolve(time, material, pipe) {
            Ok(bin) => bin,
            Err(outcome) => return outcome,
        };
        let Some(slot) = self.pipes.get(pipe.0) else {
            warn!(
                "Measurement skipped: pipe {} outside the timeline ({} pipes)",
                pipe,
                self.pipes.len()
            );
            return MeasureOutcome::OutOfRange;
        };
        let target =
            slot.get_or_init(|| CellMeasurement::new(self.core.materials(), self.core.bins()));
        let sample = Sample {
            material,
            bin,
            mass: particle.mass(),
            dwell,
        };
        self.core.write(target, pipe, &sample, thread_index)
    }

    fn pipe(&self, pipe: PipeId) -> Option<&CellMeasurement> {
        self.pipes.get(pipe.0)?.get()
    }

    pub fn raw_mass_in_pipe(&self, pipe: PipeId, bin: usize, material: usize) -> f64 {
        self.pipe(pipe).map_or(0.0, |c| c.mass(material, bin))
    }

    pub fn raw_residence_in_pipe(&self, pipe: PipeId, bin: usize, material: usize) -> f64 {
        self.pipe(pipe).map_or(0.0, |c| c.residence(material, bin))
    }

    /// Raw mass divided by the sampled seconds of the bin.
    pub fn mass_in_pipe(&self, pipe: PipeId, bin: usize, material: usize) -> f64 {
        let seconds = self.core.sampled_seconds(bin);
        if seconds <= 0.0 {
            return 0.0;
        }
        self.raw_mass_in_pipe(pipe, bin, material) / seconds
    }

    pub fn is_contaminated(&self, pipe: PipeId, bin: usize, material: usize) -> bool {
        self.raw_mass_in_pipe(pipe, bin, material) > 0.0
    }

    pub fn total_raw_mass(&self, material: usize) -> f64 {
        self.pipes
            .iter()
            .filter_map(OnceLock::get)
            .map(|c| c.total_mass(material))
            .sum()
    }

    pub fn break_all_locks(&self) -> usize {
        let mut affected = 0;
        for (i, slot) in self.pipes.iter().enumerate() {
            let Some(state) = slot.get().and_then(CellMeasurement::break_lock) else {
                continue;
            };
            report_broken_lock(format_args!("pipe {}", PipeId(i)), state);
            affected += 1;
        }
        affected
    }

    /// Replace the time bins; all values are reset.
    pub fn set_time_container(&mut self, times: TimeIndexContainer) {
        self.core.set_time_container(times);
        self.reset_pipes();
    }

    pub fn set_number_of_materials(&mut self, materials: usize) {
        self.core.set_number_of_materials(materials);
        self.reset_pipes();
    }

    fn reset_pipes(&mut self) {
        let (materials, bins) = (self.core.materials(), self.core.bins());
        for cell in self.pipes.iter_mut().filter_map(OnceLock::get_mut) {
            cell.reset(materials, bins);
        }
    }
}
