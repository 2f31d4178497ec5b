use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use bevy::log::{debug, warn};

use super::cell::{AtomicF64, BrokenLock, CellMeasurement, Sample};
use super::time_index::TimeIndexContainer;
use super::MeasureOutcome;
use crate::config::{MeasurementConfig, SamplingMode};
use crate::particle::Particle;

/// State shared by every raster flavour: policy, time bins, material count,
/// the snapshot switch and the sampled duration per bin.
#[derive(Debug)]
pub struct RasterCore {
    config: MeasurementConfig,
    times: TimeIndexContainer,
    materials: usize,
    sampling_active: AtomicBool,
    /// Last resolved `(time, bin)`; all particles of a step share one time.
    bin_cache: RwLock<Option<(f64, Option<usize>)>>,
    sampled_seconds: Vec<AtomicF64>,
}

impl RasterCore {
    pub fn new(config: MeasurementConfig, times: TimeIndexContainer, materials: usize) -> Self {
        let sampled_seconds = (0..times.len()).map(|_| AtomicF64::default()).collect();
        Self {
            config,
            times,
            materials,
            sampling_active: AtomicBool::new(false),
            bin_cache: RwLock::new(None),
            sampled_seconds,
        }
    }

    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }

    pub fn times(&self) -> &TimeIndexContainer {
        &self.times
    }

    pub fn materials(&self) -> usize {
        self.materials
    }

    pub fn bins(&self) -> usize {
        self.times.len()
    }

    /// Replace the bins. Sampled durations are reset; callers reset cells.
    pub fn set_time_container(&mut self, times: TimeIndexContainer) {
        self.sampled_seconds = (0..times.len()).map(|_| AtomicF64::default()).collect();
        self.times = times;
        *self
            .bin_cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn set_number_of_materials(&mut self, materials: usize) {
        self.materials = materials;
        for s in &self.sampled_seconds {
            s.store(0.0);
        }
    }

    /// Snapshot-mode switch, flipped by the controller between steps.
    pub fn set_sampling_active(&self, active: bool) {
        self.sampling_active.store(active, Ordering::Release);
    }

    /// Whether the current step contributes to the measurement.
    pub fn is_sampling(&self) -> bool {
        self.config.sampling_mode == SamplingMode::Continuous
            || self.sampling_active.load(Ordering::Acquire)
    }

    /// Bin of `time`, resolved once per distinct timestamp.
    pub fn bin_of(&self, time: f64) -> Option<usize> {
        let cache = self.bin_cache.read().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached_time, bin)) = *cache {
            if cached_time.to_bits() == time.to_bits() {
                return bin;
            }
        }
        drop(cache);
        let bin = self.times.bin_of(time);
        *self
            .bin_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some((time, bin));
        bin
    }

    /// Count `duration` seconds of sampling towards the bin of `time`.
    pub fn record_sampling_interval(&self, time: f64, duration: f64) -> bool {
        match self.bin_of(time).and_then(|bin| self.sampled_seconds.get(bin)) {
            Some(seconds) => {
                seconds.store(seconds.load() + duration);
                true
            }
            None => {
                debug!("Sampling interval at t={time}s lies outside the time bins");
                false
            }
        }
    }

    pub fn sampled_seconds(&self, bin: usize) -> f64 {
        self.sampled_seconds.get(bin).map(AtomicF64::load).unwrap_or(0.0)
    }

    /// Gates that do not depend on the target cell: snapshot switch and
    /// minimum travel length.
    pub(crate) fn admit(&self, particle: &Particle) -> Result<(), MeasureOutcome> {
        if !self.is_sampling() {
            return Err(MeasureOutcome::SkippedInactive);
        }
        if particle.travelled_abs() < self.config.min_travel_length {
            return Err(MeasureOutcome::SkippedShortTravel);
        }
        Ok(())
    }

    /// Time bin for a sample, or `OutOfRange` with a warning.
    pub(crate) fn resolve(
        &self,
        time: f64,
        material: usize,
        location: impl fmt::Display,
    ) -> Result<usize, MeasureOutcome> {
        if material >= self.materials {
            warn!(
                "Measurement at {location} skipped: material index {material} out of range ({} materials)",
                self.materials
            );
            return Err(MeasureOutcome::OutOfRange);
        }
        match self.bin_of(time) {
            Some(bin) => Ok(bin),
            None => {
                warn!(
                    "Measurement at {location} skipped: t={time}s has no time bin ({} bins, end {}s)",
                    self.times.len(),
                    self.times.end()
                );
                Err(MeasureOutcome::OutOfRange)
            }
        }
    }

    /// Write one sample into `target` under the configured lock policy.
    pub(crate) fn write(
        &self,
        target: &CellMeasurement,
        location: impl fmt::Display,
        sample: &Sample,
        thread_index: usize,
    ) -> MeasureOutcome {
        let synchronized = self.config.synchronize_writes;
        match target.add(sample, synchronized, thread_index, self.config.lock_timeout()) {
            Ok(true) => MeasureOutcome::Recorded,
            Ok(false) => {
                warn!(
                    "Measurement at {location} skipped: material {} / bin {} outside tables ({} x {})",
                    sample.material,
                    sample.bin,
                    target.materials(),
                    target.bins()
                );
                MeasureOutcome::OutOfRange
            }
            Err(holder) => {
                warn!(
                    "Worker {thread_index} gave up waiting {}ms for {location}, lock held by worker {}",
                    self.config.lock_timeout_ms,
                    holder.map_or_else(|| "unknown".to_string(), |h| h.to_string())
                );
                MeasureOutcome::LockTimeout
            }
        }
    }
}

/// Log the lock state found during recovery.
pub(crate) fn report_broken_lock(location: impl fmt::Display, state: BrokenLock) {
    let name = |holder: Option<usize>| holder.map_or_else(|| "unknown".to_string(), |h| h.to_string());
    match state {
        BrokenLock::Poisoned { holder } => warn!(
            "Cleared poisoned lock on {location}, last held by worker {}",
            name(holder)
        ),
        BrokenLock::Held { holder } => warn!(
            "Lock on {location} is still held by worker {}",
            name(holder)
        ),
    }
}
