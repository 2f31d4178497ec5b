use std::sync::Arc;

use super::{Injection, Material, Particle, ParticleId, ParticleStatus};
use crate::error::TransportError;

/// Owner of every particle of a run.
///
/// Ids are arena indices, so no shared counter is needed and handles stay
/// valid for the lifetime of the arena (retired particles are kept with
/// status `LeftSimulation`).
#[derive(Debug, Default)]
pub struct ParticleArena {
    particles: Vec<Particle>,
}

impl ParticleArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a particle scheduled for injection (`Waiting`). Fails once the
    /// arena holds `u32::MAX` particles.
    pub fn spawn(
        &mut self,
        material: Arc<Material>,
        mass: f64,
        injection: Injection,
    ) -> Result<ParticleId, TransportError> {
        let index = self.particles.len();
        let id = u32::try_from(index)
            .map(ParticleId)
            .map_err(|_| TransportError::IndexOutOfRange {
                what: "particle",
                index,
                len: u32::MAX as usize,
            })?;
        self.particles
            .push(Particle::waiting(id, material, mass, injection));
        Ok(id)
    }

    pub fn get(&self, id: ParticleId) -> Result<&Particle, TransportError> {
        self.particles
            .get(id.index())
            .ok_or(TransportError::UnknownParticle(id))
    }

    pub fn get_mut(&mut self, id: ParticleId) -> Result<&mut Particle, TransportError> {
        self.particles
            .get_mut(id.index())
            .ok_or(TransportError::UnknownParticle(id))
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    /// Split into at most `parts` contiguous, disjoint partitions of nearly
    /// equal size. The split depends only on the particle count, so the
    /// same input always yields the same partitioning.
    pub fn partitions_mut(&mut self, parts: usize) -> Vec<&mut [Particle]> {
        if self.particles.is_empty() {
            return Vec::new();
        }
        let chunk = self.particles.len().div_ceil(parts.max(1));
        self.particles.chunks_mut(chunk).collect()
    }

    pub fn count_with_status(&self, status: ParticleStatus) -> usize {
        self.particles.iter().filter(|p| p.status() == status).count()
    }

    pub fn active_count(&self) -> usize {
        self.particles.iter().filter(|p| p.is_active()).count()
    }

    /// True when no particle can move any more.
    pub fn all_left(&self) -> bool {
        self.particles.iter().all(|p| p.has_left())
    }

    /// Total mass of particles still in the domain.
    pub fn mass_in_domain(&self) -> f64 {
        self.particles
            .iter()
            .filter(|p| p.is_active())
            .map(|p| p.mass())
            .sum()
    }
}
