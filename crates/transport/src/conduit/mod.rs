//! Per-pipe ordering of particles by their 1D position.
//!
//! A queue stores only [`ParticleId`]s; positions are read from the particle
//! slice passed to each call, so the arena stays the single owner of particle
//! state.


use bevy::log::error;

use crate::error::TransportError;
use crate::particle::{Particle, ParticleId};

/// Frame in which [`ConduitQueue::neighbor_gap`] reports its distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// `(toward start node, toward end node)`.
    #[default]
    PipeFixed,
    /// `(upstream, downstream)` relative to the particle's own velocity.
    FlowRelative,
}

#[derive(Debug, Clone, Default)]
pub struct ConduitQueue {
    entries: Vec<ParticleId>,
}

fn position_of(particles: &[Particle], id: ParticleId) -> f64 {
    particles
        .get(id.index())
        .map(|p| p.position_1d)
        .unwrap_or(f64::NAN)
}

impl ConduitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ParticleId> + '_ {
        self.entries.iter().copied()
    }

    pub fn front(&self) -> Option<ParticleId> {
        self.entries.first().copied()
    }

    pub fn back(&self) -> Option<ParticleId> {
        self.entries.last().copied()
    }

    pub fn contains(&self, id: ParticleId) -> bool {
        self.entries.contains(&id)
    }

    /// Insert keeping ascending 1D order.
    ///
    /// Scans from the tail, since new particles usually enter at one end and
    /// existing ones are only slightly perturbed. A particle whose position
    /// cannot be ordered (NaN) is appended and reported.
    pub fn insert(&mut self, id: ParticleId, particles: &[Particle]) -> Result<(), TransportError> {
        let particle = particles
            .get(id.index())
            .ok_or(TransportError::UnknownParticle(id))?;
        let position = particle.position_1d;
        if position.is_nan() {
            error!(
                "Conduit queue ordering corrupted: particle {} has no orderable position, appended at tail ({} entries)",
                id,
                self.entries.len()
            );
            self.entries.push(id);
            return Ok(());
        }

        let mut at = self.entries.len();
        while at > 0 && position_of(particles, self.entries[at - 1]) > position {
            at -= 1;
        }
        self.entries.insert(at, id);
        Ok(())
    }

    /// Remove `id`; returns whether it was queued.
    pub fn remove(&mut self, id: ParticleId) -> bool {
        match self.entries.iter().position(|&e| e == id) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Stable full re-sort, used after moves that may reorder particles.
    pub fn sort(&mut self, particles: &[Particle]) {
        self.entries
            .sort_by(|&a, &b| position_of(particles, a).total_cmp(&position_of(particles, b)));
    }

    pub fn is_sorted(&self, particles: &[Particle]) -> bool {
        self.entries
            .windows(2)
            .all(|w| position_of(particles, w[0]) <= position_of(particles, w[1]))
    }

    /// Distances to the neighbouring particles as `(behind, ahead)`.
    ///
    /// Without a predecessor the behind gap is 0; without a successor the
    /// ahead gap is infinite. A particle that is not queued gets `(0, ∞)`.
    pub fn neighbor_gap(
        &self,
        id: ParticleId,
        particles: &[Particle],
        orientation: Orientation,
    ) -> (f64, f64) {
        let Some(idx) = self.entries.iter().position(|&e| e == id) else {
            return (0.0, f64::INFINITY);
        };
        let position = position_of(particles, id);
        let behind = match idx.checked_sub(1) {
            Some(prev) => position - position_of(particles, self.entries[prev]),
            None => 0.0,
        };
        let ahead = match self.entries.get(idx + 1) {
            Some(&next) => position_of(particles, next) - position,
            None => f64::INFINITY,
        };

        let reversed = particles
            .get(id.index())
            .is_some_and(|p| p.velocity_1d < 0.0);
        if orientation == Orientation::FlowRelative && reversed {
            (ahead, behind)
        } else {
            (behind, ahead)
        }
    }
}
