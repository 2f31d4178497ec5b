//! The particle entity: a mass packet of one material moving through pipes
//! and over the surface.
//!
//! Particles live in a [`ParticleArena`] and are addressed by [`ParticleId`],
//! a stable index. During a step each particle is mutated by exactly one
//! worker, which the arena enforces by handing out disjoint slices.

mod arena;
mod material;
mod status;
#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use bevy::math::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::network::{NodeId, PipeId};
use crate::surface::CellId;

pub use arena::ParticleArena;
pub use material::{Material, MaterialSet, RoutingPolicy};
pub use status::ParticleStatus;

/// Stable handle of a particle: its index in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticleId(pub u32);

impl ParticleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything that can hold particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capacity {
    Pipe(PipeId),
    Manhole(NodeId),
    Surface(CellId),
}

/// Where and when a particle entered the domain. Never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Injection {
    pub capacity: Capacity,
    /// 1D offset along the capacity (m); 0 for manholes and cells.
    pub offset_1d: f64,
    /// Injection time (s).
    pub time: f64,
    pub position: DVec3,
}

#[derive(Debug, Clone)]
pub struct Particle {
    id: ParticleId,
    material: Arc<Material>,
    mass: f64,
    status: ParticleStatus,
    injection: Injection,
    /// World position (m).
    pub position: DVec3,
    /// Position along the current pipe measured from its start node (m).
    pub position_1d: f64,
    /// Signed velocity along the current pipe (m/s); negative flows toward
    /// the start node.
    pub velocity_1d: f64,
    travelled_abs: f64,
    travelled_signed: f64,
    capacity: Option<Capacity>,
    surface_cell: Option<CellId>,
    last_measured_cell: Option<CellId>,
}

impl Particle {
    /// A fresh `Inactive` particle at its injection point.
    pub fn new(id: ParticleId, material: Arc<Material>, mass: f64, injection: Injection) -> Self {
        Self::with_status(id, material, mass, injection, ParticleStatus::Inactive)
    }

    /// A particle already scheduled for injection.
    pub(crate) fn waiting(
        id: ParticleId,
        material: Arc<Material>,
        mass: f64,
        injection: Injection,
    ) -> Self {
        Self::with_status(id, material, mass, injection, ParticleStatus::Waiting)
    }

    fn with_status(
        id: ParticleId,
        material: Arc<Material>,
        mass: f64,
        injection: Injection,
        status: ParticleStatus,
    ) -> Self {
        Self {
            id,
            material,
            mass,
            status,
            injection,
            position: injection.position,
            position_1d: injection.offset_1d,
            velocity_1d: 0.0,
            travelled_abs: 0.0,
            travelled_signed: 0.0,
            capacity: None,
            surface_cell: None,
            last_measured_cell: None,
        }
    }

    pub fn id(&self) -> ParticleId {
        self.id
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    pub fn material_index(&self) -> usize {
        self.material.index
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn status(&self) -> ParticleStatus {
        self.status
    }

    pub fn injection(&self) -> &Injection {
        &self.injection
    }

    pub fn capacity(&self) -> Option<Capacity> {
        self.capacity
    }

    pub fn surface_cell(&self) -> Option<CellId> {
        self.surface_cell
    }

    pub fn last_measured_cell(&self) -> Option<CellId> {
        self.last_measured_cell
    }

    pub(crate) fn set_last_measured_cell(&mut self, cell: Option<CellId>) {
        self.last_measured_cell = cell;
    }

    /// Total distance covered regardless of direction (m).
    pub fn travelled_abs(&self) -> f64 {
        self.travelled_abs
    }

    /// Net distance covered along the directions of travel (m).
    pub fn travelled_signed(&self) -> f64 {
        self.travelled_signed
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn has_left(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status change if the transition table allows it.
    pub fn transition(&mut self, to: ParticleStatus) -> Result<(), TransportError> {
        if !self.status.can_transition_to(to) {
            return Err(TransportError::InvalidTransition {
                particle: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// `Inactive -> Waiting`.
    pub fn schedule(&mut self) -> Result<(), TransportError> {
        self.transition(ParticleStatus::Waiting)
    }

    /// `Waiting -> active` at the injection capacity, once `time` has
    /// reached the injection time.
    pub fn activate(&mut self, time: f64) -> Result<(), TransportError> {
        let target = match self.injection.capacity {
            Capacity::Pipe(_) | Capacity::Manhole(_) => ParticleStatus::InPipe,
            Capacity::Surface(_) => ParticleStatus::OnSurface,
        };
        if self.status != ParticleStatus::Waiting {
            return Err(TransportError::InvalidTransition {
                particle: self.id,
                from: self.status,
                to: target,
            });
        }
        if time < self.injection.time {
            return Err(TransportError::NotYetInjected {
                particle: self.id,
                time,
                injection_time: self.injection.time,
            });
        }
        self.status = target;
        self.capacity = Some(self.injection.capacity);
        self.position = self.injection.position;
        self.position_1d = self.injection.offset_1d;
        self.surface_cell = match self.injection.capacity {
            Capacity::Surface(cell) => Some(cell),
            _ => None,
        };
        Ok(())
    }

    /// Whether a waiting particle is due for activation at `time`.
    pub fn is_due(&self, time: f64) -> bool {
        self.status == ParticleStatus::Waiting && time >= self.injection.time
    }

    /// Move into a pipe at 1D offset `position_1d`.
    pub fn enter_pipe(&mut self, pipe: PipeId, position_1d: f64) -> Result<(), TransportError> {
        self.transition(ParticleStatus::InPipe)?;
        self.capacity = Some(Capacity::Pipe(pipe));
        self.position_1d = position_1d;
        self.surface_cell = None;
        self.last_measured_cell = None;
        Ok(())
    }

    /// Park in a manhole between pipes.
    pub fn enter_manhole(&mut self, node: NodeId) -> Result<(), TransportError> {
        self.transition(ParticleStatus::InPipe)?;
        self.capacity = Some(Capacity::Manhole(node));
        self.position_1d = 0.0;
        self.surface_cell = None;
        self.last_measured_cell = None;
        Ok(())
    }

    /// Move onto the surface, into `cell`.
    pub fn enter_surface(&mut self, cell: CellId) -> Result<(), TransportError> {
        self.transition(ParticleStatus::OnSurface)?;
        self.capacity = Some(Capacity::Surface(cell));
        self.surface_cell = Some(cell);
        Ok(())
    }

    /// Terminal exit from the domain.
    pub fn leave_simulation(&mut self) -> Result<(), TransportError> {
        self.transition(ParticleStatus::LeftSimulation)?;
        self.capacity = None;
        self.surface_cell = None;
        Ok(())
    }

    /// Advance along the current pipe by `delta` metres.
    pub fn move_along(&mut self, delta: f64) {
        self.position_1d += delta;
        self.travelled_abs += delta.abs();
        self.travelled_signed += delta;
    }

    /// Move on the surface by `delta`, tracking the new cell.
    pub fn move_on_surface(&mut self, delta: DVec3, cell: CellId) {
        let distance = delta.length();
        self.position += delta;
        self.travelled_abs += distance;
        self.travelled_signed += distance;
        self.surface_cell = Some(cell);
        self.capacity = Some(Capacity::Surface(cell));
    }
}
