//! Pipe network: manholes joined by directed pipes, plus the graph searches
//! used for routing and diagnostics.
//!
//! Pipe direction is topological (start to end node). Pipes flatter than
//! [`HORIZONTAL_SLOPE_EPSILON`] imply no flow direction, so the searches
//! walk them both ways.

mod queue;
mod routing;
mod search;

use std::collections::HashMap;
use std::fmt;

use bevy::math::DVec3;
use serde::{Deserialize, Serialize};

use crate::config::HORIZONTAL_SLOPE_EPSILON;
use crate::error::TransportError;
use crate::hydraulics::{HydraulicProfile, Profile};
use crate::surface::CellId;

pub use queue::{DistanceQueue, Relaxation};
pub use routing::{Outflow, PipeEnd};
pub use search::{Direction, NodeDistance, Route};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PipeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

impl fmt::Display for PipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manhole {
    pub id: NodeId,
    pub name: String,
    pub position: DVec3,
    /// Elevation of the manhole bottom (m).
    pub sole_height: f64,
    /// Surface cell the manhole opens to. Surface particles in this cell drain
    /// into the manhole; particles arriving at a manhole without outflow
    /// spill onto it.
    pub surface_cell: Option<CellId>,
}

/// Hydraulic state of a pipe for the current step, set by the flow model.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowState {
    /// Water level above the pipe sole (m).
    pub water_level: f64,
    /// Discharge (m³/s); positive from start to end node.
    pub discharge: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipe {
    pub id: PipeId,
    pub start: NodeId,
    pub end: NodeId,
    pub length: f64,
    /// Sole drop per metre from start to end (m/m).
    pub slope: f64,
    pub profile: Profile,
    pub flow: FlowState,
}

impl Pipe {
    pub fn is_horizontal(&self) -> bool {
        self.slope.abs() < HORIZONTAL_SLOPE_EPSILON
    }

    /// Signed mean velocity for the current flow state (m/s). Non-finite
    /// for an empty pipe with non-zero discharge.
    pub fn velocity(&self) -> f64 {
        if self.flow.discharge == 0.0 {
            return 0.0;
        }
        self.profile
            .flow_velocity(self.flow.discharge, self.flow.water_level)
    }

    /// The node at the other end of the pipe from `node`.
    pub fn other_end(&self, node: NodeId) -> NodeId {
        if node == self.start {
            self.end
        } else {
            self.start
        }
    }
}

/// Manholes and pipes with adjacency lists in both directions.
#[derive(Debug, Clone, Default)]
pub struct Network {
    manholes: Vec<Manhole>,
    pipes: Vec<Pipe>,
    outgoing: Vec<Vec<PipeId>>,
    incoming: Vec<Vec<PipeId>>,
    inlets: HashMap<CellId, NodeId>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_manhole(
        &mut self,
        name: impl Into<String>,
        position: DVec3,
        sole_height: f64,
    ) -> NodeId {
        let id = NodeId(self.manholes.len());
        self.manholes.push(Manhole {
            id,
            name: name.into(),
            position,
            sole_height,
            surface_cell: None,
        });
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        id
    }

    /// Couple a manhole to the surface cell above it.
    pub fn connect_surface(&mut self, node: NodeId, cell: CellId) -> Result<(), TransportError> {
        let manhole = self
            .manholes
            .get_mut(node.0)
            .ok_or(TransportError::UnknownNode(node.0))?;
        if let Some(old) = manhole.surface_cell.replace(cell) {
            self.inlets.remove(&old);
        }
        self.inlets.insert(cell, node);
        Ok(())
    }

    /// Add a pipe from `start` to `end`; the slope follows from the sole
    /// heights of both manholes.
    pub fn add_pipe(
        &mut self,
        start: NodeId,
        end: NodeId,
        length: f64,
        profile: Profile,
    ) -> Result<PipeId, TransportError> {
        let start_sole = self.manhole(start)?.sole_height;
        let end_sole = self.manhole(end)?.sole_height;
        let slope = if length > 0.0 {
            (start_sole - end_sole) / length
        } else {
            0.0
        };
        let id = PipeId(self.pipes.len());
        self.pipes.push(Pipe {
            id,
            start,
            end,
            length,
            slope,
            profile,
            flow: FlowState::default(),
        });
        self.outgoing[start.0].push(id);
        self.incoming[end.0].push(id);
        Ok(id)
    }

    pub fn set_flow(&mut self, pipe: PipeId, flow: FlowState) -> Result<(), TransportError> {
        self.pipes
            .get_mut(pipe.0)
            .ok_or(TransportError::UnknownPipe(pipe.0))?
            .flow = flow;
        Ok(())
    }

    pub fn manhole(&self, node: NodeId) -> Result<&Manhole, TransportError> {
        self.manholes
            .get(node.0)
            .ok_or(TransportError::UnknownNode(node.0))
    }

    pub fn pipe(&self, pipe: PipeId) -> Result<&Pipe, TransportError> {
        self.pipes
            .get(pipe.0)
            .ok_or(TransportError::UnknownPipe(pipe.0))
    }

    pub fn manholes(&self) -> &[Manhole] {
        &self.manholes
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    pub fn node_count(&self) -> usize {
        self.manholes.len()
    }

    pub fn pipe_count(&self) -> usize {
        self.pipes.len()
    }

    /// Pipes starting at `node`.
    pub fn outgoing_pipes(&self, node: NodeId) -> Result<&[PipeId], TransportError> {
        self.outgoing
            .get(node.0)
            .map(Vec::as_slice)
            .ok_or(TransportError::UnknownNode(node.0))
    }

    /// Pipes ending at `node`.
    pub fn incoming_pipes(&self, node: NodeId) -> Result<&[PipeId], TransportError> {
        self.incoming
            .get(node.0)
            .map(Vec::as_slice)
            .ok_or(TransportError::UnknownNode(node.0))
    }

    /// Manhole draining the given surface cell, if any.
    pub fn inlet_at(&self, cell: CellId) -> Option<NodeId> {
        self.inlets.get(&cell).copied()
    }

    fn check_node(&self, node: NodeId) -> Result<(), TransportError> {
        if node.0 < self.manholes.len() {
            Ok(())
        } else {
            Err(TransportError::UnknownNode(node.0))
        }
    }
}
