//! Surface topology seen by the stepper and the measurement rasters.
//!
//! The core never loads meshes itself; scenario code builds a
//! [`TriangleMesh`] or a [`RectangularGrid`] and hands it over behind the
//! [`SurfaceTopology`] trait.

mod grid;
mod mesh;
#[cfg(test)]
mod tests;

use std::fmt;

use bevy::math::DVec3;
use serde::{Deserialize, Serialize};

pub use grid::RectangularGrid;
pub use mesh::TriangleMesh;

/// Index of a surface cell (triangle or grid cell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub usize);

impl CellId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell {}", self.0)
    }
}

/// Read-only cell geometry and overland flow field.
pub trait SurfaceTopology: Send + Sync {
    fn cell_count(&self) -> usize;

    /// Corner points of `cell` in counter-clockwise order; empty for unknown
    /// cells.
    fn vertices(&self, cell: CellId) -> Vec<DVec3>;

    fn centroid(&self, cell: CellId) -> Option<DVec3>;

    /// Cells sharing an edge with `cell`.
    fn neighbours(&self, cell: CellId) -> Vec<CellId>;

    /// Cell containing `point` (x/y only), searching around `hint` first.
    /// `None` when the point is off the surface.
    fn locate(&self, point: DVec3, hint: Option<CellId>) -> Option<CellId>;

    /// Overland flow velocity in `cell` (m/s); zero for unknown cells.
    fn velocity(&self, cell: CellId) -> DVec3;
}
