use bevy::math::DVec3;
use serde::{Deserialize, Serialize};

use super::{CellId, SurfaceTopology};

/// Regular grid of square cells, row-major from `origin` (the lower-left
/// corner). Cell `(x, y)` has id `y * width + x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangularGrid {
    pub origin: DVec3,
    pub cell_size: f64,
    pub width: usize,
    pub height: usize,
    velocities: Vec<DVec3>,
}

impl RectangularGrid {
    pub fn new(origin: DVec3, cell_size: f64, width: usize, height: usize) -> Self {
        Self {
            origin,
            cell_size,
            width,
            height,
            velocities: vec![DVec3::ZERO; width * height],
        }
    }

    pub fn set_uniform_velocity(&mut self, velocity: DVec3) {
        self.velocities.fill(velocity);
    }

    pub fn set_velocity(&mut self, x: usize, y: usize, velocity: DVec3) -> bool {
        match self.flat_index(x as i64, y as i64) {
            Some(idx) => {
                self.velocities[idx] = velocity;
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn flat_index(&self, x: i64, y: i64) -> Option<usize> {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            Some(y as usize * self.width + x as usize)
        } else {
            None
        }
    }

    pub fn cell_at(&self, x: usize, y: usize) -> Option<CellId> {
        self.flat_index(x as i64, y as i64).map(CellId)
    }

    /// Grid coordinates of `cell`.
    pub fn coords(&self, cell: CellId) -> Option<(usize, usize)> {
        if self.width == 0 || cell.0 >= self.width * self.height {
            return None;
        }
        Some((cell.0 % self.width, cell.0 / self.width))
    }

    /// Grid coordinates containing a world point, if on the grid.
    pub fn world_to_grid(&self, point: DVec3) -> Option<(usize, usize)> {
        let gx = ((point.x - self.origin.x) / self.cell_size).floor();
        let gy = ((point.y - self.origin.y) / self.cell_size).floor();
        if !gx.is_finite() || !gy.is_finite() {
            return None;
        }
        self.flat_index(gx as i64, gy as i64)
            .map(|_| (gx as usize, gy as usize))
    }
}

impl SurfaceTopology for RectangularGrid {
    fn cell_count(&self) -> usize {
        self.width * self.height
    }

    fn vertices(&self, cell: CellId) -> Vec<DVec3> {
        let Some((x, y)) = self.coords(cell) else {
            return Vec::new();
        };
        let s = self.cell_size;
        let corner = self.origin + DVec3::new(x as f64 * s, y as f64 * s, 0.0);
        vec![
            corner,
            corner + DVec3::new(s, 0.0, 0.0),
            corner + DVec3::new(s, s, 0.0),
            corner + DVec3::new(0.0, s, 0.0),
        ]
    }

    fn centroid(&self, cell: CellId) -> Option<DVec3> {
        let (x, y) = self.coords(cell)?;
        let s = self.cell_size;
        Some(self.origin + DVec3::new((x as f64 + 0.5) * s, (y as f64 + 0.5) * s, 0.0))
    }

    fn neighbours(&self, cell: CellId) -> Vec<CellId> {
        let Some((x, y)) = self.coords(cell) else {
            return Vec::new();
        };
        let (x, y) = (x as i64, y as i64);
        [(x, y - 1), (x - 1, y), (x + 1, y), (x, y + 1)]
            .into_iter()
            .filter_map(|(nx, ny)| self.flat_index(nx, ny).map(CellId))
            .collect()
    }

    fn locate(&self, point: DVec3, _hint: Option<CellId>) -> Option<CellId> {
        let (x, y) = self.world_to_grid(point)?;
        self.cell_at(x, y)
    }

    fn velocity(&self, cell: CellId) -> DVec3 {
        self.velocities.get(cell.0).copied().unwrap_or(DVec3::ZERO)
    }
}
