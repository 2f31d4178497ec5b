use std::collections::HashMap;

use bevy::math::{DVec2, DVec3};

use super::{CellId, SurfaceTopology};
use crate::error::TransportError;

/// Tolerance on barycentric coordinates so points on a shared edge are found
/// in either triangle.
const BARYCENTRIC_EPSILON: f64 = 1e-9;

/// Triangulated surface with per-triangle flow velocity.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    points: Vec<DVec3>,
    triangles: Vec<[usize; 3]>,
    centroids: Vec<DVec3>,
    neighbours: Vec<Vec<CellId>>,
    velocities: Vec<DVec3>,
}

impl TriangleMesh {
    /// Build a mesh from shared points and triangles indexing them.
    /// Neighbourhood is derived from shared edges.
    pub fn new(points: Vec<DVec3>, triangles: Vec<[usize; 3]>) -> Result<Self, TransportError> {
        for tri in &triangles {
            for &p in tri {
                if p >= points.len() {
                    return Err(TransportError::IndexOutOfRange {
                        what: "mesh point",
                        index: p,
                        len: points.len(),
                    });
                }
            }
        }

        let centroids = triangles
            .iter()
            .map(|t| (points[t[0]] + points[t[1]] + points[t[2]]) / 3.0)
            .collect();

        let mut edges: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (i, t) in triangles.iter().enumerate() {
            for k in 0..3 {
                let (a, b) = (t[k], t[(k + 1) % 3]);
                edges.entry((a.min(b), a.max(b))).or_default().push(i);
            }
        }
        let mut neighbours = vec![Vec::new(); triangles.len()];
        for cells in edges.values() {
            for &a in cells {
                for &b in cells {
                    if a != b {
                        neighbours[a].push(CellId(b));
                    }
                }
            }
        }
        for list in &mut neighbours {
            list.sort();
            list.dedup();
        }

        let velocities = vec![DVec3::ZERO; triangles.len()];
        Ok(Self {
            points,
            triangles,
            centroids,
            neighbours,
            velocities,
        })
    }

    /// Set the overland velocity of one triangle.
    pub fn set_velocity(&mut self, cell: CellId, velocity: DVec3) -> Result<(), TransportError> {
        let len = self.velocities.len();
        let slot = self
            .velocities
            .get_mut(cell.0)
            .ok_or(TransportError::IndexOutOfRange {
                what: "surface cell",
                index: cell.0,
                len,
            })?;
        *slot = velocity;
        Ok(())
    }

    /// Same velocity for every triangle.
    pub fn set_uniform_velocity(&mut self, velocity: DVec3) {
        self.velocities.fill(velocity);
    }

    pub fn triangle(&self, cell: CellId) -> Option<[DVec3; 3]> {
        let t = self.triangles.get(cell.0)?;
        Some([self.points[t[0]], self.points[t[1]], self.points[t[2]]])
    }

    /// Whether `point` lies inside (or on the border of) `cell` in x/y.
    pub fn contains(&self, cell: CellId, point: DVec3) -> bool {
        let Some([a, b, c]) = self.triangle(cell) else {
            return false;
        };
        let p = point.truncate();
        let (a, b, c) = (a.truncate(), b.truncate(), c.truncate());
        let Some((u, v, w)) = barycentric(p, a, b, c) else {
            return false;
        };
        u >= -BARYCENTRIC_EPSILON && v >= -BARYCENTRIC_EPSILON && w >= -BARYCENTRIC_EPSILON
    }
}

/// Barycentric coordinates of `p` in triangle `abc`; `None` for degenerate
/// triangles.
fn barycentric(p: DVec2, a: DVec2, b: DVec2, c: DVec2) -> Option<(f64, f64, f64)> {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let det = v0.x * v1.y - v1.x * v0.y;
    if det.abs() < f64::EPSILON {
        return None;
    }
    let v = (v2.x * v1.y - v1.x * v2.y) / det;
    let w = (v0.x * v2.y - v2.x * v0.y) / det;
    Some((1.0 - v - w, v, w))
}

impl SurfaceTopology for TriangleMesh {
    fn cell_count(&self) -> usize {
        self.triangles.len()
    }

    fn vertices(&self, cell: CellId) -> Vec<DVec3> {
        self.triangle(cell).map(|t| t.to_vec()).unwrap_or_default()
    }

    fn centroid(&self, cell: CellId) -> Option<DVec3> {
        self.centroids.get(cell.0).copied()
    }

    fn neighbours(&self, cell: CellId) -> Vec<CellId> {
        self.neighbours.get(cell.0).cloned().unwrap_or_default()
    }

    fn locate(&self, point: DVec3, hint: Option<CellId>) -> Option<CellId> {
        if !point.x.is_finite() || !point.y.is_finite() {
            return None;
        }
        if let Some(hint) = hint {
            if self.contains(hint, point) {
                return Some(hint);
            }
            // Particles usually move at most one cell per step.
            if let Some(&n) = self
                .neighbours
                .get(hint.0)
                .and_then(|ns| ns.iter().find(|&&n| self.contains(n, point)))
            {
                return Some(n);
            }
        }
        (0..self.triangles.len())
            .map(CellId)
            .find(|&c| self.contains(c, point))
    }

    fn velocity(&self, cell: CellId) -> DVec3 {
        self.velocities.get(cell.0).copied().unwrap_or(DVec3::ZERO)
    }
}
