use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// How particles of a material choose an outflow pipe at a junction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoutingPolicy {
    /// Fully mixed at the junction: the outflow is drawn with probability
    /// proportional to each pipe's discharge.
    #[default]
    Homogeneous,
    /// Stratified: always follows the outflow with the largest discharge.
    Heterogeneous,
}

/// A transported substance. Shared read-only between all its particles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Position in the owning `MaterialSet`; also the raster material index.
    pub index: usize,
    pub name: String,
    /// Horizontal dispersion coefficient on the surface (m²/s).
    pub surface_dispersion: f64,
    /// Longitudinal dispersion coefficient in pipes (m²/s).
    pub pipe_dispersion: f64,
    pub routing: RoutingPolicy,
}

/// Ordered materials of a scenario, indexed from zero.
#[derive(Debug, Clone, Default)]
pub struct MaterialSet {
    materials: Vec<Arc<Material>>,
}

impl MaterialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a material and return the shared handle particles will carry.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        surface_dispersion: f64,
        pipe_dispersion: f64,
        routing: RoutingPolicy,
    ) -> Arc<Material> {
        let material = Arc::new(Material {
            index: self.materials.len(),
            name: name.into(),
            surface_dispersion,
            pipe_dispersion,
            routing,
        });
        self.materials.push(Arc::clone(&material));
        material
    }

    pub fn get(&self, index: usize) -> Result<&Arc<Material>, TransportError> {
        self.materials
            .get(index)
            .ok_or(TransportError::UnknownMaterial(index))
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Material>> {
        self.materials.iter()
    }
}
