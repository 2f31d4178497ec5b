use std::sync::{Arc, OnceLock};

use bevy::math::DVec3;

use super::{
    CellMeasurement, RasterCore, RasterKind, SurfaceMeasurementRaster, TimeIndexContainer,
};
use crate::config::MeasurementConfig;
use crate::surface::{CellId, SurfaceTopology};

/// Raster over the triangles of a surface mesh. Cell records are created on
/// first touch, so untouched triangles cost one empty slot.
pub struct TriangleMeasurementRaster {
    core: RasterCore,
    topology: Arc<dyn SurfaceTopology>,
    cells: Vec<OnceLock<CellMeasurement>>,
}

impl TriangleMeasurementRaster {
    pub fn new(
        topology: Arc<dyn SurfaceTopology>,
        config: MeasurementConfig,
        times: TimeIndexContainer,
        materials: usize,
    ) -> Self {
        let cells = (0..topology.cell_count()).map(|_| OnceLock::new()).collect();
        Self {
            core: RasterCore::new(config, times, materials),
            topology,
            cells,
        }
    }

    pub fn topology(&self) -> &Arc<dyn SurfaceTopology> {
        &self.topology
    }

    /// Number of cells that have a record, sampled or not.
    pub fn allocated_cell_count(&self) -> usize {
        self.cells.iter().filter(|c| c.get().is_some()).count()
    }

    fn reset_cells(&mut self) {
        let (materials, bins) = (self.core.materials(), self.core.bins());
        for cell in self.cells.iter_mut().filter_map(OnceLock::get_mut) {
            cell.reset(materials, bins);
        }
    }
}

impl SurfaceMeasurementRaster for TriangleMeasurementRaster {
    fn kind(&self) -> RasterKind {
        RasterKind::Triangle
    }

    fn core(&self) -> &RasterCore {
        &self.core
    }

    fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn cell(&self, cell: CellId) -> Option<&CellMeasurement> {
        self.cells.get(cell.0)?.get()
    }

    fn create_measurement(&self, cell: CellId) -> Option<&CellMeasurement> {
        let slot = self.cells.get(cell.0)?;
        Some(slot.get_or_init(|| CellMeasurement::new(self.core.materials(), self.core.bins())))
    }

    fn cells(&self) -> Box<dyn Iterator<Item = (CellId, &CellMeasurement)> + '_> {
        Box::new(
            self.cells
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| slot.get().map(|c| (CellId(i), c))),
        )
    }

    fn cell_centroid(&self, cell: CellId) -> Option<DVec3> {
        self.topology.centroid(cell)
    }

    fn set_time_container(&mut self, times: TimeIndexContainer) {
        self.core.set_time_container(times);
        self.reset_cells();
    }

    fn set_number_of_materials(&mut self, materials: usize) {
        self.core.set_number_of_materials(materials);
        self.reset_cells();
    }
}
