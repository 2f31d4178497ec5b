use bevy::math::DVec3;

use super::{
    CellMeasurement, RasterCore, RasterKind, SurfaceMeasurementRaster, TimeIndexContainer,
};
use crate::config::MeasurementConfig;
use crate::surface::{CellId, RectangularGrid, SurfaceTopology};

/// Dense raster over a regular grid: one record per grid cell, allocated up
/// front. Addressed as `[x][y][bin][material]` through [`Self::raw_mass_at`].
pub struct RectangularMeasurementRaster {
    core: RasterCore,
    grid: RectangularGrid,
    cells: Vec<CellMeasurement>,
}

impl RectangularMeasurementRaster {
    pub fn new(
        grid: RectangularGrid,
        config: MeasurementConfig,
        times: TimeIndexContainer,
        materials: usize,
    ) -> Self {
        let bins = times.len();
        let cells = (0..grid.cell_count())
            .map(|_| CellMeasurement::new(materials, bins))
            .collect();
        Self {
            core: RasterCore::new(config, times, materials),
            grid,
            cells,
        }
    }

    pub fn grid(&self) -> &RectangularGrid {
        &self.grid
    }

    pub fn raw_mass_at(&self, x: usize, y: usize, bin: usize, material: usize) -> f64 {
        self.grid
            .cell_at(x, y)
            .map_or(0.0, |cell| self.raw_mass_in_cell(cell, bin, material))
    }

    fn reset_cells(&mut self) {
        let (materials, bins) = (self.core.materials(), self.core.bins());
        for cell in &mut self.cells {
            cell.reset(materials, bins);
        }
    }
}

impl SurfaceMeasurementRaster for RectangularMeasurementRaster {
    fn kind(&self) -> RasterKind {
        RasterKind::Rectangular
    }

    fn core(&self) -> &RasterCore {
        &self.core
    }

    fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn cell(&self, cell: CellId) -> Option<&CellMeasurement> {
        self.cells.get(cell.0)
    }

    fn create_measurement(&self, cell: CellId) -> Option<&CellMeasurement> {
        self.cells.get(cell.0)
    }

    fn cells(&self) -> Box<dyn Iterator<Item = (CellId, &CellMeasurement)> + '_> {
        Box::new(self.cells.iter().enumerate().map(|(i, c)| (CellId(i), c)))
    }

    fn cell_centroid(&self, cell: CellId) -> Option<DVec3> {
        self.grid.centroid(cell)
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
