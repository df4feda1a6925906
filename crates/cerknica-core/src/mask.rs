//! Boolean cell masks over the elevation grid.

use crate::error::FloodError;
use crate::terrain::ElevationGrid;

/// Row-major boolean grid, same shape as the [`ElevationGrid`] it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloodMask {
    cells: Vec<bool>,
    width: usize,
    height: usize,
}

impl FloodMask {
    pub fn new(cells: Vec<bool>, width: usize, height: usize) -> Result<Self, FloodError> {
        if cells.len() != width * height {
            return Err(FloodError::MaskLength { len: cells.len(), width, height });
        }
        Ok(Self { cells, width, height })
    }

    pub fn empty(width: usize, height: usize) -> Self {
        Self { cells: vec![false; width * height], width, height }
    }

    /// `true` where the cell elevation is at or below `water_elevation`.
    /// No-data (NaN) cells never flood.
    pub fn threshold(grid: &ElevationGrid, water_elevation: f64) -> Self {
        let cells = grid
            .data()
            .iter()
            .map(|&z| f64::from(z) <= water_elevation)
            .collect();
        Self { cells, width: grid.width(), height: grid.height() }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.cells[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: bool) {
        self.cells[row * self.width + col] = val;
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// No cell set.
    pub fn is_clear(&self) -> bool {
        !self.cells.iter().any(|&c| c)
    }

    pub fn same_shape(&self, other: &FloodMask) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Cells set here and not in `other`.
    pub fn and_not(&self, other: &FloodMask) -> Result<FloodMask, FloodError> {
        self.zip_with(other, |a, b| a && !b)
    }

    pub fn and(&self, other: &FloodMask) -> Result<FloodMask, FloodError> {
        self.zip_with(other, |a, b| a && b)
    }

    pub fn or(&self, other: &FloodMask) -> Result<FloodMask, FloodError> {
        self.zip_with(other, |a, b| a || b)
    }

    pub fn complement(&self) -> FloodMask {
        FloodMask {
            cells: self.cells.iter().map(|&c| !c).collect(),
            width: self.width,
            height: self.height,
        }
    }

    fn zip_with(
        &self,
        other: &FloodMask,
        op: impl Fn(bool, bool) -> bool,
    ) -> Result<FloodMask, FloodError> {
        if !self.same_shape(other) {
            return Err(FloodError::MaskShapeMismatch {
                left_width: self.width,
                left_height: self.height,
                right_width: other.width,
                right_height: other.height,
            });
        }
        let cells = self
            .cells
            .iter()
            .zip(&other.cells)
            .map(|(&a, &b)| op(a, b))
            .collect();
        Ok(FloodMask { cells, width: self.width, height: self.height })
    }
}
