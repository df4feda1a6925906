use serde::{Deserialize, Serialize};

use crate::error::TerrainError;
use crate::projection::Crs;

/// Affine geotransform, rasterio/GDAL convention:
///   x = a·col + b·row + c
///   y = d·col + e·row + f
/// `(col, row)` address cell corners, so `(0, 0)` is the outer corner of the
/// first cell and `(width, height)` the opposite outer corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// North-up transform with square cells; `(x_min, y_max)` is the
    /// north-west outer corner.
    pub fn north_up(x_min: f64, y_max: f64, cell_size: f64) -> Self {
        Self { a: cell_size, b: 0.0, c: x_min, d: 0.0, e: -cell_size, f: y_max }
    }

    /// World position of grid corner `(col, row)`.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Determinant of the linear part; negative for the usual north-up raster.
    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }
}

/// Immutable digital elevation model: row-major f32 elevations in metres plus
/// georeferencing. Row 0 is the first raster row (the northern edge for a
/// north-up DEM). NaN marks no-data cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevationGrid {
    data: Vec<f32>,
    width: usize,
    height: usize,
    transform: GeoTransform,
    crs: Option<Crs>,
    cell_size: f64,
}

impl ElevationGrid {
    /// Build a grid, checking shape and cell size. Cell size is taken from
    /// the transform's column step.
    pub fn new(
        data: Vec<f32>,
        width: usize,
        height: usize,
        transform: GeoTransform,
        crs: Option<Crs>,
    ) -> Result<Self, TerrainError> {
        if width == 0 || height == 0 {
            return Err(TerrainError::Empty { width, height });
        }
        let expected = width * height;
        if data.len() != expected {
            return Err(TerrainError::ShapeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        let cell_x = (transform.a * transform.a + transform.d * transform.d).sqrt();
        let cell_y = (transform.b * transform.b + transform.e * transform.e).sqrt();
        if !cell_x.is_finite() || cell_x <= 0.0 {
            return Err(TerrainError::InvalidCellSize(cell_x));
        }
        if !cell_y.is_finite() || cell_y <= 0.0 {
            return Err(TerrainError::InvalidCellSize(cell_y));
        }
        if (cell_x - cell_y).abs() > cell_x * 1e-6 {
            return Err(TerrainError::NonSquareCells { x: cell_x, y: cell_y });
        }
        Ok(Self { data, width, height, transform, crs, cell_size: cell_x })
    }

    /// Uniform north-up grid filled with `fill`. Mostly useful for tests and
    /// synthetic terrain.
    pub fn filled(
        width: usize,
        height: usize,
        cell_size: f64,
        fill: f32,
    ) -> Result<Self, TerrainError> {
        let transform = GeoTransform::north_up(0.0, height as f64 * cell_size, cell_size);
        Self::new(vec![fill; width * height], width, height, transform, None)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    /// Edge length of a (square) cell in CRS units, metres for projected DEMs.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn cell_area(&self) -> f64 {
        self.cell_size * self.cell_size
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Lowest valid elevation, `None` if every cell is no-data.
    pub fn min_elevation(&self) -> Option<f32> {
        self.data.iter().copied().filter(|v| !v.is_nan()).reduce(f32::min)
    }

    /// Highest valid elevation, `None` if every cell is no-data.
    pub fn max_elevation(&self) -> Option<f32> {
        self.data.iter().copied().filter(|v| !v.is_nan()).reduce(f32::max)
    }

    pub fn valid_cells(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// World-space bounding box `(x_min, y_min, x_max, y_max)` of the grid's
    /// outer corners.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let corners = [
            self.transform.apply(0.0, 0.0),
            self.transform.apply(self.width as f64, 0.0),
            self.transform.apply(0.0, self.height as f64),
            self.transform.apply(self.width as f64, self.height as f64),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn north_up_transform_places_corners() {
        let t = GeoTransform::north_up(100.0, 500.0, 2.0);
        assert_eq!(t.apply(0.0, 0.0), (100.0, 500.0));
        assert_eq!(t.apply(3.0, 2.0), (106.0, 496.0));
        assert!(t.determinant() < 0.0);
    }

    #[test]
    fn rejects_empty_grid() {
        let t = GeoTransform::north_up(0.0, 0.0, 1.0);
        let err = ElevationGrid::new(Vec::new(), 0, 3, t, None).unwrap_err();
        assert!(matches!(err, TerrainError::Empty { width: 0, height: 3 }));
    }

    #[test]
    fn rejects_shape_mismatch() {
        let t = GeoTransform::north_up(0.0, 0.0, 1.0);
        let err = ElevationGrid::new(vec![0.0; 5], 2, 3, t, None).unwrap_err();
        assert!(matches!(err, TerrainError::ShapeMismatch { expected: 6, actual: 5, .. }));
    }

    #[test]
    fn rejects_non_square_cells() {
        let t = GeoTransform { a: 1.0, b: 0.0, c: 0.0, d: 0.0, e: -2.0, f: 0.0 };
        let err = ElevationGrid::new(vec![0.0; 4], 2, 2, t, None).unwrap_err();
        assert!(matches!(err, TerrainError::NonSquareCells { .. }));
    }

    #[test]
    fn rejects_zero_cell_size() {
        let t = GeoTransform::north_up(0.0, 0.0, 0.0);
        let err = ElevationGrid::new(vec![0.0; 4], 2, 2, t, None).unwrap_err();
        assert!(matches!(err, TerrainError::InvalidCellSize(_)));
    }

    #[test]
    fn min_max_skip_nodata() {
        let mut grid = ElevationGrid::filled(3, 1, 1.0, 5.0).unwrap();
        grid.set(0, 0, f32::NAN);
        grid.set(0, 2, 9.0);
        assert_eq!(grid.min_elevation(), Some(5.0));
        assert_eq!(grid.max_elevation(), Some(9.0));
        assert_eq!(grid.valid_cells(), 2);
    }

    #[test]
    fn bounds_cover_all_cells() {
        let grid = ElevationGrid::filled(4, 2, 10.0, 0.0).unwrap();
        assert_eq!(grid.bounds(), (0.0, 0.0, 40.0, 20.0));
        assert_eq!(grid.cell_area(), 100.0);
    }
}
