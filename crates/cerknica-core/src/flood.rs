//! Flood extent engine: threshold → trace → clip → integrate.
//!
//! Area is measured on the polygons *after* clipping to the area of interest;
//! volume is integrated over every flooded cell of the full grid *before*
//! clipping. Flooded cells outside the area of interest therefore count
//! towards volume but not towards area.

use std::collections::HashMap;
use std::fmt;

use geo::{Area, BoundingRect, BooleanOps, Intersects, MultiPolygon, Polygon};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::FloodError;
use crate::mask::FloodMask;
use crate::polygonize::polygonize;
use crate::region::AreaOfInterest;
use crate::terrain::ElevationGrid;

/// Datum (m a.s.l.) to which the gauge offset in centimetres is added.
pub const REFERENCE_ELEVATION_M: f64 = 545.417;

const M2_PER_HA: f64 = 10_000.0;
const M3_PER_HM3: f64 = 1_000_000.0;

/// Absolute water elevation for a centimetre offset above `reference_m`.
pub fn level_to_elevation(reference_m: f64, offset_cm: f64) -> f64 {
    reference_m + offset_cm / 100.0
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Read-only inputs shared by every recomputation: the DEM and the area of
/// interest, loaded once.
#[derive(Debug, Clone)]
pub struct LakeContext {
    terrain: ElevationGrid,
    region: AreaOfInterest,
}

impl LakeContext {
    pub fn new(terrain: ElevationGrid, region: AreaOfInterest) -> Self {
        if let (Some(grid_crs), Some(aoi_crs)) = (terrain.crs(), region.crs()) {
            if grid_crs != aoi_crs {
                warn!(%grid_crs, %aoi_crs, "DEM and area of interest declare different CRSs");
            }
        }
        Self { terrain, region }
    }

    pub fn terrain(&self) -> &ElevationGrid {
        &self.terrain
    }

    pub fn region(&self) -> &AreaOfInterest {
        &self.region
    }
}

// ── Outcome types ─────────────────────────────────────────────────────────────

/// A flood that reaches the area of interest.
#[derive(Debug, Clone)]
pub struct FloodExtent {
    pub water_elevation_m: f64,
    pub mask: FloodMask,
    /// Flooded polygons clipped to the area of interest, grid CRS.
    pub polygons: MultiPolygon<f64>,
    pub area_ha: f64,
    pub volume_hm3: f64,
}

impl FloodExtent {
    pub fn summary(&self) -> FloodSummary {
        FloodSummary {
            water_elevation_m: self.water_elevation_m,
            flooded_cells: self.mask.count(),
            polygon_count: self.polygons.0.len(),
            area_ha: self.area_ha,
            volume_hm3: self.volume_hm3,
        }
    }
}

/// Result of one flood computation. Only `Flooded` carries geometry; the
/// other two are expected, reportable states rather than errors.
#[derive(Debug, Clone)]
pub enum FloodOutcome {
    Flooded(FloodExtent),
    /// No cell lies at or below the water elevation.
    NothingFlooded { water_elevation_m: f64, mask: FloodMask },
    /// Cells flood, but none of the traced polygons reach the area of interest.
    OutsideRegion { water_elevation_m: f64, mask: FloodMask, volume_hm3: f64 },
}

impl FloodOutcome {
    pub fn mask(&self) -> &FloodMask {
        match self {
            FloodOutcome::Flooded(extent) => &extent.mask,
            FloodOutcome::NothingFlooded { mask, .. } | FloodOutcome::OutsideRegion { mask, .. } => mask,
        }
    }

    pub fn water_elevation_m(&self) -> f64 {
        match self {
            FloodOutcome::Flooded(extent) => extent.water_elevation_m,
            FloodOutcome::NothingFlooded { water_elevation_m, .. }
            | FloodOutcome::OutsideRegion { water_elevation_m, .. } => *water_elevation_m,
        }
    }

    pub fn extent(&self) -> Option<&FloodExtent> {
        match self {
            FloodOutcome::Flooded(extent) => Some(extent),
            _ => None,
        }
    }

    /// User-facing notice for the non-flooded outcomes.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            FloodOutcome::Flooded(_) => None,
            FloodOutcome::NothingFlooded { .. } => Some("No flooded areas at this water level."),
            FloodOutcome::OutsideRegion { .. } => Some("Flood extent outside AOI."),
        }
    }
}

/// Scalar results, formatted with the dashboard's display precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FloodSummary {
    pub water_elevation_m: f64,
    pub flooded_cells: usize,
    pub polygon_count: usize,
    pub area_ha: f64,
    pub volume_hm3: f64,
}

impl fmt::Display for FloodSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Absolute water elevation: {:.3} m", self.water_elevation_m)?;
        writeln!(f, "Area: {:.1} ha", self.area_ha)?;
        write!(f, "Volume: {:.2} hm³", self.volume_hm3)
    }
}

// ── Pipeline stages ───────────────────────────────────────────────────────────

/// Cells at or below `water_elevation_m`.
pub fn flood_mask(grid: &ElevationGrid, water_elevation_m: f64) -> Result<FloodMask, FloodError> {
    if !water_elevation_m.is_finite() {
        return Err(FloodError::NonFiniteElevation(water_elevation_m));
    }
    Ok(FloodMask::threshold(grid, water_elevation_m))
}

/// Σ (water − ground) × cell area over the set cells of `mask`, in m³.
/// Depth is only taken where the mask is set, so it is never negative.
pub fn flooded_volume_m3(grid: &ElevationGrid, mask: &FloodMask, water_elevation_m: f64) -> f64 {
    let depth_sum: f64 = grid
        .data()
        .iter()
        .zip(mask.cells())
        .filter(|(_, &wet)| wet)
        .map(|(&z, _)| (water_elevation_m - f64::from(z)).max(0.0))
        .sum();
    depth_sum * grid.cell_area()
}

/// Clip traced polygons to the area of interest. Polygons entirely outside
/// are dropped; those crossing the boundary are cut at it.
pub fn clip_to_region(polygons: &[Polygon<f64>], region: &AreaOfInterest) -> MultiPolygon<f64> {
    let aoi = region.geometry();
    let aoi_bounds = region.bounds();
    let mut clipped = Vec::new();
    for polygon in polygons {
        let overlaps_bounds = match (polygon.bounding_rect(), aoi_bounds) {
            (Some(p), Some(a)) => p.intersects(&a),
            _ => false,
        };
        if !overlaps_bounds {
            continue;
        }
        let piece = polygon.intersection(aoi);
        clipped.extend(piece.0.into_iter().filter(|p| p.unsigned_area() > 0.0));
    }
    MultiPolygon::new(clipped)
}

/// Trace `mask` and clip the result to the context's area of interest.
/// An all-clear mask yields an empty multipolygon.
pub fn mask_to_region_polygons(
    ctx: &LakeContext,
    mask: &FloodMask,
) -> Result<MultiPolygon<f64>, FloodError> {
    let grid = ctx.terrain();
    if mask.width() != grid.width() || mask.height() != grid.height() {
        return Err(FloodError::MaskGridMismatch {
            mask_width: mask.width(),
            mask_height: mask.height(),
            grid_width: grid.width(),
            grid_height: grid.height(),
        });
    }
    if mask.is_clear() {
        return Ok(MultiPolygon::new(Vec::new()));
    }
    let traced = polygonize(mask, grid.transform());
    let clipped = clip_to_region(&traced, ctx.region());
    debug!(traced = traced.len(), clipped = clipped.0.len(), "traced mask polygons");
    Ok(clipped)
}

/// Run the full flood pipeline for one water elevation.
pub fn compute_flood(ctx: &LakeContext, water_elevation_m: f64) -> Result<FloodOutcome, FloodError> {
    let grid = ctx.terrain();
    let mask = flood_mask(grid, water_elevation_m)?;
    let flooded_cells = mask.count();
    debug!(water_elevation_m, flooded_cells, "flood mask computed");

    if flooded_cells == 0 {
        warn!(water_elevation_m, "no flooded areas at this water level");
        return Ok(FloodOutcome::NothingFlooded { water_elevation_m, mask });
    }

    let volume_hm3 = flooded_volume_m3(grid, &mask, water_elevation_m) / M3_PER_HM3;
    let polygons = mask_to_region_polygons(ctx, &mask)?;

    if polygons.0.is_empty() {
        warn!(water_elevation_m, flooded_cells, "flood extent outside area of interest");
        return Ok(FloodOutcome::OutsideRegion { water_elevation_m, mask, volume_hm3 });
    }

    let area_ha = polygons.unsigned_area() / M2_PER_HA;
    Ok(FloodOutcome::Flooded(FloodExtent {
        water_elevation_m,
        mask,
        polygons,
        area_ha,
        volume_hm3,
    }))
}

// ── Memoization ───────────────────────────────────────────────────────────────

/// Flood outcomes memoized by exact water elevation. Results are identical
/// to calling [`compute_flood`] directly; levels derived from the same
/// centimetre offset and reference hit the same entry.
#[derive(Debug, Default)]
pub struct LevelCache {
    entries: HashMap<u64, FloodOutcome>,
}

impl LevelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(
        &mut self,
        ctx: &LakeContext,
        water_elevation_m: f64,
    ) -> Result<&FloodOutcome, FloodError> {
        if !water_elevation_m.is_finite() {
            return Err(FloodError::NonFiniteElevation(water_elevation_m));
        }
        // -0.0 and 0.0 flood the same cells.
        let key = (water_elevation_m + 0.0).to_bits();
        if !self.entries.contains_key(&key) {
            let outcome = compute_flood(ctx, water_elevation_m)?;
            self.entries.insert(key, outcome);
        }
        Ok(&self.entries[&key])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
