//! Flood extent modelling for Lake Cerknica: DEM threshold → polygon tracing
//! → clip to area of interest → area (ha) and volume (hm³), plus scenario
//! diffs, gauge risk classes and GeoJSON export.
pub mod config;
pub mod error;
pub mod export;
pub mod flood;
pub mod gauge;
pub mod geotiff;
pub mod mask;
pub mod polygonize;
pub mod projection;
pub mod region;
pub mod risk;
pub mod scenario;
pub mod terrain;

pub use config::TwinConfig;
pub use error::{ConfigError, FloodError, GaugeError, ProjectionError, RegionError, TerrainError};
pub use flood::{compute_flood, level_to_elevation, FloodExtent, FloodOutcome, FloodSummary, LakeContext, LevelCache};
pub use mask::FloodMask;
pub use projection::Crs;
pub use region::AreaOfInterest;
pub use risk::RiskClass;
pub use scenario::{compare_scenario, diff_masks, MaskDiff, Scenario, ScenarioComparison};
pub use terrain::{ElevationGrid, GeoTransform};
