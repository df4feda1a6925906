//! Run configuration: input paths, the gauge datum and slider/scenario
//! presets. Loaded from JSON; every field has a default so a partial file is
//! enough.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::flood::REFERENCE_ELEVATION_M;
use crate::scenario::Scenario;

// ── Public structs ────────────────────────────────────────────────────────────

/// Inclusive slider bounds in centimetres above the gauge datum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRange {
    pub min: i32,
    pub max: i32,
}

impl LevelRange {
    pub fn contains(&self, level_cm: f64) -> bool {
        level_cm >= f64::from(self.min) && level_cm <= f64::from(self.max)
    }

    /// Clamp a level into the slider range.
    pub fn clamp(&self, level_cm: f64) -> f64 {
        level_cm.clamp(f64::from(self.min), f64::from(self.max))
    }
}

impl Default for LevelRange {
    fn default() -> Self {
        Self { min: 0, max: 600 }
    }
}

/// Signed level shifts applied by the scenario presets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioDeltas {
    /// Default +20 cm.
    pub rise_cm: f64,
    /// Default −30 cm.
    pub dry_cm: f64,
}

impl ScenarioDeltas {
    pub fn delta_cm(&self, scenario: Scenario) -> f64 {
        match scenario {
            Scenario::Rise => self.rise_cm,
            Scenario::Dry => self.dry_cm,
        }
    }
}

impl Default for ScenarioDeltas {
    fn default() -> Self {
        Self {
            rise_cm: Scenario::Rise.delta_cm(),
            dry_cm: Scenario::Dry.delta_cm(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinConfig {
    /// Single-band GeoTIFF DEM.
    pub dem_path: PathBuf,
    /// GeoJSON polygon or multipolygon in the DEM's CRS.
    pub aoi_path: PathBuf,
    /// Absolute elevation (m) of the gauge's zero.
    pub reference_elevation_m: f64,
    pub default_level_cm: f64,
    pub level_range_cm: LevelRange,
    pub scenario_deltas: ScenarioDeltas,
    /// Optional local export of the gauge table for playback.
    pub gauge_path: Option<PathBuf>,
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            dem_path: PathBuf::from("data/dem.tif"),
            aoi_path: PathBuf::from("data/aoi.geojson"),
            reference_elevation_m: REFERENCE_ELEVATION_M,
            default_level_cm: 300.0,
            level_range_cm: LevelRange::default(),
            scenario_deltas: ScenarioDeltas::default(),
            gauge_path: None,
        }
    }
}

impl TwinConfig {
    /// Read and validate a JSON config. Relative paths inside the file are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        info!(path = %path.display(), dem = %config.dem_path.display(), aoi = %config.aoi_path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.reference_elevation_m.is_finite() {
            return Err(ConfigError::NonFiniteReference(self.reference_elevation_m));
        }
        let LevelRange { min, max } = self.level_range_cm;
        if min > max {
            return Err(ConfigError::EmptyLevelRange { min, max });
        }
        Ok(())
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.dem_path);
        resolve(&mut self.aoi_path);
        if let Some(gauge) = self.gauge_path.as_mut() {
            resolve(gauge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard() {
        let c = TwinConfig::default();
        assert_eq!(c.reference_elevation_m, 545.417);
        assert_eq!(c.default_level_cm, 300.0);
        assert_eq!(c.level_range_cm, LevelRange { min: 0, max: 600 });
        assert_eq!(c.scenario_deltas.delta_cm(Scenario::Rise), 20.0);
        assert_eq!(c.scenario_deltas.delta_cm(Scenario::Dry), -30.0);
        assert!(c.gauge_path.is_none());
        c.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let c = TwinConfig::from_json_str(r#"{ "reference_elevation_m": 544.417, "scenario_deltas": { "dry_cm": -50 } }"#)
            .unwrap();
        assert_eq!(c.reference_elevation_m, 544.417);
        assert_eq!(c.scenario_deltas.dry_cm, -50.0);
        assert_eq!(c.scenario_deltas.rise_cm, 20.0);
        assert_eq!(c.default_level_cm, 300.0);
    }

    #[test]
    fn empty_range_is_rejected() {
        let err = TwinConfig::from_json_str(r#"{ "level_range_cm": { "min": 100, "max": 50 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyLevelRange { min: 100, max: 50 }));
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(TwinConfig::from_json_str("{"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn non_finite_reference_is_rejected() {
        let c = TwinConfig { reference_elevation_m: f64::NAN, ..TwinConfig::default() };
        assert!(matches!(c.validate(), Err(ConfigError::NonFiniteReference(_))));
    }

    #[test]
    fn relative_paths_follow_config_file() {
        let mut c = TwinConfig { gauge_path: Some("gauge.csv".into()), ..TwinConfig::default() };
        c.resolve_relative_to(Path::new("/srv/cerknica"));
        assert_eq!(c.dem_path, PathBuf::from("/srv/cerknica/data/dem.tif"));
        assert_eq!(c.gauge_path, Some(PathBuf::from("/srv/cerknica/gauge.csv")));
    }

    #[test]
    fn level_range_clamps() {
        let r = LevelRange::default();
        assert!(r.contains(0.0) && r.contains(600.0));
        assert!(!r.contains(600.5));
        assert_eq!(r.clamp(-10.0), 0.0);
        assert_eq!(r.clamp(700.0), 600.0);
    }
}
