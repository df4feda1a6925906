//! "What-if" scenarios: shift the selected reading by a fixed delta and
//! compare the resulting flood mask with the baseline.

use std::fmt;
use std::str::FromStr;

use geo::{Area, MultiPolygon};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FloodError;
use crate::flood::{compute_flood, level_to_elevation, mask_to_region_polygons, FloodOutcome, LakeContext};
use crate::mask::FloodMask;

/// Scenario presets offered next to the playback slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Water rises by 20 cm.
    Rise,
    /// Dry scenario: water falls by 30 cm.
    Dry,
}

impl Scenario {
    pub const ALL: [Scenario; 2] = [Scenario::Rise, Scenario::Dry];

    pub fn delta_cm(self) -> f64 {
        match self {
            Scenario::Rise => 20.0,
            Scenario::Dry => -30.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Scenario::Rise => "+20 cm",
            Scenario::Dry => "-30 cm (Dry scenario)",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rise" | "+20" | "+20cm" => Ok(Scenario::Rise),
            "dry" | "-30" | "-30cm" => Ok(Scenario::Dry),
            other => Err(format!("unknown scenario `{other}` (expected `rise` or `dry`)")),
        }
    }
}

/// Cell-wise change between a baseline and a scenario mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskDiff {
    /// Wet in the scenario, dry in the baseline.
    pub newly_flooded: FloodMask,
    /// Wet in the baseline, dry in the scenario.
    pub newly_exposed: FloodMask,
}

/// Split the change from `baseline` to `scenario` into newly flooded and
/// newly exposed cells. The two results are always disjoint.
pub fn diff_masks(baseline: &FloodMask, scenario: &FloodMask) -> Result<MaskDiff, FloodError> {
    Ok(MaskDiff {
        newly_flooded: scenario.and_not(baseline)?,
        newly_exposed: baseline.and_not(scenario)?,
    })
}

/// Baseline flood plus one scenario, with the scenario's change traced and
/// clipped to the area of interest.
#[derive(Debug, Clone)]
pub struct ScenarioComparison {
    pub scenario: Scenario,
    pub baseline: FloodOutcome,
    pub shifted: FloodOutcome,
    pub diff: MaskDiff,
    pub newly_flooded_polygons: MultiPolygon<f64>,
    pub newly_exposed_polygons: MultiPolygon<f64>,
}

impl ScenarioComparison {
    /// The change layer worth showing for this scenario: new water for a rise,
    /// exposed lake bed for a drop.
    pub fn highlighted(&self) -> &MultiPolygon<f64> {
        match self.scenario {
            Scenario::Rise => &self.newly_flooded_polygons,
            Scenario::Dry => &self.newly_exposed_polygons,
        }
    }

    /// Area of [`Self::highlighted`] inside the area of interest, in hectares.
    pub fn highlighted_area_ha(&self) -> f64 {
        self.highlighted().unsigned_area() / 10_000.0
    }
}

/// Compute baseline and scenario floods for a gauge reading of `level_cm`,
/// using the preset's standard delta.
pub fn compare_scenario(
    ctx: &LakeContext,
    reference_m: f64,
    level_cm: f64,
    scenario: Scenario,
) -> Result<ScenarioComparison, FloodError> {
    compare_scenario_with_delta(ctx, reference_m, level_cm, scenario, scenario.delta_cm())
}

/// As [`compare_scenario`] with a configured delta in centimetres.
pub fn compare_scenario_with_delta(
    ctx: &LakeContext,
    reference_m: f64,
    level_cm: f64,
    scenario: Scenario,
    delta_cm: f64,
) -> Result<ScenarioComparison, FloodError> {
    let baseline = compute_flood(ctx, level_to_elevation(reference_m, level_cm))?;
    let shifted = compute_flood(ctx, level_to_elevation(reference_m, level_cm + delta_cm))?;
    let diff = diff_masks(baseline.mask(), shifted.mask())?;

    let newly_flooded_polygons = mask_to_region_polygons(ctx, &diff.newly_flooded)?;
    let newly_exposed_polygons = mask_to_region_polygons(ctx, &diff.newly_exposed)?;
    debug!(
        %scenario,
        newly_flooded = diff.newly_flooded.count(),
        newly_exposed = diff.newly_exposed.count(),
        "scenario diff"
    );

    Ok(ScenarioComparison {
        scenario,
        baseline,
        shifted,
        diff,
        newly_flooded_polygons,
        newly_exposed_polygons,
    })
}
