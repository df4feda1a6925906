//! Diagnostic visualizer: writes PNG debug images of the DEM, the flood mask
//! and both scenario diffs to data/debug/.
//! Not part of the main pipeline.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use cerknica_core::config::TwinConfig;
use cerknica_core::geotiff::load_dem;
use cerknica_core::{diff_masks, level_to_elevation, ElevationGrid, FloodMask, Scenario};
use cerknica_core::flood::flood_mask;

#[derive(Parser, Debug)]
#[command(name = "visualize", about = "Render DEM and flood masks as PNG")]
struct Args {
    /// JSON config file (DEM path, reference elevation, scenario deltas).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gauge level in cm (default from config).
    #[arg(short, long, allow_negative_numbers = true)]
    level_cm: Option<f64>,

    /// Output directory.
    #[arg(short, long, default_value = "data/debug")]
    output: PathBuf,
}

// ── Colour helpers ────────────────────────────────────────────────────────────

const WATER: [u8; 3] = [0x1f, 0x77, 0xb4];
const ADDITIONAL: [u8; 3] = [0xff, 0x00, 0x00];
const EXPOSED: [u8; 3] = [0xff, 0x99, 0x00];
const NO_DATA: [u8; 3] = [0, 0, 0];

/// Elevation → grayscale between the grid's min (black) and max (white).
/// No-data cells are black.
fn shade(z: f32, min_z: f32, max_z: f32) -> [u8; 3] {
    if z.is_nan() {
        return NO_DATA;
    }
    let range = (max_z - min_z).max(1e-3);
    let c = (((z - min_z) / range).clamp(0.0, 1.0) * 255.0) as u8;
    [c, c, c]
}

/// Alpha-blend `over` onto `base` with weight `t`.
fn blend(base: [u8; 3], over: [u8; 3], t: f32) -> [u8; 3] {
    let mix = |b: u8, o: u8| (f32::from(b) * (1.0 - t) + f32::from(o) * t).round() as u8;
    [mix(base[0], over[0]), mix(base[1], over[1]), mix(base[2], over[2])]
}

/// Render the DEM with up to three cell overlays, painted in order.
fn render(grid: &ElevationGrid, layers: &[(&FloodMask, [u8; 3], f32)]) -> image::RgbImage {
    let min_z = grid.min_elevation().unwrap_or(0.0);
    let max_z = grid.max_elevation().unwrap_or(1.0);
    let (w, h) = (grid.width(), grid.height());
    let mut img = image::RgbImage::new(w as u32, h as u32);
    for r in 0..h {
        for c in 0..w {
            let mut px = shade(grid.get(r, c), min_z, max_z);
            for (mask, color, alpha) in layers {
                if mask.get(r, c) {
                    px = blend(px, *color, *alpha);
                }
            }
            img.put_pixel(c as u32, r as u32, image::Rgb(px));
        }
    }
    img
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => TwinConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => TwinConfig::default(),
    };
    let level_cm = args.level_cm.unwrap_or(config.default_level_cm);
    let reference = config.reference_elevation_m;

    println!("Loading DEM {}…", config.dem_path.display());
    let grid = load_dem(&config.dem_path)
        .with_context(|| format!("loading DEM {}", config.dem_path.display()))?;

    let out_dir = args.output.as_path();
    fs::create_dir_all(out_dir).with_context(|| format!("cannot create {}", out_dir.display()))?;

    let current = flood_mask(&grid, level_to_elevation(reference, level_cm))?;

    // ── 1. elevation.png ─────────────────────────────────────────────────────
    {
        let path = out_dir.join("elevation.png");
        render(&grid, &[]).save(&path).with_context(|| format!("failed to save {}", path.display()))?;
        println!("Wrote {}", path.display());
    }

    // ── 2. flood_mask.png ────────────────────────────────────────────────────
    {
        let path = out_dir.join("flood_mask.png");
        render(&grid, &[(&current, WATER, 0.6)])
            .save(&path)
            .with_context(|| format!("failed to save {}", path.display()))?;
        println!("Wrote {} ({} cells at {level_cm:.1} cm)", path.display(), current.count());
    }

    // ── 3 & 4. scenario diffs ────────────────────────────────────────────────
    for scenario in Scenario::ALL {
        let shifted_cm = level_cm + config.scenario_deltas.delta_cm(scenario);
        let shifted = flood_mask(&grid, level_to_elevation(reference, shifted_cm))?;
        let diff = diff_masks(&current, &shifted)?;
        let name = match scenario {
            Scenario::Rise => "scenario_rise.png",
            Scenario::Dry => "scenario_dry.png",
        };
        let path = out_dir.join(name);
        render(
            &grid,
            &[
                (&current, WATER, 0.4),
                (&diff.newly_flooded, ADDITIONAL, 0.6),
                (&diff.newly_exposed, EXPOSED, 0.6),
            ],
        )
        .save(&path)
        .with_context(|| format!("failed to save {}", path.display()))?;
        println!(
            "Wrote {} ({}: +{} / -{} cells)",
            path.display(),
            scenario,
            diff.newly_flooded.count(),
            diff.newly_exposed.count()
        );
    }

    println!("Done.");
    Ok(())
}
