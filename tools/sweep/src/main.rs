//! Stage–area–volume table: runs the flood pipeline at every gauge level in a
//! range (in parallel) and writes one JSON row per level.
//! Output: data/sweep.json unless `--output` is given.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use std::{fs, path::PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cerknica_core::config::TwinConfig;
use cerknica_core::geotiff::load_dem;
use cerknica_core::{compute_flood, level_to_elevation, AreaOfInterest, FloodError, FloodOutcome, LakeContext, RiskClass};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sweep", about = "Tabulate flooded area and volume across gauge levels")]
struct Args {
    /// JSON config file (DEM, area of interest, reference elevation, level range).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Lowest level in cm (default: config range minimum).
    #[arg(long, allow_negative_numbers = true)]
    from_cm: Option<i32>,

    /// Highest level in cm (default: config range maximum).
    #[arg(long, allow_negative_numbers = true)]
    to_cm: Option<i32>,

    /// Step in cm.
    #[arg(short, long, default_value_t = 10)]
    step_cm: u32,

    /// Output JSON file.
    #[arg(short, long, default_value = "data/sweep.json")]
    output: PathBuf,
}

// ── Output types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum RowState {
    Flooded,
    NothingFlooded,
    OutsideRegion,
}

#[derive(Debug, Clone, Serialize)]
struct SweepRow {
    level_cm: i32,
    water_elevation_m: f64,
    risk: RiskClass,
    state: RowState,
    flooded_cells: usize,
    area_ha: f64,
    volume_hm3: f64,
}

#[derive(Serialize)]
struct SweepTable {
    reference_elevation_m: f64,
    step_cm: u32,
    rows: Vec<SweepRow>,
}

// ── Sweep ─────────────────────────────────────────────────────────────────────

fn levels(from_cm: i32, to_cm: i32, step_cm: u32) -> Vec<i32> {
    let step = step_cm.max(1) as usize;
    (from_cm..=to_cm).step_by(step).collect()
}

fn sweep_row(ctx: &LakeContext, reference_m: f64, level_cm: i32) -> Result<SweepRow, FloodError> {
    let water = level_to_elevation(reference_m, f64::from(level_cm));
    let outcome = compute_flood(ctx, water)?;
    let flooded_cells = outcome.mask().count();
    let (state, area_ha, volume_hm3) = match &outcome {
        FloodOutcome::Flooded(extent) => (RowState::Flooded, extent.area_ha, extent.volume_hm3),
        FloodOutcome::NothingFlooded { .. } => (RowState::NothingFlooded, 0.0, 0.0),
        FloodOutcome::OutsideRegion { volume_hm3, .. } => (RowState::OutsideRegion, 0.0, *volume_hm3),
    };
    Ok(SweepRow {
        level_cm,
        water_elevation_m: water,
        risk: RiskClass::classify(f64::from(level_cm)),
        state,
        flooded_cells,
        area_ha,
        volume_hm3,
    })
}

fn sweep(ctx: &LakeContext, reference_m: f64, levels: &[i32]) -> Result<Vec<SweepRow>, FloodError> {
    levels.par_iter().map(|&cm| sweep_row(ctx, reference_m, cm)).collect()
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => TwinConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => TwinConfig::default(),
    };
    let from_cm = args.from_cm.unwrap_or(config.level_range_cm.min);
    let to_cm = args.to_cm.unwrap_or(config.level_range_cm.max);
    if from_cm > to_cm {
        bail!("empty level range {from_cm}..={to_cm} cm");
    }

    let terrain = load_dem(&config.dem_path)
        .with_context(|| format!("loading DEM {}", config.dem_path.display()))?;
    let region = AreaOfInterest::load(&config.aoi_path)
        .with_context(|| format!("loading area of interest {}", config.aoi_path.display()))?;
    let ctx = LakeContext::new(terrain, region);

    let levels = levels(from_cm, to_cm, args.step_cm);
    info!(levels = levels.len(), from_cm, to_cm, step_cm = args.step_cm, "sweeping gauge levels");
    let rows = sweep(&ctx, config.reference_elevation_m, &levels).context("flood sweep failed")?;

    eprintln!("\n{:>8} {:>10} {:>10} {:>10} {:>12}", "cm", "elev_m", "cells", "area_ha", "volume_hm3");
    eprintln!("{}", "-".repeat(54));
    for row in &rows {
        eprintln!(
            "{:>8} {:>10.3} {:>10} {:>10.1} {:>12.3}",
            row.level_cm, row.water_elevation_m, row.flooded_cells, row.area_ha, row.volume_hm3
        );
    }

    let table = SweepTable {
        reference_elevation_m: config.reference_elevation_m,
        step_cm: args.step_cm,
        rows,
    };
    if let Some(dir) = args.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(&args.output, serde_json::to_string_pretty(&table)?)
        .with_context(|| format!("writing {}", args.output.display()))?;
    eprintln!("\nDone. {} rows -> {}", table.rows.len(), args.output.display());
    Ok(())
}

// ── Unit tests ────────────────────────────────────────────────────────────────
