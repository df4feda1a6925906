//! `cerknica`: flood extent, scenario simulation and gauge playback for the
//! intermittent Lake Cerknica.
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); results go to stdout.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cerknica_core::config::TwinConfig;
use cerknica_core::export::{geographic_bounds, GeoJsonWriter, Layer};
use cerknica_core::gauge::{GaugeReading, GaugeSeries};
use cerknica_core::geotiff::load_dem;
use cerknica_core::scenario::{compare_scenario_with_delta, ScenarioComparison};
use cerknica_core::{
    compute_flood, level_to_elevation, AreaOfInterest, FloodOutcome, FloodSummary, LakeContext, RiskClass, Scenario,
};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "cerknica", about = "Lake Cerknica flood extent and scenario simulation")]
struct Cli {
    /// JSON config file. The flags below override its fields.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Single-band GeoTIFF DEM.
    #[arg(long, global = true)]
    dem: Option<PathBuf>,

    /// GeoJSON area of interest in the DEM's CRS.
    #[arg(long, global = true)]
    aoi: Option<PathBuf>,

    /// Absolute elevation (m) of the gauge zero.
    #[arg(long, global = true)]
    reference: Option<f64>,

    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flood extent for one gauge level.
    Flood(FloodArgs),
    /// Flood extent for a reading from a gauge table export.
    Playback(PlaybackArgs),
    /// Describe the DEM and area of interest.
    Info,
    /// Print the risk classes and their level bands.
    Legend,
}

#[derive(ClapArgs, Debug)]
struct OutputArgs {
    /// Compare against a scenario preset (`rise` or `dry`).
    #[arg(short, long)]
    scenario: Option<Scenario>,

    /// Write the result layers as WGS84 GeoJSON.
    #[arg(short = 'o', long)]
    geojson: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct FloodArgs {
    /// Gauge level in cm above the reference (default from config).
    #[arg(short, long, allow_negative_numbers = true)]
    level_cm: Option<f64>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(ClapArgs, Debug)]
struct PlaybackArgs {
    /// Gauge table export (default from config).
    #[arg(short, long)]
    gauge: Option<PathBuf>,

    /// Playback position, 0 = oldest reading. Defaults to the latest.
    #[arg(short, long, conflicts_with = "at")]
    index: Option<usize>,

    /// Latest reading at or before this time (`YYYY-MM-DD HH:MM` or `DD.MM.YYYY HH:MM`).
    #[arg(long)]
    at: Option<String>,

    #[command(flatten)]
    output: OutputArgs,
}

// ── Reports ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct LevelReport {
    level_cm: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<NaiveDateTime>,
    risk: RiskClass,
    risk_color: &'static str,
    water_elevation_m: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<FloodSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<ScenarioReport>,
}

#[derive(Serialize)]
struct ScenarioReport {
    scenario: Scenario,
    label: &'static str,
    level_cm: f64,
    water_elevation_m: f64,
    newly_flooded_cells: usize,
    newly_exposed_cells: usize,
    highlighted_area_ha: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<&'static str>,
}

#[derive(Serialize)]
struct InfoReport {
    dem_width: usize,
    dem_height: usize,
    cell_size_m: f64,
    crs: Option<String>,
    valid_cells: usize,
    min_elevation_m: Option<f32>,
    max_elevation_m: Option<f32>,
    dem_bounds: [f64; 4],
    aoi_polygons: usize,
    aoi_area_ha: f64,
    aoi_bounds_wgs84: Option<[f64; 4]>,
    reference_elevation_m: f64,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<TwinConfig> {
    let mut config = match &cli.config {
        Some(path) => TwinConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => TwinConfig::default(),
    };
    if let Some(dem) = &cli.dem {
        config.dem_path = dem.clone();
    }
    if let Some(aoi) = &cli.aoi {
        config.aoi_path = aoi.clone();
    }
    if let Some(reference) = cli.reference {
        config.reference_elevation_m = reference;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn load_context(config: &TwinConfig) -> Result<LakeContext> {
    let terrain = load_dem(&config.dem_path)
        .with_context(|| format!("loading DEM {}", config.dem_path.display()))?;
    let region = AreaOfInterest::load(&config.aoi_path)
        .with_context(|| format!("loading area of interest {}", config.aoi_path.display()))?;
    Ok(LakeContext::new(terrain, region))
}

fn parse_time(text: &str) -> Result<NaiveDateTime> {
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%d.%m.%Y %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text.trim(), fmt).ok())
        .with_context(|| format!("cannot parse time `{text}`"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn as_properties(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// ── Level evaluation ──────────────────────────────────────────────────────────

fn evaluate_level(
    ctx: &LakeContext,
    config: &TwinConfig,
    level_cm: f64,
    time: Option<NaiveDateTime>,
    output: &OutputArgs,
    as_json: bool,
) -> Result<()> {
    if !config.level_range_cm.contains(level_cm) {
        warn!(
            level_cm,
            min = config.level_range_cm.min,
            max = config.level_range_cm.max,
            "gauge level outside the configured range"
        );
    }
    let reference = config.reference_elevation_m;
    let risk = RiskClass::classify(level_cm);

    let (baseline, comparison) = match output.scenario {
        Some(scenario) => {
            let delta = config.scenario_deltas.delta_cm(scenario);
            let comparison = compare_scenario_with_delta(ctx, reference, level_cm, scenario, delta)
                .with_context(|| format!("computing scenario {scenario}"))?;
            (comparison.baseline.clone(), Some((comparison, delta)))
        }
        None => {
            let outcome = compute_flood(ctx, level_to_elevation(reference, level_cm))
                .context("computing flood extent")?;
            (outcome, None)
        }
    };

    let report = LevelReport {
        level_cm,
        time,
        risk,
        risk_color: risk.color(),
        water_elevation_m: baseline.water_elevation_m(),
        summary: baseline.extent().map(|e| e.summary()),
        notice: baseline.notice(),
        scenario: comparison.as_ref().map(|(c, delta)| ScenarioReport {
            scenario: c.scenario,
            label: c.scenario.label(),
            level_cm: level_cm + delta,
            water_elevation_m: c.shifted.water_elevation_m(),
            newly_flooded_cells: c.diff.newly_flooded.count(),
            newly_exposed_cells: c.diff.newly_exposed.count(),
            highlighted_area_ha: c.highlighted_area_ha(),
            notice: c.shifted.notice(),
        }),
    };

    if let Some(path) = &output.geojson {
        write_geojson(path, ctx, &baseline, comparison.as_ref().map(|(c, _)| c))?;
    }

    if as_json {
        return print_json(&report);
    }
    print_level_report(&report);
    Ok(())
}

fn print_level_report(report: &LevelReport) {
    println!("{:.1} cm", report.level_cm);
    if let Some(time) = report.time {
        println!("{}", time.format("%d %b %Y %H:%M"));
    }
    println!("Status: {} ({})", report.risk, report.risk_color);
    match (&report.summary, report.notice) {
        (Some(summary), _) => println!("{summary}"),
        (None, Some(notice)) => {
            println!("Absolute water elevation: {:.3} m", report.water_elevation_m);
            println!("{notice}");
        }
        (None, None) => {}
    }
    if let Some(s) = &report.scenario {
        println!();
        println!("Scenario: {} → {:.1} cm ({:.3} m)", s.label, s.level_cm, s.water_elevation_m);
        println!("  newly flooded: {} cells", s.newly_flooded_cells);
        println!("  newly exposed: {} cells", s.newly_exposed_cells);
        println!("  highlighted area: {:.1} ha", s.highlighted_area_ha);
        if let Some(notice) = s.notice {
            println!("  {notice}");
        }
    }
}

fn write_geojson(
    path: &Path,
    ctx: &LakeContext,
    baseline: &FloodOutcome,
    comparison: Option<&ScenarioComparison>,
) -> Result<()> {
    let crs = ctx.terrain().crs();
    let mut writer = GeoJsonWriter::new(crs).context("cannot re-project results to WGS84")?;
    writer.add_layer(Layer::Aoi, ctx.region().geometry(), Map::new());
    if let Some(extent) = baseline.extent() {
        writer.add_layer(Layer::Current, &extent.polygons, as_properties(serde_json::to_value(extent.summary())?));
    }
    if let Some(c) = comparison {
        let mut extra = Map::new();
        extra.insert("scenario".into(), json!(c.scenario.label()));
        extra.insert("area_ha".into(), json!(c.highlighted_area_ha()));
        writer.add_layer(Layer::for_scenario(c.scenario), c.highlighted(), extra);
    }
    let layers = writer.len();

    let mut doc = writer.finish();
    if let Some(bbox) = geographic_bounds(ctx.region(), crs)? {
        doc["bbox"] = json!(bbox);
    }
    let text = serde_json::to_string_pretty(&doc)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), layers, "wrote GeoJSON");
    Ok(())
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn run_playback(ctx: &LakeContext, config: &TwinConfig, args: &PlaybackArgs, as_json: bool) -> Result<()> {
    let Some(path) = args.gauge.as_ref().or(config.gauge_path.as_ref()) else {
        bail!("no gauge table given (use --gauge or set gauge_path in the config)");
    };
    let series = GaugeSeries::load(path).with_context(|| format!("loading gauge table {}", path.display()))?;

    let reading: &GaugeReading = match (&args.at, args.index) {
        (Some(at), _) => {
            let time = parse_time(at)?;
            series
                .at_or_before(time)
                .with_context(|| format!("no gauge reading at or before {time}"))?
        }
        (None, Some(index)) => series.at(index)?,
        (None, None) => series.latest(),
    };
    info!(time = %reading.time, level_cm = reading.level_cm, readings = series.len(), "selected gauge reading");
    evaluate_level(ctx, config, reading.level_cm, Some(reading.time), &args.output, as_json)
}

fn run_info(ctx: &LakeContext, config: &TwinConfig, as_json: bool) -> Result<()> {
    let grid = ctx.terrain();
    let region = ctx.region();
    let (x_min, y_min, x_max, y_max) = grid.bounds();
    let aoi_bounds_wgs84 = match geographic_bounds(region, grid.crs()) {
        Ok(bounds) => bounds,
        Err(e) => {
            warn!("cannot compute geographic bounds: {e}");
            None
        }
    };
    let report = InfoReport {
        dem_width: grid.width(),
        dem_height: grid.height(),
        cell_size_m: grid.cell_size(),
        crs: grid.crs().map(|c| c.to_string()),
        valid_cells: grid.valid_cells(),
        min_elevation_m: grid.min_elevation(),
        max_elevation_m: grid.max_elevation(),
        dem_bounds: [x_min, y_min, x_max, y_max],
        aoi_polygons: region.geometry().0.len(),
        aoi_area_ha: region.area_m2() / 10_000.0,
        aoi_bounds_wgs84,
        reference_elevation_m: config.reference_elevation_m,
    };
    if as_json {
        return print_json(&report);
    }
    println!("DEM: {}×{} cells of {:.2} m", report.dem_width, report.dem_height, report.cell_size_m);
    println!("CRS: {}", report.crs.as_deref().unwrap_or("unknown"));
    println!("Valid cells: {}", report.valid_cells);
    if let (Some(lo), Some(hi)) = (report.min_elevation_m, report.max_elevation_m) {
        println!("Elevation: {lo:.3} – {hi:.3} m");
    }
    println!("Bounds: {x_min:.1}, {y_min:.1}, {x_max:.1}, {y_max:.1}");
    println!("Area of interest: {} polygon(s), {:.1} ha", report.aoi_polygons, report.aoi_area_ha);
    if let Some([w, s, e, n]) = report.aoi_bounds_wgs84 {
        println!("Area of interest (WGS84): {w:.5}, {s:.5}, {e:.5}, {n:.5}");
    }
    println!("Reference elevation: {:.3} m", report.reference_elevation_m);
    Ok(())
}

fn print_legend(as_json: bool) -> Result<()> {
    if as_json {
        let classes: Vec<Value> = RiskClass::ALL
            .iter()
            .map(|c| json!({ "class": c, "label": c.label(), "band_cm": c.band(), "color": c.color() }))
            .collect();
        return print_json(&classes);
    }
    println!("Risk Classification (Reference period 1954–2025)");
    for class in RiskClass::ALL {
        println!("  {:<10} {:<8} {}", class.label(), class.band(), class.color());
    }
    println!("Thresholds derived from long-term daily water level observations (1954–2025).");
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match &cli.command {
        Command::Legend => print_legend(cli.json),
        Command::Info => {
            let ctx = load_context(&config)?;
            run_info(&ctx, &config, cli.json)
        }
        Command::Flood(args) => {
            let ctx = load_context(&config)?;
            let level_cm = args.level_cm.unwrap_or(config.default_level_cm);
            evaluate_level(&ctx, &config, level_cm, None, &args.output, cli.json)
        }
        Command::Playback(args) => {
            let ctx = load_context(&config)?;
            run_playback(&ctx, &config, args, cli.json)
        }
    }
}
