//! File loaders against real files in a scratch directory.

use std::fs;
use std::path::PathBuf;

use cerknica_core::gauge::GaugeSeries;
use cerknica_core::geotiff::load_dem;
use cerknica_core::{AreaOfInterest, ConfigError, GaugeError, RegionError, RiskClass, TerrainError, TwinConfig};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cerknica-{}-{name}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn config_file_resolves_paths_next_to_it() {
    let dir = scratch_dir("config");
    let path = dir.join("twin.json");
    fs::write(
        &path,
        r#"{ "dem_path": "dem.tif", "aoi_path": "/abs/aoi.geojson", "gauge_path": "arso.csv", "default_level_cm": 420 }"#,
    )
    .unwrap();

    let config = TwinConfig::load(&path).unwrap();
    assert_eq!(config.dem_path, dir.join("dem.tif"));
    assert_eq!(config.aoi_path, PathBuf::from("/abs/aoi.geojson"));
    assert_eq!(config.gauge_path, Some(dir.join("arso.csv")));
    assert_eq!(config.default_level_cm, 420.0);
    assert_eq!(config.reference_elevation_m, 545.417);
}

#[test]
fn missing_files_name_the_path() {
    let missing = scratch_dir("missing").join("nope");
    match TwinConfig::load(&missing) {
        Err(ConfigError::Io { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected Io error, got {other:?}"),
    }
    assert!(matches!(load_dem(&missing), Err(TerrainError::Io { .. })));
    assert!(matches!(AreaOfInterest::load(&missing), Err(RegionError::Io { .. })));
    assert!(matches!(GaugeSeries::load(&missing), Err(GaugeError::Io { .. })));
}

#[test]
fn non_tiff_dem_is_a_decode_error() {
    let path = scratch_dir("bad-dem").join("dem.tif");
    fs::write(&path, b"definitely not a tiff").unwrap();
    assert!(matches!(load_dem(&path), Err(TerrainError::Tiff(_))));
}

#[test]
fn aoi_file_with_multipolygon() {
    let path = scratch_dir("aoi").join("aoi.geojson");
    fs::write(
        &path,
        r#"{ "type": "MultiPolygon", "coordinates": [
            [[[0, 0], [100, 0], [100, 100], [0, 100], [0, 0]]],
            [[[200, 0], [300, 0], [300, 100], [200, 100], [200, 0]]]
        ] }"#,
    )
    .unwrap();
    let aoi = AreaOfInterest::load(&path).unwrap();
    assert_eq!(aoi.geometry().0.len(), 2);
    assert_eq!(aoi.area_m2(), 20_000.0);
    assert_eq!(aoi.crs(), None);
}

#[test]
fn gauge_export_playback() {
    let path = scratch_dir("gauge").join("arso.csv");
    fs::write(
        &path,
        "Datum,Vodostaj (cm)\n\
         10.02.2026 06:00,530\n\
         09.02.2026 06:00,455\n\
         08.02.2026 06:00,\n\
         07.02.2026 06:00,340\n",
    )
    .unwrap();
    let series = GaugeSeries::load(&path).unwrap();
    assert_eq!(series.len(), 3);
    let classes: Vec<RiskClass> = series.readings().iter().map(|r| r.risk()).collect();
    assert_eq!(classes, vec![RiskClass::Normal, RiskClass::VeryHigh, RiskClass::Extreme]);
    assert_eq!(series.latest().level_cm, 530.0);
}
