//! Error types for every loader and for the flood engine.
//!
//! The two expected non-fatal results ("nothing flooded", "extent outside
//! region") are not errors; see [`crate::flood::FloodOutcome`].

use std::path::PathBuf;

use thiserror::Error;

/// Failure to load or validate the elevation grid.
#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("cannot open DEM {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode DEM as GeoTIFF: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("elevation grid is empty ({width}×{height})")]
    Empty { width: usize, height: usize },

    #[error("elevation grid has {actual} samples, expected {width}×{height} = {expected}")]
    ShapeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("DEM carries no georeferencing (needs ModelPixelScale + ModelTiepoint or ModelTransformation)")]
    MissingGeoreference,

    #[error("invalid cell size {0}: must be finite and positive")]
    InvalidCellSize(f64),

    #[error("non-square cells are not supported ({x} × {y})")]
    NonSquareCells { x: f64, y: f64 },

    #[error("unsupported DEM sample format: {0}")]
    UnsupportedSampleFormat(String),
}

/// Failure to load or validate the area of interest.
#[derive(Debug, Error)]
pub enum RegionError {
    #[error("cannot read area of interest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("area of interest is not valid GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("area of interest contains no polygon geometry")]
    NoPolygons,

    #[error("unsupported geometry type `{0}` in area of interest")]
    UnsupportedGeometry(String),

    #[error("polygon ring {ring} has {points} positions, need at least 4")]
    DegenerateRing { ring: usize, points: usize },

    #[error("area of interest has a non-finite coordinate")]
    NonFiniteCoordinate,

    #[error("area of interest has zero area")]
    ZeroArea,
}

/// Violated precondition of a flood computation.
#[derive(Debug, Error, PartialEq)]
pub enum FloodError {
    #[error("water elevation must be finite, got {0}")]
    NonFiniteElevation(f64),

    #[error("mask has {len} cells but {width}×{height} needs {}", .width * .height)]
    MaskLength { len: usize, width: usize, height: usize },

    #[error("mask shapes differ: {left_width}×{left_height} vs {right_width}×{right_height}")]
    MaskShapeMismatch {
        left_width: usize,
        left_height: usize,
        right_width: usize,
        right_height: usize,
    },

    #[error("mask is {mask_width}×{mask_height} but the grid is {grid_width}×{grid_height}")]
    MaskGridMismatch {
        mask_width: usize,
        mask_height: usize,
        grid_width: usize,
        grid_height: usize,
    },
}

/// Failure to read a gauge table export.
#[derive(Debug, Error)]
pub enum GaugeError {
    #[error("cannot read gauge table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("gauge table has no header row")]
    MissingHeader,

    #[error("gauge table has no `{0}` column")]
    MissingColumn(&'static str),

    #[error("gauge table has no readable rows")]
    NoReadings,

    #[error("playback index {index} out of range (series has {len} readings)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Coordinate reference system cannot be handled.
#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("unsupported coordinate reference system EPSG:{0}")]
    UnsupportedEpsg(u32),

    #[error("grid carries no coordinate reference system")]
    UnknownCrs,
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reference elevation must be finite, got {0}")]
    NonFiniteReference(f64),

    #[error("level range {min}..={max} cm is empty")]
    EmptyLevelRange { min: i32, max: i32 },
}
