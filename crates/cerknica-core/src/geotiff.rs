//! DEM loading from single-band GeoTIFF.
//!
//! Georeferencing comes from ModelPixelScale + ModelTiepoint or from
//! ModelTransformation; the EPSG code from the GeoKey directory
//! (ProjectedCSType, else GeographicType). The GDAL no-data tag is honoured by
//! storing those cells as NaN. For multi-band files only band 1 is read.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::info;

use crate::error::TerrainError;
use crate::projection::Crs;
use crate::terrain::{ElevationGrid, GeoTransform};

pub const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
pub const TAG_MODEL_TIEPOINT: u16 = 33922;
pub const TAG_MODEL_TRANSFORMATION: u16 = 34264;
pub const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
pub const TAG_GDAL_NODATA: u16 = 42113;

const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;
const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;

/// Read a DEM from a GeoTIFF file.
pub fn load_dem(path: &Path) -> Result<ElevationGrid, TerrainError> {
    let file = File::open(path).map_err(|source| TerrainError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let grid = read_dem(BufReader::new(file))?;
    info!(
        path = %path.display(),
        width = grid.width(),
        height = grid.height(),
        cell_size = grid.cell_size(),
        crs = ?grid.crs(),
        valid_cells = grid.valid_cells(),
        "loaded DEM"
    );
    Ok(grid)
}

/// Read a DEM from any seekable GeoTIFF stream.
pub fn read_dem<R: Read + Seek>(reader: R) -> Result<ElevationGrid, TerrainError> {
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());
    let (w, h) = decoder.dimensions()?;
    let (width, height) = (w as usize, h as usize);
    if width == 0 || height == 0 {
        return Err(TerrainError::Empty { width, height });
    }

    let geo_keys = find_u16s(&mut decoder, TAG_GEO_KEY_DIRECTORY)?.unwrap_or_default();
    let transform = read_transform(&mut decoder, &geo_keys)?;
    let crs = crs_from_geo_keys(&geo_keys);
    let nodata = match decoder.find_tag(Tag::from_u16_exhaustive(TAG_GDAL_NODATA))? {
        Some(value) => value.into_string().ok().and_then(|s| s.trim_matches('\0').trim().parse::<f64>().ok()),
        None => None,
    };

    let raw = samples_as_f32(decoder.read_image()?)?;
    let pixels = width * height;
    if raw.is_empty() || raw.len() % pixels != 0 {
        return Err(TerrainError::ShapeMismatch {
            width,
            height,
            expected: pixels,
            actual: raw.len(),
        });
    }
    let bands = raw.len() / pixels;
    let data: Vec<f32> = raw
        .into_iter()
        .step_by(bands)
        .map(|v| match nodata {
            Some(nd) if f64::from(v) == nd || (nd.is_nan() && v.is_nan()) => f32::NAN,
            _ => v,
        })
        .collect();

    ElevationGrid::new(data, width, height, transform, crs)
}

fn find_u16s<R: Read + Seek>(decoder: &mut Decoder<R>, tag: u16) -> Result<Option<Vec<u16>>, TerrainError> {
    match decoder.find_tag(Tag::from_u16_exhaustive(tag))? {
        Some(value) => Ok(Some(value.into_u16_vec()?)),
        None => Ok(None),
    }
}

fn find_f64s<R: Read + Seek>(decoder: &mut Decoder<R>, tag: u16) -> Result<Option<Vec<f64>>, TerrainError> {
    match decoder.find_tag(Tag::from_u16_exhaustive(tag))? {
        Some(value) => Ok(Some(value.into_f64_vec()?)),
        None => Ok(None),
    }
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>, geo_keys: &[u16]) -> Result<GeoTransform, TerrainError> {
    let transform = if let Some(m) = find_f64s(decoder, TAG_MODEL_TRANSFORMATION)? {
        if m.len() < 16 {
            return Err(TerrainError::MissingGeoreference);
        }
        GeoTransform { a: m[0], b: m[1], c: m[3], d: m[4], e: m[5], f: m[7] }
    } else {
        let scale = find_f64s(decoder, TAG_MODEL_PIXEL_SCALE)?;
        let tie = find_f64s(decoder, TAG_MODEL_TIEPOINT)?;
        match (scale, tie) {
            (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
                let (sx, sy) = (s[0], s[1]);
                let (i, j, x, y) = (t[0], t[1], t[3], t[4]);
                GeoTransform { a: sx, b: 0.0, c: x - i * sx, d: 0.0, e: -sy, f: y + j * sy }
            }
            _ => return Err(TerrainError::MissingGeoreference),
        }
    };

    // PixelIsPoint tiepoints address cell centres; shift to the outer corner.
    if geo_key(geo_keys, KEY_RASTER_TYPE) == Some(RASTER_PIXEL_IS_POINT) {
        let (cx, cy) = transform.apply(-0.5, -0.5);
        return Ok(GeoTransform { c: cx, f: cy, ..transform });
    }
    Ok(transform)
}

/// Inline SHORT value of `key` in a GeoKey directory.
fn geo_key(directory: &[u16], key: u16) -> Option<u16> {
    let count = *directory.get(3)? as usize;
    directory
        .get(4..4 + 4 * count)?
        .chunks_exact(4)
        .find(|entry| entry[0] == key && entry[1] == 0)
        .map(|entry| entry[3])
}

fn crs_from_geo_keys(directory: &[u16]) -> Option<Crs> {
    [KEY_PROJECTED_CS_TYPE, KEY_GEOGRAPHIC_TYPE]
        .into_iter()
        .filter_map(|key| geo_key(directory, key))
        .find(|&code| code != 0 && code != USER_DEFINED)
        .map(|code| Crs(u32::from(code)))
}

fn samples_as_f32(result: DecodingResult) -> Result<Vec<f32>, TerrainError> {
    Ok(match result {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => return Err(TerrainError::UnsupportedSampleFormat("64-bit integer".to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_key_reads_inline_values() {
        // Header: version 1, revision 1.0, 3 keys.
        let dir = [1, 1, 0, 3, 1024, 0, 1, 1, 1025, 0, 1, 1, 3072, 0, 1, 3794];
        assert_eq!(geo_key(&dir, KEY_RASTER_TYPE), Some(1));
        assert_eq!(crs_from_geo_keys(&dir), Some(Crs::SLOVENIA_D96_TM));
    }

    #[test]
    fn geo_key_ignores_referenced_values() {
        // ProjectedCSType stored in another tag (location ≠ 0) is not inline.
        let dir = [1, 1, 0, 1, 3072, 34736, 1, 0];
        assert_eq!(geo_key(&dir, KEY_PROJECTED_CS_TYPE), None);
        assert_eq!(crs_from_geo_keys(&dir), None);
    }

    #[test]
    fn user_defined_crs_falls_back_to_geographic() {
        let dir = [1, 1, 0, 2, 2048, 0, 1, 4326, 3072, 0, 1, USER_DEFINED];
        assert_eq!(crs_from_geo_keys(&dir), Some(Crs::WGS84));
    }

    #[test]
    fn truncated_directory_is_tolerated() {
        assert_eq!(geo_key(&[1, 1, 0, 5, 3072, 0], KEY_PROJECTED_CS_TYPE), None);
        assert_eq!(crs_from_geo_keys(&[]), None);
    }

    #[test]
    fn integer_samples_widen_to_f32() {
        let v = samples_as_f32(DecodingResult::I16(vec![-3, 545])).unwrap();
        assert_eq!(v, vec![-3.0, 545.0]);
    }
}
