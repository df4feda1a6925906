//! Area of interest: the fixed clip boundary for reported flood area.
//!
//! Loaded from GeoJSON (`FeatureCollection`, `Feature`, or a bare `Polygon` /
//! `MultiPolygon`) in the same projected CRS as the DEM. A legacy `crs`
//! member of the form `urn:ogc:def:crs:EPSG::3794` or `EPSG:3794` is read
//! when present.

use std::fs;
use std::path::Path;

use geo::{Area, BoundingRect, Coord, LineString, MultiPolygon, Polygon, Rect};
use serde_json::Value;
use tracing::info;

use crate::error::RegionError;
use crate::projection::Crs;

#[derive(Debug, Clone)]
pub struct AreaOfInterest {
    geometry: MultiPolygon<f64>,
    crs: Option<Crs>,
}

impl AreaOfInterest {
    /// Validate and wrap a multipolygon.
    pub fn new(geometry: MultiPolygon<f64>, crs: Option<Crs>) -> Result<Self, RegionError> {
        if geometry.0.is_empty() {
            return Err(RegionError::NoPolygons);
        }
        let finite = geometry.0.iter().all(|p| {
            std::iter::once(p.exterior())
                .chain(p.interiors())
                .flat_map(|ring| ring.coords())
                .all(|c| c.x.is_finite() && c.y.is_finite())
        });
        if !finite {
            return Err(RegionError::NonFiniteCoordinate);
        }
        if geometry.unsigned_area() <= 0.0 {
            return Err(RegionError::ZeroArea);
        }
        Ok(Self { geometry, crs })
    }

    /// Axis-aligned rectangle `[x_min, x_max] × [y_min, y_max]`.
    pub fn rectangle(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self, RegionError> {
        let rect = Rect::new(Coord { x: x_min, y: y_min }, Coord { x: x_max, y: y_max });
        Self::new(MultiPolygon::new(vec![rect.to_polygon()]), None)
    }

    /// Read a GeoJSON file.
    pub fn load(path: &Path) -> Result<Self, RegionError> {
        let text = fs::read_to_string(path).map_err(|source| RegionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let aoi = Self::from_geojson_str(&text)?;
        info!(
            path = %path.display(),
            parts = aoi.geometry.0.len(),
            area_ha = aoi.area_m2() / 10_000.0,
            "loaded area of interest"
        );
        Ok(aoi)
    }

    pub fn from_geojson_str(text: &str) -> Result<Self, RegionError> {
        let doc: Value = serde_json::from_str(text)?;
        let crs = legacy_crs(&doc);
        let mut polygons = Vec::new();
        collect_polygons(&doc, &mut polygons)?;
        Self::new(MultiPolygon::new(polygons), crs)
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn area_m2(&self) -> f64 {
        self.geometry.unsigned_area()
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }
}

// ── GeoJSON decoding ──────────────────────────────────────────────────────────

fn type_of(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}

fn collect_polygons(value: &Value, out: &mut Vec<Polygon<f64>>) -> Result<(), RegionError> {
    match type_of(value) {
        Some("FeatureCollection") => {
            let features = value.get("features").and_then(Value::as_array);
            for feature in features.into_iter().flatten() {
                collect_polygons(feature, out)?;
            }
            Ok(())
        }
        Some("Feature") => match value.get("geometry") {
            Some(Value::Null) | None => Ok(()),
            Some(geometry) => collect_polygons(geometry, out),
        },
        Some("Polygon") => {
            let rings: Vec<Vec<Vec<f64>>> = coordinates(value)?;
            out.push(polygon_from_rings(rings)?);
            Ok(())
        }
        Some("MultiPolygon") => {
            let parts: Vec<Vec<Vec<Vec<f64>>>> = coordinates(value)?;
            for rings in parts {
                out.push(polygon_from_rings(rings)?);
            }
            Ok(())
        }
        Some(other) => Err(RegionError::UnsupportedGeometry(other.to_string())),
        None => Err(RegionError::UnsupportedGeometry("<missing type>".to_string())),
    }
}

fn coordinates<T: serde::de::DeserializeOwned>(geometry: &Value) -> Result<T, RegionError> {
    let coords = geometry.get("coordinates").cloned().unwrap_or(Value::Null);
    Ok(serde_json::from_value(coords)?)
}

fn polygon_from_rings(rings: Vec<Vec<Vec<f64>>>) -> Result<Polygon<f64>, RegionError> {
    let mut line_strings = Vec::with_capacity(rings.len());
    for (i, ring) in rings.into_iter().enumerate() {
        if ring.len() < 4 {
            return Err(RegionError::DegenerateRing { ring: i, points: ring.len() });
        }
        let coords = ring
            .into_iter()
            .map(|pos| match pos.as_slice() {
                [x, y, ..] => Ok(Coord { x: *x, y: *y }),
                _ => Err(RegionError::NonFiniteCoordinate),
            })
            .collect::<Result<Vec<_>, _>>()?;
        line_strings.push(LineString::new(coords));
    }
    let mut iter = line_strings.into_iter();
    let exterior = iter.next().ok_or(RegionError::NoPolygons)?;
    Ok(Polygon::new(exterior, iter.collect()))
}

/// EPSG code from a pre-RFC7946 `crs` member, if any.
fn legacy_crs(doc: &Value) -> Option<Crs> {
    let name = doc.get("crs")?.get("properties")?.get("name")?.as_str()?;
    let code = name.rsplit(':').next()?;
    code.parse().ok().map(Crs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::3794" } },
        "features": [{
            "type": "Feature",
            "properties": { "name": "lake" },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]
            }
        }]
    }"#;

    #[test]
    fn parses_feature_collection_with_crs() {
        let aoi = AreaOfInterest::from_geojson_str(SQUARE).unwrap();
        assert_eq!(aoi.crs(), Some(Crs::SLOVENIA_D96_TM));
        assert_eq!(aoi.geometry().0.len(), 1);
        assert!((aoi.area_m2() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn parses_bare_multipolygon_with_hole() {
        let text = r#"{
            "type": "MultiPolygon",
            "coordinates": [
                [[[0, 0], [4, 0], [4, 4], [0, 4], [0, 0]],
                 [[1, 1], [1, 2], [2, 2], [2, 1], [1, 1]]],
                [[[10, 10], [11, 10], [11, 11, 500.0], [10, 11], [10, 10]]]
            ]
        }"#;
        let aoi = AreaOfInterest::from_geojson_str(text).unwrap();
        assert_eq!(aoi.geometry().0.len(), 2);
        assert!((aoi.area_m2() - 16.0).abs() < 1e-9);
        assert_eq!(aoi.crs(), None);
    }

    #[test]
    fn rejects_point_geometry() {
        let text = r#"{ "type": "Point", "coordinates": [1, 2] }"#;
        let err = AreaOfInterest::from_geojson_str(text).unwrap_err();
        assert!(matches!(err, RegionError::UnsupportedGeometry(t) if t == "Point"));
    }

    #[test]
    fn rejects_degenerate_ring() {
        let text = r#"{ "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [0, 0]]] }"#;
        let err = AreaOfInterest::from_geojson_str(text).unwrap_err();
        assert!(matches!(err, RegionError::DegenerateRing { ring: 0, points: 3 }));
    }

    #[test]
    fn rejects_empty_collection() {
        let text = r#"{ "type": "FeatureCollection", "features": [] }"#;
        let err = AreaOfInterest::from_geojson_str(text).unwrap_err();
        assert!(matches!(err, RegionError::NoPolygons));
    }

    #[test]
    fn rejects_zero_area() {
        let text = r#"{ "type": "Polygon", "coordinates": [[[0, 0], [1, 1], [2, 2], [0, 0]]] }"#;
        let err = AreaOfInterest::from_geojson_str(text).unwrap_err();
        assert!(matches!(err, RegionError::ZeroArea));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = AreaOfInterest::from_geojson_str("{ not json").unwrap_err();
        assert!(matches!(err, RegionError::Json(_)));
    }

    #[test]
    fn rectangle_bounds() {
        let aoi = AreaOfInterest::rectangle(1.0, 2.0, 3.0, 5.0).unwrap();
        let b = aoi.bounds().unwrap();
        assert_eq!((b.min().x, b.min().y, b.max().x, b.max().y), (1.0, 2.0, 3.0, 5.0));
    }
}
