//! GeoJSON output of result layers, re-projected to WGS84 for web maps.
//!
//! Each layer becomes one `MultiPolygon` feature carrying simplestyle
//! properties (`fill`, `stroke`, `fill-opacity`, `stroke-width`) so any
//! GeoJSON viewer draws it the way the dashboard does.

use geo::{BoundingRect, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ProjectionError;
use crate::projection::{Crs, Projection};
use crate::region::AreaOfInterest;
use crate::scenario::Scenario;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// Flood extent at the selected level.
    Current,
    /// Cells that flood only in a rising scenario.
    Additional,
    /// Lake bed exposed in a dry scenario.
    Exposed,
    /// Area-of-interest outline.
    Aoi,
}

impl Layer {
    pub fn name(self) -> &'static str {
        match self {
            Layer::Current => "current",
            Layer::Additional => "additional",
            Layer::Exposed => "exposed",
            Layer::Aoi => "aoi",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Layer::Current => "#1f77b4",
            Layer::Additional => "#ff0000",
            Layer::Exposed => "#ff9900",
            Layer::Aoi => "#555555",
        }
    }

    /// Change layer drawn for a scenario: new water for a rise, exposed bed
    /// for a drop.
    pub fn for_scenario(scenario: Scenario) -> Self {
        match scenario {
            Scenario::Rise => Layer::Additional,
            Scenario::Dry => Layer::Exposed,
        }
    }

    fn fill_opacity(self) -> f64 {
        match self {
            Layer::Aoi => 0.0,
            _ => 0.6,
        }
    }

    fn stroke_width(self) -> u32 {
        match self {
            Layer::Additional | Layer::Exposed => 2,
            _ => 1,
        }
    }
}

/// Accumulates layers in grid CRS and writes them as a WGS84 feature
/// collection.
#[derive(Debug)]
pub struct GeoJsonWriter {
    projection: Projection,
    features: Vec<Value>,
}

impl GeoJsonWriter {
    pub fn new(grid_crs: Option<Crs>) -> Result<Self, ProjectionError> {
        let projection = grid_crs.ok_or(ProjectionError::UnknownCrs)?.projection()?;
        Ok(Self { projection, features: Vec::new() })
    }

    /// Add one layer. Empty geometries are skipped. `extra` is merged into the
    /// feature properties.
    pub fn add_layer(&mut self, layer: Layer, geometry: &MultiPolygon<f64>, extra: Map<String, Value>) {
        if geometry.0.is_empty() {
            return;
        }
        let geographic = self.projection.multipolygon_to_geographic(geometry);
        let mut properties = Map::new();
        properties.insert("layer".into(), json!(layer.name()));
        properties.insert("fill".into(), json!(layer.color()));
        properties.insert("stroke".into(), json!(layer.color()));
        properties.insert("fill-opacity".into(), json!(layer.fill_opacity()));
        properties.insert("stroke-width".into(), json!(layer.stroke_width()));
        properties.extend(extra);

        self.features.push(json!({
            "type": "Feature",
            "properties": properties,
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": multipolygon_coordinates(&geographic),
            },
        }));
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn finish(self) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": self.features,
        })
    }
}

/// `[west, south, east, north]` of the area of interest in WGS84, for
/// fitting the map view.
pub fn geographic_bounds(region: &AreaOfInterest, grid_crs: Option<Crs>) -> Result<Option<[f64; 4]>, ProjectionError> {
    let projection = grid_crs.ok_or(ProjectionError::UnknownCrs)?.projection()?;
    let geographic = projection.multipolygon_to_geographic(region.geometry());
    Ok(geographic
        .bounding_rect()
        .map(|r| [r.min().x, r.min().y, r.max().x, r.max().y]))
}

fn multipolygon_coordinates(mp: &MultiPolygon<f64>) -> Value {
    Value::Array(mp.0.iter().map(polygon_coordinates).collect())
}

fn polygon_coordinates(polygon: &Polygon<f64>) -> Value {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.coords().map(|c| json!([c.x, c.y])).collect::<Vec<_>>())
        .collect::<Vec<_>>()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        AreaOfInterest::rectangle(x0, y0, x0 + size, y0 + size)
            .unwrap()
            .geometry()
            .clone()
    }

    #[test]
    fn writes_feature_collection_in_wgs84() {
        let mut writer = GeoJsonWriter::new(Some(Crs::SLOVENIA_D96_TM)).unwrap();
        let mut extra = Map::new();
        extra.insert("area_ha".into(), json!(12.5));
        writer.add_layer(Layer::Current, &square(455_000.0, 70_000.0, 1_000.0), extra);
        writer.add_layer(Layer::Exposed, &MultiPolygon::new(Vec::new()), Map::new());
        assert_eq!(writer.len(), 1, "empty layers are skipped");

        let doc = writer.finish();
        assert_eq!(doc["type"], "FeatureCollection");
        let feature = &doc["features"][0];
        assert_eq!(feature["properties"]["layer"], "current");
        assert_eq!(feature["properties"]["fill"], "#1f77b4");
        assert_eq!(feature["properties"]["area_ha"], 12.5);

        let first = &feature["geometry"]["coordinates"][0][0][0];
        let lon = first[0].as_f64().unwrap();
        let lat = first[1].as_f64().unwrap();
        assert!((14.0..15.0).contains(&lon), "lon {lon}");
        assert!((45.5..46.0).contains(&lat), "lat {lat}");
    }

    #[test]
    fn scenario_layers_use_change_colours() {
        assert_eq!(Layer::for_scenario(Scenario::Rise).color(), "#ff0000");
        assert_eq!(Layer::for_scenario(Scenario::Dry).color(), "#ff9900");
    }

    #[test]
    fn unknown_crs_cannot_be_exported() {
        assert_eq!(GeoJsonWriter::new(None).unwrap_err(), ProjectionError::UnknownCrs);
        assert_eq!(
            GeoJsonWriter::new(Some(Crs(2154))).unwrap_err(),
            ProjectionError::UnsupportedEpsg(2154)
        );
    }

    #[test]
    fn aoi_bounds_are_geographic() {
        let aoi = AreaOfInterest::rectangle(450_000.0, 65_000.0, 462_000.0, 76_000.0).unwrap();
        let [west, south, east, north] = geographic_bounds(&aoi, Some(Crs::SLOVENIA_D96_TM)).unwrap().unwrap();
        assert!(west < east && south < north);
        assert!((14.2..14.6).contains(&west), "west {west}");
        assert!((45.6..45.9).contains(&south), "south {south}");
    }
}
