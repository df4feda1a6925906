//! Coordinate reference systems and re-projection to geographic WGS84.
//!
//! Only the transverse Mercator family is supported: Slovenia's D96/TM
//! (EPSG:3794) plus the ETRS89 and WGS84 UTM zones. The grid CRS is kept as
//! an EPSG code; re-projection happens only when results leave the core for
//! display.
//!
//! Formulas follow Snyder, *Map Projections: A Working Manual* (USGS PP 1395),
//! §8, truncated at the sixth-order terms. Within a few degrees of the central
//! meridian the error is far below a DEM cell.

use geo::{Coord, MapCoords, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;

/// Coordinate reference system, identified by EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs(pub u32);

impl Crs {
    pub const WGS84: Crs = Crs(4326);
    pub const SLOVENIA_D96_TM: Crs = Crs(3794);

    pub fn epsg(self) -> u32 {
        self.0
    }

    /// Resolve the projection used to reach geographic coordinates.
    pub fn projection(self) -> Result<Projection, ProjectionError> {
        match self.0 {
            4326 | 4258 => Ok(Projection::Geographic),
            3794 => Ok(Projection::TransverseMercator(TransverseMercator {
                ellipsoid: Ellipsoid::GRS80,
                lon0_deg: 15.0,
                k0: 0.9999,
                false_easting: 500_000.0,
                false_northing: -5_000_000.0,
            })),
            code @ 25801..=25860 => Ok(Projection::TransverseMercator(
                TransverseMercator::utm(Ellipsoid::GRS80, code - 25800, false),
            )),
            code @ 32601..=32660 => Ok(Projection::TransverseMercator(
                TransverseMercator::utm(Ellipsoid::WGS84, code - 32600, false),
            )),
            code @ 32701..=32760 => Ok(Projection::TransverseMercator(
                TransverseMercator::utm(Ellipsoid::WGS84, code - 32700, true),
            )),
            other => Err(ProjectionError::UnsupportedEpsg(other)),
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis (m).
    pub a: f64,
    /// Inverse flattening.
    pub inv_f: f64,
}

impl Ellipsoid {
    pub const GRS80: Ellipsoid = Ellipsoid { a: 6_378_137.0, inv_f: 298.257_222_101 };
    pub const WGS84: Ellipsoid = Ellipsoid { a: 6_378_137.0, inv_f: 298.257_223_563 };

    /// First eccentricity squared.
    fn e2(&self) -> f64 {
        let f = 1.0 / self.inv_f;
        f * (2.0 - f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    pub ellipsoid: Ellipsoid,
    /// Central meridian (degrees). Latitude of origin is always the equator.
    pub lon0_deg: f64,
    pub k0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl TransverseMercator {
    pub fn utm(ellipsoid: Ellipsoid, zone: u32, south: bool) -> Self {
        Self {
            ellipsoid,
            lon0_deg: -183.0 + 6.0 * f64::from(zone),
            k0: 0.9996,
            false_easting: 500_000.0,
            false_northing: if south { 10_000_000.0 } else { 0.0 },
        }
    }

    /// Meridian arc length from the equator to latitude `phi` (radians).
    fn meridian_arc(&self, phi: f64) -> f64 {
        let a = self.ellipsoid.a;
        let e2 = self.ellipsoid.e2();
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        a * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
    }

    /// Geographic (lon, lat) degrees → projected (easting, northing) metres.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let a = self.ellipsoid.a;
        let e2 = self.ellipsoid.e2();
        let ep2 = e2 / (1.0 - e2);
        let phi = lat_deg.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let big_a = (lon_deg - self.lon0_deg).to_radians() * cos_phi;
        let m = self.meridian_arc(phi);

        let a2 = big_a * big_a;
        let a3 = a2 * big_a;
        let a4 = a3 * big_a;
        let a5 = a4 * big_a;
        let a6 = a5 * big_a;

        let x = self.k0
            * n
            * (big_a + (1.0 - t + c) * a3 / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a5 / 120.0);
        let y = self.k0
            * (m + n
                * tan_phi
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0));

        (x + self.false_easting, y + self.false_northing)
    }

    /// Projected (easting, northing) metres → geographic (lon, lat) degrees.
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let a = self.ellipsoid.a;
        let e2 = self.ellipsoid.e2();
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let ep2 = e2 / (1.0 - e2);

        let x = easting - self.false_easting;
        let m = (northing - self.false_northing) / self.k0;
        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

        let sqrt_1_e2 = (1.0 - e2).sqrt();
        let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);
        let e1_2 = e1 * e1;
        let e1_3 = e1_2 * e1;
        let e1_4 = e1_3 * e1;

        // Footpoint latitude.
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

        let (sin1, cos1) = phi1.sin_cos();
        let tan1 = phi1.tan();
        let c1 = ep2 * cos1 * cos1;
        let t1 = tan1 * tan1;
        let w = 1.0 - e2 * sin1 * sin1;
        let n1 = a / w.sqrt();
        let r1 = a * (1.0 - e2) / w.powf(1.5);
        let d = x / (n1 * self.k0);

        let d2 = d * d;
        let d3 = d2 * d;
        let d4 = d3 * d;
        let d5 = d4 * d;
        let d6 = d5 * d;

        let phi = phi1
            - (n1 * tan1 / r1)
                * (d2 / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * ep2
                        - 3.0 * c1 * c1)
                        * d6
                        / 720.0);
        let lambda = (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d5
                / 120.0)
            / cos1;

        (self.lon0_deg + lambda.to_degrees(), phi.to_degrees())
    }
}

/// How to reach geographic coordinates from a CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Already longitude/latitude degrees.
    Geographic,
    TransverseMercator(TransverseMercator),
}

impl Projection {
    /// Native (x, y) → (lon, lat) degrees.
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (x, y),
            Projection::TransverseMercator(tm) => tm.inverse(x, y),
        }
    }

    /// (lon, lat) degrees → native (x, y).
    pub fn from_geographic(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (lon, lat),
            Projection::TransverseMercator(tm) => tm.forward(lon, lat),
        }
    }

    /// Re-project a multipolygon to geographic coordinates (x = lon, y = lat).
    pub fn multipolygon_to_geographic(&self, mp: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        mp.map_coords(|c| {
            let (lon, lat) = self.to_geographic(c.x, c.y);
            Coord { x: lon, y: lat }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn central_meridian_maps_to_lon0() {
        let proj = Crs::SLOVENIA_D96_TM.projection().unwrap();
        let (lon, _lat) = proj.to_geographic(500_000.0, 100_000.0);
        assert_abs_diff_eq!(lon, 15.0, epsilon = 1e-9);
    }

    #[test]
    fn utm_origin_is_equator_on_central_meridian() {
        let proj = Crs(32633).projection().unwrap();
        let (lon, lat) = proj.to_geographic(500_000.0, 0.0);
        assert_abs_diff_eq!(lon, 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(lat, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn d96_round_trip_over_slovenia() {
        let proj = Crs::SLOVENIA_D96_TM.projection().unwrap();
        for &(lon, lat) in &[(14.37, 45.77), (13.6, 46.4), (16.5, 46.6), (15.0, 45.5)] {
            let (x, y) = proj.from_geographic(lon, lat);
            let (lon2, lat2) = proj.to_geographic(x, y);
            assert_abs_diff_eq!(lon, lon2, epsilon = 1e-7);
            assert_abs_diff_eq!(lat, lat2, epsilon = 1e-7);
        }
    }

    #[test]
    fn cerknica_lands_in_expected_d96_box() {
        // Lake Cerknica sits roughly 45 km WSW of the D96 central meridian.
        let proj = Crs::SLOVENIA_D96_TM.projection().unwrap();
        let (x, y) = proj.from_geographic(14.37, 45.77);
        assert!((440_000.0..470_000.0).contains(&x), "easting {x}");
        assert!((60_000.0..80_000.0).contains(&y), "northing {y}");
    }

    #[test]
    fn southern_utm_uses_false_northing() {
        let proj = Crs(32733).projection().unwrap();
        let (_, lat) = proj.to_geographic(500_000.0, 10_000_000.0);
        assert_abs_diff_eq!(lat, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn unsupported_epsg_is_rejected() {
        assert_eq!(Crs(3912).projection(), Err(ProjectionError::UnsupportedEpsg(3912)));
    }

    #[test]
    fn geographic_is_identity() {
        let proj = Crs::WGS84.projection().unwrap();
        assert_eq!(proj.to_geographic(14.0, 45.0), (14.0, 45.0));
    }
}
