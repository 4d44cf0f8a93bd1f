//! Map projections used for overlay texture coordinates.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::{Cartographic, Ellipsoid, GlobeRectangle, Rectangle};

/// Latitude beyond which web mercator degenerates; inputs are clamped here.
const WEB_MERCATOR_MAX_LATITUDE: f64 = 1.4844222297453324;

/// A projection from geodetic coordinates to 2D map coordinates.
///
/// Equality is what the overlay binder keys on: two overlay providers with
/// the same projection share one texture-coordinate channel per tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    /// Equirectangular: x = lon * a, y = lat * a.
    Geographic,
    /// Spherical web mercator (EPSG:3857).
    WebMercator,
}

impl Projection {
    /// Project a geodetic position to 2D map coordinates in meters.
    pub fn project(&self, c: &Cartographic) -> DVec2 {
        let a = Ellipsoid::WGS84.semimajor_axis;
        match self {
            Projection::Geographic => DVec2::new(c.longitude * a, c.latitude * a),
            Projection::WebMercator => {
                let latitude = c
                    .latitude
                    .clamp(-WEB_MERCATOR_MAX_LATITUDE, WEB_MERCATOR_MAX_LATITUDE);
                let y = (std::f64::consts::FRAC_PI_4 + latitude * 0.5).tan().ln();
                DVec2::new(c.longitude * a, y * a)
            }
        }
    }

    /// Project a globe rectangle. Both projections are monotonic in
    /// longitude and latitude, so the corners bound the image.
    pub fn project_rectangle(&self, rectangle: &GlobeRectangle) -> Rectangle {
        let south_west = self.project(&Cartographic::new(rectangle.west, rectangle.south, 0.0));
        let north_east = self.project(&Cartographic::new(rectangle.east, rectangle.north, 0.0));
        Rectangle::new(south_west.x, south_west.y, north_east.x, north_east.y)
    }
}
