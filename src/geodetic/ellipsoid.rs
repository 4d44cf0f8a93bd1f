//! WGS84 ellipsoid conversions between geodetic and earth-centered frames.

use glam::DVec3;

/// Geodetic position: longitude/latitude in radians, height in meters above
/// the ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cartographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

impl Cartographic {
    pub fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Cartographic {
            longitude,
            latitude,
            height,
        }
    }
}

/// Reference ellipsoid described by its semi-axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub semimajor_axis: f64,
    pub semiminor_axis: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        semimajor_axis: 6378137.0,
        semiminor_axis: 6356752.314245179,
    };

    /// First eccentricity squared.
    fn e2(&self) -> f64 {
        let a2 = self.semimajor_axis * self.semimajor_axis;
        let b2 = self.semiminor_axis * self.semiminor_axis;
        (a2 - b2) / a2
    }

    /// Second eccentricity squared.
    fn ep2(&self) -> f64 {
        let a2 = self.semimajor_axis * self.semimajor_axis;
        let b2 = self.semiminor_axis * self.semiminor_axis;
        (a2 - b2) / b2
    }

    /// Convert a geodetic position to earth-centered, earth-fixed meters.
    pub fn geodetic_to_ecef(&self, c: &Cartographic) -> DVec3 {
        let e2 = self.e2();
        let sin_lat = c.latitude.sin();
        let cos_lat = c.latitude.cos();
        let sin_lon = c.longitude.sin();
        let cos_lon = c.longitude.cos();
        let n = self.semimajor_axis / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        DVec3::new(
            (n + c.height) * cos_lat * cos_lon,
            (n + c.height) * cos_lat * sin_lon,
            (n * (1.0 - e2) + c.height) * sin_lat,
        )
    }

    /// Convert earth-centered, earth-fixed meters to a geodetic position
    /// using Bowring's closed-form approximation. Sub-millimeter accuracy for
    /// anything near the surface, which is all tile geometry ever is.
    pub fn ecef_to_geodetic(&self, position: DVec3) -> Cartographic {
        let a = self.semimajor_axis;
        let b = self.semiminor_axis;
        let e2 = self.e2();
        let ep2 = self.ep2();

        let p = (position.x * position.x + position.y * position.y).sqrt();
        if p < 1e-9 {
            // On the polar axis the longitude is arbitrary.
            let latitude = if position.z >= 0.0 {
                std::f64::consts::FRAC_PI_2
            } else {
                -std::f64::consts::FRAC_PI_2
            };
            return Cartographic::new(0.0, latitude, position.z.abs() - b);
        }

        let theta = (position.z * a).atan2(p * b);
        let sin_theta = theta.sin();
        let cos_theta = theta.cos();
        let latitude = (position.z + ep2 * b * sin_theta * sin_theta * sin_theta)
            .atan2(p - e2 * a * cos_theta * cos_theta * cos_theta);
        let longitude = position.y.atan2(position.x);
        let sin_lat = latitude.sin();
        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let height = p / latitude.cos() - n;

        Cartographic::new(longitude, latitude, height)
    }
}
