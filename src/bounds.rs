//! Bounding volume types for tiles.

use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};

use crate::geodetic::{Cartographic, Ellipsoid, GlobeRectangle};

/// Bounding volume of a tile.
///
/// The loose-region variant carries a region whose height bounds are only
/// approximate (typical for terrain tiles before their content is decoded);
/// it projects to the same globe rectangle as a tight region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundingVolume {
    /// Oriented bounding box.
    Box(OrientedBox),
    /// Geographic region (WGS84).
    Region(BoundingRegion),
    /// Region whose min/max heights are loose fits.
    LooseRegion(BoundingRegionWithLooseFittingHeights),
    /// Bounding sphere.
    Sphere(BoundingSphere),
}

/// Oriented bounding box defined by center and half-axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientedBox {
    /// 12 doubles: center (3) + x half-axis (3) + y half-axis (3) + z half-axis (3).
    #[serde(rename = "box")]
    pub data: [f64; 12],
}

/// Bounding sphere defined by center and radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    /// 4 doubles: [cx, cy, cz, radius].
    pub sphere: [f64; 4],
}

/// Geographic bounding region in WGS84.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    /// 6 doubles: [west, south, east, north, min_height, max_height].
    /// Longitude/latitude in radians, heights in meters.
    pub region: [f64; 6],
}

/// A [`BoundingRegion`] whose height bounds are not tight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegionWithLooseFittingHeights {
    pub region: [f64; 6],
}

impl BoundingRegion {
    pub fn rectangle(&self) -> GlobeRectangle {
        GlobeRectangle::new(self.region[0], self.region[1], self.region[2], self.region[3])
    }
}

impl BoundingVolume {
    /// The globe rectangle of a region-based volume. Overlay mapping is only
    /// supported for tiles where this is `Some`.
    pub fn rectangle(&self) -> Option<GlobeRectangle> {
        match self {
            Self::Region(r) => Some(r.rectangle()),
            Self::LooseRegion(r) => Some(GlobeRectangle::new(
                r.region[0],
                r.region[1],
                r.region[2],
                r.region[3],
            )),
            _ => None,
        }
    }

    /// Center point of the bounding volume in ECEF meters.
    pub fn center(&self) -> DVec3 {
        match self {
            Self::Box(b) => DVec3::new(b.data[0], b.data[1], b.data[2]),
            Self::Sphere(s) => DVec3::new(s.sphere[0], s.sphere[1], s.sphere[2]),
            Self::Region(BoundingRegion { region })
            | Self::LooseRegion(BoundingRegionWithLooseFittingHeights { region }) => {
                let lon = (region[0] + region[2]) / 2.0;
                let lat = (region[1] + region[3]) / 2.0;
                let height = (region[4] + region[5]) / 2.0;
                Ellipsoid::WGS84.geodetic_to_ecef(&Cartographic::new(lon, lat, height))
            }
        }
    }

    /// Transform the bounding volume by a matrix. Regions are fixed to the
    /// ellipsoid and pass through unchanged.
    pub fn transform(&self, matrix: &DMat4) -> Self {
        match self {
            Self::Box(b) => {
                let center = matrix.transform_point3(DVec3::new(b.data[0], b.data[1], b.data[2]));
                let x_axis = matrix.transform_vector3(DVec3::new(b.data[3], b.data[4], b.data[5]));
                let y_axis = matrix.transform_vector3(DVec3::new(b.data[6], b.data[7], b.data[8]));
                let z_axis = matrix.transform_vector3(DVec3::new(b.data[9], b.data[10], b.data[11]));
                Self::Box(OrientedBox {
                    data: [
                        center.x, center.y, center.z, x_axis.x, x_axis.y, x_axis.z, y_axis.x,
                        y_axis.y, y_axis.z, z_axis.x, z_axis.y, z_axis.z,
                    ],
                })
            }
            Self::Sphere(s) => {
                let center = matrix.transform_point3(DVec3::new(s.sphere[0], s.sphere[1], s.sphere[2]));
                let scale = matrix.to_scale_rotation_translation().0;
                let max_scale = scale.x.max(scale.y).max(scale.z);
                Self::Sphere(BoundingSphere {
                    sphere: [center.x, center.y, center.z, s.sphere[3] * max_scale],
                })
            }
            Self::Region(_) | Self::LooseRegion(_) => self.clone(),
        }
    }
}

impl Default for BoundingVolume {
    fn default() -> Self {
        Self::Sphere(BoundingSphere {
            sphere: [0.0, 0.0, 0.0, 1.0],
        })
    }
}
