//! Decoded model data and overlay texture-coordinate generation.

use glam::DVec3;

use crate::geodetic::{Ellipsoid, Projection, Rectangle};

/// One texture-coordinate attribute set generated for a raster overlay
/// projection. `id` is the dense channel index the overlay binder assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureCoordinateSet {
    pub id: u32,
    pub uv: Vec<[f32; 2]>,
}

/// A mesh primitive: ECEF positions, triangle indices, and any overlay
/// texture-coordinate sets generated after decode.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<DVec3>,
    pub indices: Vec<u32>,
    pub overlay_texture_coordinates: Vec<TextureCoordinateSet>,
}

/// Decoded renderable content of a tile: a flat list of mesh primitives.
/// Material and texture data are opaque to the lifecycle engine and travel
/// with the renderer adapter's handles instead.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub meshes: Vec<Mesh>,
}

impl Model {
    /// Number of distinct overlay texture-coordinate channels on this model.
    /// Every mesh carries the same channels, so the first mesh is
    /// representative.
    pub fn overlay_texture_coordinate_set_count(&self) -> usize {
        self.meshes
            .first()
            .map(|m| m.overlay_texture_coordinates.len())
            .unwrap_or(0)
    }
}

/// Generate a texture-coordinate set on every mesh of `model` for one
/// overlay projection.
///
/// Each vertex position is converted to geodetic coordinates, projected, and
/// normalized into `rectangle`; coordinates are clamped to [0, 1] so
/// geometry that pokes past the tile's region still samples the edge texels.
pub fn create_raster_overlay_texture_coordinates(
    model: &mut Model,
    set_id: u32,
    projection: &Projection,
    rectangle: &Rectangle,
) {
    let width = rectangle.width();
    let height = rectangle.height();

    for mesh in &mut model.meshes {
        let mut uv = Vec::with_capacity(mesh.positions.len());
        for position in &mesh.positions {
            let cartographic = Ellipsoid::WGS84.ecef_to_geodetic(*position);
            let projected = projection.project(&cartographic);
            let u = if width > 0.0 {
                ((projected.x - rectangle.min_x) / width).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let v = if height > 0.0 {
                ((projected.y - rectangle.min_y) / height).clamp(0.0, 1.0)
            } else {
                0.0
            };
            uv.push([u as f32, v as f32]);
        }
        mesh.overlay_texture_coordinates
            .push(TextureCoordinateSet { id: set_id, uv });
    }
}
