//! Geodetic primitives: WGS84 ellipsoid math, globe rectangles, and the map
//! projections shared between raster overlays.

mod ellipsoid;
mod projection;
mod rectangle;

pub use ellipsoid::{Cartographic, Ellipsoid};
pub use projection::Projection;
pub use rectangle::{GlobeRectangle, Rectangle};
