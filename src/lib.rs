//! Tile lifecycle and load-state engine for streaming 3D geospatial
//! tilesets.
//!
//! A tileset is a tree of bounding volumes with geometric-error values whose
//! leaves reference renderable content fetched on demand. This crate owns
//! the per-tile load-state machine: asynchronous content fetch, off-thread
//! decode, raster overlay binding, main-thread GPU finalization, and
//! state-gated teardown. The pieces it does not own (transport, content
//! decoders, the renderer backend, the refinement traversal) plug in through
//! the adapter traits in [`externals`] and [`tileset`].

pub mod asset;
mod bounds;
mod content;
mod error;
pub mod geodetic;
mod model;
mod raster;
mod selection;
mod state;
mod task_pool;
mod tile;
mod tile_id;

pub mod externals;
pub mod tileset;

pub use bounds::{
    BoundingRegion, BoundingRegionWithLooseFittingHeights, BoundingSphere, BoundingVolume,
    OrientedBox,
};
pub use content::{ContentFactory, ContentFactoryRegistry, ContentInputs, TileContent};
pub use error::{TileError, TileFailureReason, TileResult};
pub use model::{create_raster_overlay_texture_coordinates, Mesh, Model, TextureCoordinateSet};
pub use raster::{
    AttachmentState, RasterImage, RasterMappedTo3DTile, RasterOverlayTile,
    RasterOverlayTileProvider, RasterTileState,
};
pub use selection::{TileSelectionResult, TileSelectionState};
pub use state::{LoadStateCell, TileLoadState};
pub use task_pool::ThreadPoolTaskProcessor;
pub use tile::{Tile, TileRefine, REFINE_PAST_GEOMETRIC_ERROR};
pub use tile_id::TileId;
