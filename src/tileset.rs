//! The tileset-side contract consumed by tiles.

use std::sync::Arc;

use crate::externals::{AssetRequest, TilesetExternals};
use crate::raster::RasterOverlayTileProvider;
use crate::tile::Tile;

/// The owning tileset, as seen by its tiles.
///
/// Tiles hold this weakly; the tileset owns the tile tree. Implementations
/// must make `notify_tile_done_loading` callable from any thread, since it
/// is invoked from request continuations and decode workers as well as the
/// main thread.
pub trait Tileset: Send + Sync {
    /// Create the content request for a tile, or `None` if the tile has no
    /// external content (purely structural tiles).
    fn request_tile_content(&self, tile: &Tile) -> Option<Arc<dyn AssetRequest>>;

    /// The overlay providers currently mapped over this tileset, in overlay
    /// order.
    fn overlays(&self) -> Vec<Arc<dyn RasterOverlayTileProvider>>;

    /// Called exactly once per load cycle when a tile reaches
    /// `ContentLoaded` or `Failed`. The tileset uses this to balance its
    /// in-flight load counter.
    fn notify_tile_done_loading(&self, tile: &Tile);

    /// Shared external collaborators.
    fn externals(&self) -> &TilesetExternals;
}
