//! Raster overlay tiles and their mapping onto geometry tiles.
//!
//! Overlay tiles are shared: one `RasterOverlayTile` may be mapped onto many
//! geometry tiles, and its lifetime exceeds any single mapping. Providers
//! that cache the tiles they hand out should hold them weakly (or evict on
//! their own schedule); the tiles keep a strong reference back to their
//! provider for projection lookup.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use crate::geodetic::{GlobeRectangle, Projection, Rectangle};

/// Load state of a raster overlay tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum RasterTileState {
    /// Imagery failed to load.
    Failed = -1,
    /// Nothing fetched yet.
    Unloaded = 0,
    /// Imagery fetch/decode in progress on a worker.
    Loading = 1,
    /// Imagery decoded; awaiting main-thread resource creation.
    Loaded = 2,
    /// Fully ready.
    Done = 3,
}

impl RasterTileState {
    fn from_raw(raw: i32) -> RasterTileState {
        match raw {
            -1 => RasterTileState::Failed,
            0 => RasterTileState::Unloaded,
            1 => RasterTileState::Loading,
            2 => RasterTileState::Loaded,
            3 => RasterTileState::Done,
            other => unreachable!("corrupt raster tile state {}", other),
        }
    }
}

/// Decoded overlay imagery.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Provider of raster overlay tiles for one overlay layer.
pub trait RasterOverlayTileProvider: Send + Sync {
    /// Resolve which of this provider's raster tiles project onto a geometry
    /// tile with the given rectangle, appending a mapping per raster tile.
    /// `geometric_error` lets the provider pick an imagery level matched to
    /// the geometry detail.
    fn map_raster_tiles_to_geometry_tile(
        &self,
        rectangle: &GlobeRectangle,
        geometric_error: f64,
        output: &mut Vec<RasterMappedTo3DTile>,
    );

    /// The projection all of this provider's tiles are served in.
    fn projection(&self) -> Projection;
}

/// One raster tile of an overlay layer.
pub struct RasterOverlayTile {
    provider: Arc<dyn RasterOverlayTileProvider>,
    rectangle: Rectangle,
    state: AtomicI32,
    image: Mutex<Option<RasterImage>>,
}

impl RasterOverlayTile {
    pub fn new(provider: Arc<dyn RasterOverlayTileProvider>, rectangle: Rectangle) -> Self {
        RasterOverlayTile {
            provider,
            rectangle,
            state: AtomicI32::new(RasterTileState::Unloaded as i32),
            image: Mutex::new(None),
        }
    }

    pub fn provider(&self) -> &Arc<dyn RasterOverlayTileProvider> {
        &self.provider
    }

    /// Projected bounds of this raster tile in its provider's projection.
    pub fn rectangle(&self) -> Rectangle {
        self.rectangle
    }

    pub fn state(&self) -> RasterTileState {
        RasterTileState::from_raw(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: RasterTileState) {
        self.state.store(state as i32, Ordering::Release);
    }

    /// Begin the background fetch/decode of the imagery.
    pub fn mark_loading(&self) {
        self.set_state(RasterTileState::Loading);
    }

    /// Publish decoded imagery; the tile becomes `Loaded`.
    pub fn complete_loading(&self, image: RasterImage) {
        *self.image.lock().unwrap() = Some(image);
        self.set_state(RasterTileState::Loaded);
    }

    pub fn mark_failed(&self) {
        self.set_state(RasterTileState::Failed);
    }

    /// Finish any main-thread half of loading (texture creation lives behind
    /// the renderer adapter). `Loaded` advances to `Done`; other states are
    /// left alone so the per-frame attach loop can call this repeatedly.
    pub fn load_in_main_thread(&self) {
        if self.state() == RasterTileState::Loaded {
            self.set_state(RasterTileState::Done);
        }
    }

    pub fn with_image<R>(&self, f: impl FnOnce(Option<&RasterImage>) -> R) -> R {
        f(self.image.lock().unwrap().as_ref())
    }
}

/// Attachment progress of one raster-to-geometry mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    /// Not yet attached to the geometry tile.
    Unattached,
    /// Attached while the raster tile is still loading; revisited once the
    /// real imagery arrives.
    TemporarilyAttached,
    /// Fully attached.
    Attached,
}

/// Mapping of one raster overlay tile onto a geometry tile.
pub struct RasterMappedTo3DTile {
    raster_tile: Arc<RasterOverlayTile>,
    texture_coordinate_id: u32,
    state: AttachmentState,
}

impl RasterMappedTo3DTile {
    pub fn new(raster_tile: Arc<RasterOverlayTile>) -> Self {
        RasterMappedTo3DTile {
            raster_tile,
            texture_coordinate_id: 0,
            state: AttachmentState::Unattached,
        }
    }

    pub fn raster_tile(&self) -> &Arc<RasterOverlayTile> {
        &self.raster_tile
    }

    /// Texture-coordinate channel assigned by the overlay binder. Mappings
    /// whose providers share a projection share a channel.
    pub fn texture_coordinate_id(&self) -> u32 {
        self.texture_coordinate_id
    }

    pub fn set_texture_coordinate_id(&mut self, id: u32) {
        self.texture_coordinate_id = id;
    }

    pub fn attachment_state(&self) -> AttachmentState {
        self.state
    }

    /// Mark this mapping attached to its geometry tile. The attachment is
    /// temporary while the raster tile has not finished loading.
    pub fn attach(&mut self) {
        self.state = if self.raster_tile.state() >= RasterTileState::Loaded {
            AttachmentState::Attached
        } else {
            AttachmentState::TemporarilyAttached
        };
    }
}
