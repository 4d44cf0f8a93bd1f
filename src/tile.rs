//! The tile entity and its content load lifecycle.
//!
//! A tile's mutable state is split by writer. Configuration set during
//! tileset construction lives in one read-mostly lock; the load payload
//! (request, content, renderer resources, raster mappings) is locked per
//! concern. The atomic load state is the publication barrier between the
//! decode worker and the main thread: fields the worker wrote become visible
//! exactly when it release-stores `ContentLoaded`.
//!
//! Thread contract (enforced by the host, not the types): `load_content`,
//! `update`, `unload_content`, `prepare_to_destroy`, and children mutation
//! happen on the main thread; `content_response_received` may run anywhere
//! the asset accessor likes; the decode task runs on a task-processor
//! worker.

use std::sync::{Arc, Mutex, RwLock, Weak};

use glam::DMat4;
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::bounds::BoundingVolume;
use crate::content::{ContentInputs, TileContent};
use crate::error::{TileError, TileFailureReason, TileResult};
use crate::externals::{AssetRequest, AssetResponse, RendererResources};
use crate::raster::{AttachmentState, RasterMappedTo3DTile, RasterTileState};
use crate::selection::TileSelectionState;
use crate::state::{LoadStateCell, TileLoadState};
use crate::tile_id::TileId;
use crate::tileset::Tileset;

/// Geometric error assigned to tiles whose content decoded without a model,
/// so the traversal refines past them instead of rendering a hole.
pub const REFINE_PAST_GEOMETRIC_ERROR: f64 = 999_999_999.0;

/// Refinement strategy for child tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TileRefine {
    /// Children replace the parent when displayed.
    #[default]
    Replace,
    /// Children are displayed together with the parent.
    Add,
}

/// Configuration written during tileset construction and by the main-thread
/// finalizer; read by the decode worker while loading.
struct TileConfig {
    bounding_volume: BoundingVolume,
    viewer_request_volume: Option<BoundingVolume>,
    geometric_error: f64,
    refine: TileRefine,
    transform: DMat4,
    id: TileId,
    content_bounding_volume: Option<BoundingVolume>,
}

impl Default for TileConfig {
    fn default() -> Self {
        TileConfig {
            bounding_volume: BoundingVolume::default(),
            viewer_request_volume: None,
            geometric_error: 0.0,
            refine: TileRefine::Replace,
            transform: DMat4::IDENTITY,
            id: TileId::default(),
            content_bounding_volume: None,
        }
    }
}

/// One node of a streaming tileset.
///
/// Tiles are `Arc`-shared; the tileset and parent back-references are weak,
/// so the tree never owns itself upward. An in-flight request continuation
/// holds a strong reference, which keeps a loading tile alive until the
/// continuation resolves.
pub struct Tile {
    /// Self-handle for continuations; tiles are always `Arc`-constructed.
    this: Weak<Tile>,
    tileset: Weak<dyn Tileset>,
    parent: Mutex<Weak<Tile>>,
    children: Mutex<Vec<Arc<Tile>>>,
    config: RwLock<TileConfig>,
    state: LoadStateCell,
    content_request: Mutex<Option<Arc<dyn AssetRequest>>>,
    content: Mutex<Option<TileContent>>,
    renderer_resources: Mutex<Option<RendererResources>>,
    raster_tiles: Mutex<Vec<RasterMappedTo3DTile>>,
    failure: Mutex<Option<TileFailureReason>>,
    last_selection_state: Mutex<TileSelectionState>,
}

impl Tile {
    /// Create an unloaded tile belonging to `tileset`.
    pub fn new(tileset: Weak<dyn Tileset>) -> Arc<Tile> {
        Arc::new_cyclic(|this| Tile {
            this: this.clone(),
            tileset,
            parent: Mutex::new(Weak::new()),
            children: Mutex::new(Vec::new()),
            config: RwLock::new(TileConfig::default()),
            state: LoadStateCell::default(),
            content_request: Mutex::new(None),
            content: Mutex::new(None),
            renderer_resources: Mutex::new(None),
            raster_tiles: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            last_selection_state: Mutex::new(TileSelectionState::default()),
        })
    }

    // ---- tree structure ----------------------------------------------------

    pub fn tileset(&self) -> Option<Arc<dyn Tileset>> {
        self.tileset.upgrade()
    }

    pub fn parent(&self) -> Option<Arc<Tile>> {
        self.parent.lock().unwrap().upgrade()
    }

    pub fn set_parent(&self, parent: &Arc<Tile>) {
        *self.parent.lock().unwrap() = Arc::downgrade(parent);
    }

    pub fn children(&self) -> Vec<Arc<Tile>> {
        self.children.lock().unwrap().clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.lock().unwrap().len()
    }

    /// Hand this tile its children. A tile's children are created at most
    /// once; a second call fails.
    pub fn create_child_tiles(&self, children: Vec<Arc<Tile>>) -> TileResult<()> {
        let mut slot = self.children.lock().unwrap();
        if !slot.is_empty() {
            return Err(TileError::ChildrenAlreadyCreated);
        }
        *slot = children;
        Ok(())
    }

    /// Create `count` empty child tiles for the tileset loader to fill in.
    pub fn create_empty_child_tiles(&self, count: usize) -> TileResult<()> {
        let children = (0..count).map(|_| Tile::new(self.tileset.clone())).collect();
        self.create_child_tiles(children)
    }

    // ---- configuration -----------------------------------------------------

    pub fn tile_id(&self) -> TileId {
        self.config.read().unwrap().id.clone()
    }

    pub fn set_tile_id(&self, id: TileId) {
        self.config.write().unwrap().id = id;
    }

    pub fn bounding_volume(&self) -> BoundingVolume {
        self.config.read().unwrap().bounding_volume.clone()
    }

    pub fn set_bounding_volume(&self, volume: BoundingVolume) {
        self.config.write().unwrap().bounding_volume = volume;
    }

    pub fn viewer_request_volume(&self) -> Option<BoundingVolume> {
        self.config.read().unwrap().viewer_request_volume.clone()
    }

    pub fn set_viewer_request_volume(&self, volume: Option<BoundingVolume>) {
        self.config.write().unwrap().viewer_request_volume = volume;
    }

    pub fn geometric_error(&self) -> f64 {
        self.config.read().unwrap().geometric_error
    }

    pub fn set_geometric_error(&self, error: f64) {
        self.config.write().unwrap().geometric_error = error;
    }

    pub fn refine(&self) -> TileRefine {
        self.config.read().unwrap().refine
    }

    pub fn set_refine(&self, refine: TileRefine) {
        self.config.write().unwrap().refine = refine;
    }

    pub fn transform(&self) -> DMat4 {
        self.config.read().unwrap().transform
    }

    pub fn set_transform(&self, transform: DMat4) {
        self.config.write().unwrap().transform = transform;
    }

    pub fn content_bounding_volume(&self) -> Option<BoundingVolume> {
        self.config.read().unwrap().content_bounding_volume.clone()
    }

    pub fn set_content_bounding_volume(&self, volume: Option<BoundingVolume>) {
        self.config.write().unwrap().content_bounding_volume = volume;
    }

    pub fn last_selection_state(&self) -> TileSelectionState {
        *self.last_selection_state.lock().unwrap()
    }

    pub fn set_last_selection_state(&self, state: TileSelectionState) {
        *self.last_selection_state.lock().unwrap() = state;
    }

    // ---- observation -------------------------------------------------------

    pub fn state(&self) -> TileLoadState {
        self.state.get()
    }

    /// Why the last load cycle failed, if it did.
    pub fn failure_reason(&self) -> Option<TileFailureReason> {
        *self.failure.lock().unwrap()
    }

    pub fn has_content_request(&self) -> bool {
        self.content_request.lock().unwrap().is_some()
    }

    pub fn with_content<R>(&self, f: impl FnOnce(Option<&TileContent>) -> R) -> R {
        f(self.content.lock().unwrap().as_ref())
    }

    pub fn with_raster_tiles<R>(&self, f: impl FnOnce(&[RasterMappedTo3DTile]) -> R) -> R {
        f(&self.raster_tiles.lock().unwrap())
    }

    /// Whether this tile can be put on screen.
    ///
    /// A tile whose content carries no model (an external tileset) is never
    /// renderable; selecting it would leave a hole while its parent refines,
    /// even though both its parent and its children may have content. A tile
    /// with a still-loading raster mapping is likewise held back so imagery
    /// does not pop in after the fact.
    pub fn is_renderable(&self) -> bool {
        self.state() >= TileLoadState::ContentLoaded
            && self
                .content
                .lock()
                .unwrap()
                .as_ref()
                .map_or(true, |content| content.model.is_some())
            && !self
                .raster_tiles
                .lock()
                .unwrap()
                .iter()
                .any(|mapped| mapped.raster_tile().state() == RasterTileState::Loading)
    }

    // ---- load pipeline -----------------------------------------------------

    /// Kick off the content load. No-op unless the tile is `Unloaded`.
    ///
    /// Maps raster overlays onto the tile (region-based tiles only), asks
    /// the tileset for a content request, and binds the completion
    /// continuation. Main thread only.
    pub fn load_content(&self) {
        if self.state() != TileLoadState::Unloaded {
            return;
        }
        let Some(tileset) = self.tileset.upgrade() else {
            warn!("load_content on a tile whose tileset is gone");
            return;
        };

        self.state.set(TileLoadState::ContentLoading);

        // Overlay mapping currently requires a globe rectangle, so only
        // region-based bounding volumes participate. Other volumes would
        // need placeholder raster tiles resolved after decode, when real
        // geometry pins down the projected extent.
        let rectangle = self.config.read().unwrap().bounding_volume.rectangle();
        if let Some(rectangle) = rectangle {
            let geometric_error = self.geometric_error();
            // Map into a fresh vector and swap it in afterwards, so raster
            // tiles that are already loaded and still wanted are not dropped
            // before the new mappings take a reference.
            let mut mapped = Vec::new();
            for provider in tileset.overlays() {
                provider.map_raster_tiles_to_geometry_tile(&rectangle, geometric_error, &mut mapped);
            }
            *self.raster_tiles.lock().unwrap() = mapped;
        }

        match tileset.request_tile_content(self) {
            Some(request) => {
                trace!("requesting content for tile {}", self.tile_id());
                *self.content_request.lock().unwrap() = Some(Arc::clone(&request));
                let tile = self.this.upgrade().expect("tiles are Arc-constructed");
                request.bind(Box::new(move |request| {
                    tile.content_response_received(request);
                }));
            }
            None => {
                // Nothing to fetch; the tile is purely structural.
                tileset.notify_tile_done_loading(self);
                self.state.set(TileLoadState::ContentLoaded);
            }
        }
    }

    /// Continuation bound to the content request. Runs on whatever thread
    /// the asset accessor completes on; must not block.
    fn content_response_received(&self, request: &dyn AssetRequest) {
        let Some(tileset) = self.tileset.upgrade() else {
            // No tileset left to notify; record the reason and finish the
            // cycle as failed like every other continuation outcome.
            warn!("tileset dropped while tile {} was loading", self.tile_id());
            *self.failure.lock().unwrap() = Some(TileFailureReason::TilesetDropped);
            *self.content_request.lock().unwrap() = None;
            self.state.set(TileLoadState::Failed);
            return;
        };

        if self.state() == TileLoadState::Destroying {
            self.fail_load(&*tileset, TileFailureReason::Cancelled);
            return;
        }
        if self.state() > TileLoadState::ContentLoading {
            // A duplicate or late response; the tile moved on without us.
            trace!("dropping duplicate response for tile {}", self.tile_id());
            return;
        }

        let Some(response) = request.response() else {
            self.fail_load(&*tileset, TileFailureReason::NoResponse);
            return;
        };
        let status = response.status_code();
        if !(200..300).contains(&status) {
            self.fail_load(&*tileset, TileFailureReason::HttpStatus(status));
            return;
        }

        let url = request.url().to_string();
        let tile = self.this.upgrade().expect("tiles are Arc-constructed");
        let processor = Arc::clone(&tileset.externals().task_processor);
        processor.start_task(Box::new(move || {
            tile.decode_content(tileset, url, response);
        }));
    }

    /// Decode task body, run on a background worker.
    fn decode_content(&self, tileset: Arc<dyn Tileset>, url: String, response: Arc<dyn AssetResponse>) {
        if self.abort_if_destroying(&*tileset) {
            return;
        }

        let created = {
            let inputs = {
                let config = self.config.read().unwrap();
                ContentInputs {
                    tileset: self.tileset.clone(),
                    tile_id: config.id.clone(),
                    bounding_volume: config.bounding_volume.clone(),
                    geometric_error: config.geometric_error,
                    transform: config.transform,
                    content_bounding_volume: config.content_bounding_volume.clone(),
                    refine: config.refine,
                    url,
                    content_type: response.content_type(),
                    data: response.data(),
                }
            };
            tileset.externals().content_factory.create_content(inputs)
        };

        let Some(created) = created else {
            self.fail_load(&*tileset, TileFailureReason::ContentRejected);
            return;
        };
        *self.content.lock().unwrap() = Some(created);

        if self.abort_if_destroying(&*tileset) {
            return;
        }

        let has_model = self.generate_overlay_texture_coordinates();

        if has_model {
            if let Some(renderer) = tileset.externals().prepare_renderer_resources.as_ref() {
                if let Some(handle) = renderer.prepare_in_load_thread(self) {
                    *self.renderer_resources.lock().unwrap() =
                        Some(RendererResources::LoadThread(handle));
                }
            }
        }

        tileset.notify_tile_done_loading(self);
        *self.content_request.lock().unwrap() = None;
        self.state.set(TileLoadState::ContentLoaded);
    }

    /// Assign texture-coordinate channels to the raster mappings and
    /// generate one attribute set per distinct projection. Returns whether
    /// the content has a model.
    ///
    /// Channel IDs are dense from 0 in order of first occurrence, and two
    /// mappings whose providers share a projection share a channel, so the
    /// projection work runs once per projection rather than once per
    /// mapping.
    fn generate_overlay_texture_coordinates(&self) -> bool {
        let mut content = self.content.lock().unwrap();
        let Some(model) = content.as_mut().and_then(|c| c.model.as_mut()) else {
            return false;
        };

        let rectangle = self.config.read().unwrap().bounding_volume.rectangle();
        let Some(rectangle) = rectangle else {
            return true;
        };

        let mut raster_tiles = self.raster_tiles.lock().unwrap();
        if raster_tiles.is_empty() {
            return true;
        }

        let mut projections = Vec::new();
        for mapped in raster_tiles.iter_mut() {
            let projection = mapped.raster_tile().provider().projection();
            match projections.iter().position(|seen| *seen == projection) {
                Some(existing) => mapped.set_texture_coordinate_id(existing as u32),
                None => {
                    let id = projections.len() as u32;
                    let projected = projection.project_rectangle(&rectangle);
                    crate::model::create_raster_overlay_texture_coordinates(
                        model, id, &projection, &projected,
                    );
                    mapped.set_texture_coordinate_id(id);
                    projections.push(projection);
                }
            }
        }
        true
    }

    /// Per-frame finalizer. Main thread only.
    ///
    /// On the frame after decode completes this uploads renderer resources,
    /// adopts child tiles produced by the content (external tilesets),
    /// applies the content's improved bounding volume, and releases the
    /// request. While `Done`, it attaches any raster mappings that have not
    /// been attached yet.
    pub fn update(&self, _previous_frame_number: u32, _current_frame_number: u32) {
        let Some(tileset) = self.tileset.upgrade() else {
            return;
        };

        if self.state() == TileLoadState::ContentLoaded {
            if let Some(renderer) = tileset.externals().prepare_renderer_resources.as_ref() {
                let staged = self.renderer_resources.lock().unwrap().take();
                let load_half = match staged {
                    Some(RendererResources::LoadThread(handle)) => Some(handle),
                    Some(RendererResources::MainThread(handle)) => Some(handle),
                    None => None,
                };
                let main_half = renderer.prepare_in_main_thread(self, load_half);
                *self.renderer_resources.lock().unwrap() =
                    main_half.map(RendererResources::MainThread);
            }

            let mut adopted = None;
            let mut has_model = true;
            let mut updated_volume = None;
            {
                let mut content = self.content.lock().unwrap();
                if let Some(content) = content.as_mut() {
                    if content.has_child_tiles() && self.children.lock().unwrap().is_empty() {
                        adopted = content.take_child_tiles();
                    }
                    has_model = content.model.is_some();
                    updated_volume = content.updated_bounding_volume.clone();
                }
            }

            if let Some(children) = adopted {
                let this = self.this.upgrade().expect("tiles are Arc-constructed");
                for child in &children {
                    child.set_parent(&this);
                }
                if self.create_child_tiles(children).is_err() {
                    warn!("decoded child tiles dropped: children already exist");
                }
            }
            if !has_model {
                // Nothing to render here; push the traversal past this tile.
                self.set_geometric_error(REFINE_PAST_GEOMETRIC_ERROR);
            }
            if let Some(volume) = updated_volume {
                self.set_bounding_volume(volume);
            }

            *self.content_request.lock().unwrap() = None;
            self.state.set(TileLoadState::Done);
        }

        if self.state() == TileLoadState::Done {
            let mut raster_tiles = self.raster_tiles.lock().unwrap();
            for mapped in raster_tiles.iter_mut() {
                if mapped.attachment_state() == AttachmentState::Unattached {
                    mapped.raster_tile().load_in_main_thread();
                    mapped.attach();
                }
            }
        }
    }

    /// Tear down the tile's content and renderer resources. Main thread
    /// only.
    ///
    /// Refuses (returns false) while a request or decode is in flight. A
    /// `Destroying` tile reaches `Failed` once its continuation resolves,
    /// which is when its destructor unloads it.
    pub fn unload_content(&self) -> bool {
        // Cannot unload while an async operation is in progress.
        if self.state() == TileLoadState::ContentLoading {
            return false;
        }

        if let Some(tileset) = self.tileset.upgrade() {
            if let Some(renderer) = tileset.externals().prepare_renderer_resources.as_ref() {
                let resources = self.renderer_resources.lock().unwrap().take();
                match resources {
                    Some(RendererResources::MainThread(handle)) => {
                        renderer.free(self, Some(handle), None)
                    }
                    Some(RendererResources::LoadThread(handle)) => {
                        renderer.free(self, None, Some(handle))
                    }
                    None => {}
                }
            }
        }

        *self.renderer_resources.lock().unwrap() = None;
        *self.content_request.lock().unwrap() = None;
        *self.content.lock().unwrap() = None;
        self.raster_tiles.lock().unwrap().clear();
        *self.failure.lock().unwrap() = None;
        self.state.set(TileLoadState::Unloaded);
        true
    }

    /// Begin tearing the tile down. Cancels any in-flight request
    /// (advisory) and flips `ContentLoading` to `Destroying`; a tile in any
    /// other state is left untouched. The continuation pipeline turns
    /// `Destroying` into `Failed`, after which the tile can be unloaded.
    pub fn prepare_to_destroy(&self) {
        let request = self.content_request.lock().unwrap().clone();
        if let Some(request) = request {
            request.cancel();
        }
        self.state.mark_destroying_if_loading();
    }

    // ---- failure plumbing --------------------------------------------------

    /// The check-notify-fail triad guarding every continuation: if the tile
    /// is being destroyed, finish its load cycle as `Failed` and report
    /// completion to the tileset.
    fn abort_if_destroying(&self, tileset: &dyn Tileset) -> bool {
        if self.state() == TileLoadState::Destroying {
            self.fail_load(tileset, TileFailureReason::Cancelled);
            true
        } else {
            false
        }
    }

    fn fail_load(&self, tileset: &dyn Tileset, reason: TileFailureReason) {
        trace!("tile {} failed to load: {}", self.tile_id(), reason);
        *self.failure.lock().unwrap() = Some(reason);
        *self.content_request.lock().unwrap() = None;
        tileset.notify_tile_done_loading(self);
        self.state.set(TileLoadState::Failed);
    }
}

impl Drop for Tile {
    fn drop(&mut self) {
        self.prepare_to_destroy();
        self.unload_content();
    }
}
