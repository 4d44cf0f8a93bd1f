// Shared mock adapters for the lifecycle tests: a scripted asset request, a
// manually drained task processor, a recording renderer adapter, and a
// tileset stub that counts load-completion notifications.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tilestream::externals::{
    AssetAccessor, AssetContinuation, AssetRequest, AssetResponse, PrepareRendererResources,
    RendererHandle, TilesetExternals,
};
use tilestream::geodetic::{Cartographic, Ellipsoid, GlobeRectangle, Projection};
use tilestream::tileset::Tileset;
use tilestream::{
    BoundingRegion, BoundingVolume, ContentFactory, ContentInputs, Mesh, Model, RasterImage,
    RasterMappedTo3DTile, RasterOverlayTile, RasterOverlayTileProvider, Tile, TileContent, TileId,
};

// ---- asset plumbing --------------------------------------------------------

pub struct StaticResponse {
    pub status: u16,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl AssetResponse for StaticResponse {
    fn status_code(&self) -> u16 {
        self.status
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A request the test completes by hand.
pub struct ScriptedRequest {
    url: String,
    response: Mutex<Option<Arc<dyn AssetResponse>>>,
    continuation: Mutex<Option<AssetContinuation>>,
    cancelled: AtomicBool,
}

impl ScriptedRequest {
    pub fn new(url: &str) -> Arc<Self> {
        Arc::new(ScriptedRequest {
            url: url.to_string(),
            response: Mutex::new(None),
            continuation: Mutex::new(None),
            cancelled: AtomicBool::new(false),
        })
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Complete with a response and fire the bound continuation.
    pub fn deliver(&self, status: u16, content_type: &str, data: &[u8]) {
        *self.response.lock().unwrap() = Some(Arc::new(StaticResponse {
            status,
            content_type: content_type.to_string(),
            data: data.to_vec(),
        }));
        self.fire();
    }

    /// Complete without any response (transport failure).
    pub fn deliver_no_response(&self) {
        self.fire();
    }

    fn fire(&self) {
        let continuation = self.continuation.lock().unwrap().take();
        if let Some(continuation) = continuation {
            continuation(self);
        }
    }
}

impl AssetRequest for ScriptedRequest {
    fn url(&self) -> &str {
        &self.url
    }

    fn response(&self) -> Option<Arc<dyn AssetResponse>> {
        self.response.lock().unwrap().clone()
    }

    fn bind(&self, continuation: AssetContinuation) {
        *self.continuation.lock().unwrap() = Some(continuation);
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

pub struct ScriptedAccessor;

impl AssetAccessor for ScriptedAccessor {
    fn request_asset(&self, url: &str) -> Arc<dyn AssetRequest> {
        ScriptedRequest::new(url)
    }
}

// ---- task processor --------------------------------------------------------

/// Queues tasks until the test drains them, standing in for the background
/// worker pool so every interleaving is deterministic.
#[derive(Default)]
pub struct ManualTaskProcessor {
    queue: Mutex<VecDeque<Box<dyn FnOnce() + Send>>>,
}

impl ManualTaskProcessor {
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Run queued tasks (and any they enqueue) to completion.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.queue.lock().unwrap().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }
}

impl tilestream::externals::TaskProcessor for ManualTaskProcessor {
    fn start_task(&self, task: Box<dyn FnOnce() + Send>) {
        self.queue.lock().unwrap().push_back(task);
    }
}

// ---- renderer adapter ------------------------------------------------------

/// Records every adapter call and hands out marker handles.
#[derive(Default)]
pub struct RecordingRenderer {
    load_preps: AtomicUsize,
    main_preps: AtomicUsize,
    frees: Mutex<Vec<(bool, bool)>>,
}

impl RecordingRenderer {
    pub fn load_preps(&self) -> usize {
        self.load_preps.load(Ordering::SeqCst)
    }

    pub fn main_preps(&self) -> usize {
        self.main_preps.load(Ordering::SeqCst)
    }

    /// `(main_half_present, load_half_present)` per `free` call.
    pub fn frees(&self) -> Vec<(bool, bool)> {
        self.frees.lock().unwrap().clone()
    }
}

impl PrepareRendererResources for RecordingRenderer {
    fn prepare_in_load_thread(&self, _tile: &Tile) -> Option<RendererHandle> {
        self.load_preps.fetch_add(1, Ordering::SeqCst);
        Some(Box::new("load-half"))
    }

    fn prepare_in_main_thread(
        &self,
        _tile: &Tile,
        _load_thread_result: Option<RendererHandle>,
    ) -> Option<RendererHandle> {
        self.main_preps.fetch_add(1, Ordering::SeqCst);
        Some(Box::new("main-half"))
    }

    fn free(
        &self,
        _tile: &Tile,
        main_thread_result: Option<RendererHandle>,
        load_thread_result: Option<RendererHandle>,
    ) {
        self.frees
            .lock()
            .unwrap()
            .push((main_thread_result.is_some(), load_thread_result.is_some()));
    }
}

// ---- overlay provider ------------------------------------------------------

/// Provider that maps exactly one raster tile covering the geometry tile's
/// rectangle. `leave_loading` keeps the raster tile in its `Loading` state.
pub struct SingleTileProvider {
    projection: Projection,
    leave_loading: bool,
    this: Weak<SingleTileProvider>,
}

impl SingleTileProvider {
    pub fn new(projection: Projection) -> Arc<Self> {
        Self::with_loading(projection, false)
    }

    pub fn with_loading(projection: Projection, leave_loading: bool) -> Arc<Self> {
        Arc::new_cyclic(|this| SingleTileProvider {
            projection,
            leave_loading,
            this: this.clone(),
        })
    }
}

impl RasterOverlayTileProvider for SingleTileProvider {
    fn map_raster_tiles_to_geometry_tile(
        &self,
        rectangle: &GlobeRectangle,
        _geometric_error: f64,
        output: &mut Vec<RasterMappedTo3DTile>,
    ) {
        let provider: Arc<dyn RasterOverlayTileProvider> =
            self.this.upgrade().expect("provider alive during mapping");
        let raster = Arc::new(RasterOverlayTile::new(
            provider,
            self.projection.project_rectangle(rectangle),
        ));
        raster.mark_loading();
        if !self.leave_loading {
            raster.complete_loading(RasterImage {
                width: 1,
                height: 1,
                rgba: vec![255, 255, 255, 255],
            });
        }
        output.push(RasterMappedTo3DTile::new(raster));
    }

    fn projection(&self) -> Projection {
        self.projection
    }
}

// ---- content factories -----------------------------------------------------

type FactoryFn = dyn Fn(ContentInputs<'_>) -> Option<TileContent> + Send + Sync;

pub struct FnContentFactory(Box<FactoryFn>);

impl FnContentFactory {
    pub fn new(f: impl Fn(ContentInputs<'_>) -> Option<TileContent> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(FnContentFactory(Box::new(f)))
    }
}

impl ContentFactory for FnContentFactory {
    fn create_content(&self, inputs: ContentInputs<'_>) -> Option<TileContent> {
        (self.0)(inputs)
    }
}

/// Four-corner mesh spanning a globe rectangle, positions in ECEF.
pub fn model_over(rectangle: &GlobeRectangle) -> Model {
    let ellipsoid = Ellipsoid::WGS84;
    let corners = [
        Cartographic::new(rectangle.west, rectangle.south, 0.0),
        Cartographic::new(rectangle.east, rectangle.south, 0.0),
        Cartographic::new(rectangle.east, rectangle.north, 0.0),
        Cartographic::new(rectangle.west, rectangle.north, 0.0),
    ];
    Model {
        meshes: vec![Mesh {
            positions: corners.iter().map(|c| ellipsoid.geodetic_to_ecef(c)).collect(),
            indices: vec![0, 1, 2, 0, 2, 3],
            overlay_texture_coordinates: Vec::new(),
        }],
    }
}

/// Factory producing a model over the tile's own region.
pub fn model_factory() -> Arc<FnContentFactory> {
    FnContentFactory::new(|inputs| {
        let rectangle = inputs
            .bounding_volume
            .rectangle()
            .expect("model factory needs a region tile");
        Some(TileContent::new(Some(model_over(&rectangle))))
    })
}

// ---- tileset ---------------------------------------------------------------

pub struct MockTileset {
    externals: TilesetExternals,
    overlays: Mutex<Vec<Arc<dyn RasterOverlayTileProvider>>>,
    next_request: Mutex<Option<Arc<ScriptedRequest>>>,
    notifications: AtomicUsize,
}

impl MockTileset {
    pub fn new(
        processor: Arc<ManualTaskProcessor>,
        renderer: Option<Arc<RecordingRenderer>>,
        factory: Arc<dyn ContentFactory>,
    ) -> Arc<Self> {
        Arc::new(MockTileset {
            externals: TilesetExternals {
                asset_accessor: Arc::new(ScriptedAccessor),
                task_processor: processor,
                prepare_renderer_resources: renderer
                    .map(|r| r as Arc<dyn PrepareRendererResources>),
                content_factory: factory,
            },
            overlays: Mutex::new(Vec::new()),
            next_request: Mutex::new(None),
            notifications: AtomicUsize::new(0),
        })
    }

    pub fn add_overlay(&self, provider: Arc<dyn RasterOverlayTileProvider>) {
        self.overlays.lock().unwrap().push(provider);
    }

    /// Arm the request `request_tile_content` will hand out next.
    pub fn expect_request(&self, request: Arc<ScriptedRequest>) {
        *self.next_request.lock().unwrap() = Some(request);
    }

    pub fn notifications(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }

    pub fn as_weak(this: &Arc<Self>) -> Weak<dyn Tileset> {
        let strong: Arc<dyn Tileset> = Arc::clone(this) as Arc<dyn Tileset>;
        Arc::downgrade(&strong)
    }
}

impl Tileset for MockTileset {
    fn request_tile_content(&self, _tile: &Tile) -> Option<Arc<dyn AssetRequest>> {
        self.next_request
            .lock()
            .unwrap()
            .take()
            .map(|r| r as Arc<dyn AssetRequest>)
    }

    fn overlays(&self) -> Vec<Arc<dyn RasterOverlayTileProvider>> {
        self.overlays.lock().unwrap().clone()
    }

    fn notify_tile_done_loading(&self, _tile: &Tile) {
        self.notifications.fetch_add(1, Ordering::SeqCst);
    }

    fn externals(&self) -> &TilesetExternals {
        &self.externals
    }
}

// ---- tile builders ---------------------------------------------------------

pub const TEST_REGION: [f64; 6] = [0.10, 0.20, 0.20, 0.30, 0.0, 150.0];

pub fn test_rectangle() -> GlobeRectangle {
    GlobeRectangle::new(TEST_REGION[0], TEST_REGION[1], TEST_REGION[2], TEST_REGION[3])
}

/// A region-bounded tile ready to load.
pub fn region_tile(tileset: &Arc<MockTileset>) -> Arc<Tile> {
    let tile = Tile::new(MockTileset::as_weak(tileset));
    tile.set_bounding_volume(BoundingVolume::Region(BoundingRegion {
        region: TEST_REGION,
    }));
    tile.set_tile_id(TileId::Url("tiles/0/0/0.glb".into()));
    tile.set_geometric_error(16.0);
    tile
}
