//! Host-adapter contracts: asset access, background tasks, and renderer
//! resource preparation.
//!
//! The lifecycle engine owns none of these concerns; it drives them through
//! the traits below. Every implementation handed to a tileset must be
//! thread-safe: request continuations fire on whatever thread the accessor
//! chooses, and decode tasks run on the task processor's workers.

use std::any::Any;
use std::sync::Arc;

use crate::content::ContentFactory;
use crate::tile::Tile;

/// A completed (or absent) response to an asset request.
pub trait AssetResponse: Send + Sync {
    fn status_code(&self) -> u16;
    fn content_type(&self) -> &str;
    fn data(&self) -> &[u8];
}

/// Continuation invoked when a request completes. Receives the request so it
/// can read the URL and response without holding another handle.
pub type AssetContinuation = Box<dyn FnOnce(&dyn AssetRequest) + Send>;

/// An in-flight asset request.
pub trait AssetRequest: Send + Sync {
    fn url(&self) -> &str;

    /// The response, once one has arrived. `None` both before completion and
    /// for transport failures that produced no response at all.
    fn response(&self) -> Option<Arc<dyn AssetResponse>>;

    /// Bind the completion continuation. If the request already completed,
    /// the continuation fires immediately on the calling thread. At most one
    /// continuation may be bound per request.
    fn bind(&self, continuation: AssetContinuation);

    /// Advisory cancellation: the transport may or may not abort, and the
    /// bound continuation may still fire. Callers guard against that race
    /// with the tile's load state, not with this method.
    fn cancel(&self);
}

/// Issues asset requests. Used by tileset implementations to service
/// `request_tile_content`.
pub trait AssetAccessor: Send + Sync {
    fn request_asset(&self, url: &str) -> Arc<dyn AssetRequest>;
}

/// Schedules work on a pool of background workers.
pub trait TaskProcessor: Send + Sync {
    fn start_task(&self, task: Box<dyn FnOnce() + Send>);
}

/// Opaque renderer-side artifact (buffers, textures, staging state). The
/// engine never looks inside; it only tracks which thread the handle
/// currently belongs to.
pub type RendererHandle = Box<dyn Any + Send + Sync>;

/// A renderer handle tagged with the thread domain that produced it. The tag
/// routes the handle into the matching parameter of
/// [`PrepareRendererResources::free`], so the two arms cannot be swapped.
pub enum RendererResources {
    /// Produced by `prepare_in_load_thread` on a background worker.
    LoadThread(RendererHandle),
    /// Produced by `prepare_in_main_thread`.
    MainThread(RendererHandle),
}

/// Renderer adapter: stages GPU resources for tiles.
///
/// `prepare_in_load_thread` must be reentrant and thread-safe; the other two
/// methods are only ever invoked from the main thread.
pub trait PrepareRendererResources: Send + Sync {
    /// Off-thread half of resource preparation, called from the decode task
    /// after the tile's content record is in place.
    fn prepare_in_load_thread(&self, tile: &Tile) -> Option<RendererHandle>;

    /// Main-thread half (GPU uploads). Consumes whatever the load-thread
    /// half produced and returns the handle the tile keeps until unload.
    fn prepare_in_main_thread(
        &self,
        tile: &Tile,
        load_thread_result: Option<RendererHandle>,
    ) -> Option<RendererHandle>;

    /// Release resources. Exactly one of the two handles is present,
    /// matching the half of preparation the tile had reached.
    fn free(
        &self,
        tile: &Tile,
        main_thread_result: Option<RendererHandle>,
        load_thread_result: Option<RendererHandle>,
    );
}

/// External collaborators shared by every tile of a tileset.
pub struct TilesetExternals {
    /// Transport used by the tileset to create content requests.
    pub asset_accessor: Arc<dyn AssetAccessor>,
    /// Background worker pool for decode tasks.
    pub task_processor: Arc<dyn TaskProcessor>,
    /// Renderer adapter; absent for headless use (e.g. analytics pipelines
    /// that only want the tile hierarchy).
    pub prepare_renderer_resources: Option<Arc<dyn PrepareRendererResources>>,
    /// Factory that turns response bytes into content records.
    pub content_factory: Arc<dyn ContentFactory>,
}
