//! Decoded tile content and the factory contract that produces it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use glam::DMat4;
use log::trace;

use crate::bounds::BoundingVolume;
use crate::model::Model;
use crate::tile::{Tile, TileRefine};
use crate::tile_id::TileId;
use crate::tileset::Tileset;

/// Decoded content of a tile, owned by the tile from `ContentLoaded` until
/// unload.
#[derive(Default)]
pub struct TileContent {
    /// Decoded mesh/material graph. Absent for structural content such as
    /// external tilesets.
    pub model: Option<Model>,
    /// Child tiles produced by decode (external-tileset linkage), surrendered
    /// to the owning tile exactly once by the main-thread finalizer.
    child_tiles: Option<Vec<Arc<Tile>>>,
    /// A tighter bounding volume discovered during decode.
    pub updated_bounding_volume: Option<BoundingVolume>,
}

impl TileContent {
    pub fn new(model: Option<Model>) -> Self {
        TileContent {
            model,
            child_tiles: None,
            updated_bounding_volume: None,
        }
    }

    pub fn with_child_tiles(mut self, children: Vec<Arc<Tile>>) -> Self {
        self.child_tiles = Some(children);
        self
    }

    pub fn with_updated_bounding_volume(mut self, volume: BoundingVolume) -> Self {
        self.updated_bounding_volume = Some(volume);
        self
    }

    pub fn has_child_tiles(&self) -> bool {
        self.child_tiles.is_some()
    }

    /// Surrender the decoded child tiles. The content cannot yield them
    /// twice; a second call returns `None`.
    pub fn take_child_tiles(&mut self) -> Option<Vec<Arc<Tile>>> {
        self.child_tiles.take()
    }
}

/// Everything a content factory gets to work with for one tile.
pub struct ContentInputs<'a> {
    /// Back-reference to the tileset, for factories that create child tiles.
    pub tileset: Weak<dyn Tileset>,
    pub tile_id: TileId,
    pub bounding_volume: BoundingVolume,
    pub geometric_error: f64,
    pub transform: DMat4,
    pub content_bounding_volume: Option<BoundingVolume>,
    pub refine: TileRefine,
    pub url: String,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

/// Turns response bytes into a content record.
///
/// Must be reentrant and thread-safe: it is invoked from background decode
/// workers, possibly for many tiles at once. Returning `None` rejects the
/// payload and fails the tile's load.
pub trait ContentFactory: Send + Sync {
    fn create_content(&self, inputs: ContentInputs<'_>) -> Option<TileContent>;
}

/// Content factory dispatching on response content type, with a magic-byte
/// fallback for servers that mislabel payloads.
///
/// Keys are either normalized content types (`model/gltf-binary`) or
/// four-byte magics (`glTF`, `b3dm`); both live in one table, looked up in
/// that order.
#[derive(Default)]
pub struct ContentFactoryRegistry {
    factories: RwLock<HashMap<String, Arc<dyn ContentFactory>>>,
}

impl ContentFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a content type or magic string. Later
    /// registrations replace earlier ones for the same key.
    pub fn register(&self, key: &str, factory: Arc<dyn ContentFactory>) {
        self.factories
            .write()
            .unwrap()
            .insert(normalize_key(key), factory);
    }

    fn lookup(&self, key: &str) -> Option<Arc<dyn ContentFactory>> {
        self.factories.read().unwrap().get(&normalize_key(key)).cloned()
    }
}

/// Strip content-type parameters (`; charset=...`) and lowercase.
fn normalize_key(key: &str) -> String {
    key.split(';').next().unwrap_or(key).trim().to_ascii_lowercase()
}

fn magic_of(data: &[u8]) -> Option<&str> {
    if data.len() < 4 {
        return None;
    }
    std::str::from_utf8(&data[..4]).ok()
}

impl ContentFactory for ContentFactoryRegistry {
    fn create_content(&self, inputs: ContentInputs<'_>) -> Option<TileContent> {
        let factory = self
            .lookup(inputs.content_type)
            .or_else(|| magic_of(inputs.data).and_then(|magic| self.lookup(magic)));

        match factory {
            Some(factory) => factory.create_content(inputs),
            None => {
                trace!(
                    "no content factory for type '{}' ({} bytes)",
                    inputs.content_type,
                    inputs.data.len()
                );
                None
            }
        }
    }
}
