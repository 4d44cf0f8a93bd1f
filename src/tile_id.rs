//! Tile content identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies the content of a tile within its tileset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileId {
    /// Content addressed by a URL (possibly relative to the tileset root).
    Url(String),
    /// Implicit quadtree addressing.
    Quadtree { level: u32, x: u32, y: u32 },
    /// Implicit octree addressing.
    Octree { level: u32, x: u32, y: u32, z: u32 },
}

impl TileId {
    pub fn url(&self) -> Option<&str> {
        match self {
            TileId::Url(url) => Some(url),
            _ => None,
        }
    }
}

impl Default for TileId {
    fn default() -> Self {
        TileId::Url(String::new())
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileId::Url(url) => write!(f, "{}", url),
            TileId::Quadtree { level, x, y } => write!(f, "quadtree {}/{}/{}", level, x, y),
            TileId::Octree { level, x, y, z } => write!(f, "octree {}/{}/{}/{}", level, x, y, z),
        }
    }
}
