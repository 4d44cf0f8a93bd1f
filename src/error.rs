//! Error types for the tile lifecycle engine.

use thiserror::Error;

/// Result type for tile operations.
pub type TileResult<T> = Result<T, TileError>;

/// Errors surfaced to callers of the tile API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TileError {
    /// `create_child_tiles` was called on a tile that already has children.
    #[error("children already created")]
    ChildrenAlreadyCreated,
}

/// Why a tile ended up in the `Failed` load state.
///
/// No retry policy is attached to any of these; the traversal layer may
/// unload the tile and issue a fresh `load_content`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFailureReason {
    /// The request completed without producing a response.
    #[error("request completed without a response")]
    NoResponse,

    /// The response carried a status code outside [200, 300).
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// The content factory rejected the payload.
    #[error("content factory rejected the payload")]
    ContentRejected,

    /// The tile was torn down while its load was in flight.
    #[error("load cancelled during teardown")]
    Cancelled,

    /// The owning tileset was dropped while the load was in flight.
    #[error("tileset dropped while loading")]
    TilesetDropped,
}
