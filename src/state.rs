//! Tile load states and the atomic cell that publishes them across threads.

use std::sync::atomic::{AtomicI32, Ordering};

/// Load state of a tile's content.
///
/// Discriminants are chosen so that ordering comparisons express the load
/// protocol directly: `state >= ContentLoaded` means "decode has finished and
/// its writes are visible", and the failure states sort below `Unloaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum TileLoadState {
    /// The tile is being torn down while its content was loading. Any
    /// in-flight continuation must finish by transitioning to `Failed`.
    Destroying = -2,
    /// Content failed to load; terminal until `unload_content` resets.
    Failed = -1,
    /// No content, no request, no renderer resources.
    Unloaded = 0,
    /// A request is in flight, or a decode task is queued or running.
    ContentLoading = 1,
    /// Decode and off-thread renderer prep finished; awaiting the
    /// main-thread finalizer.
    ContentLoaded = 2,
    /// `update` has run; the tile is fully ready.
    Done = 3,
}

impl TileLoadState {
    fn from_raw(raw: i32) -> TileLoadState {
        match raw {
            -2 => TileLoadState::Destroying,
            -1 => TileLoadState::Failed,
            0 => TileLoadState::Unloaded,
            1 => TileLoadState::ContentLoading,
            2 => TileLoadState::ContentLoaded,
            3 => TileLoadState::Done,
            other => unreachable!("corrupt tile load state {}", other),
        }
    }

    /// Whether `next` is reachable from `self` in one legal step.
    ///
    /// Same-state stores are permitted; they occur when `unload_content`
    /// runs on a tile that never loaded.
    pub fn can_transition_to(self, next: TileLoadState) -> bool {
        use TileLoadState::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Unloaded, ContentLoading)
                | (ContentLoading, ContentLoaded)
                | (ContentLoading, Failed)
                | (ContentLoading, Destroying)
                | (Destroying, Failed)
                | (ContentLoaded, Done)
                | (Done, Unloaded)
                | (ContentLoaded, Unloaded)
                | (Failed, Unloaded)
        )
    }
}

/// Atomic holder for a [`TileLoadState`].
///
/// Stores are release-ordered and loads acquire-ordered, so the fields a
/// decode worker wrote before advancing the state are visible to whoever
/// observes the new state. The only compare-and-swap is the
/// `ContentLoading -> Destroying` edge used by teardown.
#[derive(Debug)]
pub struct LoadStateCell(AtomicI32);

impl LoadStateCell {
    pub fn new(state: TileLoadState) -> Self {
        LoadStateCell(AtomicI32::new(state as i32))
    }

    pub fn get(&self) -> TileLoadState {
        TileLoadState::from_raw(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: TileLoadState) {
        self.0.store(state as i32, Ordering::Release);
    }

    /// Atomically change `ContentLoading` to `Destroying`; any other state is
    /// left untouched. Returns true if the exchange happened.
    pub fn mark_destroying_if_loading(&self) -> bool {
        self.0
            .compare_exchange(
                TileLoadState::ContentLoading as i32,
                TileLoadState::Destroying as i32,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for LoadStateCell {
    fn default() -> Self {
        LoadStateCell::new(TileLoadState::Unloaded)
    }
}
