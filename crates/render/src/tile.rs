//! Tile entity and its load lifecycle.
//!
//! A tile covers one cell of one pyramid level. Its state moves
//! Unloaded -> Loading -> Loaded | Error and only [`Tile::recycle`] or
//! [`Tile::abandon`] send it back to Unloaded. Every exit from Loading bumps
//! the tile's generation, so a decode that finishes after its tile was
//! recycled can be recognized and dropped instead of resurrecting the tile.

use crate::decoder::{Bitmap, DecodeError};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tessera_viewer_core::Rect;

/// Identity of a tile within a pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    /// Power-of-two downsample factor of the level
    pub sample_size: u32,

    /// Column within the level grid
    pub x: u32,

    /// Row within the level grid
    pub y: u32,
}

impl TileId {
    pub fn new(sample_size: u32, x: u32, y: u32) -> Self {
        Self { sample_size, x, y }
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@({},{})", self.sample_size, self.x, self.y)
    }
}

/// Load state of a tile.
#[derive(Debug, Clone, Default)]
pub enum TileState {
    #[default]
    Unloaded,

    /// A decode job owns the tile
    Loading { generation: u64 },

    Loaded(Arc<Bitmap>),

    Error(Arc<DecodeError>),
}

impl TileState {
    pub fn name(&self) -> &'static str {
        match self {
            TileState::Unloaded => "unloaded",
            TileState::Loading { .. } => "loading",
            TileState::Loaded(_) => "loaded",
            TileState::Error(_) => "error",
        }
    }
}

/// Proof that a caller won the Unloaded -> Loading transition. Completing
/// or abandoning a load requires the ticket it was started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub id: TileId,
    pub generation: u64,
}

/// Outcome of handing a decode result back to its tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Committed,
    /// The tile moved on (recycled or re-dispatched) while the decode ran.
    Stale,
}

#[derive(Debug, Default)]
struct TileSlot {
    state: TileState,
    visible: bool,
    generation: u64,
}

/// One cell of one pyramid level.
#[derive(Debug)]
pub struct Tile {
    id: TileId,
    source_rect: Rect,
    file_source_rect: Rect,
    slot: Mutex<TileSlot>,
}

impl Tile {
    pub fn new(id: TileId, source_rect: Rect, visible: bool) -> Self {
        Self {
            id,
            source_rect,
            file_source_rect: source_rect,
            slot: Mutex::new(TileSlot { visible, ..TileSlot::default() }),
        }
    }

    fn slot(&self) -> MutexGuard<'_, TileSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn sample_size(&self) -> u32 {
        self.id.sample_size
    }

    /// Bounds in full-resolution source pixels.
    pub fn source_rect(&self) -> Rect {
        self.source_rect
    }

    /// Bounds handed to the decoder.
    pub fn file_source_rect(&self) -> Rect {
        self.file_source_rect
    }

    pub fn state(&self) -> TileState {
        self.slot().state.clone()
    }

    pub fn generation(&self) -> u64 {
        self.slot().generation
    }

    pub fn is_visible(&self) -> bool {
        self.slot().visible
    }

    pub fn set_visible(&self, visible: bool) {
        self.slot().visible = visible;
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.slot().state, TileState::Loading { .. })
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.slot().state, TileState::Loaded(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.slot().state, TileState::Error(_))
    }

    /// Neither in flight nor already holding pixels.
    pub fn can_load(&self) -> bool {
        !matches!(self.slot().state, TileState::Loading { .. } | TileState::Loaded(_))
    }

    pub fn bitmap(&self) -> Option<Arc<Bitmap>> {
        match &self.slot().state {
            TileState::Loaded(bitmap) => Some(Arc::clone(bitmap)),
            _ => None,
        }
    }

    /// Atomically claims the tile for a decode. Returns `None` unless the
    /// tile was Unloaded.
    pub fn begin_loading(&self) -> Option<LoadTicket> {
        let mut slot = self.slot();
        if !matches!(slot.state, TileState::Unloaded) {
            return None;
        }

        slot.generation += 1;
        let generation = slot.generation;
        slot.state = TileState::Loading { generation };

        Some(LoadTicket { id: self.id, generation })
    }

    /// Stores a decode result if `ticket` still owns the tile.
    pub fn complete(
        &self,
        ticket: LoadTicket,
        result: Result<Bitmap, Arc<DecodeError>>,
    ) -> Completion {
        let mut slot = self.slot();
        match slot.state {
            TileState::Loading { generation } if generation == ticket.generation => {
                slot.state = match result {
                    Ok(bitmap) => TileState::Loaded(Arc::new(bitmap)),
                    Err(error) => TileState::Error(error),
                };
                Completion::Committed
            }
            _ => Completion::Stale,
        }
    }

    /// Returns a cancelled load to Unloaded so it can be dispatched again.
    /// A no-op when `ticket` no longer owns the tile.
    pub fn abandon(&self, ticket: LoadTicket) -> bool {
        let mut slot = self.slot();
        match slot.state {
            TileState::Loading { generation } if generation == ticket.generation => {
                slot.generation += 1;
                slot.state = TileState::Unloaded;
                true
            }
            _ => false,
        }
    }

    /// Releases pixels and any claim on the tile and hides it. Returns true
    /// when a bitmap was dropped.
    pub fn recycle(&self) -> bool {
        let mut slot = self.slot();
        let released = matches!(slot.state, TileState::Loaded(_));
        if !matches!(slot.state, TileState::Unloaded) {
            slot.generation += 1;
        }
        slot.state = TileState::Unloaded;
        slot.visible = false;
        released
    }
}
