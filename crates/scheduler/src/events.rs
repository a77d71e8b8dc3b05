//! Outbound notifications: listener callbacks and the redraw signal.

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_render::DecodeError;
use tessera_viewer_core::Size;

/// Engine event callbacks. Every method defaults to a no-op.
///
/// Tile and full-image callbacks describe the base layer load only; detail
/// tiles stream in without notifications. Tile callbacks arrive on decode
/// worker threads; the rest arrive on the thread that drives the engine.
pub trait EventListener: Send + Sync {
    fn on_image_info_decoded(&self, _size: Size) {}

    fn on_image_info_failed(&self, _error: &(dyn Error + 'static)) {}

    /// `index` is 1-based within the batch of `total` dispatched tiles.
    fn on_tile_decoded(&self, _index: usize, _total: usize) {}

    fn on_tile_failed(&self, _index: usize, _total: usize, _error: &DecodeError) {}

    /// Every base layer tile was decoded or failed. Not sent when the load
    /// was cancelled.
    fn on_full_image_loaded(&self) {}

    fn on_full_image_failed(&self, _error: &(dyn Error + 'static)) {}

    fn on_initialization_canceled(&self) {}
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl EventListener for NoopListener {}

type RedrawCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Monotonic counter bumped whenever drawable content changes.
///
/// Hosts either poll [`RedrawSignal::generation`] once per frame or attach a
/// callback that schedules a frame. Clones share the counter.
#[derive(Clone, Default)]
pub struct RedrawSignal {
    generation: Arc<AtomicU64>,
    callback: Option<RedrawCallback>,
}

impl RedrawSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Advances the counter and fires the callback with the new value.
    pub fn bump(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(callback) = &self.callback {
            callback(generation);
        }
        generation
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl fmt::Debug for RedrawSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedrawSignal")
            .field("generation", &self.generation())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
