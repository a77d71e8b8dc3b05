//! Live state of an initialized engine.

use tessera_gesture::ViewportHost;
use tessera_scheduler::{RefreshOutcome, TileScheduler};
use tessera_viewer_core::Viewport;

/// Viewport plus the scheduler feeding it. Gestures and animations mutate
/// the viewport through [`ViewportHost`]; every requested refresh goes
/// straight to the scheduler.
pub(crate) struct Session {
    pub(crate) viewport: Viewport,
    pub(crate) scheduler: TileScheduler,
}

impl Session {
    pub(crate) fn new(viewport: Viewport, scheduler: TileScheduler) -> Self {
        Self { viewport, scheduler }
    }

    pub(crate) fn refresh(&mut self, load: bool) -> RefreshOutcome {
        let outcome = self.scheduler.refresh(&self.viewport, load);
        self.scheduler.redraw().bump();
        outcome
    }

    /// Cancels and joins all decodes, then drops every bitmap.
    pub(crate) fn close(self) -> usize {
        self.scheduler.shutdown();
        self.scheduler.pyramid().recycle_all()
    }
}

impl ViewportHost for Session {
    fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    fn request_refresh(&mut self, load: bool) {
        self.refresh(load);
    }
}
