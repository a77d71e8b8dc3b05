use tessera_viewer_core::Viewport;

/// What gesture detectors and animations act on.
///
/// The engine implements this for its interactive state; every call happens
/// on the thread that feeds pointer events and animation ticks.
pub trait ViewportHost {
    fn viewport(&self) -> &Viewport;

    fn viewport_mut(&mut self) -> &mut Viewport;

    /// Recompute tile visibility. Decodes are dispatched only when `load` is
    /// set, which detectors do once the view settles.
    fn request_refresh(&mut self, load: bool);
}
