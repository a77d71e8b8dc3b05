use std::time::Duration;
use tessera_viewer_core::Axis;

/// Thresholds and timings for gesture recognition.
///
/// Distances are in view pixels unless the name says otherwise; the
/// dp-based thresholds scale with `density`.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    /// Display density multiplier (1.0 = 160 dpi).
    pub density: f32,

    /// Scroll axis of an enclosing container, if any.
    pub scroll_container_axis: Option<Axis>,

    /// Minimum release distance from the pan start for a fling.
    pub min_fling_distance_px: f32,

    /// Minimum release velocity on either axis for a fling.
    pub min_fling_velocity_px_per_sec: f32,

    /// Window between the first and second down of a quick zoom.
    pub quick_zoom_timeout: Duration,

    /// Second taps closer than this to the first release are ignored.
    pub double_tap_min_time: Duration,

    pub quick_zoom_duration: Duration,
    pub fling_duration: Duration,

    /// Minimum spacing between animation ticks.
    pub update_interval: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            density: 1.0,
            scroll_container_axis: None,
            min_fling_distance_px: 50.0,
            min_fling_velocity_px_per_sec: 50.0,
            quick_zoom_timeout: Duration::from_millis(300),
            double_tap_min_time: Duration::from_millis(40),
            quick_zoom_duration: Duration::from_millis(250),
            fling_duration: Duration::from_millis(250),
            update_interval: Duration::from_millis(16),
        }
    }
}

impl GestureConfig {
    /// Movement that turns a press into a drag.
    pub fn touch_slop(&self) -> f32 {
        8.0 * self.density
    }

    /// Movement before a started pan begins moving the image.
    pub fn pan_threshold(&self) -> f32 {
        5.0 * self.density
    }

    /// Added to the quick-scale span so small drags scale gently.
    pub fn quick_scale_threshold(&self) -> f32 {
        20.0 * self.density
    }
}
