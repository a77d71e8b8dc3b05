use crate::host::ViewportHost;
use tessera_viewer_core::PointF;

/// Parameters shared by fling and quick-zoom animations.
///
/// Over the animation the scale moves from `scale_start` to `scale_end`
/// while the source point `source_center_end` slides from `focus_start` to
/// `focus_end` in view space. The curve is the animation's easing; progress
/// arrives already eased.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewMotion {
    pub scale_start: f32,
    pub scale_end: f32,
    pub source_center_end: PointF,
    pub focus_start: PointF,
    pub focus_end: PointF,
}

fn lerp(from: f32, to: f32, progress: f32) -> f32 {
    from + (to - from) * progress
}

impl ViewMotion {
    /// Applies the state for `progress` to the host's viewport. Tiles are
    /// only loaded on the final frame.
    pub fn apply(&self, progress: f32, host: &mut dyn ViewportHost) {
        let finished = progress >= 1.0;
        let progress = progress.clamp(0.0, 1.0);
        let fixed_scale = self.scale_start == self.scale_end;

        let viewport = host.viewport_mut();
        if !fixed_scale {
            viewport.set_scale(lerp(self.scale_start, self.scale_end, progress));
        }

        let focus_x = lerp(self.focus_start.x, self.focus_end.x, progress);
        let focus_y = lerp(self.focus_start.y, self.focus_end.y, progress);

        let target = viewport.source_to_view(self.source_center_end);
        viewport.offset_translate(-((target.x - focus_x) as i32), -((target.y - focus_y) as i32));
        viewport.fit_to_bounds(finished || fixed_scale);

        host.request_refresh(finished);
    }
}
