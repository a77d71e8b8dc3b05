/// Easing curves used by fling and quick-zoom animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    /// Decelerating to zero velocity.
    EaseOutQuad,
    /// Accelerating until halfway, then decelerating.
    EaseInOutQuad,
}

impl Easing {
    /// Value at `time` for a curve starting at `from` and moving by `change`
    /// over `duration`. `time` and `duration` share a unit.
    pub fn ease(self, time: f32, from: f32, change: f32, duration: f32) -> f32 {
        if duration <= 0.0 {
            return from + change;
        }

        match self {
            Easing::EaseOutQuad => {
                let progress = time / duration;
                -change * progress * (progress - 2.0) + from
            }
            Easing::EaseInOutQuad => {
                let mut t = time / (duration / 2.0);
                if t < 1.0 {
                    change / 2.0 * t * t + from
                } else {
                    t -= 1.0;
                    -change / 2.0 * (t * (t - 2.0) - 1.0) + from
                }
            }
        }
    }

    /// Interpolates between `from` and `to` for a progress in `[0, 1]`.
    pub fn interpolate(self, progress: f32, from: f32, to: f32) -> f32 {
        self.ease(progress.clamp(0.0, 1.0), from, to - from, 1.0)
    }
}
