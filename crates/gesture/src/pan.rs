//! Single-pointer pan with fling.

use crate::animation::{Animation, AnimationSpec, AnimationStatus};
use crate::config::GestureConfig;
use crate::detector::{DetectorResponse, GestureInput};
use crate::easing::Easing;
use crate::host::ViewportHost;
use crate::motion::ViewMotion;
use crate::velocity::VelocityTracker;
use std::time::Instant;
use tessera_viewer_core::{Axis, Point, PointF};

/// Share of the release velocity (px/s) projected into the fling distance.
const FLING_PROJECTION: f32 = 0.25;

#[derive(Debug)]
pub struct PanDetector {
    config: GestureConfig,
    velocity: VelocityTracker,
    start: PointF,
    translate_start: PointF,
    is_panning: bool,
    fling: Option<Animation<ViewMotion>>,
}

impl PanDetector {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            velocity: VelocityTracker::new(),
            start: PointF::ZERO,
            translate_start: PointF::ZERO,
            is_panning: false,
            fling: None,
        }
    }

    /// True once the drag has committed to moving the image.
    pub fn is_panning(&self) -> bool {
        self.is_panning
    }

    pub fn is_animating(&self) -> bool {
        self.fling.as_ref().is_some_and(Animation::is_running)
    }

    pub fn fling(&self) -> Option<&Animation<ViewMotion>> {
        self.fling.as_ref()
    }

    pub(crate) fn start(&mut self, input: GestureInput, host: &mut dyn ViewportHost) {
        self.fling = None;
        self.is_panning = false;

        self.velocity.reset();
        self.velocity.add(input.time, input.position);

        self.start = input.position;
        self.translate_start = host.viewport().translate().to_f32();
    }

    pub(crate) fn update(
        &mut self,
        input: GestureInput,
        host: &mut dyn ViewportHost,
    ) -> DetectorResponse {
        self.velocity.add(input.time, input.position);

        let position = input.position;
        let dx = (position.x - self.start.x).abs();
        let dy = (position.y - self.start.y).abs();
        let threshold = self.config.pan_threshold();

        if !(dx > threshold || dy > threshold || self.is_panning) {
            return DetectorResponse::Handled;
        }

        let viewport = host.viewport_mut();
        let wanted = Point::truncate(PointF::new(
            self.translate_start.x + (position.x - self.start.x),
            self.translate_start.y + (position.y - self.start.y),
        ));
        viewport.set_translate(wanted);
        viewport.fit_to_bounds(true);

        let fitted = viewport.translate();
        let at_x_edge = fitted.x != wanted.x;
        let at_y_edge = fitted.y != wanted.y;
        let edge_x_swipe = at_x_edge && dx > dy && !self.is_panning;
        let edge_y_swipe = at_y_edge && dy > dx && !self.is_panning;
        let y_pan = fitted.y == wanted.y && dy > threshold * 3.0;

        if !edge_x_swipe
            && !edge_y_swipe
            && (!at_x_edge || !at_y_edge || y_pan || self.is_panning)
        {
            self.is_panning = true;
        } else {
            let released = match self.config.scroll_container_axis {
                Some(Axis::Horizontal) => edge_x_swipe,
                Some(Axis::Vertical) => edge_y_swipe,
                None => false,
            };
            if released {
                tracing::debug!(dx, dy, "edge swipe released to container");
                return DetectorResponse::ReleasedToParent;
            }
        }

        host.request_refresh(false);
        DetectorResponse::Handled
    }

    pub(crate) fn end(&mut self, input: GestureInput, host: &mut dyn ViewportHost) -> DetectorResponse {
        self.velocity.add(input.time, input.position);

        let end = input.position;
        let min_distance = self.config.min_fling_distance_px;
        let far_enough = (end.x - self.start.x).abs() > min_distance
            || (end.y - self.start.y).abs() > min_distance;

        if self.is_panning && !self.is_animating() && far_enough {
            let velocity = self.velocity.velocity();
            let min_velocity = self.config.min_fling_velocity_px_per_sec;

            if velocity.x.abs() > min_velocity || velocity.y.abs() > min_velocity {
                self.start_fling(input.time, velocity, host);
                return DetectorResponse::Animating;
            }
        }

        self.finish(host);
        DetectorResponse::Handled
    }

    fn start_fling(&mut self, now: Instant, velocity: PointF, host: &mut dyn ViewportHost) {
        tracing::debug!(vx = velocity.x, vy = velocity.y, "starting fling");

        let viewport = host.viewport();
        let spec = AnimationSpec {
            duration: self.config.fling_duration,
            update_interval: self.config.update_interval,
            easing: Easing::EaseOutQuad,
            can_be_canceled: true,
        };

        let animation = Animation::start(
            now,
            spec,
            || {
                let scale = viewport.scale();
                let translate = viewport.translate().to_f32();
                let available = viewport.available();
                let view_center =
                    PointF::new((available.width / 2) as f32, (available.height / 2) as f32);

                let translate_end = PointF::new(
                    translate.x + velocity.x * FLING_PROJECTION,
                    translate.y + velocity.y * FLING_PROJECTION,
                );
                let source_center_end = PointF::new(
                    (view_center.x - translate_end.x) / scale,
                    (view_center.y - translate_end.y) / scale,
                );

                ViewMotion {
                    scale_start: scale,
                    scale_end: scale,
                    source_center_end,
                    focus_start: viewport.source_to_view(source_center_end),
                    focus_end: view_center,
                }
            },
            |motion: &ViewMotion, progress, _duration, host| motion.apply(progress, host),
        )
        .on_end(|canceled, host| {
            tracing::debug!(canceled, "fling ended");
            host.request_refresh(true);
        });

        self.fling = Some(animation);
    }

    /// Advances a running fling. Returns true while it is still running.
    pub(crate) fn tick(&mut self, now: Instant, host: &mut dyn ViewportHost) -> bool {
        let Some(fling) = self.fling.as_mut() else {
            return false;
        };

        match fling.tick(now, host) {
            AnimationStatus::Running => true,
            AnimationStatus::Finished { .. } => {
                self.fling = None;
                self.reset();
                false
            }
        }
    }

    pub(crate) fn cancel_animation(&mut self, host: &mut dyn ViewportHost) -> bool {
        let canceled = self.fling.as_mut().is_some_and(|fling| fling.cancel(host));
        if canceled {
            self.fling = None;
            self.reset();
        }
        canceled
    }

    /// Ends the session without a fling.
    pub(crate) fn finish(&mut self, host: &mut dyn ViewportHost) {
        self.reset();
        host.request_refresh(true);
    }

    /// Drops all session state, including a running fling, without callbacks.
    pub(crate) fn abort(&mut self) {
        self.fling = None;
        self.reset();
    }

    fn reset(&mut self) {
        self.start = PointF::ZERO;
        self.translate_start = PointF::ZERO;
        self.is_panning = false;
        self.velocity.reset();
    }
}
