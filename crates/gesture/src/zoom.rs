//! One-finger quick scale and double-tap quick zoom.
//!
//! The session starts on the second press of a double tap. Dragging before
//! release scales continuously around the press point; releasing without
//! movement animates to the double-tap zoom scale, or back to the minimum
//! when already zoomed in.

use crate::animation::{Animation, AnimationSpec, AnimationStatus};
use crate::config::GestureConfig;
use crate::detector::{DetectorResponse, GestureInput};
use crate::easing::Easing;
use crate::host::ViewportHost;
use crate::motion::ViewMotion;
use std::time::Instant;
use tessera_viewer_core::{Point, PointF, ScaleAndTranslate};

/// Relative span change below which a drag is still treated as a tap.
const QUICK_SCALE_DEAD_ZONE: f32 = 0.03;

/// Zoom in unless already within this share of the double-tap scale.
const ZOOM_IN_RATIO: f32 = 0.9;

#[derive(Debug)]
pub struct ZoomDetector {
    config: GestureConfig,
    center_start: PointF,
    translate_start: PointF,
    scale_start: f32,
    source_center: PointF,
    press: PointF,
    last_point: PointF,
    last_distance: f32,
    moved: bool,
    animation: Option<Animation<ViewMotion>>,
}

impl ZoomDetector {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            center_start: PointF::ZERO,
            translate_start: PointF::ZERO,
            scale_start: 0.0,
            source_center: PointF::ZERO,
            press: PointF::ZERO,
            last_point: PointF::ZERO,
            last_distance: 0.0,
            moved: false,
            animation: None,
        }
    }

    /// True once the pointer moved enough to quick-scale.
    pub fn has_moved(&self) -> bool {
        self.moved
    }

    pub fn is_animating(&self) -> bool {
        self.animation.as_ref().is_some_and(Animation::is_running)
    }

    pub fn animation(&self) -> Option<&Animation<ViewMotion>> {
        self.animation.as_ref()
    }

    pub(crate) fn start(&mut self, input: GestureInput, host: &mut dyn ViewportHost) {
        self.animation = None;
        self.anchor(input.position, host);
        self.moved = false;
    }

    fn anchor(&mut self, position: PointF, host: &dyn ViewportHost) {
        let viewport = host.viewport();

        self.center_start = position;
        self.translate_start = viewport.translate().to_f32();
        self.scale_start = viewport.scale();
        self.last_distance = -1.0;
        self.source_center = viewport.view_to_source(position);
        self.press = position;
        self.last_point = position;
    }

    pub(crate) fn update(&mut self, input: GestureInput, host: &mut dyn ViewportHost) {
        let position = input.position;
        let mut distance =
            (self.press.y - position.y).abs() * 2.0 + self.config.quick_scale_threshold();

        if self.last_distance == -1.0 {
            self.last_distance = distance;
        }

        let downwards = position.y > self.last_point.y;
        self.last_point = position;
        let span_diff = (1.0 - distance / self.last_distance).abs() * 0.5;

        if span_diff > QUICK_SCALE_DEAD_ZONE || self.moved {
            self.moved = true;

            let multiplier = if self.last_distance > 0.0 {
                if downwards {
                    1.0 + span_diff
                } else {
                    1.0 - span_diff
                }
            } else {
                1.0
            };

            let viewport = host.viewport_mut();
            let previous_scale = viewport.scale();
            let new_scale = (previous_scale * multiplier)
                .min(viewport.max_scale())
                .max(viewport.min_scale());
            viewport.set_scale(new_scale);

            let left_start = self.center_start.x - self.translate_start.x;
            let top_start = self.center_start.y - self.translate_start.y;
            let left_now = left_start * (new_scale / self.scale_start);
            let top_now = top_start * (new_scale / self.scale_start);
            viewport.set_translate(Point::truncate(PointF::new(
                self.center_start.x - left_now,
                self.center_start.y - top_now,
            )));

            // Crossing the point where the image fills the view on an axis
            // snaps the translate, so the anchor has to follow.
            let source = viewport.source();
            let available = viewport.available();
            let crosses = |size: i32, view: i32| {
                previous_scale * (size as f32) < view as f32
                    && new_scale * (size as f32) >= view as f32
            };
            if crosses(source.height, available.height) || crosses(source.width, available.width)
            {
                viewport.fit_to_bounds(true);
                self.center_start = viewport.source_to_view(self.source_center);
                self.translate_start = viewport.translate().to_f32();
                self.scale_start = new_scale;
                distance = 0.0;
            }
        }

        self.last_distance = distance;
        host.viewport_mut().fit_to_bounds(true);
        host.request_refresh(true);
    }

    pub(crate) fn end(&mut self, input: GestureInput, host: &mut dyn ViewportHost) -> DetectorResponse {
        if !self.moved && !self.is_animating() {
            self.start_quick_zoom(input, host);
            return DetectorResponse::Animating;
        }

        self.finish(host);
        DetectorResponse::Handled
    }

    fn start_quick_zoom(&mut self, input: GestureInput, host: &mut dyn ViewportHost) {
        self.anchor(input.position, host);

        let viewport = host.viewport();
        let tap = input.position;
        let source_center = self.source_center;
        let spec = AnimationSpec {
            duration: self.config.quick_zoom_duration,
            update_interval: self.config.update_interval,
            easing: Easing::EaseInOutQuad,
            can_be_canceled: false,
        };

        let animation = Animation::start(
            input.time,
            spec,
            || {
                let current = viewport.scale();
                let min = viewport.min_scale();
                let double_tap = viewport.max_scale().min(viewport.double_tap_zoom_scale());
                let zoom_in = current <= double_tap * ZOOM_IN_RATIO || current == min;
                let target = viewport.limited_scale(if zoom_in { double_tap } else { min });

                let target_center = viewport.limited_source_center(source_center, target);
                let available = viewport.available();

                let focus_end = if zoom_in {
                    let center_now = viewport.center();
                    let translate_end =
                        PointF::new(tap.x - target * center_now.x, tap.y - target * center_now.y);
                    let fitted = viewport.fit(true, ScaleAndTranslate::new(target, translate_end));
                    PointF::new(
                        tap.x + (fitted.translate.x - translate_end.x),
                        tap.y + (fitted.translate.y - translate_end.y),
                    )
                } else {
                    PointF::new((available.width / 2) as f32, (available.height / 2) as f32)
                };

                tracing::debug!(from = current, to = target, zoom_in, "starting quick zoom");

                ViewMotion {
                    scale_start: current,
                    scale_end: target,
                    source_center_end: target_center,
                    focus_start: viewport.source_to_view(target_center),
                    focus_end,
                }
            },
            |motion: &ViewMotion, progress, _duration, host| motion.apply(progress, host),
        )
        .on_end(|canceled, host| {
            tracing::debug!(canceled, "quick zoom ended");
            host.request_refresh(true);
        });

        self.animation = Some(animation);
    }

    pub(crate) fn tick(&mut self, now: Instant, host: &mut dyn ViewportHost) -> bool {
        let Some(animation) = self.animation.as_mut() else {
            return false;
        };

        match animation.tick(now, host) {
            AnimationStatus::Running => true,
            AnimationStatus::Finished { .. } => {
                self.animation = None;
                self.reset();
                false
            }
        }
    }

    pub(crate) fn cancel_animation(&mut self, host: &mut dyn ViewportHost) -> bool {
        let canceled = self.animation.as_mut().is_some_and(|animation| animation.cancel(host));
        if canceled {
            self.animation = None;
            self.reset();
        }
        canceled
    }

    pub(crate) fn finish(&mut self, host: &mut dyn ViewportHost) {
        self.reset();
        host.request_refresh(true);
    }

    pub(crate) fn abort(&mut self) {
        self.animation = None;
        self.reset();
    }

    fn reset(&mut self) {
        self.center_start = PointF::ZERO;
        self.translate_start = PointF::ZERO;
        self.source_center = PointF::ZERO;
        self.press = PointF::ZERO;
        self.last_point = PointF::ZERO;
        self.scale_start = 0.0;
        self.last_distance = 0.0;
        self.moved = false;
    }
}
