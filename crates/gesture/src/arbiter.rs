//! Routes raw pointer events to the pan and zoom detectors.
//!
//! Every press starts by cancelling running animations. If one refuses to
//! stop, the whole press is swallowed until all pointers are up. Otherwise
//! a drag past the touch slop starts a pan, and a second press shortly
//! after a tap starts a zoom. Whichever starts first owns the session.

use crate::config::GestureConfig;
use crate::detector::{DetectorResponse, GestureAction, GestureDetector, GestureInput, GestureKind};
use crate::host::ViewportHost;
use std::time::Instant;
use tessera_viewer_core::{Axis, PointF};

pub type PointerId = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { id: PointerId, position: PointF, time: Instant },
    Move { id: PointerId, position: PointF, time: Instant },
    Up { id: PointerId, position: PointF, time: Instant },
    /// The host took the pointer stream away (for example to a parent).
    Cancel { time: Instant },
}

/// What the arbiter did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arbitration {
    /// Not relevant to any detector.
    Ignored,
    /// Watched, but no gesture has been recognized yet.
    Tracking,
    /// Fed to the active gesture, or swallowed while an animation runs.
    Consumed,
    Started(GestureKind),
    Ended(GestureKind),
    /// The drag should be handled by an enclosing scroll container.
    ReleasedToParent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PanTrack {
    Idle,
    Pending { pointer: PointerId, origin: PointF, time: Instant },
    Active { pointer: PointerId },
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ZoomTrack {
    Idle,
    AwaitingFirstUp { pointer: PointerId, down: Instant },
    AwaitingSecondDown { down: Instant, up: Instant },
    Active { pointer: PointerId },
}

#[derive(Debug)]
pub struct GestureArbiter {
    config: GestureConfig,
    pan: GestureDetector,
    zoom: GestureDetector,
    pointers: Vec<PointerId>,
    locked: bool,
    pan_track: PanTrack,
    zoom_track: ZoomTrack,
}

impl GestureArbiter {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            pan: GestureDetector::pan(config.clone()),
            zoom: GestureDetector::zoom(config.clone()),
            config,
            pointers: Vec::new(),
            locked: false,
            pan_track: PanTrack::Idle,
            zoom_track: ZoomTrack::Idle,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn pan(&self) -> &GestureDetector {
        &self.pan
    }

    pub fn zoom(&self) -> &GestureDetector {
        &self.zoom
    }

    pub fn is_animating(&self) -> bool {
        self.pan.is_animating() || self.zoom.is_animating()
    }

    /// True while a press is being swallowed behind a running animation.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn handle(&mut self, event: PointerEvent, host: &mut dyn ViewportHost) -> Arbitration {
        match event {
            PointerEvent::Down { id, position, time } => self.on_down(id, position, time, host),
            PointerEvent::Move { id, position, time } => self.on_move(id, position, time, host),
            PointerEvent::Up { id, position, time } => self.on_up(id, position, time, host),
            PointerEvent::Cancel { .. } => self.on_cancel(host),
        }
    }

    /// Advances running animations. Returns true while any is running.
    pub fn tick(&mut self, now: Instant, host: &mut dyn ViewportHost) -> bool {
        let pan = self.pan.tick(now, host);
        let zoom = self.zoom.tick(now, host);
        pan || zoom
    }

    /// Cancels every animation that allows it.
    pub fn cancel_animations(&mut self, host: &mut dyn ViewportHost) {
        self.pan.cancel_animation(host);
        self.zoom.cancel_animation(host);
    }

    /// Forgets all pointer and detector state without callbacks.
    pub fn reset(&mut self) {
        self.pan.abort();
        self.zoom.abort();
        self.pointers.clear();
        self.locked = false;
        self.pan_track = PanTrack::Idle;
        self.zoom_track = ZoomTrack::Idle;
    }

    fn on_down(
        &mut self,
        id: PointerId,
        position: PointF,
        time: Instant,
        host: &mut dyn ViewportHost,
    ) -> Arbitration {
        let first = self.pointers.is_empty();
        if !self.pointers.contains(&id) {
            self.pointers.push(id);
        }
        if !first {
            return if self.locked { Arbitration::Consumed } else { Arbitration::Ignored };
        }

        self.cancel_animations(host);
        if self.is_animating() {
            tracing::debug!("gestures locked by a running animation");
            self.locked = true;
            return Arbitration::Consumed;
        }

        if self.is_second_tap(time) {
            self.pan_track = PanTrack::Idle;
            self.pan.cancel(host);
            self.zoom.handle(GestureAction::Start, GestureInput::new(position, time), host);
            self.zoom_track = ZoomTrack::Active { pointer: id };
            return Arbitration::Started(GestureKind::Zoom);
        }

        self.zoom_track = ZoomTrack::AwaitingFirstUp { pointer: id, down: time };
        self.pan_track = match self.config.scroll_container_axis {
            Some(axis) if axis.yields_to_container(&host.viewport().pan_info()) => {
                PanTrack::Released
            }
            _ => PanTrack::Pending { pointer: id, origin: position, time },
        };
        Arbitration::Tracking
    }

    fn is_second_tap(&self, time: Instant) -> bool {
        let ZoomTrack::AwaitingSecondDown { down, up } = self.zoom_track else {
            return false;
        };

        let since_down = time.saturating_duration_since(down);
        let since_up = time.saturating_duration_since(up);
        since_down <= self.config.quick_zoom_timeout
            && since_up <= self.config.quick_zoom_timeout
            && since_up >= self.config.double_tap_min_time
    }

    fn on_move(
        &mut self,
        id: PointerId,
        position: PointF,
        time: Instant,
        host: &mut dyn ViewportHost,
    ) -> Arbitration {
        if self.locked {
            return Arbitration::Consumed;
        }

        let input = GestureInput::new(position, time);

        if self.zoom_track == (ZoomTrack::Active { pointer: id }) {
            self.zoom.handle(GestureAction::Update, input, host);
            return Arbitration::Consumed;
        }

        match self.pan_track {
            PanTrack::Active { pointer } if pointer == id => {
                if self.pan.handle(GestureAction::Update, input, host)
                    == DetectorResponse::ReleasedToParent
                {
                    self.pan.cancel(host);
                    self.pan_track = PanTrack::Released;
                    return Arbitration::ReleasedToParent;
                }
                Arbitration::Consumed
            }
            PanTrack::Pending { pointer, origin, time: down } if pointer == id => {
                let dx = position.x - origin.x;
                let dy = position.y - origin.y;
                if (dx * dx + dy * dy).sqrt() <= self.config.touch_slop() {
                    return Arbitration::Tracking;
                }

                if self.drags_toward_touched_edge(origin, position, host) {
                    self.pan_track = PanTrack::Released;
                    return Arbitration::ReleasedToParent;
                }

                if self.zoom.is_active() {
                    self.zoom.cancel(host);
                }
                self.zoom_track = ZoomTrack::Idle;

                self.pan.handle(GestureAction::Start, GestureInput::new(origin, down), host);
                self.pan_track = PanTrack::Active { pointer: id };
                if self.pan.handle(GestureAction::Update, input, host)
                    == DetectorResponse::ReleasedToParent
                {
                    self.pan.cancel(host);
                    self.pan_track = PanTrack::Released;
                    return Arbitration::ReleasedToParent;
                }
                Arbitration::Started(GestureKind::Pan)
            }
            PanTrack::Released => Arbitration::ReleasedToParent,
            _ => Arbitration::Ignored,
        }
    }

    fn drags_toward_touched_edge(
        &self,
        origin: PointF,
        position: PointF,
        host: &dyn ViewportHost,
    ) -> bool {
        let Some(axis) = self.config.scroll_container_axis else {
            return false;
        };

        let info = host.viewport().pan_info();
        let (delta, touches_start, touches_end) = match axis {
            Axis::Horizontal => (origin.x - position.x, info.touches_left(), info.touches_right()),
            Axis::Vertical => (origin.y - position.y, info.touches_top(), info.touches_bottom()),
        };

        (delta < 0.0 && touches_start) || (delta > 0.0 && touches_end)
    }

    fn on_up(
        &mut self,
        id: PointerId,
        position: PointF,
        time: Instant,
        host: &mut dyn ViewportHost,
    ) -> Arbitration {
        self.pointers.retain(|pointer| *pointer != id);

        if self.locked {
            if self.pointers.is_empty() {
                self.locked = false;
            }
            return Arbitration::Consumed;
        }

        let input = GestureInput::new(position, time);

        if self.zoom_track == (ZoomTrack::Active { pointer: id }) {
            self.zoom.handle(GestureAction::End, input, host);
            self.zoom_track = ZoomTrack::Idle;
            self.pan_track = PanTrack::Idle;
            return Arbitration::Ended(GestureKind::Zoom);
        }

        if self.pan_track == (PanTrack::Active { pointer: id }) {
            self.pan.handle(GestureAction::End, input, host);
            self.pan_track = PanTrack::Idle;
            self.zoom_track = ZoomTrack::Idle;
            return Arbitration::Ended(GestureKind::Pan);
        }

        if let ZoomTrack::AwaitingFirstUp { pointer, down } = self.zoom_track {
            if pointer == id {
                self.zoom_track = ZoomTrack::AwaitingSecondDown { down, up: time };
            }
        }
        if self.pointers.is_empty() {
            self.pan_track = PanTrack::Idle;
        }
        Arbitration::Tracking
    }

    fn on_cancel(&mut self, host: &mut dyn ViewportHost) -> Arbitration {
        let was_active = self.pan.is_active() || self.zoom.is_active();
        self.pan.cancel(host);
        self.zoom.cancel(host);

        self.pointers.clear();
        self.locked = false;
        self.pan_track = PanTrack::Idle;
        self.zoom_track = ZoomTrack::Idle;

        if was_active {
            Arbitration::Consumed
        } else {
            Arbitration::Ignored
        }
    }
}
