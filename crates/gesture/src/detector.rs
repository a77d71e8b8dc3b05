use crate::config::GestureConfig;
use crate::host::ViewportHost;
use crate::pan::PanDetector;
use crate::zoom::ZoomDetector;
use std::time::Instant;
use tessera_viewer_core::PointF;

/// Pointer sample handed to a detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureInput {
    pub position: PointF,
    pub time: Instant,
}

impl GestureInput {
    pub fn new(position: PointF, time: Instant) -> Self {
        Self { position, time }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    Pan,
    Zoom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction {
    Start,
    Update,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorResponse {
    /// Out of order for the detector's session; nothing changed.
    Ignored,
    Handled,
    /// The gesture ended into an animation (fling or quick zoom).
    Animating,
    /// The drag belongs to an enclosing scroll container.
    ReleasedToParent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Active,
}

impl Phase {
    fn accepts(self, action: GestureAction) -> bool {
        matches!(
            (self, action),
            (Phase::Idle, GestureAction::Start)
                | (Phase::Active, GestureAction::Update | GestureAction::End)
        )
    }
}

#[derive(Debug)]
enum Recognizer {
    Pan(PanDetector),
    Zoom(ZoomDetector),
}

/// A pan or zoom recognizer driven through `Start -> Update* -> End`.
#[derive(Debug)]
pub struct GestureDetector {
    phase: Phase,
    recognizer: Recognizer,
}

impl GestureDetector {
    pub fn pan(config: GestureConfig) -> Self {
        Self { phase: Phase::Idle, recognizer: Recognizer::Pan(PanDetector::new(config)) }
    }

    pub fn zoom(config: GestureConfig) -> Self {
        Self { phase: Phase::Idle, recognizer: Recognizer::Zoom(ZoomDetector::new(config)) }
    }

    pub fn kind(&self) -> GestureKind {
        match self.recognizer {
            Recognizer::Pan(_) => GestureKind::Pan,
            Recognizer::Zoom(_) => GestureKind::Zoom,
        }
    }

    pub fn as_pan(&self) -> Option<&PanDetector> {
        match &self.recognizer {
            Recognizer::Pan(pan) => Some(pan),
            Recognizer::Zoom(_) => None,
        }
    }

    pub fn as_zoom(&self) -> Option<&ZoomDetector> {
        match &self.recognizer {
            Recognizer::Zoom(zoom) => Some(zoom),
            Recognizer::Pan(_) => None,
        }
    }

    /// True between an accepted `Start` and its `End`.
    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn is_animating(&self) -> bool {
        match &self.recognizer {
            Recognizer::Pan(pan) => pan.is_animating(),
            Recognizer::Zoom(zoom) => zoom.is_animating(),
        }
    }

    pub fn handle(
        &mut self,
        action: GestureAction,
        input: GestureInput,
        host: &mut dyn ViewportHost,
    ) -> DetectorResponse {
        if !self.phase.accepts(action) {
            tracing::debug!(kind = ?self.kind(), ?action, phase = ?self.phase, "ignoring out-of-order gesture action");
            return DetectorResponse::Ignored;
        }

        tracing::trace!(kind = ?self.kind(), ?action, x = input.position.x, y = input.position.y, "gesture action");

        let response = match (&mut self.recognizer, action) {
            (Recognizer::Pan(pan), GestureAction::Start) => {
                pan.start(input, host);
                DetectorResponse::Handled
            }
            (Recognizer::Pan(pan), GestureAction::Update) => pan.update(input, host),
            (Recognizer::Pan(pan), GestureAction::End) => pan.end(input, host),
            (Recognizer::Zoom(zoom), GestureAction::Start) => {
                zoom.start(input, host);
                DetectorResponse::Handled
            }
            (Recognizer::Zoom(zoom), GestureAction::Update) => {
                zoom.update(input, host);
                DetectorResponse::Handled
            }
            (Recognizer::Zoom(zoom), GestureAction::End) => zoom.end(input, host),
        };

        self.phase = match action {
            GestureAction::Start | GestureAction::Update => Phase::Active,
            GestureAction::End => Phase::Idle,
        };
        response
    }

    /// Ends an active session without a fling or quick zoom.
    pub fn cancel(&mut self, host: &mut dyn ViewportHost) {
        if self.phase == Phase::Idle {
            return;
        }

        self.phase = Phase::Idle;
        match &mut self.recognizer {
            Recognizer::Pan(pan) => pan.finish(host),
            Recognizer::Zoom(zoom) => zoom.finish(host),
        }
    }

    /// Cancels a running animation if it allows it.
    pub fn cancel_animation(&mut self, host: &mut dyn ViewportHost) -> bool {
        match &mut self.recognizer {
            Recognizer::Pan(pan) => pan.cancel_animation(host),
            Recognizer::Zoom(zoom) => zoom.cancel_animation(host),
        }
    }

    /// Advances a running animation. Returns true while one is running.
    pub fn tick(&mut self, now: Instant, host: &mut dyn ViewportHost) -> bool {
        match &mut self.recognizer {
            Recognizer::Pan(pan) => pan.tick(now, host),
            Recognizer::Zoom(zoom) => zoom.tick(now, host),
        }
    }

    /// Drops session and animation state without callbacks.
    pub fn abort(&mut self) {
        self.phase = Phase::Idle;
        match &mut self.recognizer {
            Recognizer::Pan(pan) => pan.abort(),
            Recognizer::Zoom(zoom) => zoom.abort(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_accepts_only_ordered_actions() {
        assert!(Phase::Idle.accepts(GestureAction::Start));
        assert!(!Phase::Idle.accepts(GestureAction::Update));
        assert!(!Phase::Idle.accepts(GestureAction::End));
        assert!(!Phase::Active.accepts(GestureAction::Start));
        assert!(Phase::Active.accepts(GestureAction::Update));
        assert!(Phase::Active.accepts(GestureAction::End));
    }

    #[test]
    fn constructors_tag_their_kind() {
        let pan = GestureDetector::pan(GestureConfig::default());
        let zoom = GestureDetector::zoom(GestureConfig::default());

        assert_eq!(pan.kind(), GestureKind::Pan);
        assert!(pan.as_pan().is_some() && pan.as_zoom().is_none());
        assert_eq!(zoom.kind(), GestureKind::Zoom);
        assert!(!zoom.is_active() && !zoom.is_animating());
    }
}
