use approx::assert_relative_eq;
use std::time::{Duration, Instant};
use tessera_gesture::{
    Arbitration, DetectorResponse, GestureAction, GestureArbiter, GestureConfig, GestureDetector,
    GestureInput, GestureKind, PointerEvent, ViewportHost,
};
use tessera_viewer_core::{Axis, PointF, ScaleConfig, Size, Viewport};

struct TestHost {
    viewport: Viewport,
    refreshes: Vec<bool>,
}

impl TestHost {
    /// 4000x3000 image in a 1000x800 view, fitted at the minimum scale.
    fn fitted() -> Self {
        let mut viewport =
            Viewport::new(Size::new(1000, 800), Size::new(4000, 3000), ScaleConfig::default())
                .unwrap();
        viewport.fit_to_bounds(true);
        Self { viewport, refreshes: Vec::new() }
    }

    /// Same image with explicit scale bounds.
    fn with_scales(min: f32, max: f32, double_tap: f32) -> Self {
        let config = ScaleConfig {
            min_scale_override: Some(min),
            max_scale_override: Some(max),
            double_tap_zoom_scale_override: Some(double_tap),
            ..ScaleConfig::default()
        };
        let mut viewport =
            Viewport::new(Size::new(1000, 800), Size::new(4000, 3000), config).unwrap();
        viewport.fit_to_bounds(true);
        Self { viewport, refreshes: Vec::new() }
    }

    fn zoomed() -> Self {
        let mut host = Self::fitted();
        host.viewport.set_scale_and_center(1.0, PointF::new(2000.0, 1500.0));
        host
    }
}

impl ViewportHost for TestHost {
    fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    fn request_refresh(&mut self, load: bool) {
        self.refreshes.push(load);
    }
}

fn at(start: Instant, ms: u64) -> Instant {
    start + Duration::from_millis(ms)
}

fn down(x: f32, y: f32, time: Instant) -> PointerEvent {
    PointerEvent::Down { id: 1, position: PointF::new(x, y), time }
}

fn moved(x: f32, y: f32, time: Instant) -> PointerEvent {
    PointerEvent::Move { id: 1, position: PointF::new(x, y), time }
}

fn up(x: f32, y: f32, time: Instant) -> PointerEvent {
    PointerEvent::Up { id: 1, position: PointF::new(x, y), time }
}

fn run_animations(arbiter: &mut GestureArbiter, host: &mut TestHost, start: Instant) -> Instant {
    let mut now = start;
    while arbiter.tick(now, host) {
        now += Duration::from_millis(16);
        assert!(now < start + Duration::from_secs(5), "animation never finished");
    }
    now
}

#[test]
fn fast_release_flings() {
    let t0 = Instant::now();
    let mut host = TestHost::zoomed();
    let mut arbiter = GestureArbiter::new(GestureConfig::default());
    let translate_before = host.viewport.translate();

    assert_eq!(arbiter.handle(down(100.0, 100.0, t0), &mut host), Arbitration::Tracking);
    assert_eq!(
        arbiter.handle(moved(100.0, 150.0, at(t0, 10)), &mut host),
        Arbitration::Started(GestureKind::Pan)
    );
    assert_eq!(arbiter.handle(moved(100.0, 200.0, at(t0, 25)), &mut host), Arbitration::Consumed);
    assert_eq!(arbiter.handle(moved(100.0, 300.0, at(t0, 50)), &mut host), Arbitration::Consumed);
    assert_eq!(host.viewport.translate().y, translate_before.y + 200);

    assert_eq!(
        arbiter.handle(up(100.0, 300.0, at(t0, 50)), &mut host),
        Arbitration::Ended(GestureKind::Pan)
    );
    assert!(arbiter.pan().is_animating());
    let released_at = host.viewport.translate();

    run_animations(&mut arbiter, &mut host, at(t0, 50));

    assert!(!arbiter.is_animating());
    assert!(host.viewport.translate().y > released_at.y);
    assert_eq!(host.viewport.translate().x, released_at.x);
    assert_eq!(host.refreshes.last(), Some(&true));
}

#[test]
fn slow_release_stops_without_fling() {
    let t0 = Instant::now();
    let mut host = TestHost::zoomed();
    let mut arbiter = GestureArbiter::new(GestureConfig::default());

    arbiter.handle(down(100.0, 100.0, t0), &mut host);
    arbiter.handle(moved(100.0, 120.0, at(t0, 500)), &mut host);
    arbiter.handle(moved(100.0, 120.0, at(t0, 900)), &mut host);
    arbiter.handle(up(100.0, 120.0, at(t0, 1000)), &mut host);

    assert!(!arbiter.is_animating());
    assert_eq!(host.refreshes.last(), Some(&true));
}

#[test]
fn double_tap_zooms_to_double_tap_scale() {
    let t0 = Instant::now();
    let mut host = TestHost::fitted();
    let mut arbiter = GestureArbiter::new(GestureConfig::default());
    assert_relative_eq!(host.viewport.scale(), 0.25);

    assert_eq!(arbiter.handle(down(500.0, 400.0, t0), &mut host), Arbitration::Tracking);
    assert_eq!(arbiter.handle(up(500.0, 400.0, at(t0, 50)), &mut host), Arbitration::Tracking);
    assert_eq!(
        arbiter.handle(down(500.0, 400.0, at(t0, 150)), &mut host),
        Arbitration::Started(GestureKind::Zoom)
    );
    assert_eq!(
        arbiter.handle(up(500.0, 400.0, at(t0, 200)), &mut host),
        Arbitration::Ended(GestureKind::Zoom)
    );
    assert!(arbiter.zoom().is_animating());
    assert!(!arbiter.zoom().as_zoom().unwrap().has_moved());

    run_animations(&mut arbiter, &mut host, at(t0, 200));

    let expected = host.viewport.max_scale().min(host.viewport.double_tap_zoom_scale());
    assert_relative_eq!(host.viewport.scale(), expected);
    assert_eq!(host.refreshes.last(), Some(&true));
}

fn double_tap(arbiter: &mut GestureArbiter, host: &mut TestHost, t0: Instant) {
    arbiter.handle(down(500.0, 400.0, t0), host);
    arbiter.handle(up(500.0, 400.0, at(t0, 50)), host);
    assert_eq!(
        arbiter.handle(down(500.0, 400.0, at(t0, 150)), host),
        Arbitration::Started(GestureKind::Zoom)
    );
    arbiter.handle(up(500.0, 400.0, at(t0, 200)), host);
    run_animations(arbiter, host, at(t0, 200));
}

#[test]
fn double_tap_at_minimum_always_zooms_in() {
    let t0 = Instant::now();
    let mut host = TestHost::with_scales(0.95, 2.0, 1.0);
    let mut arbiter = GestureArbiter::new(GestureConfig::default());
    assert_relative_eq!(host.viewport.scale(), 0.95);

    double_tap(&mut arbiter, &mut host, t0);

    assert_relative_eq!(host.viewport.scale(), 1.0);
}

#[test]
fn double_tap_near_target_above_minimum_zooms_out() {
    let t0 = Instant::now();
    let mut host = TestHost::with_scales(0.95, 2.0, 1.0);
    host.viewport.set_scale_and_center(0.97, PointF::new(2000.0, 1500.0));
    let mut arbiter = GestureArbiter::new(GestureConfig::default());

    double_tap(&mut arbiter, &mut host, t0);

    assert_relative_eq!(host.viewport.scale(), 0.95);
}

#[test]
fn double_tap_when_zoomed_in_returns_to_minimum() {
    let t0 = Instant::now();
    let mut host = TestHost::zoomed();
    let mut arbiter = GestureArbiter::new(GestureConfig::default());

    arbiter.handle(down(500.0, 400.0, t0), &mut host);
    arbiter.handle(up(500.0, 400.0, at(t0, 60)), &mut host);
    arbiter.handle(down(500.0, 400.0, at(t0, 160)), &mut host);
    arbiter.handle(up(500.0, 400.0, at(t0, 200)), &mut host);
    run_animations(&mut arbiter, &mut host, at(t0, 200));

    assert_relative_eq!(host.viewport.scale(), host.viewport.min_scale());
}

#[test]
fn late_second_tap_starts_a_new_session() {
    let t0 = Instant::now();
    let mut host = TestHost::fitted();
    let mut arbiter = GestureArbiter::new(GestureConfig::default());

    arbiter.handle(down(500.0, 400.0, t0), &mut host);
    arbiter.handle(up(500.0, 400.0, at(t0, 50)), &mut host);

    assert_eq!(arbiter.handle(down(500.0, 400.0, at(t0, 400)), &mut host), Arbitration::Tracking);
    assert!(!arbiter.zoom().is_active());
}

#[test]
fn second_tap_inside_minimum_gap_is_not_a_double_tap() {
    let t0 = Instant::now();
    let mut host = TestHost::fitted();
    let mut arbiter = GestureArbiter::new(GestureConfig::default());

    arbiter.handle(down(500.0, 400.0, t0), &mut host);
    arbiter.handle(up(500.0, 400.0, at(t0, 50)), &mut host);

    assert_eq!(arbiter.handle(down(500.0, 400.0, at(t0, 60)), &mut host), Arbitration::Tracking);
}

#[test]
fn dragging_after_second_tap_quick_scales() {
    let t0 = Instant::now();
    let mut host = TestHost::fitted();
    let mut arbiter = GestureArbiter::new(GestureConfig::default());

    arbiter.handle(down(500.0, 400.0, t0), &mut host);
    arbiter.handle(up(500.0, 400.0, at(t0, 50)), &mut host);
    arbiter.handle(down(500.0, 400.0, at(t0, 150)), &mut host);
    arbiter.handle(moved(500.0, 500.0, at(t0, 170)), &mut host);
    arbiter.handle(moved(500.0, 600.0, at(t0, 190)), &mut host);

    let scaled = host.viewport.scale();
    assert!(scaled > host.viewport.min_scale());
    assert!(scaled <= host.viewport.max_scale());

    assert_eq!(
        arbiter.handle(up(500.0, 600.0, at(t0, 210)), &mut host),
        Arbitration::Ended(GestureKind::Zoom)
    );
    assert!(!arbiter.is_animating());
    assert_relative_eq!(host.viewport.scale(), scaled);
}

#[test]
fn quick_zoom_cannot_be_interrupted() {
    let t0 = Instant::now();
    let mut host = TestHost::fitted();
    let mut arbiter = GestureArbiter::new(GestureConfig::default());

    arbiter.handle(down(500.0, 400.0, t0), &mut host);
    arbiter.handle(up(500.0, 400.0, at(t0, 50)), &mut host);
    arbiter.handle(down(500.0, 400.0, at(t0, 150)), &mut host);
    arbiter.handle(up(500.0, 400.0, at(t0, 200)), &mut host);
    arbiter.tick(at(t0, 216), &mut host);

    assert_eq!(arbiter.handle(down(10.0, 10.0, at(t0, 230)), &mut host), Arbitration::Consumed);
    assert!(arbiter.is_locked());
    assert_eq!(arbiter.handle(moved(300.0, 300.0, at(t0, 240)), &mut host), Arbitration::Consumed);
    assert_eq!(arbiter.handle(up(300.0, 300.0, at(t0, 250)), &mut host), Arbitration::Consumed);
    assert!(!arbiter.is_locked());
    assert!(arbiter.zoom().is_animating());
}

#[test]
fn new_press_cancels_fling() {
    let t0 = Instant::now();
    let mut host = TestHost::zoomed();
    let mut arbiter = GestureArbiter::new(GestureConfig::default());

    arbiter.handle(down(100.0, 100.0, t0), &mut host);
    arbiter.handle(moved(100.0, 200.0, at(t0, 20)), &mut host);
    arbiter.handle(moved(100.0, 300.0, at(t0, 40)), &mut host);
    arbiter.handle(up(100.0, 300.0, at(t0, 40)), &mut host);
    assert!(arbiter.pan().is_animating());

    assert_eq!(arbiter.handle(down(100.0, 100.0, at(t0, 60)), &mut host), Arbitration::Tracking);
    assert!(!arbiter.is_animating());
    assert!(!arbiter.is_locked());
    assert_eq!(host.refreshes.last(), Some(&true));
}

#[test]
fn horizontal_container_takes_drags_of_a_width_fitted_image() {
    let t0 = Instant::now();
    let mut host = TestHost::fitted();
    let config = GestureConfig {
        scroll_container_axis: Some(Axis::Horizontal),
        ..GestureConfig::default()
    };
    let mut arbiter = GestureArbiter::new(config);

    arbiter.handle(down(500.0, 400.0, t0), &mut host);
    assert_eq!(
        arbiter.handle(moved(300.0, 400.0, at(t0, 20)), &mut host),
        Arbitration::ReleasedToParent
    );
    assert!(!arbiter.pan().is_active());
}

#[test]
fn zoomed_image_pans_away_from_touched_edge_only() {
    let t0 = Instant::now();
    let mut host = TestHost::fitted();
    host.viewport.set_scale_and_center(1.0, PointF::new(0.0, 1500.0));
    assert!(host.viewport.pan_info().touches_left());

    let config = GestureConfig {
        scroll_container_axis: Some(Axis::Horizontal),
        ..GestureConfig::default()
    };
    let mut arbiter = GestureArbiter::new(config);

    // Dragging right would pull the image off its left edge.
    arbiter.handle(down(500.0, 400.0, t0), &mut host);
    assert_eq!(
        arbiter.handle(moved(600.0, 400.0, at(t0, 20)), &mut host),
        Arbitration::ReleasedToParent
    );
    arbiter.handle(up(600.0, 400.0, at(t0, 30)), &mut host);

    arbiter.handle(down(500.0, 400.0, at(t0, 1000)), &mut host);
    assert_eq!(
        arbiter.handle(moved(400.0, 400.0, at(t0, 1020)), &mut host),
        Arbitration::Started(GestureKind::Pan)
    );
}

#[test]
fn detector_ignores_out_of_order_actions() {
    let t0 = Instant::now();
    let mut host = TestHost::zoomed();
    let mut detector = GestureDetector::pan(GestureConfig::default());
    let input = GestureInput::new(PointF::new(10.0, 10.0), t0);

    assert_eq!(detector.handle(GestureAction::Update, input, &mut host), DetectorResponse::Ignored);
    assert_eq!(detector.handle(GestureAction::End, input, &mut host), DetectorResponse::Ignored);
    assert_eq!(detector.handle(GestureAction::Start, input, &mut host), DetectorResponse::Handled);
    assert_eq!(detector.handle(GestureAction::Start, input, &mut host), DetectorResponse::Ignored);
    assert_eq!(detector.handle(GestureAction::End, input, &mut host), DetectorResponse::Handled);
    assert!(!detector.is_active());
}

#[test]
fn cancel_event_ends_active_pan_without_fling() {
    let t0 = Instant::now();
    let mut host = TestHost::zoomed();
    let mut arbiter = GestureArbiter::new(GestureConfig::default());

    arbiter.handle(down(100.0, 100.0, t0), &mut host);
    arbiter.handle(moved(100.0, 300.0, at(t0, 20)), &mut host);
    assert!(arbiter.pan().is_active());

    assert_eq!(arbiter.handle(PointerEvent::Cancel { time: at(t0, 25) }, &mut host), Arbitration::Consumed);
    assert!(!arbiter.pan().is_active());
    assert!(!arbiter.is_animating());
}
