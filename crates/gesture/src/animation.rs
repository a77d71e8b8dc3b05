//! Time-based animation driver.
//!
//! The host calls [`Animation::tick`] from its frame loop. Each tick that is
//! due passes the animation's parameters and the eased progress to the
//! tick callback. The tick that reaches progress 1 always runs, whatever
//! the update interval, so an animation converges even after a missed
//! frame. The end callback runs exactly once, on natural completion or on
//! cancellation.

use crate::easing::Easing;
use crate::host::ViewportHost;
use std::fmt;
use std::time::{Duration, Instant};
use tessera_scheduler::CancellationToken;

type TickFn<P> = Box<dyn FnMut(&P, f32, Duration, &mut dyn ViewportHost) + Send>;
type EndFn = Box<dyn FnOnce(bool, &mut dyn ViewportHost) + Send>;

/// Timing and curve for one animation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationSpec {
    pub duration: Duration,
    pub update_interval: Duration,
    /// Applied to the elapsed fraction before it reaches the tick callback.
    pub easing: Easing,
    /// Whether [`Animation::cancel`] and the cancellation token take effect.
    pub can_be_canceled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationStatus {
    Running,
    Finished { canceled: bool },
}

pub struct Animation<P> {
    params: P,
    spec: AnimationSpec,
    started_at: Instant,
    last_tick: Option<Instant>,
    token: CancellationToken,
    on_tick: TickFn<P>,
    on_end: Option<EndFn>,
    status: AnimationStatus,
}

impl<P> Animation<P> {
    /// Starts an animation at `now`. `params` is evaluated immediately so it
    /// captures the view as it is when the animation begins.
    pub fn start<F, T>(now: Instant, spec: AnimationSpec, params: F, on_tick: T) -> Self
    where
        F: FnOnce() -> P,
        T: FnMut(&P, f32, Duration, &mut dyn ViewportHost) + Send + 'static,
    {
        tracing::trace!(
            duration_ms = spec.duration.as_millis() as u64,
            cancelable = spec.can_be_canceled,
            "animation started"
        );

        Self {
            params: params(),
            spec,
            started_at: now,
            last_tick: None,
            token: CancellationToken::new(),
            on_tick: Box::new(on_tick),
            on_end: None,
            status: AnimationStatus::Running,
        }
    }

    /// Sets the one-shot completion callback. It receives `true` when the
    /// animation was cancelled.
    pub fn on_end<E>(mut self, on_end: E) -> Self
    where
        E: FnOnce(bool, &mut dyn ViewportHost) + Send + 'static,
    {
        self.on_end = Some(Box::new(on_end));
        self
    }

    pub fn params(&self) -> &P {
        &self.params
    }

    pub fn spec(&self) -> AnimationSpec {
        self.spec
    }

    /// Token checked on every tick. Cancelling it stops a cancelable
    /// animation at its next tick.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn status(&self) -> AnimationStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == AnimationStatus::Running
    }

    pub fn progress_at(&self, now: Instant) -> f32 {
        if self.spec.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f32() / self.spec.duration.as_secs_f32()).min(1.0)
    }

    /// Earliest instant at which [`tick`](Self::tick) will do work.
    pub fn next_tick_at(&self) -> Instant {
        match self.last_tick {
            Some(last) => last + self.spec.update_interval,
            None => self.started_at,
        }
    }

    /// Stops a running cancelable animation right away, running the end
    /// callback with `canceled = true`. Returns false when the animation is
    /// not cancelable or already finished.
    pub fn cancel(&mut self, host: &mut dyn ViewportHost) -> bool {
        if !self.is_running() || !self.spec.can_be_canceled {
            return false;
        }

        self.token.cancel();
        self.finish(true, host);
        true
    }

    pub fn tick(&mut self, now: Instant, host: &mut dyn ViewportHost) -> AnimationStatus {
        if !self.is_running() {
            return self.status;
        }

        if self.spec.can_be_canceled && self.token.is_cancelled() {
            self.finish(true, host);
            return self.status;
        }

        let progress = self.progress_at(now);
        if progress < 1.0 && now < self.next_tick_at() {
            return self.status;
        }

        let eased = if progress >= 1.0 {
            1.0
        } else {
            self.spec.easing.interpolate(progress, 0.0, 1.0)
        };
        (self.on_tick)(&self.params, eased, self.spec.duration, host);
        self.last_tick = Some(now);
        tracing::trace!(progress, "animation tick");

        if progress >= 1.0 {
            self.finish(false, host);
        }
        self.status
    }

    /// Runs the final progress-1 tick now and completes normally.
    pub fn complete(&mut self, host: &mut dyn ViewportHost) {
        if !self.is_running() {
            return;
        }

        (self.on_tick)(&self.params, 1.0, self.spec.duration, host);
        self.finish(false, host);
    }

    fn finish(&mut self, canceled: bool, host: &mut dyn ViewportHost) {
        self.status = AnimationStatus::Finished { canceled };
        tracing::trace!(canceled, "animation ended");

        if let Some(on_end) = self.on_end.take() {
            on_end(canceled, host);
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for Animation<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("params", &self.params)
            .field("spec", &self.spec)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};
    use tessera_viewer_core::{ScaleConfig, Size, Viewport};

    struct NullHost {
        viewport: Viewport,
        refreshes: Vec<bool>,
    }

    impl NullHost {
        fn new() -> Self {
            let viewport =
                Viewport::new(Size::new(100, 100), Size::new(200, 200), ScaleConfig::default())
                    .unwrap();
            Self { viewport, refreshes: Vec::new() }
        }
    }

    impl ViewportHost for NullHost {
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

    fn spec(can_be_canceled: bool) -> AnimationSpec {
        AnimationSpec {
            duration: Duration::from_millis(100),
            update_interval: Duration::from_millis(16),
            easing: Easing::EaseOutQuad,
            can_be_canceled,
        }
    }

    type Log = Arc<Mutex<Vec<f32>>>;

    fn recording(now: Instant, can_be_canceled: bool) -> (Animation<u32>, Log, Arc<Mutex<Vec<bool>>>) {
        let progress: Log = Arc::default();
        let ends: Arc<Mutex<Vec<bool>>> = Arc::default();

        let tick_log = Arc::clone(&progress);
        let end_log = Arc::clone(&ends);
        let animation = Animation::start(now, spec(can_be_canceled), || 7, move |params, p, _, _| {
            assert_eq!(*params, 7);
            tick_log.lock().unwrap().push(p);
        })
        .on_end(move |canceled, _| end_log.lock().unwrap().push(canceled));

        (animation, progress, ends)
    }

    #[test]
    fn runs_to_progress_one_and_ends_once() {
        let start = Instant::now();
        let mut host = NullHost::new();
        let (mut animation, progress, ends) = recording(start, true);

        let mut now = start;
        while animation.tick(now, &mut host) == AnimationStatus::Running {
            now += Duration::from_millis(16);
        }
        animation.tick(now + Duration::from_millis(50), &mut host);

        let progress = progress.lock().unwrap();
        assert_eq!(progress.first().copied(), Some(0.0));
        assert_eq!(progress.last().copied(), Some(1.0));
        assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(*ends.lock().unwrap(), vec![false]);
    }

    #[test]
    fn missed_frames_still_converge() {
        let start = Instant::now();
        let mut host = NullHost::new();
        let (mut animation, progress, _) = recording(start, true);

        animation.tick(start, &mut host);
        // The host stalls well past the duration.
        let status = animation.tick(start + Duration::from_secs(1), &mut host);

        assert_eq!(status, AnimationStatus::Finished { canceled: false });
        assert_eq!(*progress.lock().unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn ticks_inside_the_interval_are_skipped() {
        let start = Instant::now();
        let mut host = NullHost::new();
        let (mut animation, progress, _) = recording(start, true);

        animation.tick(start, &mut host);
        animation.tick(start + Duration::from_millis(5), &mut host);
        animation.tick(start + Duration::from_millis(16), &mut host);

        assert_eq!(progress.lock().unwrap().len(), 2);
    }

    #[test]
    fn cancel_respects_can_be_canceled() {
        let start = Instant::now();
        let mut host = NullHost::new();

        let (mut locked, _, locked_ends) = recording(start, false);
        assert!(!locked.cancel(&mut host));
        locked.token().cancel();
        assert_eq!(locked.tick(start, &mut host), AnimationStatus::Running);
        assert!(locked_ends.lock().unwrap().is_empty());

        let (mut open, progress, ends) = recording(start, true);
        assert!(open.cancel(&mut host));
        assert!(!open.cancel(&mut host));
        assert_eq!(open.status(), AnimationStatus::Finished { canceled: true });
        assert!(progress.lock().unwrap().is_empty());
        assert_eq!(*ends.lock().unwrap(), vec![true]);
    }

    #[test]
    fn token_cancels_on_next_tick() {
        let start = Instant::now();
        let mut host = NullHost::new();
        let (mut animation, _, ends) = recording(start, true);

        animation.token().cancel();
        let status = animation.tick(start + Duration::from_millis(20), &mut host);

        assert_eq!(status, AnimationStatus::Finished { canceled: true });
        assert_eq!(*ends.lock().unwrap(), vec![true]);
    }

    #[test]
    fn tick_callback_receives_eased_progress() {
        let start = Instant::now();
        let mut host = NullHost::new();
        let seen: Log = Arc::default();
        let log = Arc::clone(&seen);
        let spec = AnimationSpec { easing: Easing::EaseInOutQuad, ..spec(true) };
        let mut animation = Animation::start(start, spec, || (), move |_, p, _, _| {
            log.lock().unwrap().push(p);
        });

        animation.tick(start + Duration::from_millis(25), &mut host);
        animation.tick(start + Duration::from_millis(75), &mut host);
        animation.tick(start + Duration::from_millis(100), &mut host);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_relative_eq!(seen[0], 0.125, epsilon = 1e-5);
        assert_relative_eq!(seen[1], 0.875, epsilon = 1e-5);
        assert_eq!(seen[2], 1.0);
    }

    #[test]
    fn complete_jumps_to_the_end() {
        let start = Instant::now();
        let mut host = NullHost::new();
        let (mut animation, progress, ends) = recording(start, false);

        animation.complete(&mut host);
        animation.complete(&mut host);

        assert_eq!(*progress.lock().unwrap(), vec![1.0]);
        assert_eq!(*ends.lock().unwrap(), vec![false]);
        assert!(host.refreshes.is_empty());
    }
}
