use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tessera_viewer_core::PointF;

const HORIZON: Duration = Duration::from_millis(100);
const MAX_SAMPLES: usize = 20;

/// Estimates pointer velocity from recent position samples.
///
/// Fits a straight line through the samples of the last 100 ms on each axis
/// and reports its slope in pixels per second.
#[derive(Debug, Clone, Default)]
pub struct VelocityTracker {
    samples: VecDeque<(Instant, PointF)>,
}

impl VelocityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, time: Instant, position: PointF) {
        if self.samples.len() == MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back((time, position));
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn velocity(&self) -> PointF {
        let Some(&(latest, _)) = self.samples.back() else {
            return PointF::ZERO;
        };

        let recent: Vec<(f32, PointF)> = self
            .samples
            .iter()
            .filter(|(time, _)| latest.saturating_duration_since(*time) <= HORIZON)
            .map(|(time, position)| {
                (-latest.saturating_duration_since(*time).as_secs_f32(), *position)
            })
            .collect();

        if recent.len() < 2 {
            return PointF::ZERO;
        }

        PointF::new(
            slope(recent.iter().map(|(t, p)| (*t, p.x))),
            slope(recent.iter().map(|(t, p)| (*t, p.y))),
        )
    }
}

fn slope(points: impl Iterator<Item = (f32, f32)> + Clone) -> f32 {
    let n = points.clone().count() as f32;
    let mean_t = points.clone().map(|(t, _)| t).sum::<f32>() / n;
    let mean_v = points.clone().map(|(_, v)| v).sum::<f32>() / n;

    let (covariance, variance) = points.fold((0.0, 0.0), |(cov, var), (t, v)| {
        let dt = t - mean_t;
        (cov + dt * (v - mean_v), var + dt * dt)
    });

    if variance <= f32::EPSILON {
        0.0
    } else {
        covariance / variance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn straight_drag_reports_constant_speed() {
        let start = Instant::now();
        let mut tracker = VelocityTracker::new();
        for step in 0..=5 {
            let time = start + Duration::from_millis(10 * step);
            tracker.add(time, PointF::new(100.0, 100.0 + 40.0 * step as f32));
        }

        let velocity = tracker.velocity();
        assert_relative_eq!(velocity.x, 0.0);
        assert_relative_eq!(velocity.y, 4000.0, max_relative = 1e-3);
    }

    #[test]
    fn old_samples_are_ignored() {
        let start = Instant::now();
        let mut tracker = VelocityTracker::new();
        tracker.add(start, PointF::new(0.0, 0.0));
        tracker.add(start + Duration::from_millis(500), PointF::new(0.0, 0.0));
        tracker.add(start + Duration::from_millis(550), PointF::new(100.0, 0.0));

        assert_relative_eq!(tracker.velocity().x, 2000.0, max_relative = 1e-3);
    }

    #[test]
    fn single_sample_has_no_velocity() {
        let mut tracker = VelocityTracker::new();
        tracker.add(Instant::now(), PointF::new(3.0, 4.0));
        assert_eq!(tracker.velocity(), PointF::ZERO);

        tracker.reset();
        assert_eq!(tracker.velocity(), PointF::ZERO);
    }
}
