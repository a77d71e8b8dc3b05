//! Source/view coordinate mapping and the fit-to-bounds clamp.
//!
//! A [`Viewport`] owns the only mutable copy of the scale and translate. The
//! transform is `view = source * scale + translate`; every mutation that can
//! break the scale range or expose empty space is followed by
//! [`Viewport::fit_to_bounds`].

use crate::error::{Result, ViewportError};
use crate::geometry::{Point, PointF, Rect, RectF, Size};
use crate::pan_info::PanInfo;
use crate::scale::{ScaleBounds, ScaleConfig};
use tracing::debug;

/// Snapshot of the transform for renderers and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub scale: f32,
    pub translate: Point,
    pub available: Size,
    pub source: Size,
}

/// A candidate scale and float translate, the unit `fit` operates on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleAndTranslate {
    pub scale: f32,
    pub translate: PointF,
}

impl ScaleAndTranslate {
    pub fn new(scale: f32, translate: PointF) -> Self {
        Self { scale, translate }
    }
}

#[derive(Debug, Clone)]
pub struct Viewport {
    state: ViewportState,
    bounds: ScaleBounds,
    config: ScaleConfig,
    needs_initial_center: bool,
}

impl Viewport {
    /// Creates a viewport at the minimum scale. The first
    /// [`fit_to_bounds`](Self::fit_to_bounds) call centers the image.
    pub fn new(available: Size, source: Size, config: ScaleConfig) -> Result<Self> {
        if !available.is_positive() {
            return Err(ViewportError::InvalidAvailableSize(available));
        }
        if !source.is_positive() {
            return Err(ViewportError::InvalidSourceSize(source));
        }

        let bounds = config.resolve(available, source)?;
        debug!(
            %available,
            %source,
            min_scale = bounds.min,
            max_scale = bounds.max,
            "resolved scale bounds"
        );

        Ok(Self {
            state: ViewportState {
                scale: bounds.min,
                translate: Point::ZERO,
                available,
                source,
            },
            bounds,
            config,
            needs_initial_center: true,
        })
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn scale(&self) -> f32 {
        self.state.scale
    }

    pub fn translate(&self) -> Point {
        self.state.translate
    }

    pub fn available(&self) -> Size {
        self.state.available
    }

    pub fn source(&self) -> Size {
        self.state.source
    }

    pub fn bounds(&self) -> ScaleBounds {
        self.bounds
    }

    pub fn min_scale(&self) -> f32 {
        self.bounds.min
    }

    pub fn max_scale(&self) -> f32 {
        self.bounds.max
    }

    pub fn double_tap_zoom_scale(&self) -> f32 {
        self.bounds.double_tap
    }

    pub fn limited_scale(&self, scale: f32) -> f32 {
        self.bounds.clamp(scale)
    }

    /// Sets the scale without clamping. Callers restore the invariant with
    /// [`fit_to_bounds`](Self::fit_to_bounds).
    pub fn set_scale(&mut self, scale: f32) {
        self.state.scale = scale;
    }

    /// Sets the translate without clamping.
    pub fn set_translate(&mut self, translate: Point) {
        self.state.translate = translate;
    }

    pub fn offset_translate(&mut self, dx: i32, dy: i32) {
        self.state.translate.x += dx;
        self.state.translate.y += dy;
    }

    /// Re-derives the scale range for a new view size, keeping the source
    /// point at the viewport center where it was.
    pub fn resize(&mut self, available: Size) -> Result<()> {
        if !available.is_positive() {
            return Err(ViewportError::InvalidAvailableSize(available));
        }

        let center = self.center();
        self.bounds = self.config.resolve(available, self.state.source)?;
        self.state.available = available;
        debug!(%available, min_scale = self.bounds.min, "viewport resized");

        let scale = self.bounds.clamp(self.state.scale);
        self.set_scale_and_center(scale, center);
        Ok(())
    }

    pub fn source_to_view_x(&self, sx: f32) -> f32 {
        sx * self.state.scale + self.state.translate.x as f32
    }

    pub fn source_to_view_y(&self, sy: f32) -> f32 {
        sy * self.state.scale + self.state.translate.y as f32
    }

    pub fn view_to_source_x(&self, vx: f32) -> f32 {
        (vx - self.state.translate.x as f32) / self.state.scale
    }

    pub fn view_to_source_y(&self, vy: f32) -> f32 {
        (vy - self.state.translate.y as f32) / self.state.scale
    }

    pub fn source_to_view(&self, point: PointF) -> PointF {
        PointF::new(self.source_to_view_x(point.x), self.source_to_view_y(point.y))
    }

    pub fn view_to_source(&self, point: PointF) -> PointF {
        PointF::new(self.view_to_source_x(point.x), self.view_to_source_y(point.y))
    }

    /// View-space rect of a source rect, truncated to whole pixels.
    pub fn source_to_view_rect(&self, rect: Rect) -> Rect {
        Rect::new(
            self.source_to_view_x(rect.left as f32) as i32,
            self.source_to_view_y(rect.top as f32) as i32,
            self.source_to_view_x(rect.right as f32) as i32,
            self.source_to_view_y(rect.bottom as f32) as i32,
        )
    }

    /// Source-space region covered by the viewport corners.
    pub fn visible_source_rect(&self) -> RectF {
        let available = self.state.available;
        RectF::new(
            self.view_to_source_x(0.0),
            self.view_to_source_y(0.0),
            self.view_to_source_x(available.width as f32),
            self.view_to_source_y(available.height as f32),
        )
    }

    /// Source point under the viewport center.
    pub fn center(&self) -> PointF {
        let available = self.state.available;
        self.view_to_source(PointF::new(
            (available.width / 2) as f32,
            (available.height / 2) as f32,
        ))
    }

    /// Clamps a candidate scale and translate without touching the viewport.
    ///
    /// With `center` the scaled image may not leave empty space on a side it
    /// could cover, and an image narrower than the view is centered on that
    /// axis. Without it the image only has to keep some part on screen.
    pub fn fit(&self, center: bool, candidate: ScaleAndTranslate) -> ScaleAndTranslate {
        let available = self.state.available;
        let source = self.state.source;
        let available_width = available.width as f32;
        let available_height = available.height as f32;

        let scale = self.bounds.clamp(candidate.scale);
        let scaled_width = scale * source.width as f32;
        let scaled_height = scale * source.height as f32;
        let mut translate = candidate.translate;

        let (max_tx, max_ty) = if center {
            translate.x = translate.x.max(available_width - scaled_width);
            translate.y = translate.y.max(available_height - scaled_height);
            (
                ((available_width - scaled_width) * 0.5).max(0.0),
                ((available_height - scaled_height) * 0.5).max(0.0),
            )
        } else {
            translate.x = translate.x.max(-scaled_width);
            translate.y = translate.y.max(-scaled_height);
            (available_width.max(0.0), available_height.max(0.0))
        };

        translate.x = translate.x.min(max_tx);
        translate.y = translate.y.min(max_ty);

        ScaleAndTranslate { scale, translate }
    }

    /// Applies [`fit`](Self::fit) to the live state. The very first call
    /// after construction also centers the image.
    pub fn fit_to_bounds(&mut self, center: bool) {
        let fitted = self.fit(
            center,
            ScaleAndTranslate::new(self.state.scale, self.state.translate.to_f32()),
        );

        self.state.scale = fitted.scale;
        self.state.translate = Point::truncate(fitted.translate);

        if self.needs_initial_center {
            self.needs_initial_center = false;

            let source = self.state.source;
            let middle = PointF::new((source.width / 2) as f32, (source.height / 2) as f32);
            let translate = self.translate_for_source_center(middle, self.state.scale);
            self.state.translate = Point::truncate(translate);
        }
    }

    /// Fitted translate that puts `source_center` in the middle of the view
    /// at `scale`.
    pub fn translate_for_source_center(&self, source_center: PointF, scale: f32) -> PointF {
        let available = self.state.available;
        let view_center_x = (available.width / 2) as f32;
        let view_center_y = (available.height / 2) as f32;

        let candidate = ScaleAndTranslate::new(
            scale,
            PointF::new(
                view_center_x - source_center.x * scale,
                view_center_y - source_center.y * scale,
            ),
        );

        self.fit(true, candidate).translate
    }

    /// Closest reachable source center to `source_center` at `scale`.
    pub fn limited_source_center(&self, source_center: PointF, scale: f32) -> PointF {
        let available = self.state.available;
        let translate = self.translate_for_source_center(source_center, scale);

        PointF::new(
            ((available.width / 2) as f32 - translate.x) / scale,
            ((available.height / 2) as f32 - translate.y) / scale,
        )
    }

    /// Jumps to `scale` (clamped) with `source_center` as close to the
    /// viewport center as the bounds allow.
    pub fn set_scale_and_center(&mut self, scale: f32, source_center: PointF) {
        let scale = self.bounds.clamp(scale);
        let translate = self.translate_for_source_center(source_center, scale);

        self.state.scale = scale;
        self.state.translate = Point::truncate(translate);
        self.needs_initial_center = false;
    }

    pub fn pan_info(&self) -> PanInfo {
        let available = self.state.available;
        let source = self.state.source;

        PanInfo::new(
            self.source_to_view_x(0.0),
            self.source_to_view_y(0.0),
            self.source_to_view_x(source.width as f32) - available.width as f32,
            self.source_to_view_y(source.height as f32) - available.height as f32,
        )
    }
}
