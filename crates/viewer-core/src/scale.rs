//! Scale policy and DPI-derived scale values.

use crate::error::{Result, ViewportError};
use crate::geometry::Size;
use serde::{Deserialize, Serialize};

/// Used when the display DPI is unknown or the target DPI is disabled.
pub const DEFAULT_MAX_SCALE: f32 = 2.0;
pub const DEFAULT_MIN_DPI: u32 = 160;
pub const DEFAULT_DOUBLE_TAP_ZOOM_DPI: u32 = 160;

/// How the minimum scale is derived from the source and available sizes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalePolicy {
    /// Whole image visible, letterboxed on one axis.
    #[default]
    CenterInside,
    /// Viewport fully covered, overflow cropped on one axis.
    CenterCrop,
    FitWidth,
    FitHeight,
    OriginalSize,
    /// Fit width for portrait sources, fit height otherwise.
    SmartFit,
    /// Explicit minimum scale. Non-positive values fall back to center-inside.
    Custom(f32),
}

impl ScalePolicy {
    pub fn min_scale(&self, available: Size, source: Size) -> Result<f32> {
        if !available.is_positive() {
            return Err(ViewportError::InvalidAvailableSize(available));
        }
        if !source.is_positive() {
            return Err(ViewportError::InvalidSourceSize(source));
        }

        let width_ratio = available.width as f32 / source.width as f32;
        let height_ratio = available.height as f32 / source.height as f32;

        let scale = match *self {
            ScalePolicy::CenterInside => width_ratio.min(height_ratio),
            ScalePolicy::CenterCrop => width_ratio.max(height_ratio),
            ScalePolicy::FitWidth => width_ratio,
            ScalePolicy::FitHeight => height_ratio,
            ScalePolicy::OriginalSize => 1.0,
            ScalePolicy::SmartFit => {
                if source.height > source.width {
                    width_ratio
                } else {
                    height_ratio
                }
            }
            ScalePolicy::Custom(value) if value > 0.0 => value,
            ScalePolicy::Custom(_) => width_ratio.min(height_ratio),
        };

        Ok(scale)
    }
}

/// Physical display density as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayMetrics {
    pub xdpi: f32,
    pub ydpi: f32,
    /// Logical-to-physical pixel multiplier used for dp thresholds.
    pub density: f32,
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        Self { xdpi: 160.0, ydpi: 160.0, density: 1.0 }
    }
}

impl DisplayMetrics {
    pub fn average_dpi(&self) -> f32 {
        (self.xdpi + self.ydpi) / 2.0
    }

    /// Converts density-independent pixels to view pixels.
    pub fn dp_to_px(&self, dp: f32) -> f32 {
        dp * self.density
    }

    /// `average_dpi / target_dpi`, or [`DEFAULT_MAX_SCALE`] when either side
    /// is unusable.
    pub fn max_scale_for_dpi(&self, target_dpi: u32) -> f32 {
        let average = self.average_dpi();
        if target_dpi == 0 || average <= 0.0 {
            return DEFAULT_MAX_SCALE;
        }
        average / target_dpi as f32
    }

    /// Effective minimum tile DPI, never above the screen's own DPI. Zero
    /// disables the sample-size adjustment.
    pub fn min_tile_dpi(&self, configured: Option<u32>) -> u32 {
        match configured {
            Some(dpi) if dpi > 0 => self.average_dpi().min(dpi as f32).max(0.0) as u32,
            _ => 0,
        }
    }
}

/// Inclusive `[min, max]` scale range plus the double-tap target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleBounds {
    pub min: f32,
    pub max: f32,
    pub double_tap: f32,
}

impl ScaleBounds {
    pub fn new(min: f32, max: f32, double_tap: f32) -> Result<Self> {
        if min > max {
            return Err(ViewportError::InvertedScaleBounds { min, max });
        }
        Ok(Self { min, max, double_tap })
    }

    pub fn clamp(&self, scale: f32) -> f32 {
        scale.max(self.min).min(self.max)
    }
}

/// Inputs needed to resolve [`ScaleBounds`] for a concrete source and view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    pub policy: ScalePolicy,
    pub min_scale_override: Option<f32>,
    pub max_scale_override: Option<f32>,
    pub double_tap_zoom_scale_override: Option<f32>,
    pub min_dpi: u32,
    pub double_tap_zoom_dpi: u32,
    pub metrics: DisplayMetrics,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            policy: ScalePolicy::default(),
            min_scale_override: None,
            max_scale_override: None,
            double_tap_zoom_scale_override: None,
            min_dpi: DEFAULT_MIN_DPI,
            double_tap_zoom_dpi: DEFAULT_DOUBLE_TAP_ZOOM_DPI,
            metrics: DisplayMetrics::default(),
        }
    }
}

impl ScaleConfig {
    pub fn resolve(&self, available: Size, source: Size) -> Result<ScaleBounds> {
        let min = match self.min_scale_override {
            Some(value) if value > 0.0 => value,
            Some(value) => return Err(ViewportError::InvalidCustomScale(value)),
            None => self.policy.min_scale(available, source)?,
        };

        // A derived maximum never undercuts the fitted minimum; only two
        // explicit overrides can conflict.
        let max = match self.max_scale_override {
            Some(value) => value,
            None => self.metrics.max_scale_for_dpi(self.min_dpi).max(min),
        };

        let double_tap = self
            .double_tap_zoom_scale_override
            .unwrap_or_else(|| self.metrics.max_scale_for_dpi(self.double_tap_zoom_dpi));

        ScaleBounds::new(min, max, double_tap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const VIEW: Size = Size::new(1000, 800);
    const LANDSCAPE: Size = Size::new(4000, 3000);
    const PORTRAIT: Size = Size::new(1000, 4000);

    #[test]
    fn center_inside_takes_smaller_ratio() {
        let scale = ScalePolicy::CenterInside.min_scale(VIEW, LANDSCAPE).unwrap();
        assert_relative_eq!(scale, 0.25);
    }

    #[test]
    fn center_crop_takes_larger_ratio() {
        let scale = ScalePolicy::CenterCrop.min_scale(VIEW, LANDSCAPE).unwrap();
        assert_relative_eq!(scale, 800.0 / 3000.0);
    }

    #[test]
    fn smart_fit_depends_on_orientation() {
        assert_relative_eq!(ScalePolicy::SmartFit.min_scale(VIEW, PORTRAIT).unwrap(), 1.0);
        assert_relative_eq!(
            ScalePolicy::SmartFit.min_scale(VIEW, LANDSCAPE).unwrap(),
            800.0 / 3000.0
        );
    }

    #[test]
    fn custom_policy_falls_back_when_not_positive() {
        assert_relative_eq!(ScalePolicy::Custom(0.7).min_scale(VIEW, LANDSCAPE).unwrap(), 0.7);
        assert_relative_eq!(ScalePolicy::Custom(-1.0).min_scale(VIEW, LANDSCAPE).unwrap(), 0.25);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert_eq!(
            ScalePolicy::FitWidth.min_scale(Size::new(0, 800), LANDSCAPE),
            Err(ViewportError::InvalidAvailableSize(Size::new(0, 800)))
        );
        assert_eq!(
            ScalePolicy::FitWidth.min_scale(VIEW, Size::new(10, -1)),
            Err(ViewportError::InvalidSourceSize(Size::new(10, -1)))
        );
    }

    #[test]
    fn max_scale_derives_from_dpi() {
        let metrics = DisplayMetrics { xdpi: 480.0, ydpi: 480.0, density: 3.0 };
        assert_relative_eq!(metrics.max_scale_for_dpi(160), 3.0);
        assert_relative_eq!(metrics.max_scale_for_dpi(0), DEFAULT_MAX_SCALE);
    }

    #[test]
    fn min_tile_dpi_is_capped_by_screen() {
        let metrics = DisplayMetrics { xdpi: 240.0, ydpi: 240.0, density: 1.5 };
        assert_eq!(metrics.min_tile_dpi(Some(320)), 240);
        assert_eq!(metrics.min_tile_dpi(Some(120)), 120);
        assert_eq!(metrics.min_tile_dpi(None), 0);
    }

    #[test]
    fn derived_max_scale_never_undercuts_min() {
        let bounds = ScaleConfig::default().resolve(VIEW, Size::new(100, 100)).unwrap();
        assert_relative_eq!(bounds.min, 8.0);
        assert_relative_eq!(bounds.max, 8.0);
    }

    #[test]
    fn inverted_overrides_fail_fast() {
        let config = ScaleConfig {
            min_scale_override: Some(4.0),
            max_scale_override: Some(1.0),
            ..ScaleConfig::default()
        };

        assert_eq!(
            config.resolve(VIEW, LANDSCAPE),
            Err(ViewportError::InvertedScaleBounds { min: 4.0, max: 1.0 })
        );
    }
}
