//! Engine configuration.
//!
//! Every knob a host can turn lives in [`EngineConfig`]. It can be built in
//! code, read from a TOML file, or overlaid from `TESSERA_*` environment
//! variables. Values are checked by [`EngineConfig::validate`] before an
//! engine accepts them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tessera_gesture::GestureConfig;
use tessera_scheduler::DecodePoolConfig;
use tessera_viewer_core::{Axis, DisplayMetrics, ScaleConfig, ScalePolicy, Size};

/// Tile size used for [`MaxTileSize::Auto`] when the host reports no limit.
pub const DEFAULT_MAX_TILE_SIZE: i32 = 2048;

/// Upper bound for decoded tile bitmaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxTileSize {
    /// Square limit in pixels.
    Fixed(u32),
    /// Whatever the host canvas supports.
    #[default]
    Auto,
}

impl MaxTileSize {
    /// Resolves against the host canvas limit, if the host knows one.
    pub fn resolve(&self, canvas_limit: Option<Size>) -> Size {
        match *self {
            MaxTileSize::Fixed(side) => {
                let side = i32::try_from(side).unwrap_or(i32::MAX);
                Size::new(side, side)
            }
            MaxTileSize::Auto => canvas_limit
                .filter(|limit| limit.is_positive())
                .unwrap_or(Size::new(DEFAULT_MAX_TILE_SIZE, DEFAULT_MAX_TILE_SIZE)),
        }
    }
}

impl FromStr for MaxTileSize {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("auto") {
            return Ok(MaxTileSize::Auto);
        }
        value.parse().map(MaxTileSize::Fixed)
    }
}

/// Physical screen density in dots per inch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenDpi {
    pub x: f32,
    pub y: f32,
}

impl Default for ScreenDpi {
    fn default() -> Self {
        let metrics = DisplayMetrics::default();
        Self { x: metrics.xdpi, y: metrics.ydpi }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scroll axis of an enclosing container, if the viewport lives in one.
    pub scroll_container_axis: Option<Axis>,

    pub min_fling_distance_px: f32,
    pub min_fling_velocity_px_per_sec: f32,

    /// Maximum gap between the taps of a double tap.
    pub quick_zoom_timeout_ms: u64,
    pub quick_zoom_duration_ms: u64,
    pub fling_duration_ms: u64,
    pub animation_update_interval_ms: u64,

    pub min_scale_override: Option<f32>,
    pub max_scale_override: Option<f32>,
    pub double_tap_zoom_scale_override: Option<f32>,
    pub scale_policy: ScalePolicy,

    /// Tile DPI the maximum scale is derived from.
    pub min_dpi: u32,
    pub double_tap_zoom_dpi: u32,
    /// Lowest acceptable DPI for decoded tiles. Lower values decode coarser
    /// levels on dense screens.
    pub min_tile_dpi: Option<u32>,

    pub max_tile_size: MaxTileSize,
    /// Decode threads. Defaults to the available parallelism.
    pub decode_threads: Option<usize>,

    /// Logical-to-physical pixel multiplier for dp thresholds.
    pub density: f32,
    pub dpi: ScreenDpi,

    /// Emit per-tile debug events.
    pub debug: bool,
    /// Attached to log spans so several engines can be told apart.
    pub debug_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let scale = ScaleConfig::default();
        let gesture = GestureConfig::default();

        Self {
            scroll_container_axis: None,
            min_fling_distance_px: gesture.min_fling_distance_px,
            min_fling_velocity_px_per_sec: gesture.min_fling_velocity_px_per_sec,
            quick_zoom_timeout_ms: millis(gesture.quick_zoom_timeout),
            quick_zoom_duration_ms: millis(gesture.quick_zoom_duration),
            fling_duration_ms: millis(gesture.fling_duration),
            animation_update_interval_ms: millis(gesture.update_interval),
            min_scale_override: None,
            max_scale_override: None,
            double_tap_zoom_scale_override: None,
            scale_policy: ScalePolicy::default(),
            min_dpi: scale.min_dpi,
            double_tap_zoom_dpi: scale.double_tap_zoom_dpi,
            min_tile_dpi: None,
            max_tile_size: MaxTileSize::default(),
            decode_threads: None,
            density: gesture.density,
            dpi: ScreenDpi::default(),
            debug: false,
            debug_key: String::new(),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl EngineConfig {
    pub fn with_scroll_container_axis(mut self, axis: Axis) -> Self {
        self.scroll_container_axis = Some(axis);
        self
    }

    pub fn with_scale_policy(mut self, policy: ScalePolicy) -> Self {
        self.scale_policy = policy;
        self
    }

    pub fn with_min_scale(mut self, scale: f32) -> Self {
        self.min_scale_override = Some(scale);
        self
    }

    pub fn with_max_scale(mut self, scale: f32) -> Self {
        self.max_scale_override = Some(scale);
        self
    }

    pub fn with_double_tap_zoom_scale(mut self, scale: f32) -> Self {
        self.double_tap_zoom_scale_override = Some(scale);
        self
    }

    pub fn with_max_tile_size(mut self, max_tile_size: MaxTileSize) -> Self {
        self.max_tile_size = max_tile_size;
        self
    }

    pub fn with_min_tile_dpi(mut self, dpi: u32) -> Self {
        self.min_tile_dpi = Some(dpi);
        self
    }

    pub fn with_decode_threads(mut self, threads: usize) -> Self {
        self.decode_threads = Some(threads);
        self
    }

    /// Sets the tick interval from the display refresh rate.
    pub fn with_refresh_rate(mut self, hz: u32) -> Self {
        self.animation_update_interval_ms = 1000 / u64::from(hz.max(1));
        self
    }

    pub fn with_display(mut self, density: f32, dpi: ScreenDpi) -> Self {
        self.density = density;
        self.dpi = dpi;
        self
    }

    pub fn with_debug(mut self, debug_key: impl Into<String>) -> Self {
        self.debug = true;
        self.debug_key = debug_key.into();
        self
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.animation_update_interval_ms)
    }

    pub fn display_metrics(&self) -> DisplayMetrics {
        DisplayMetrics { xdpi: self.dpi.x, ydpi: self.dpi.y, density: self.density }
    }

    pub fn scale_config(&self) -> ScaleConfig {
        ScaleConfig {
            policy: self.scale_policy,
            min_scale_override: self.min_scale_override,
            max_scale_override: self.max_scale_override,
            double_tap_zoom_scale_override: self.double_tap_zoom_scale_override,
            min_dpi: self.min_dpi,
            double_tap_zoom_dpi: self.double_tap_zoom_dpi,
            metrics: self.display_metrics(),
        }
    }

    pub fn gesture_config(&self) -> GestureConfig {
        GestureConfig {
            density: self.density,
            scroll_container_axis: self.scroll_container_axis,
            min_fling_distance_px: self.min_fling_distance_px,
            min_fling_velocity_px_per_sec: self.min_fling_velocity_px_per_sec,
            quick_zoom_timeout: Duration::from_millis(self.quick_zoom_timeout_ms),
            quick_zoom_duration: Duration::from_millis(self.quick_zoom_duration_ms),
            fling_duration: Duration::from_millis(self.fling_duration_ms),
            update_interval: self.update_interval(),
            ..GestureConfig::default()
        }
    }

    pub fn pool_config(&self) -> DecodePoolConfig {
        match self.decode_threads {
            Some(threads) => DecodePoolConfig::new(threads),
            None => DecodePoolConfig::default(),
        }
    }

    /// Checks ranges the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(key: &str, value: impl fmt::Display) -> ConfigError {
            ConfigError::Invalid { key: key.to_string(), value: value.to_string() }
        }

        let durations = [
            ("quick_zoom_duration_ms", self.quick_zoom_duration_ms),
            ("fling_duration_ms", self.fling_duration_ms),
            ("animation_update_interval_ms", self.animation_update_interval_ms),
        ];
        for (key, value) in durations {
            if value == 0 {
                return Err(invalid(key, value));
            }
        }

        let scales = [
            ("min_scale_override", self.min_scale_override),
            ("max_scale_override", self.max_scale_override),
            ("double_tap_zoom_scale_override", self.double_tap_zoom_scale_override),
        ];
        for (key, value) in scales {
            if let Some(scale) = value {
                if !(scale.is_finite() && scale > 0.0) {
                    return Err(invalid(key, scale));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_scale_override, self.max_scale_override) {
            if min > max {
                return Err(invalid("min_scale_override", format!("{min} > max {max}")));
            }
        }

        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(invalid("density", self.density));
        }
        if !(self.dpi.x > 0.0 && self.dpi.y > 0.0) {
            return Err(invalid("dpi", format!("{}x{}", self.dpi.x, self.dpi.y)));
        }
        if self.max_tile_size == MaxTileSize::Fixed(0) {
            return Err(invalid("max_tile_size", 0));
        }
        if self.decode_threads == Some(0) {
            return Err(invalid("decode_threads", 0));
        }

        Ok(())
    }

    /// Overlays `TESSERA_*` environment variables on the defaults.
    ///
    /// - `TESSERA_MAX_TILE_SIZE`: pixels or `auto`
    /// - `TESSERA_DECODE_THREADS`
    /// - `TESSERA_MIN_TILE_DPI`
    /// - `TESSERA_SCROLL_AXIS`: `horizontal` or `vertical`
    /// - `TESSERA_QUICK_ZOOM_TIMEOUT_MS`, `TESSERA_QUICK_ZOOM_DURATION_MS`,
    ///   `TESSERA_FLING_DURATION_MS`
    /// - `TESSERA_DENSITY`
    /// - `TESSERA_DEBUG`: `true`/`false`/`1`/`0`
    /// - `TESSERA_DEBUG_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = env_value::<MaxTileSize>("TESSERA_MAX_TILE_SIZE")? {
            config.max_tile_size = value;
        }
        if let Some(value) = env_value("TESSERA_DECODE_THREADS")? {
            config.decode_threads = Some(value);
        }
        if let Some(value) = env_value("TESSERA_MIN_TILE_DPI")? {
            config.min_tile_dpi = Some(value);
        }
        if let Some(raw) = env_raw("TESSERA_SCROLL_AXIS") {
            config.scroll_container_axis = Some(match raw.to_ascii_lowercase().as_str() {
                "horizontal" => Axis::Horizontal,
                "vertical" => Axis::Vertical,
                _ => return Err(ConfigError::Invalid { key: "TESSERA_SCROLL_AXIS".into(), value: raw }),
            });
        }
        if let Some(value) = env_value("TESSERA_QUICK_ZOOM_TIMEOUT_MS")? {
            config.quick_zoom_timeout_ms = value;
        }
        if let Some(value) = env_value("TESSERA_QUICK_ZOOM_DURATION_MS")? {
            config.quick_zoom_duration_ms = value;
        }
        if let Some(value) = env_value("TESSERA_FLING_DURATION_MS")? {
            config.fling_duration_ms = value;
        }
        if let Some(value) = env_value("TESSERA_DENSITY")? {
            config.density = value;
        }
        if let Some(raw) = env_raw("TESSERA_DEBUG") {
            config.debug = match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::Invalid { key: "TESSERA_DEBUG".into(), value: raw }),
            };
        }
        if let Some(raw) = env_raw("TESSERA_DEBUG_KEY") {
            config.debug_key = raw;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document. Missing keys keep their defaults.
    ///
    /// ```toml
    /// scroll_container_axis = "horizontal"
    /// scale_policy = "center_crop"
    /// max_tile_size = { fixed = 1024 }
    /// fling_duration_ms = 300
    /// ```
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }
}

fn env_raw(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|value| value.trim().to_string())
}

fn env_value<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env_raw(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key: key.to_string(), value: raw }),
        None => Ok(None),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },

    #[error("config I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
