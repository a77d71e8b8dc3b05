//! Viewport model for the tiled image engine.
//!
//! Geometry primitives, the source/view transform, scale policies and the
//! fit-to-bounds clamp. Everything here is plain data with no threading.

mod error;
mod geometry;
mod pan_info;
mod scale;
mod viewport;

pub use error::{Result, ViewportError};
pub use geometry::{Point, PointF, Rect, RectF, Size};
pub use pan_info::{Axis, PanInfo, DEFAULT_EDGE_TOLERANCE};
pub use scale::{
    DisplayMetrics, ScaleBounds, ScaleConfig, ScalePolicy, DEFAULT_DOUBLE_TAP_ZOOM_DPI,
    DEFAULT_MAX_SCALE, DEFAULT_MIN_DPI,
};
pub use viewport::{ScaleAndTranslate, Viewport, ViewportState};
