use crate::geometry::Size;

/// Programmer errors in viewport configuration. These are raised eagerly at
/// the point the bad value enters the viewport so no later transform ever
/// divides by a zero dimension.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewportError {
    #[error("available size must be positive, got {0}")]
    InvalidAvailableSize(Size),

    #[error("source size must be positive, got {0}")]
    InvalidSourceSize(Size),

    #[error("custom minimum scale must be positive, got {0}")]
    InvalidCustomScale(f32),

    #[error("scale bounds are inverted: min {min} > max {max}")]
    InvertedScaleBounds { min: f32, max: f32 },
}

pub type Result<T> = std::result::Result<T, ViewportError>;
