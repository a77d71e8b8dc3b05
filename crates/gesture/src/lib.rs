//! Gesture recognition and animation for the tiled image viewport.
//!
//! Pointer events go through a [`GestureArbiter`], which decides between a
//! pan (with fling) and a double-tap quick zoom and feeds the winning
//! [`GestureDetector`]. Detectors mutate the viewport through a
//! [`ViewportHost`] and animate with the poll-driven [`Animation`].

mod animation;
mod arbiter;
mod config;
mod detector;
mod easing;
mod host;
mod motion;
mod pan;
mod velocity;
mod zoom;

pub use animation::{Animation, AnimationSpec, AnimationStatus};
pub use arbiter::{Arbitration, GestureArbiter, PointerEvent, PointerId};
pub use config::GestureConfig;
pub use detector::{DetectorResponse, GestureAction, GestureDetector, GestureInput, GestureKind};
pub use easing::Easing;
pub use host::ViewportHost;
pub use motion::ViewMotion;
pub use pan::PanDetector;
pub use velocity::VelocityTracker;
pub use zoom::ZoomDetector;
