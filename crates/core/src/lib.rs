//! Tiled image viewer engine.
//!
//! [`ImageEngine`] ties the pieces together for one image: the viewport
//! transform, the tile pyramid and its decode scheduler, and the pan/zoom
//! gestures with their animations. The host supplies a decoder, a view
//! size, pointer events and frame ticks, and paints the tiles it gets back.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_core::{EngineConfig, ImageEngine};
//! use tessera_render::{FileSource, RasterRegionDecoder, RegionDecoder};
//! use tessera_viewer_core::Size;
//!
//! let provider = || Arc::new(RasterRegionDecoder::new()) as Arc<dyn RegionDecoder>;
//! let mut engine = ImageEngine::new(EngineConfig::default(), provider)?;
//! engine.set_available_size(Size::new(1280, 720))?;
//! engine.initialize(&FileSource::new("photo.jpg"))?;
//!
//! for tile in engine.drawable_tiles() {
//!     println!("{} -> {:?}", tile.id, tile.screen_rect);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
mod session;

pub use config::{ConfigError, EngineConfig, MaxTileSize, ScreenDpi, DEFAULT_MAX_TILE_SIZE};
pub use engine::{ImageEngine, InitializationHandle, InitializationState};
pub use error::{EngineError, InitializationError, Result};

pub use tessera_gesture::{Arbitration, GestureKind, PointerEvent, PointerId};
pub use tessera_scheduler::{DrawableTile, EventListener, NoopListener, RedrawSignal};
