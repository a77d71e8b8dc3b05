//! Tile decode scheduling.
//!
//! Decides which tiles of a pyramid should be visible for a viewport,
//! dispatches their decodes to a pool of worker threads, and reports
//! progress through an [`EventListener`] and a [`RedrawSignal`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessera_render::{build_pyramid, RasterRegionDecoder, SampleSizeCalculator};
//! use tessera_scheduler::{NoopListener, SchedulerConfig, TileScheduler};
//! use tessera_viewer_core::{ScaleConfig, Size, Viewport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Size::new(4000, 3000);
//! let view = Size::new(1000, 800);
//! let mut viewport = Viewport::new(view, source, ScaleConfig::default())?;
//! viewport.fit_to_bounds(true);
//!
//! let calculator = SampleSizeCalculator::default();
//! let full = calculator.full_image_sample_size(source, viewport.min_scale());
//! let pyramid = build_pyramid(source, Size::new(2048, 2048), view, full)?;
//!
//! let decoder = Arc::new(RasterRegionDecoder::new());
//! let scheduler = TileScheduler::new(
//!     pyramid,
//!     decoder,
//!     calculator,
//!     Arc::new(NoopListener),
//!     SchedulerConfig::default(),
//! )?;
//!
//! scheduler.load_blocking();
//! scheduler.refresh(&viewport, true);
//! # Ok(())
//! # }
//! ```

mod batch;
mod cancel;
mod error;
mod events;
mod priority;
mod tile_scheduler;
mod worker;

pub use batch::LoadBatch;
pub use cancel::{CancellationRegistry, CancellationToken, JobId};
pub use error::{Result, SchedulerError};
pub use events::{EventListener, NoopListener, RedrawSignal};
pub use priority::{DecodeJob, DecodePriority, DecodeQueue, Pop};
pub use tile_scheduler::{DrawableTile, RefreshOutcome, SchedulerConfig, TileScheduler};
pub use worker::{DecodePool, DecodePoolConfig, JobExecutor};
