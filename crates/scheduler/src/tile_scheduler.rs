//! Visibility computation and decode dispatch for a tile pyramid.
//!
//! [`TileScheduler::refresh`] runs on the interactive thread after every
//! viewport change. It recycles tiles that are no longer useful, marks the
//! tiles of the current sample size visible when they touch the viewport,
//! and queues the ones without pixels on the decode pool. Decode results are
//! written back through the tile's generation-checked transition, so a
//! completion that raced with a recycle is dropped.

use crate::batch::LoadBatch;
use crate::cancel::{CancellationRegistry, JobId};
use crate::error::Result;
use crate::events::{EventListener, RedrawSignal};
use crate::priority::{DecodeJob, DecodePriority, DecodeQueue};
use crate::worker::{DecodePool, DecodePoolConfig, JobExecutor};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tessera_render::{
    Bitmap, Completion, DecodeError, LoadTicket, RegionDecoder, SampleSizeCalculator, Tile,
    TileId, TilePyramid,
};
use tessera_viewer_core::{Rect, Viewport};

/// Scheduler options.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    pub pool: DecodePoolConfig,
    /// Emit per-tile events on the `tile.debug` target.
    pub debug: bool,
    /// Bumped after every decode completion.
    pub redraw: RedrawSignal,
}

/// What one refresh pass decided.
#[derive(Debug, Clone, Default)]
pub struct RefreshOutcome {
    pub sample_size: u32,
    /// Visible tiles at the current sample size.
    pub visible: usize,
    pub recycled: usize,
    pub cancelled: usize,
    /// Batch of dispatched decodes, when loading was requested.
    pub batch: Option<Arc<LoadBatch>>,
}

impl RefreshOutcome {
    pub fn dispatched(&self) -> usize {
        self.batch.as_ref().map_or(0, |batch| batch.total())
    }
}

/// A loaded tile ready to be composed by the host renderer.
#[derive(Debug, Clone)]
pub struct DrawableTile {
    pub id: TileId,
    /// View-space destination, recomputed from the current viewport.
    pub screen_rect: Rect,
    pub source_rect: Rect,
    pub bitmap: Arc<Bitmap>,
}

#[derive(Debug, Clone)]
struct JobTag {
    tile: Arc<Tile>,
    ticket: LoadTicket,
    priority: DecodePriority,
}

struct Shared {
    decoder: Arc<dyn RegionDecoder>,
    registry: CancellationRegistry<JobTag>,
    redraw: RedrawSignal,
    debug: bool,
}

pub struct TileScheduler {
    pyramid: Arc<TilePyramid>,
    calculator: SampleSizeCalculator,
    listener: Arc<dyn EventListener>,
    shared: Arc<Shared>,
    queue: Arc<DecodeQueue>,
    pool: Mutex<Option<DecodePool>>,
    next_job_id: AtomicU64,
}

impl TileScheduler {
    /// Start the decode pool for `pyramid`.
    pub fn new(
        pyramid: TilePyramid,
        decoder: Arc<dyn RegionDecoder>,
        calculator: SampleSizeCalculator,
        listener: Arc<dyn EventListener>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            decoder,
            registry: CancellationRegistry::new(),
            redraw: config.redraw,
            debug: config.debug,
        });
        let queue = Arc::new(DecodeQueue::new());

        let worker_shared = Arc::clone(&shared);
        let executor: JobExecutor = Arc::new(move |job| execute(&worker_shared, job));
        let pool = DecodePool::new(Arc::clone(&queue), executor, config.pool)?;

        Ok(Self {
            pyramid: Arc::new(pyramid),
            calculator,
            listener,
            shared,
            queue,
            pool: Mutex::new(Some(pool)),
            next_job_id: AtomicU64::new(1),
        })
    }

    pub fn pyramid(&self) -> &Arc<TilePyramid> {
        &self.pyramid
    }

    pub fn redraw(&self) -> &RedrawSignal {
        &self.shared.redraw
    }

    /// Sample size the viewport currently calls for, never coarser than the
    /// base layer.
    pub fn current_sample_size(&self, viewport: &Viewport) -> u32 {
        let full = self.pyramid.full_image_sample_size();
        full.min(self.calculator.calculate(viewport.source(), viewport.scale()))
    }

    pub fn has_missing_tiles(&self, sample_size: u32) -> bool {
        self.pyramid.has_missing_tiles(sample_size)
    }

    /// Number of decode jobs dispatched and not yet finished.
    pub fn pending_jobs(&self) -> usize {
        self.shared.registry.len()
    }

    /// Recompute tile visibility for `viewport`. Decodes are dispatched only
    /// when `load` is set; mid-animation refreshes just update visibility.
    pub fn refresh(&self, viewport: &Viewport, load: bool) -> RefreshOutcome {
        let full = self.pyramid.full_image_sample_size();
        let current = self.current_sample_size(viewport);
        let visible_rect = viewport.visible_source_rect();

        let mut outcome = RefreshOutcome { sample_size: current, ..Default::default() };
        let mut to_load = Vec::new();

        for sample_size in self.pyramid.sample_sizes() {
            for tile in self.pyramid.level(sample_size) {
                if sample_size != current && sample_size != full {
                    if tile.recycle() {
                        outcome.recycled += 1;
                    }
                    continue;
                }

                if sample_size == current {
                    if tile.source_rect().touches(&visible_rect) {
                        tile.set_visible(true);
                        outcome.visible += 1;
                        if load && tile.can_load() && !tile.is_loading() {
                            to_load.push(Arc::clone(tile));
                        }
                    } else if sample_size != full && tile.recycle() {
                        outcome.recycled += 1;
                    }
                }

                if sample_size == full {
                    tile.set_visible(true);
                }
            }
        }

        // Detail decodes for tiles that just left the viewport are pointless.
        for tag in self.shared.registry.cancel_where(|tag| {
            tag.priority == DecodePriority::Detail
                && (tag.tile.sample_size() != current || !tag.tile.is_visible())
        }) {
            tag.tile.abandon(tag.ticket);
            outcome.cancelled += 1;
        }

        if load {
            outcome.batch = self.load_tiles(to_load, DecodePriority::Detail);
        }

        tracing::debug!(
            sample_size = current,
            visible = outcome.visible,
            recycled = outcome.recycled,
            cancelled = outcome.cancelled,
            dispatched = outcome.dispatched(),
            "refreshed tiles"
        );
        outcome
    }

    /// Claim and queue `tiles` for decoding.
    ///
    /// Tiles already in flight or loaded are skipped. Only base layer batches
    /// report tile and full-image events to the listener; detail batches
    /// stream in silently. Returns `None` when the decoder is unusable.
    pub fn load_tiles(
        &self,
        tiles: Vec<Arc<Tile>>,
        priority: DecodePriority,
    ) -> Option<Arc<LoadBatch>> {
        let reporter =
            (priority == DecodePriority::BaseLayer).then(|| Arc::clone(&self.listener));

        if !self.shared.decoder.is_ready() {
            let error = DecodeError::NotInitialized;
            tracing::warn!(%error, "cannot load tiles");
            if let Some(reporter) = &reporter {
                reporter.on_full_image_failed(&error);
            }
            return None;
        }

        let claimed: Vec<(Arc<Tile>, LoadTicket)> = tiles
            .into_iter()
            .filter_map(|tile| tile.begin_loading().map(|ticket| (tile, ticket)))
            .collect();

        let batch = LoadBatch::new(claimed.len(), reporter);
        if claimed.is_empty() {
            if let Some(reporter) = batch.reporter() {
                reporter.on_full_image_loaded();
            }
            return Some(batch);
        }

        for (position, (tile, ticket)) in claimed.into_iter().enumerate() {
            let id: JobId = self.next_job_id.fetch_add(1, Ordering::Relaxed);
            let token = self.shared.registry.register(
                id,
                JobTag { tile: Arc::clone(&tile), ticket, priority },
            );

            if self.shared.debug {
                tracing::debug!(target: "tile.debug", tile = %tile.id(), job = id, "dispatching decode");
            }

            let job = DecodeJob::new(
                id,
                priority,
                tile,
                ticket,
                position + 1,
                Arc::clone(&batch),
                token,
            );
            if let Err(job) = self.queue.push(job) {
                self.shared.registry.unregister(job.id);
                job.tile.abandon(job.ticket);
                job.batch.finish_interrupted();
            }
        }

        Some(batch)
    }

    /// Decode the base layer and wait for it, so the first frame is never
    /// blank.
    pub fn load_blocking(&self) -> Option<Arc<LoadBatch>> {
        let base = self.pyramid.base_layer().to_vec();
        let batch = self.load_tiles(base, DecodePriority::BaseLayer)?;
        batch.wait();
        Some(batch)
    }

    /// Cancel every in-flight decode except the base layer's. Returns the
    /// number of jobs cancelled.
    pub fn cancel_detail_jobs(&self) -> usize {
        let cancelled = self
            .shared
            .registry
            .cancel_where(|tag| tag.priority == DecodePriority::Detail);
        for tag in &cancelled {
            tag.tile.abandon(tag.ticket);
        }
        if !cancelled.is_empty() {
            tracing::debug!(jobs = cancelled.len(), "cancelled detail decodes");
        }
        cancelled.len()
    }

    pub fn cancel_all(&self) -> usize {
        let cancelled = self.shared.registry.cancel_all();
        for tag in &cancelled {
            tag.tile.abandon(tag.ticket);
        }
        cancelled.len()
    }

    /// Visible loaded tiles, coarsest level first, with screen rects for
    /// `viewport`.
    ///
    /// Coarser levels are included only while the current level still has
    /// holes, so finer tiles paint over them.
    pub fn drawable_tiles(&self, viewport: &Viewport) -> Vec<DrawableTile> {
        let current = self.current_sample_size(viewport);
        let missing = self.pyramid.has_missing_tiles(current);

        self.pyramid
            .sample_sizes()
            .filter(|&sample_size| sample_size == current || missing)
            .flat_map(|sample_size| self.pyramid.level(sample_size))
            .filter(|tile| tile.is_visible())
            .filter_map(|tile| {
                let bitmap = tile.bitmap()?;
                Some(DrawableTile {
                    id: tile.id(),
                    screen_rect: viewport.source_to_view_rect(tile.source_rect()),
                    source_rect: tile.source_rect(),
                    bitmap,
                })
            })
            .collect()
    }

    /// Cancel everything and join the decode workers. Idempotent.
    pub fn shutdown(&self) {
        self.cancel_all();
        let pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(pool) = pool {
            pool.shutdown();
        }
    }
}

impl Drop for TileScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn execute(shared: &Shared, job: DecodeJob) {
    let DecodeJob { id, tile, ticket, index, batch, token, .. } = job;
    let total = batch.total();
    let reporter = batch.reporter().cloned();

    let committed = if token.is_cancelled() {
        tile.abandon(ticket);
        false
    } else {
        let result = shared.decoder.decode_region(tile.file_source_rect(), tile.sample_size());

        match result {
            _ if token.is_cancelled() => {
                tile.abandon(ticket);
                false
            }
            Err(error) if error.is_cancellation() => {
                tile.abandon(ticket);
                false
            }
            Ok(bitmap) => {
                let committed = tile.complete(ticket, Ok(bitmap)) == Completion::Committed;
                if committed {
                    if shared.debug {
                        tracing::debug!(target: "tile.debug", tile = %tile.id(), "tile decoded");
                    }
                    if let Some(reporter) = &reporter {
                        reporter.on_tile_decoded(index, total);
                    }
                }
                committed
            }
            Err(error) => {
                tracing::warn!(tile = %tile.id(), %error, "tile decode failed");
                let error = Arc::new(error);
                let committed =
                    tile.complete(ticket, Err(Arc::clone(&error))) == Completion::Committed;
                if committed {
                    if let Some(reporter) = &reporter {
                        reporter.on_tile_failed(index, total, &error);
                    }
                }
                committed
            }
        }
    };

    shared.registry.unregister(id);
    shared.redraw.bump();
    if committed {
        batch.finish_one();
    } else {
        batch.finish_interrupted();
    }
}
