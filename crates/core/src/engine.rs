//! The engine facade a host drives from its interactive thread.

use crate::config::EngineConfig;
use crate::error::{InitializationError, Result};
use crate::session::Session;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tessera_gesture::{Arbitration, GestureArbiter, PointerEvent};
use tessera_render::{
    build_pyramid, DecoderProvider, ImageSource, RegionDecoder, SampleSizeCalculator,
};
use tessera_scheduler::{
    CancellationToken, DrawableTile, EventListener, NoopListener, RedrawSignal, RefreshOutcome,
    SchedulerConfig, TileScheduler,
};
use tessera_viewer_core::{PointF, Size, Viewport, ViewportError};
use tracing::{debug, error, warn};

/// Where the engine is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InitializationState {
    #[default]
    Uninitialized,
    /// The last initialization failed. Holds the rendered error.
    Error(String),
    Success,
}

impl InitializationState {
    pub fn is_success(&self) -> bool {
        matches!(self, InitializationState::Success)
    }
}

/// Lets another thread abort an initialization in progress.
///
/// The engine checks the flag between initialization steps. A handle only
/// applies to the initialization it was taken for: a canceled initialization
/// and [`ImageEngine::reset`] both issue a fresh one, so the next attempt
/// starts clean.
#[derive(Debug, Clone)]
pub struct InitializationHandle {
    token: CancellationToken,
}

impl InitializationHandle {
    pub fn cancel_initialization(&self) {
        self.token.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// One image, one decoder, one viewport.
///
/// `initialize` decodes the image dimensions, builds the tile pyramid and
/// loads the base layer before returning, so the first frame is never
/// blank. After that the host feeds pointer events and frame ticks, and
/// draws [`drawable_tiles`](Self::drawable_tiles) whenever the redraw
/// signal moves.
pub struct ImageEngine {
    config: EngineConfig,
    provider: Arc<dyn DecoderProvider>,
    listener: Arc<dyn EventListener>,
    redraw: RedrawSignal,
    decoder: Option<Arc<dyn RegionDecoder>>,
    session: Option<Session>,
    arbiter: GestureArbiter,
    state: InitializationState,
    available: Option<Size>,
    canvas_limit: Option<Size>,
    init_token: CancellationToken,
}

impl ImageEngine {
    pub fn new(config: EngineConfig, provider: impl DecoderProvider + 'static) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            arbiter: GestureArbiter::new(config.gesture_config()),
            config,
            provider: Arc::new(provider),
            listener: Arc::new(NoopListener),
            redraw: RedrawSignal::new(),
            decoder: None,
            session: None,
            state: InitializationState::Uninitialized,
            available: None,
            canvas_limit: None,
            init_token: CancellationToken::new(),
        })
    }

    pub fn with_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Uses `redraw` instead of a private signal, for hosts that want a
    /// callback.
    pub fn with_redraw_signal(mut self, redraw: RedrawSignal) -> Self {
        self.redraw = redraw;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &InitializationState {
        &self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn redraw(&self) -> &RedrawSignal {
        &self.redraw
    }

    pub fn redraw_generation(&self) -> u64 {
        self.redraw.generation()
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.session.as_ref().map(|session| &session.viewport)
    }

    pub fn scheduler(&self) -> Option<&TileScheduler> {
        self.session.as_ref().map(|session| &session.scheduler)
    }

    pub fn arbiter(&self) -> &GestureArbiter {
        &self.arbiter
    }

    pub fn initialization_handle(&self) -> InitializationHandle {
        InitializationHandle { token: self.init_token.clone() }
    }

    /// Largest bitmap the host canvas accepts, used by `MaxTileSize::Auto`.
    pub fn set_canvas_limit(&mut self, limit: Size) {
        self.canvas_limit = Some(limit);
    }

    /// Sets the view size. Must be called before `initialize`; later calls
    /// resize the live viewport and keep the same source point centered.
    pub fn set_available_size(&mut self, available: Size) -> Result<()> {
        if !available.is_positive() {
            return Err(ViewportError::InvalidAvailableSize(available).into());
        }
        self.available = Some(available);

        if let Some(session) = self.session.as_mut() {
            session.viewport.resize(available)?;
            session.refresh(true);
        }
        Ok(())
    }

    /// Initializes the decoder from `source` and loads the base layer.
    ///
    /// Fails fast with [`InitializationError::AlreadyInitialized`] while a
    /// decoder is held; the running session is left alone in that case.
    /// Any other failure tears the session down before returning.
    pub fn initialize(
        &mut self,
        source: &dyn ImageSource,
    ) -> std::result::Result<(), InitializationError> {
        let _span = tracing::debug_span!("engine", debug_key = %self.config.debug_key).entered();

        if self.decoder.is_some() {
            let error = InitializationError::AlreadyInitialized;
            warn!(%error, "rejecting second initialization");
            self.listener.on_image_info_failed(&error);
            return Err(error);
        }

        let decoder = self.provider.provide();
        self.decoder = Some(Arc::clone(&decoder));

        match self.start_session(source, decoder) {
            Ok(()) => {
                self.state = InitializationState::Success;
                Ok(())
            }
            Err(InitializationError::Canceled) => {
                debug!("initialization canceled");
                self.reset();
                self.listener.on_initialization_canceled();
                Err(InitializationError::Canceled)
            }
            Err(err) => {
                error!(error = %err, "initialization failed");
                self.teardown();
                self.state = InitializationState::Error(err.to_string());
                Err(err)
            }
        }
    }

    fn start_session(
        &mut self,
        source: &dyn ImageSource,
        decoder: Arc<dyn RegionDecoder>,
    ) -> std::result::Result<(), InitializationError> {
        let token = self.init_token.clone();
        let check_canceled = || {
            if token.is_cancelled() {
                Err(InitializationError::Canceled)
            } else {
                Ok(())
            }
        };

        check_canceled()?;
        let available = self.available.ok_or(InitializationError::NoViewport)?;

        let dimensions = source
            .provide()
            .map_err(InitializationError::Source)
            .and_then(|mut stream| {
                decoder.init(&mut *stream).map_err(InitializationError::Dimensions)
            });
        let size = match dimensions {
            Ok(size) => size,
            Err(err) => {
                self.listener.on_image_info_failed(&err);
                return Err(err);
            }
        };
        self.listener.on_image_info_decoded(size);
        debug!(%size, "decoded image dimensions");
        check_canceled()?;

        let mut viewport = Viewport::new(available, size, self.config.scale_config())?;
        viewport.fit_to_bounds(true);

        let metrics = self.config.display_metrics();
        let calculator = SampleSizeCalculator::new(
            metrics.min_tile_dpi(self.config.min_tile_dpi),
            metrics.average_dpi(),
        );
        let full_sample_size = calculator.full_image_sample_size(size, viewport.scale());
        let max_tile_size = self.config.max_tile_size.resolve(self.canvas_limit);

        let pyramid = build_pyramid(size, max_tile_size, available, full_sample_size)?;
        debug!(
            full_sample_size,
            %max_tile_size,
            levels = pyramid.sample_sizes().count(),
            tiles = pyramid.tile_count(),
            "built tile pyramid"
        );

        let scheduler = TileScheduler::new(
            pyramid,
            decoder,
            calculator,
            Arc::clone(&self.listener),
            SchedulerConfig {
                pool: self.config.pool_config(),
                debug: self.config.debug,
                redraw: self.redraw.clone(),
            },
        )?;
        let session = self.session.insert(Session::new(viewport, scheduler));

        if session.scheduler.load_blocking().is_none() {
            return Err(InitializationError::DecoderNotReady);
        }
        check_canceled()?;

        session.viewport.fit_to_bounds(false);
        let outcome = session.refresh(true);
        debug!(
            sample_size = outcome.sample_size,
            dispatched = outcome.dispatched(),
            "initial refresh"
        );
        Ok(())
    }

    /// Routes a pointer event through gesture arbitration. A newly started
    /// gesture cancels the detail decodes of the previous view.
    pub fn on_pointer_event(&mut self, event: PointerEvent) -> Arbitration {
        let Some(session) = self.session.as_mut() else {
            return Arbitration::Ignored;
        };

        let arbitration = self.arbiter.handle(event, session);
        if let Arbitration::Started(kind) = arbitration {
            let cancelled = session.scheduler.cancel_detail_jobs();
            debug!(?kind, cancelled, "gesture started");
        }
        arbitration
    }

    /// Advances running animations. Returns true while another tick is
    /// needed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.session.as_mut() {
            Some(session) => self.arbiter.tick(now, session),
            None => false,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.arbiter.is_animating()
    }

    /// Recomputes visibility and, with `load`, dispatches missing tiles.
    pub fn refresh_tiles(&mut self, load: bool) -> Option<RefreshOutcome> {
        self.session.as_mut().map(|session| session.refresh(load))
    }

    /// Jumps to `scale` around `source_center`, stopping any animation that
    /// allows it.
    pub fn set_scale_and_center(&mut self, scale: f32, source_center: PointF) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        self.arbiter.cancel_animations(session);
        session.viewport.set_scale_and_center(scale, source_center);
        session.refresh(true);
    }

    /// Loaded tiles to paint this frame, coarsest first.
    pub fn drawable_tiles(&self) -> Vec<DrawableTile> {
        match &self.session {
            Some(session) => session.scheduler.drawable_tiles(&session.viewport),
            None => Vec::new(),
        }
    }

    /// True while the current level still has visible tiles without pixels.
    pub fn has_missing_tiles(&self) -> bool {
        self.session.as_ref().is_some_and(|session| {
            let sample_size = session.scheduler.current_sample_size(&session.viewport);
            session.scheduler.has_missing_tiles(sample_size)
        })
    }

    /// Returns to `Uninitialized`: gestures dropped, decodes cancelled and
    /// joined, tiles recycled, decoder released. The view size is kept.
    pub fn reset(&mut self) {
        self.teardown();
        self.state = InitializationState::Uninitialized;
        self.init_token = CancellationToken::new();
    }

    fn teardown(&mut self) {
        self.arbiter.reset();

        if let Some(session) = self.session.take() {
            let recycled = session.close();
            debug!(recycled, "closed session");
        }
        // Only after the pool is joined: no decode can still be running.
        if let Some(decoder) = self.decoder.take() {
            decoder.recycle();
        }
    }
}

impl Drop for ImageEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for ImageEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageEngine")
            .field("state", &self.state)
            .field("viewport", &self.viewport().map(Viewport::state))
            .field("animating", &self.is_animating())
            .field("redraw", &self.redraw.generation())
            .finish_non_exhaustive()
    }
}
