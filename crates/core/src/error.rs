use crate::config::ConfigError;
use tessera_render::{DecodeError, PyramidError};
use tessera_scheduler::SchedulerError;
use tessera_viewer_core::ViewportError;

/// Why [`ImageEngine::initialize`](crate::ImageEngine::initialize) failed.
///
/// Every variant leaves the engine torn down: in-flight work is cancelled
/// and the decoder released before the error is returned.
#[derive(Debug, thiserror::Error)]
pub enum InitializationError {
    #[error("Decoder was already initialized")]
    AlreadyInitialized,

    #[error("image source failed: {0}")]
    Source(#[source] std::io::Error),

    #[error("failed to decode image dimensions: {0}")]
    Dimensions(#[source] DecodeError),

    #[error("viewport size has not been set")]
    NoViewport,

    #[error(transparent)]
    Viewport(#[from] ViewportError),

    #[error(transparent)]
    Pyramid(#[from] PyramidError),

    #[error("failed to start decode workers: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("decoder was not ready to load the base layer")]
    DecoderNotReady,

    #[error("initialization canceled")]
    Canceled,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error(transparent)]
    Viewport(#[from] ViewportError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
