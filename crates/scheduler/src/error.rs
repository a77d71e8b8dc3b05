use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to start decode workers: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
