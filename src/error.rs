use crate::beacon::Mac;

/// Errors produced by the positioning core.
#[derive(Debug, thiserror::Error)]
pub enum AodError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("beacon {0} is not registered")]
    NotFound(Mac),

    #[error("beacon registry is full")]
    NoSpace,

    #[error("rays are too near-parallel for a stable position fix")]
    ParallelLines,

    #[error("IQ worker thread has stopped")]
    WorkerStopped,

    #[error("worker thread error: {0}")]
    Thread(#[from] std::io::Error),
}
