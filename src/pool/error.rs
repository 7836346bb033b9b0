/// Errors that can occur while setting up or starting a `WorkerPool`.
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    #[error("a worker pool requires at least one worker")]
    NoWorkers,
    #[error("worker pool has already been started")]
    AlreadyStarted,
    #[error("worker pool has been stopped and cannot be restarted")]
    Stopped,
    #[error("failed to spawn worker thread")]
    Spawn(#[source] std::io::Error),
}

/// Error returned when an item could not be handed to a worker. The item is returned so it is
/// not lost.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SubmitError<I> {
    /// The pool's input sink has been closed.
    #[error("worker pool input is closed")]
    Closed(I),
    /// The token was cancelled before a worker took the item.
    #[error("submission was cancelled")]
    Cancelled(I),
}
