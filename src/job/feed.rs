use crate::cancel::CancelToken;
use crate::pool::{SubmitError, WorkerPool};

/// Stops the pool when dropped, so the shutdown sequence is initiated exactly once however the
/// feeder exits (including when the input iterator panics).
struct StopGuard<'a, I, O, E>(&'a WorkerPool<I, O, E>)
where
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static;

impl<I, O, E> Drop for StopGuard<'_, I, O, E>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Submits each of `inputs` to `pool` until the inputs are exhausted, `cancel` fires, or the
/// pool's input sink closes; then stops the pool. Returns the number of items submitted.
pub fn feed<T, I, O, E>(cancel: &CancelToken, inputs: T, pool: &WorkerPool<I, O, E>) -> usize
where
    T: IntoIterator<Item = I>,
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    let _guard = StopGuard(pool);
    let mut submitted = 0;
    for input in inputs {
        if cancel.is_cancelled() {
            break;
        }
        match pool.submit(input, cancel) {
            Ok(()) => submitted += 1,
            Err(SubmitError::Cancelled(_)) => break,
            Err(SubmitError::Closed(_)) => {
                tracing::debug!("worker pool input closed before all items were submitted");
                break;
            }
        }
    }
    tracing::debug!(submitted, cancelled = cancel.is_cancelled(), "feeder exiting");
    submitted
}
