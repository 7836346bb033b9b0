//! Orchestration of a map-reduce run.
//!
//! A run wires three parts together:
//! * a [`WorkerPool`] whose workers apply the map function to each input;
//! * a feeder thread that submits the inputs to the pool and stops the pool when it is done;
//! * the reducer loop, which runs on the calling thread and folds each output into the
//!   accumulator until both of the pool's sources are closed.
mod builder;
mod feed;
mod reduce;

pub use builder::Builder;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::MapReduceError;
use crate::pool::{PoolError, Status, WorkerPool};
use std::sync::Arc;

/// Applies `map` to every input on a pool of `num_workers` threads and folds the outputs into
/// `initial` with `reduce` on the calling thread.
///
/// Outputs are reduced in the order they are produced, which is not the order of `inputs`.
///
/// `reduce` borrows the accumulator and returns its replacement, so a failed step leaves the
/// accumulator as it was. An accumulator that is not `Copy` therefore has to be cloned on every
/// step: folding into a growing collection this way costs time quadratic in the number of
/// outputs. Prefer a small accumulator (a count, a sum, a running maximum), or one that is cheap
/// to clone, such as a persistent data structure or an `Arc` that is only rebuilt when it changes.
///
/// Returns `Ok` with the final accumulator if every input was transformed and reduced. Otherwise
/// returns a [`MapReduceError`] that carries the accumulator:
/// * `Failed` if the run completed but some inputs failed to transform or reduce; their
///   contributions are missing from the accumulator;
/// * `Interrupted` as soon as `cancel` fires, without waiting for the remaining inputs;
/// * `Pool` if `num_workers` is `0` or the worker threads could not be spawned.
///
/// # Examples
///
/// ```
/// use forage::{map_reduce, CancelToken};
///
/// let cancel = CancelToken::new();
/// let sum = map_reduce(
///     &cancel,
///     2,
///     vec![1u64, 2, 3, 4],
///     |x| Ok::<_, String>(x * x),
///     |acc, x| Ok(acc + x),
///     0,
/// );
/// assert_eq!(sum.unwrap(), 30);
/// ```
pub fn map_reduce<T, I, O, E, R, M, F>(
    cancel: &CancelToken,
    num_workers: usize,
    inputs: T,
    map: M,
    reduce: F,
    initial: R,
) -> Result<R, MapReduceError<R, E>>
where
    T: IntoIterator<Item = I>,
    T::IntoIter: Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
    M: Fn(I) -> Result<O, E> + Send + Sync + 'static,
    F: FnMut(&R, O) -> Result<R, E>,
{
    Builder::new()
        .num_threads(num_workers)
        .map_reduce(cancel, inputs, map, reduce, initial)
}

pub(crate) fn run<T, I, O, E, R, M, F>(
    config: Config,
    cancel: &CancelToken,
    inputs: T,
    map: M,
    reduce: F,
    initial: R,
) -> Result<R, MapReduceError<R, E>>
where
    T: IntoIterator<Item = I>,
    T::IntoIter: Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
    M: Fn(I) -> Result<O, E> + Send + Sync + 'static,
    F: FnMut(&R, O) -> Result<R, E>,
{
    let num_workers = config.num_threads.unwrap_or(0);
    let feeder_builder = config.thread_builder("feeder");
    let pool = match WorkerPool::new(num_workers, map, config) {
        Ok(pool) => Arc::new(pool),
        Err(source) => {
            return Err(MapReduceError::Pool {
                value: initial,
                source,
            })
        }
    };
    let sources = pool
        .take_sources()
        .expect("sources are taken exactly once from a new pool");
    if let Err(source) = pool.start(cancel) {
        pool.stop();
        return Err(MapReduceError::Pool {
            value: initial,
            source,
        });
    }
    let inputs = inputs.into_iter();
    let feeder = {
        let pool = Arc::clone(&pool);
        let cancel = cancel.clone();
        feeder_builder.spawn(move || feed::feed(&cancel, inputs, &pool))
    };
    let feeder = match feeder {
        Ok(handle) => handle,
        Err(error) => {
            pool.stop();
            return Err(MapReduceError::Pool {
                value: initial,
                source: PoolError::Spawn(error),
            });
        }
    };
    let result = reduce::reduce(cancel, sources, reduce, initial);
    // after an interruption the feeder is left to finish stopping the pool on its own
    if !matches!(result, Err(MapReduceError::Interrupted { .. })) {
        if let Err(payload) = feeder.join() {
            std::panic::resume_unwind(payload);
        }
        debug_assert_eq!(pool.status(), Status::Stopped);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::map_reduce;
    use crate::cancel::{CancelToken, Interrupted};
    use crate::error::{Failure, MapReduceError};
    use crate::pool::PoolError;
    use itertools::Itertools;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(thiserror::Error, Debug, PartialEq)]
    enum TestError {
        #[error("even input {0}")]
        Even(u64),
        #[error("overflow")]
        Overflow,
    }

    fn square(x: u64) -> Result<u64, TestError> {
        Ok(x * x)
    }

    fn square_odd(x: u64) -> Result<u64, TestError> {
        if x % 2 == 0 {
            Err(TestError::Even(x))
        } else {
            Ok(x * x)
        }
    }

    fn sum(acc: &u64, x: u64) -> Result<u64, TestError> {
        Ok(acc + x)
    }

    #[test]
    fn test_squares_sum() {
        let cancel = CancelToken::new();
        let result = map_reduce(&cancel, 2, vec![1, 2, 3, 4], square, sum, 0);
        assert_eq!(result.unwrap(), 30);
    }

    #[test]
    fn test_even_inputs_fail() {
        let cancel = CancelToken::new();
        let result = map_reduce(&cancel, 2, vec![1, 2, 3, 4], square_odd, sum, 0);
        let Err(MapReduceError::Failed { value, errors }) = result else {
            panic!("expected failures");
        };
        assert_eq!(value, 10);
        assert_eq!(errors.len(), 2);
        let causes = errors
            .into_iter()
            .filter_map(Failure::into_cause)
            .sorted_by_key(|error| match error {
                TestError::Even(x) => *x,
                TestError::Overflow => u64::MAX,
            })
            .collect_vec();
        assert_eq!(causes, vec![TestError::Even(2), TestError::Even(4)]);
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = map_reduce(&cancel, 2, vec![1, 2, 3, 4], square, sum, 7);
        let error = result.unwrap_err();
        assert_eq!(error.interrupted(), Some(Interrupted::Cancelled));
        assert_eq!(error.into_value(), 7);
    }

    #[test]
    fn test_empty_inputs() {
        let cancel = CancelToken::new();
        let result = map_reduce(&cancel, 3, Vec::<u64>::new(), square, sum, 5);
        assert_eq!(result.unwrap(), 5);
    }

    #[test]
    fn test_no_workers() {
        let cancel = CancelToken::new();
        let result = map_reduce(&cancel, 0, vec![1], square, sum, 5);
        let error = result.unwrap_err();
        assert!(matches!(
            error,
            MapReduceError::Pool {
                value: 5,
                source: PoolError::NoWorkers
            }
        ));
    }

    #[test]
    fn test_order_independent() {
        let cancel = CancelToken::new();
        let inputs: Vec<u64> = (0..1000).collect();
        let expected: u64 = inputs.iter().map(|x| x * 3).sum();
        for num_workers in [1, 2, 8] {
            let result = map_reduce(
                &cancel,
                num_workers,
                inputs.clone(),
                |x| Ok::<_, TestError>(x * 3),
                sum,
                0,
            );
            assert_eq!(result.unwrap(), expected);
        }
    }

    #[test]
    fn test_k_of_n_failures() {
        let cancel = CancelToken::new();
        let inputs: Vec<u64> = (1..=100).collect();
        let result = map_reduce(
            &cancel,
            4,
            inputs,
            |x| {
                if x % 10 == 0 {
                    Err(TestError::Even(x))
                } else {
                    Ok(1u64)
                }
            },
            sum,
            0,
        );
        let error = result.unwrap_err();
        assert_eq!(error.aggregate().map(|errors| errors.len()), Some(10));
        // one per successfully transformed input
        assert_eq!(error.into_value(), 90);
    }

    #[test]
    fn test_reduce_failures_are_collected() {
        let cancel = CancelToken::new();
        let result = map_reduce(
            &cancel,
            2,
            vec![1u64, 2, 3, 4],
            square,
            |acc: &u64, x| match acc.checked_add(x) {
                Some(next) if x < 10 => Ok(next),
                _ => Err(TestError::Overflow),
            },
            0,
        );
        let error = result.unwrap_err();
        let errors = error.aggregate().unwrap();
        assert_eq!(errors.num_reduce_failures(), 1);
        assert_eq!(errors.num_transform_failures(), 0);
        assert_eq!(*error.value(), 14);
    }

    #[test]
    fn test_panicking_transform_is_collected() {
        let cancel = CancelToken::new();
        let result = map_reduce(
            &cancel,
            2,
            vec![1u64, 2, 3],
            |x| {
                if x == 2 {
                    panic!("cannot handle 2");
                }
                Ok::<_, TestError>(x)
            },
            sum,
            0,
        );
        let Err(MapReduceError::Failed { value, errors }) = result else {
            panic!("expected failures");
        };
        assert_eq!(value, 4);
        let Failure::Transform(error) = &errors.errors()[0] else {
            panic!("expected a transform failure");
        };
        assert_eq!(
            error.panic().and_then(|panic| panic.message()),
            Some("cannot handle 2")
        );
    }

    #[test]
    fn test_cancel_returns_promptly() {
        let cancel = CancelToken::new();
        let transformed = Arc::new(AtomicUsize::new(0));
        let canceller = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                cancel.cancel();
            })
        };
        let start = Instant::now();
        let result = {
            let transformed = Arc::clone(&transformed);
            map_reduce(
                &cancel,
                2,
                0u64..,
                move |x| {
                    transformed.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    Ok::<_, TestError>(x)
                },
                sum,
                0,
            )
        };
        canceller.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        let error = result.unwrap_err();
        assert_eq!(error.interrupted(), Some(Interrupted::Cancelled));
        assert!(transformed.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_timeout() {
        let cancel = CancelToken::with_timeout(Duration::from_millis(100));
        let result = map_reduce(
            &cancel,
            2,
            0u64..,
            |x| {
                thread::sleep(Duration::from_millis(5));
                Ok::<_, TestError>(x)
            },
            sum,
            0,
        );
        let error = result.unwrap_err();
        assert_eq!(error.interrupted(), Some(Interrupted::DeadlineExceeded));
    }

    #[test]
    fn test_cancelled_run_releases_workers() {
        // the reducer stops draining on cancellation while workers are still mid-transform or
        // blocked delivering results; every worker must still exit and release the map function
        let cancel = CancelToken::new();
        let marker = Arc::new(());
        let result = {
            let marker = Arc::clone(&marker);
            let cancel_in_map = cancel.clone();
            map_reduce(
                &cancel,
                4,
                0u64..,
                move |x| {
                    let _marker = &marker;
                    if x == 20 {
                        cancel_in_map.cancel();
                    }
                    thread::sleep(Duration::from_millis(5));
                    Ok::<_, TestError>(x)
                },
                sum,
                0,
            )
        };
        assert!(result.unwrap_err().is_interrupted());
        let deadline = Instant::now() + Duration::from_secs(5);
        while Arc::strong_count(&marker) > 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(Arc::strong_count(&marker), 1);
    }

    #[test]
    #[should_panic(expected = "inputs exhausted badly")]
    fn test_input_panic_propagates() {
        let cancel = CancelToken::new();
        let inputs = (0..5u64).map(|x| {
            if x == 3 {
                panic!("inputs exhausted badly");
            }
            x
        });
        let _ = map_reduce(&cancel, 2, inputs, square, sum, 0);
    }
}
