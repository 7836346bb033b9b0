//! Errors returned at the boundary of a map-reduce run.
//!
//! Every [`MapReduceError`] variant carries the accumulator as it stood when the run ended, so
//! partial results are never lost.
use crate::cancel::Interrupted;
use crate::pool::PoolError;
use crate::Panic;
use std::error::Error;
use std::fmt::{self, Debug, Display};

/// The failure of the map function on a single input.
#[derive(Debug)]
pub enum TransformError<E> {
    /// The map function returned an error.
    Failed(E),
    /// The map function panicked.
    Panicked(Panic),
}

impl<E> TransformError<E> {
    /// Returns the error returned by the map function, or `None` if it panicked.
    pub fn cause(&self) -> Option<&E> {
        match self {
            Self::Failed(error) => Some(error),
            Self::Panicked(_) => None,
        }
    }

    /// Consumes this `TransformError` and returns the error returned by the map function, or
    /// `None` if it panicked.
    pub fn into_cause(self) -> Option<E> {
        match self {
            Self::Failed(error) => Some(error),
            Self::Panicked(_) => None,
        }
    }

    /// Returns the caught panic, if the map function panicked.
    pub fn panic(&self) -> Option<&Panic> {
        match self {
            Self::Failed(_) => None,
            Self::Panicked(panic) => Some(panic),
        }
    }
}

impl<E: Display> Display for TransformError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(error) => write!(f, "transform failed: {error}"),
            Self::Panicked(panic) => write!(f, "transform {panic}"),
        }
    }
}

impl<E: Error + 'static> Error for TransformError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Failed(error) => Some(error),
            Self::Panicked(_) => None,
        }
    }
}

/// A single non-fatal failure collected during a run.
#[derive(Debug)]
pub enum Failure<E> {
    /// An input could not be transformed; its output is missing from the accumulator.
    Transform(TransformError<E>),
    /// The reduce function rejected an output; the accumulator was left unchanged.
    Reduce(E),
}

impl<E> Failure<E> {
    pub fn is_transform(&self) -> bool {
        matches!(self, Self::Transform(_))
    }

    pub fn is_reduce(&self) -> bool {
        matches!(self, Self::Reduce(_))
    }

    /// Returns the underlying error, if there is one (i.e., this is not a transform panic).
    pub fn cause(&self) -> Option<&E> {
        match self {
            Self::Transform(error) => error.cause(),
            Self::Reduce(error) => Some(error),
        }
    }

    /// Consumes this `Failure` and returns the underlying error, if there is one.
    pub fn into_cause(self) -> Option<E> {
        match self {
            Self::Transform(error) => error.into_cause(),
            Self::Reduce(error) => Some(error),
        }
    }
}

impl<E: Display> Display for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transform(error) => Display::fmt(error, f),
            Self::Reduce(error) => write!(f, "reduce failed: {error}"),
        }
    }
}

impl<E: Error + 'static> Error for Failure<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transform(error) => Some(error),
            Self::Reduce(error) => Some(error),
        }
    }
}

/// All of the failures collected during a run, in the order they were observed.
///
/// An `AggregateError` is never empty: a run that collects no failures returns `Ok`.
#[derive(Debug)]
pub struct AggregateError<E>(Vec<Failure<E>>);

impl<E> AggregateError<E> {
    pub(crate) fn new(failures: Vec<Failure<E>>) -> Self {
        debug_assert!(!failures.is_empty());
        Self(failures)
    }

    /// The number of collected failures.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of failures caused by the map function.
    pub fn num_transform_failures(&self) -> usize {
        self.0.iter().filter(|failure| failure.is_transform()).count()
    }

    /// The number of failures caused by the reduce function.
    pub fn num_reduce_failures(&self) -> usize {
        self.0.iter().filter(|failure| failure.is_reduce()).count()
    }

    pub fn errors(&self) -> &[Failure<E>] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Failure<E>> {
        self.0.iter()
    }

    pub fn into_errors(self) -> Vec<Failure<E>> {
        self.0
    }
}

impl<E> IntoIterator for AggregateError<E> {
    type Item = Failure<E>;
    type IntoIter = std::vec::IntoIter<Failure<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<E> Display for AggregateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s) occurred during map-reduce ({} transform, {} reduce)",
            self.len(),
            self.num_transform_failures(),
            self.num_reduce_failures()
        )
    }
}

impl<E: Debug> Error for AggregateError<E> {}

/// The error returned by a map-reduce run.
#[derive(Debug)]
pub enum MapReduceError<R, E> {
    /// The run was cancelled, or its deadline passed, before all inputs were reduced. `errors`
    /// holds the failures collected up to that point; outputs and failures that were still in
    /// flight are dropped.
    Interrupted {
        value: R,
        reason: Interrupted,
        errors: Vec<Failure<E>>,
    },
    /// The run completed but one or more inputs failed to transform or reduce.
    Failed { value: R, errors: AggregateError<E> },
    /// The worker pool could not be set up. `value` is the initial accumulator.
    Pool { value: R, source: PoolError },
}

impl<R, E> MapReduceError<R, E> {
    /// Returns the accumulator as it stood when the run ended.
    pub fn value(&self) -> &R {
        match self {
            Self::Interrupted { value, .. } => value,
            Self::Failed { value, .. } => value,
            Self::Pool { value, .. } => value,
        }
    }

    /// Consumes this error and returns the accumulator as it stood when the run ended.
    pub fn into_value(self) -> R {
        match self {
            Self::Interrupted { value, .. } => value,
            Self::Failed { value, .. } => value,
            Self::Pool { value, .. } => value,
        }
    }

    /// Returns the reason for interruption, if the run was cancelled or timed out.
    pub fn interrupted(&self) -> Option<Interrupted> {
        match self {
            Self::Interrupted { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// Returns the aggregated failures of a run that completed.
    pub fn aggregate(&self) -> Option<&AggregateError<E>> {
        match self {
            Self::Failed { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

impl<R, E> Display for MapReduceError<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted { reason, errors, .. } if errors.is_empty() => {
                Display::fmt(reason, f)
            }
            Self::Interrupted { reason, errors, .. } => {
                write!(f, "{reason} after {} error(s)", errors.len())
            }
            Self::Failed { errors, .. } => Display::fmt(errors, f),
            Self::Pool { source, .. } => write!(f, "worker pool error: {source}"),
        }
    }
}

impl<R: Debug, E: Debug + 'static> Error for MapReduceError<R, E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Interrupted { reason, .. } => Some(reason),
            Self::Failed { errors, .. } => Some(errors),
            Self::Pool { source, .. } => Some(source),
        }
    }
}
