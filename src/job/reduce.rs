use crate::cancel::{CancelToken, Interrupted};
use crate::channel::CancelArms;
use crate::error::{AggregateError, Failure, MapReduceError};
use crate::pool::Sources;
use crossbeam_channel::Select;

/// Drains `sources` until both the output and the error source are closed, folding each output
/// into the accumulator with `reduce_fn` and collecting every failure.
///
/// A failure of `reduce_fn` is collected and leaves the accumulator unchanged. If `cancel` fires,
/// returns immediately with the current accumulator and the failures collected so far; `sources`
/// is dropped, which releases any worker still blocked on delivering a result.
pub fn reduce<O, E, R, F>(
    cancel: &CancelToken,
    sources: Sources<O, E>,
    mut reduce_fn: F,
    initial: R,
) -> Result<R, MapReduceError<R, E>>
where
    F: FnMut(&R, O) -> Result<R, E>,
{
    let mut acc = initial;
    let mut failures = Vec::new();
    let mut outputs_open = true;
    let mut errors_open = true;
    let mut num_outputs = 0usize;

    while outputs_open || errors_open {
        if let Some(reason) = cancel.reason() {
            return Err(interrupted(acc, reason, failures));
        }
        let expiry = cancel.expiry();
        let mut sel = Select::new();
        let arms = CancelArms::register(&mut sel, cancel, &expiry);
        // a closed source is no longer registered, so it cannot spin the loop
        let outputs_index = outputs_open.then(|| sel.recv(&sources.outputs));
        let errors_index = errors_open.then(|| sel.recv(&sources.errors));
        let Some(oper) = arms.complete(sel.select(), cancel, &expiry) else {
            return Err(interrupted(acc, cancel.interrupted(), failures));
        };
        let index = oper.index();
        if Some(index) == outputs_index {
            match oper.recv(&sources.outputs) {
                Ok(output) => {
                    num_outputs += 1;
                    match reduce_fn(&acc, output) {
                        Ok(next) => acc = next,
                        Err(error) => {
                            tracing::trace!("reduce failed");
                            failures.push(Failure::Reduce(error));
                        }
                    }
                }
                Err(_) => outputs_open = false,
            }
        } else if Some(index) == errors_index {
            match oper.recv(&sources.errors) {
                Ok(error) => {
                    tracing::trace!("transform failed");
                    failures.push(Failure::Transform(error));
                }
                Err(_) => errors_open = false,
            }
        } else {
            unreachable!("unregistered operation selected");
        }
    }

    tracing::debug!(
        outputs = num_outputs,
        failures = failures.len(),
        "reduction complete"
    );
    if failures.is_empty() {
        Ok(acc)
    } else {
        Err(MapReduceError::Failed {
            value: acc,
            errors: AggregateError::new(failures),
        })
    }
}

fn interrupted<R, E>(
    value: R,
    reason: Interrupted,
    errors: Vec<Failure<E>>,
) -> MapReduceError<R, E> {
    tracing::debug!(%reason, failures = errors.len(), "reduction interrupted");
    MapReduceError::Interrupted {
        value,
        reason,
        errors,
    }
}
