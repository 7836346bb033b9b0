use crate::cancel::CancelToken;
use crate::channel::{Delivery, Message, ReceiverExt, SenderExt};
use crate::error::TransformError;
use crate::Panic;
use crossbeam_channel::{Receiver, Sender};
use crossbeam_utils::sync::WaitGroup;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The per-item function applied by each worker.
pub type Transform<I, O, E> = dyn Fn(I) -> Result<O, E> + Send + Sync;

/// Tracks a live worker. Dropping it (when the worker exits, including by unwinding) decrements
/// the pool's active count and then releases the worker's share of the `WaitGroup`.
pub struct Sentinel {
    active: Arc<AtomicUsize>,
    _done: WaitGroup,
}

impl Sentinel {
    pub fn new(active: &Arc<AtomicUsize>, done: &WaitGroup) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        Self {
            active: Arc::clone(active),
            _done: done.clone(),
        }
    }
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Why a worker's loop ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Exit {
    /// The input sink was closed and drained.
    InputClosed,
    /// The cancellation token fired.
    Cancelled,
    /// The reducer dropped the output or error source.
    Abandoned,
}

/// A single worker thread's state.
pub struct Worker<I, O, E> {
    index: usize,
    transform: Arc<Transform<I, O, E>>,
    inputs: Receiver<I>,
    outputs: Sender<O>,
    errors: Sender<TransformError<E>>,
    cancel: CancelToken,
    _sentinel: Sentinel,
}

impl<I, O, E> Worker<I, O, E> {
    pub fn new(
        index: usize,
        transform: Arc<Transform<I, O, E>>,
        inputs: Receiver<I>,
        outputs: Sender<O>,
        errors: Sender<TransformError<E>>,
        cancel: CancelToken,
        sentinel: Sentinel,
    ) -> Self {
        Self {
            index,
            transform,
            inputs,
            outputs,
            errors,
            cancel,
            _sentinel: sentinel,
        }
    }

    /// Receives and transforms items until the input sink is closed, the token is cancelled, or
    /// the results can no longer be delivered. A failed or panicking transform is forwarded to
    /// the error source and does not end the loop.
    pub fn run(self) -> Exit {
        let exit = loop {
            let input = match self.inputs.recv_or_cancel(&self.cancel) {
                Message::Received(input) => input,
                Message::ChannelDisconnected => break Exit::InputClosed,
                Message::Interrupted => break Exit::Cancelled,
            };
            let delivery = match Panic::try_call(None, || (self.transform)(input)) {
                Ok(Ok(output)) => discard(self.outputs.send_or_cancel(output, &self.cancel)),
                Ok(Err(error)) => discard(
                    self.errors
                        .send_or_cancel(TransformError::Failed(error), &self.cancel),
                ),
                Err(panic) => {
                    tracing::trace!(worker = self.index, "transform panicked");
                    let panic = panic.with_detail(format!("worker-{}", self.index));
                    discard(
                        self.errors
                            .send_or_cancel(TransformError::Panicked(panic), &self.cancel),
                    )
                }
            };
            match delivery {
                Delivery::Delivered => continue,
                Delivery::ChannelDisconnected(()) => break Exit::Abandoned,
                Delivery::Interrupted(()) => break Exit::Cancelled,
            }
        };
        tracing::trace!(worker = self.index, ?exit, "worker exiting");
        exit
    }
}

/// Drops the undelivered value of a failed delivery.
fn discard<T>(delivery: Delivery<T>) -> Delivery<()> {
    match delivery {
        Delivery::Delivered => Delivery::Delivered,
        Delivery::ChannelDisconnected(_) => Delivery::ChannelDisconnected(()),
        Delivery::Interrupted(_) => Delivery::Interrupted(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{Exit, Sentinel, Transform, Worker};
    use crate::cancel::CancelToken;
    use crate::error::TransformError;
    use crossbeam_channel::{bounded, Receiver, Sender};
    use crossbeam_utils::sync::WaitGroup;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    type Channels = (
        Sender<u32>,
        Receiver<u32>,
        Receiver<TransformError<String>>,
        thread::JoinHandle<Exit>,
    );

    fn spawn_worker(
        cancel: &CancelToken,
        active: &Arc<AtomicUsize>,
        done: &WaitGroup,
    ) -> Channels {
        let transform: Arc<Transform<u32, u32, String>> = Arc::new(|i: u32| match i {
            0 => panic!("zero"),
            i if i % 2 == 0 => Err(format!("even: {i}")),
            i => Ok(i * 10),
        });
        let (in_tx, in_rx) = bounded(0);
        let (out_tx, out_rx) = bounded(0);
        let (err_tx, err_rx) = bounded(0);
        let worker = Worker::new(
            0,
            transform,
            in_rx,
            out_tx,
            err_tx,
            cancel.clone(),
            Sentinel::new(active, done),
        );
        (in_tx, out_rx, err_rx, thread::spawn(move || worker.run()))
    }

    #[test]
    fn test_routes_outputs_and_errors() {
        let cancel = CancelToken::new();
        let active = Arc::new(AtomicUsize::new(0));
        let done = WaitGroup::new();
        let (in_tx, out_rx, err_rx, handle) = spawn_worker(&cancel, &active, &done);
        assert_eq!(active.load(Ordering::Acquire), 1);
        in_tx.send(3).unwrap();
        assert_eq!(out_rx.recv().unwrap(), 30);
        in_tx.send(4).unwrap();
        let error = err_rx.recv().unwrap();
        assert_eq!(error.cause().map(String::as_str), Some("even: 4"));
        // the worker survives a panicking transform
        in_tx.send(0).unwrap();
        let error = err_rx.recv().unwrap();
        let panic = error.panic().expect("panic is collected");
        assert_eq!(panic.detail(), Some("worker-0"));
        assert_eq!(panic.to_string(), "panicked in worker-0: zero");
        in_tx.send(5).unwrap();
        assert_eq!(out_rx.recv().unwrap(), 50);
        drop(in_tx);
        assert_eq!(handle.join().unwrap(), Exit::InputClosed);
        done.wait();
        assert_eq!(active.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_cancelled_while_blocked_on_send() {
        let cancel = CancelToken::new();
        let active = Arc::new(AtomicUsize::new(0));
        let done = WaitGroup::new();
        let (in_tx, _out_rx, _err_rx, handle) = spawn_worker(&cancel, &active, &done);
        in_tx.send(1).unwrap();
        // nobody receives the output
        thread::sleep(Duration::from_millis(50));
        cancel.cancel();
        assert_eq!(handle.join().unwrap(), Exit::Cancelled);
        done.wait();
        assert_eq!(active.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_abandoned_when_sources_dropped() {
        let cancel = CancelToken::new();
        let active = Arc::new(AtomicUsize::new(0));
        let done = WaitGroup::new();
        let (in_tx, out_rx, err_rx, handle) = spawn_worker(&cancel, &active, &done);
        drop(out_rx);
        drop(err_rx);
        in_tx.send(1).unwrap();
        assert_eq!(handle.join().unwrap(), Exit::Abandoned);
    }
}
