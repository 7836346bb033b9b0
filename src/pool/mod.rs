//! A single-use pool of worker threads that apply a transform to each item submitted to it.
//!
//! A [`WorkerPool`] has three rendezvous channels:
//! * the input sink, into which items are submitted;
//! * the output source, from which transformed values are received;
//! * the error source, from which failed transforms are received.
//!
//! Every handoff blocks the sender until a receiver takes the value, so the submitter can never
//! get ahead of the workers, and the workers can never get ahead of whoever drains the sources.
//!
//! The pool moves through three states: `New`, `Started` and `Stopped`. Stopping closes the
//! input sink, waits for every worker to exit, and only then closes the output and error sources,
//! so no worker can ever send into a closed channel.
mod error;
mod status;
mod worker;

pub use error::{PoolError, SubmitError};
pub use status::Status;

use self::status::StatusCell;
use self::worker::{Sentinel, Transform, Worker};
use crate::cancel::CancelToken;
use crate::channel::{Delivery, SenderExt};
use crate::config::Config;
use crate::error::TransformError;
use crossbeam_channel::{Receiver, Sender};
use crossbeam_utils::sync::WaitGroup;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The receiving ends of a pool's output and error channels.
pub struct Sources<O, E> {
    pub outputs: Receiver<O>,
    pub errors: Receiver<TransformError<E>>,
}

pub struct WorkerPool<I, O, E> {
    size: usize,
    transform: Arc<Transform<I, O, E>>,
    config: Config,
    status: StatusCell,
    input_tx: Mutex<Option<Sender<I>>>,
    // handed out to the workers on `start`
    input_rx: Mutex<Option<Receiver<I>>>,
    output_tx: Mutex<Option<Sender<O>>>,
    error_tx: Mutex<Option<Sender<TransformError<E>>>>,
    // handed out to the reducer by `take_sources`
    sources: Mutex<Option<Sources<O, E>>>,
    // released once by `stop`; every worker holds a clone until it exits
    done: Mutex<Option<WaitGroup>>,
    active: Arc<AtomicUsize>,
}

impl<I, O, E> WorkerPool<I, O, E>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
{
    /// Creates a new pool of `size` workers that apply `transform` to each input. Threads are not
    /// spawned until [`start`](Self::start) is called.
    pub fn new<F>(size: usize, transform: F, config: Config) -> Result<Self, PoolError>
    where
        F: Fn(I) -> Result<O, E> + Send + Sync + 'static,
    {
        if size == 0 {
            return Err(PoolError::NoWorkers);
        }
        let (input_tx, input_rx) = crossbeam_channel::bounded(0);
        let (output_tx, output_rx) = crossbeam_channel::bounded(0);
        let (error_tx, error_rx) = crossbeam_channel::bounded(0);
        Ok(Self {
            size,
            transform: Arc::new(transform),
            config,
            status: StatusCell::default(),
            input_tx: Mutex::new(Some(input_tx)),
            input_rx: Mutex::new(Some(input_rx)),
            output_tx: Mutex::new(Some(output_tx)),
            error_tx: Mutex::new(Some(error_tx)),
            sources: Mutex::new(Some(Sources {
                outputs: output_rx,
                errors: error_rx,
            })),
            done: Mutex::new(Some(WaitGroup::new())),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The number of workers in this pool.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn status(&self) -> Status {
        self.status.get()
    }

    /// The number of workers that have been spawned and have not yet exited.
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Takes the output and error sources. Returns `None` if they have already been taken.
    ///
    /// Dropping the sources before the pool is stopped causes any worker blocked on delivering a
    /// result to exit.
    pub fn take_sources(&self) -> Option<Sources<O, E>> {
        self.sources.lock().take()
    }

    /// Spawns `size` worker threads. Each worker observes `cancel` in every blocking operation.
    ///
    /// Returns an error if the pool has already been started or stopped, or if a thread could not
    /// be spawned. In the latter case the workers that were spawned keep running until
    /// [`stop`](Self::stop) is called.
    pub fn start(&self, cancel: &CancelToken) -> Result<(), PoolError> {
        self.status
            .transition(Status::New, Status::Started)
            .map_err(|status| match status {
                Status::Stopped => PoolError::Stopped,
                _ => PoolError::AlreadyStarted,
            })?;
        // the pool keeps none of these so that the workers alone decide when they disconnect
        let input_rx = self.input_rx.lock().take().ok_or(PoolError::AlreadyStarted)?;
        let output_tx = self.output_tx.lock().clone().ok_or(PoolError::Stopped)?;
        let error_tx = self.error_tx.lock().clone().ok_or(PoolError::Stopped)?;
        let done = self.done.lock().clone().ok_or(PoolError::Stopped)?;
        tracing::debug!(size = self.size, "starting worker pool");
        for index in 0..self.size {
            let worker = Worker::new(
                index,
                Arc::clone(&self.transform),
                input_rx.clone(),
                output_tx.clone(),
                error_tx.clone(),
                cancel.clone(),
                Sentinel::new(&self.active, &done),
            );
            // if spawning fails the closure is dropped, which releases the worker's sentinel
            self.config
                .thread_builder(&format!("worker-{index}"))
                .spawn(move || {
                    worker.run();
                })
                .map_err(PoolError::Spawn)?;
        }
        Ok(())
    }

    /// Hands `item` to the next free worker, blocking until one takes it or `cancel` fires.
    pub fn submit(&self, item: I, cancel: &CancelToken) -> Result<(), SubmitError<I>> {
        // clone the sender so the lock is not held while blocked
        let tx = match self.input_tx.lock().as_ref() {
            Some(tx) => tx.clone(),
            None => return Err(SubmitError::Closed(item)),
        };
        match tx.send_or_cancel(item, cancel) {
            Delivery::Delivered => Ok(()),
            Delivery::ChannelDisconnected(item) => Err(SubmitError::Closed(item)),
            Delivery::Interrupted(item) => Err(SubmitError::Cancelled(item)),
        }
    }

    /// Stops the pool: closes the input sink, blocks until every worker has exited, and then
    /// closes the output source followed by the error source. Calling `stop` on a pool that is
    /// already stopped does nothing.
    pub fn stop(&self) {
        if !self.status.stop() {
            return;
        }
        drop(self.input_tx.lock().take());
        // a pool that was never started still holds the receiver
        drop(self.input_rx.lock().take());
        let done = self.done.lock().take();
        if let Some(done) = done {
            done.wait();
        }
        debug_assert_eq!(self.active_workers(), 0);
        drop(self.output_tx.lock().take());
        drop(self.error_tx.lock().take());
        tracing::debug!(size = self.size(), "worker pool stopped");
    }
}
