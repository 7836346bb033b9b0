//! Cooperative cancellation shared by every thread taking part in a map-reduce run.
//!
//! A [`CancelToken`] is cheap to clone; all clones observe the same state. Cancellation is
//! triggered either explicitly, by calling [`CancelToken::cancel`], or implicitly, when the
//! token's deadline (if any) passes. Blocking operations inside the crate race their channel
//! operation against [`CancelToken::signal`] and [`CancelToken::expiry`] so that they return as
//! soon as either fires.
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The reason a run was interrupted before all of its inputs were reduced.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// [`CancelToken::cancel`] was called.
    #[error("operation was cancelled")]
    Cancelled,
    /// The token's deadline passed.
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

/// A cloneable, thread-safe cancellation signal with an optional deadline.
#[derive(Clone, Debug)]
pub struct CancelToken(Arc<Inner>);

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    // dropping the sender disconnects `signal`, which wakes every `select!` waiting on it
    trigger: Mutex<Option<Sender<Infallible>>>,
    signal: Receiver<Infallible>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Returns a token that is only cancelled by calling [`cancel`](Self::cancel).
    pub fn new() -> Self {
        Self::with_optional_deadline(None)
    }

    /// Returns a token that is cancelled automatically once `timeout` has elapsed. A timeout too
    /// large to be represented as an `Instant` never expires.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_optional_deadline(Instant::now().checked_add(timeout))
    }

    /// Returns a token that is cancelled automatically at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::with_optional_deadline(Some(deadline))
    }

    fn with_optional_deadline(deadline: Option<Instant>) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self(Arc::new(Inner {
            cancelled: AtomicBool::new(false),
            trigger: Mutex::new(Some(tx)),
            signal: rx,
            deadline,
        }))
    }

    /// Cancels this token and all of its clones. Calling this more than once has no effect.
    pub fn cancel(&self) {
        if !self.0.cancelled.swap(true, Ordering::AcqRel) {
            let _ = self.0.trigger.lock().take();
        }
    }

    /// Returns `true` if the token has been cancelled or its deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Returns the reason this token is cancelled, or `None` if it is still live. An explicit
    /// cancellation takes precedence over an expired deadline.
    pub fn reason(&self) -> Option<Interrupted> {
        if self.0.cancelled.load(Ordering::Acquire) {
            Some(Interrupted::Cancelled)
        } else if self.0.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            Some(Interrupted::DeadlineExceeded)
        } else {
            None
        }
    }

    /// The instant at which this token expires, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.0.deadline
    }

    /// A receiver that becomes disconnected when [`cancel`](Self::cancel) is called. It never
    /// yields a message.
    pub(crate) fn signal(&self) -> &Receiver<Infallible> {
        &self.0.signal
    }

    /// A receiver that yields a single message when the deadline passes, or never if there is no
    /// deadline. A fresh receiver must be requested for each `select!` since the message is only
    /// delivered once.
    pub(crate) fn expiry(&self) -> Receiver<Instant> {
        match self.0.deadline {
            Some(deadline) => crossbeam_channel::at(deadline),
            None => crossbeam_channel::never(),
        }
    }

    /// Returns the reason for cancellation after a `select!` arm on `signal` or `expiry` fired.
    pub(crate) fn interrupted(&self) -> Interrupted {
        self.reason().unwrap_or(Interrupted::DeadlineExceeded)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
