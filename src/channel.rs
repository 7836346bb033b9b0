//! Extensions to `crossbeam_channel` senders and receivers that race each blocking operation
//! against a [`CancelToken`].
use crate::cancel::CancelToken;
use crossbeam_channel::{Receiver, Select, SelectedOperation, SendError, Sender};
use std::time::Instant;

/// Possible results of calling `ReceiverExt::recv_or_cancel()` on a `Receiver`.
#[derive(Debug, PartialEq, Eq)]
pub enum Message<T> {
    /// A message was successfully received from the channel.
    Received(T),
    /// The channel was disconnected.
    ChannelDisconnected,
    /// The token was cancelled before a message arrived.
    Interrupted,
}

/// Possible results of calling `SenderExt::send_or_cancel()` on a `Sender`. The undelivered value
/// is handed back on failure.
#[derive(Debug, PartialEq, Eq)]
pub enum Delivery<T> {
    /// The value was handed off to a receiver.
    Delivered,
    /// All receivers have been dropped.
    ChannelDisconnected(T),
    /// The token was cancelled before a receiver took the value.
    Interrupted(T),
}

pub trait ReceiverExt<T> {
    /// Blocks until a message is received, the channel is disconnected, or `cancel` fires,
    /// whichever happens first. A token that is already cancelled always wins.
    fn recv_or_cancel(&self, cancel: &CancelToken) -> Message<T>;
}

pub trait SenderExt<T> {
    /// Blocks until `value` is taken by a receiver, the channel is disconnected, or `cancel`
    /// fires, whichever happens first. A token that is already cancelled always wins.
    fn send_or_cancel(&self, value: T, cancel: &CancelToken) -> Delivery<T>;
}

/// The operations registered with a `Select` for observing a `CancelToken`.
pub(crate) struct CancelArms {
    signal: usize,
    expiry: usize,
}

impl CancelArms {
    /// Registers the token's signal and its deadline receiver `expiry` with `sel`.
    pub fn register<'a>(
        sel: &mut Select<'a>,
        cancel: &'a CancelToken,
        expiry: &'a Receiver<Instant>,
    ) -> Self {
        Self {
            signal: sel.recv(cancel.signal()),
            expiry: sel.recv(expiry),
        }
    }

    /// If `oper` is one of the cancellation arms, completes it and returns `None`. Otherwise
    /// returns the operation untouched so the caller can complete it.
    pub fn complete<'a>(
        &self,
        oper: SelectedOperation<'a>,
        cancel: &CancelToken,
        expiry: &Receiver<Instant>,
    ) -> Option<SelectedOperation<'a>> {
        let index = oper.index();
        if index == self.signal {
            let _ = oper.recv(cancel.signal());
            None
        } else if index == self.expiry {
            let _ = oper.recv(expiry);
            None
        } else {
            Some(oper)
        }
    }
}

impl<T> ReceiverExt<T> for Receiver<T> {
    fn recv_or_cancel(&self, cancel: &CancelToken) -> Message<T> {
        if cancel.is_cancelled() {
            return Message::Interrupted;
        }
        let expiry = cancel.expiry();
        let mut sel = Select::new();
        let arms = CancelArms::register(&mut sel, cancel, &expiry);
        sel.recv(self);
        // bound to a local so the selected operation's borrow of `expiry` ends before it drops
        let message = match arms.complete(sel.select(), cancel, &expiry) {
            None => Message::Interrupted,
            Some(oper) => match oper.recv(self) {
                Ok(msg) => Message::Received(msg),
                Err(_) => Message::ChannelDisconnected,
            },
        };
        message
    }
}

impl<T> SenderExt<T> for Sender<T> {
    fn send_or_cancel(&self, value: T, cancel: &CancelToken) -> Delivery<T> {
        if cancel.is_cancelled() {
            return Delivery::Interrupted(value);
        }
        let expiry = cancel.expiry();
        let mut sel = Select::new();
        let arms = CancelArms::register(&mut sel, cancel, &expiry);
        sel.send(self);
        let delivery = match arms.complete(sel.select(), cancel, &expiry) {
            None => Delivery::Interrupted(value),
            Some(oper) => match oper.send(self, value) {
                Ok(()) => Delivery::Delivered,
                Err(SendError(value)) => Delivery::ChannelDisconnected(value),
            },
        };
        delivery
    }
}
