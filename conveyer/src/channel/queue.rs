//! Bounded string channel with explicit close.

use crate::cancellation::CancellationToken;
use crate::context::Context;
use crate::errors::ChannelError;
use tokio::sync::{mpsc, Mutex};

/// A named, bounded, ordered queue of string messages.
///
/// Any number of tasks may send and receive concurrently. Closing is
/// explicit and happens once: after [`Channel::close`], sends fail with
/// [`ChannelError::Closed`] while receivers keep draining whatever is
/// buffered and then observe end-of-stream (`None`).
pub struct Channel {
    name: String,
    capacity: usize,
    tx: mpsc::Sender<String>,
    // Receivers take turns; tokio's mutex is fair, so waiting consumers are
    // served in arrival order.
    rx: Mutex<mpsc::Receiver<String>>,
    closed: CancellationToken,
}

impl Channel {
    /// Creates an open channel holding at most `capacity` messages.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            name: name.into(),
            capacity,
            tx,
            rx: Mutex::new(rx),
            closed: CancellationToken::new(),
        }
    }

    /// Returns the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of buffered messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    /// Returns true if no messages are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether the channel has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Closes the channel. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        self.closed.cancel(format!("channel '{}' closed", self.name))
    }

    /// Sends a message, waiting for room.
    ///
    /// Fails with [`ChannelError::Closed`] if the channel is closed before
    /// the message is enqueued.
    pub async fn send(&self, message: String) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(self.closed_error()),
            sent = self.tx.send(message) => sent.map_err(|_| self.closed_error()),
        }
    }

    /// Sends a message unless the channel is full or closed.
    pub fn try_send(&self, message: String) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::Full(self.name.clone()),
            mpsc::error::TrySendError::Closed(_) => self.closed_error(),
        })
    }

    /// Receives the next message.
    ///
    /// Returns `None` once the channel is closed and drained.
    pub async fn recv(&self) -> Option<String> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            message = rx.recv() => message,
            // Closed: hand out what is still buffered, one message per call.
            () = self.closed.cancelled() => rx.try_recv().ok(),
        }
    }

    /// Sends a message unless `ctx` is done first.
    ///
    /// Returns `Ok(false)` when cancellation won the race, in which case the
    /// message was not enqueued.
    pub async fn send_or_done(&self, ctx: &Context, message: String) -> Result<bool, ChannelError> {
        tokio::select! {
            biased;
            () = ctx.done() => Ok(false),
            sent = self.send(message) => sent.map(|()| true),
        }
    }

    /// Receives a message unless `ctx` is done first.
    ///
    /// Returns `None` both when `ctx` is done and when the channel is closed
    /// and drained; either way the caller has no more work.
    pub async fn recv_or_done(&self, ctx: &Context) -> Option<String> {
        tokio::select! {
            biased;
            () = ctx.done() => None,
            message = self.recv() => message,
        }
    }

    fn closed_error(&self) -> ChannelError {
        ChannelError::Closed(self.name.clone())
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
