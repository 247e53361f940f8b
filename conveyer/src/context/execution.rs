//! Execution context carried by every stage task.

use crate::cancellation::CancellationToken;
use crate::errors::ContextError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A cancellation-and-deadline carrier.
///
/// Contexts form a tree: a child is done when its parent is, but cancelling
/// a child leaves the parent untouched. Cloning a context yields a handle to
/// the same node.
#[derive(Clone, Debug)]
pub struct Context {
    token: Arc<CancellationToken>,
    deadline: Option<Instant>,
}

impl Context {
    /// Creates a root context that is never done unless cancelled.
    #[must_use]
    pub fn background() -> Self {
        Self {
            token: Arc::new(CancellationToken::new()),
            deadline: None,
        }
    }

    /// Derives a child context with its own cancellation.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: CancellationToken::child_of(&self.token),
            deadline: self.deadline,
        }
    }

    /// Derives a child context that is done after `timeout`.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a child context that is done at `deadline`.
    ///
    /// The earlier of this deadline and the parent's one applies.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.child();
        child.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        child
    }

    /// Cancels this context and all contexts derived from it.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.token.cancel(reason);
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns whether the context is cancelled or past its deadline.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Returns why the context is done, or `None` while it is live.
    #[must_use]
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled(
                self.token.reason().unwrap_or_default(),
            ));
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Completes once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
