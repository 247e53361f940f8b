//! Cancellation token for cooperative cancellation.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::warn;

/// A callback type for cancellation notifications.
pub type CancelCallback = Box<dyn Fn() + Send + Sync>;

/// A token for cooperative cancellation.
///
/// Cancellation is idempotent - only the first cancellation reason is kept.
/// Tasks wait for it with [`CancellationToken::cancelled`].
///
/// A child token keeps its parent alive, so cancelling any ancestor reaches
/// every live descendant even when intermediate handles were dropped.
/// Dropping a child removes its callback from the parent.
#[derive(Default)]
pub struct CancellationToken {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Callbacks to invoke on cancellation, keyed for removal.
    callbacks: RwLock<Vec<(u64, CancelCallback)>>,
    /// Next callback key.
    next_id: AtomicU64,
    /// The parent token and this token's callback key in it.
    parent: Option<(Arc<Self>, u64)>,
    /// Wakes tasks parked in `cancelled()`.
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that is cancelled whenever `parent` is.
    ///
    /// Cancelling the child does not affect the parent.
    #[must_use]
    pub fn child_of(parent: &Arc<Self>) -> Arc<Self> {
        let id = parent.next_id.fetch_add(1, Ordering::Relaxed);
        let child = Arc::new(Self {
            cancelled: AtomicBool::new(false),
            reason: RwLock::new(None),
            callbacks: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            parent: Some((parent.clone(), id)),
            notify: Notify::new(),
        });

        let weak: Weak<Self> = Arc::downgrade(&child);
        parent.register(id, move || {
            if let Some(child) = weak.upgrade() {
                child.cancel("parent cancelled");
            }
        });
        child
    }

    /// Requests cancellation with a reason.
    ///
    /// Returns `true` if this call performed the cancellation. Only the first
    /// reason is kept. Panics in callbacks are logged and suppressed.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        *self.reason.write() = Some(reason.into());
        self.notify.notify_waiters();

        let callbacks = std::mem::take(&mut *self.callbacks.write());
        for (_, callback) in &callbacks {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback();
            })) {
                warn!("Cancellation callback panicked: {:?}", e);
            }
        }
        true
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.register(id, callback);
    }

    fn register<F>(&self, id: u64, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        {
            let mut callbacks = self.callbacks.write();
            if !self.is_cancelled() {
                callbacks.push((id, Box::new(callback)));
                return;
            }
        }

        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            callback();
        })) {
            warn!("Cancellation callback panicked: {:?}", e);
        }
    }

    /// Returns the number of callbacks waiting for cancellation.
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking the flag so a concurrent
            // `cancel` between the check and the await is not missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for CancellationToken {
    fn drop(&mut self) {
        if let Some((parent, id)) = self.parent.take() {
            parent.callbacks.write().retain(|(key, _)| *key != id);
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
