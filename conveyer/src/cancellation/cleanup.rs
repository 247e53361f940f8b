//! Cleanup registry.

use parking_lot::Mutex;
use tracing::warn;

/// A callback for cleanup, with a name for diagnostics.
struct CleanupCallback {
    callback: Box<dyn FnOnce() + Send>,
    name: String,
}

/// Registry for cleanup callbacks executed in LIFO order.
///
/// Every callback runs at most once; the registry is empty after `run_all`.
#[derive(Default)]
pub struct CleanupRegistry {
    /// Registered callbacks.
    callbacks: Mutex<Vec<CleanupCallback>>,
}

impl CleanupRegistry {
    /// Creates a new cleanup registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cleanup callback.
    pub fn register<F>(&self, name: impl Into<String>, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.callbacks.lock().push(CleanupCallback {
            callback: Box::new(callback),
            name: name.into(),
        });
    }

    /// Runs all cleanup callbacks in LIFO order.
    ///
    /// A panicking callback does not stop the others. Returns the
    /// `(name, message)` pairs of callbacks that panicked.
    pub fn run_all(&self) -> Vec<(String, String)> {
        let callbacks: Vec<CleanupCallback> = std::mem::take(&mut *self.callbacks.lock());
        let mut failures = Vec::new();

        for entry in callbacks.into_iter().rev() {
            let CleanupCallback { callback, name } = entry;
            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
                let msg = format!("Cleanup callback panicked: {panic:?}");
                warn!("{}: {}", name, msg);
                failures.push((name, msg));
            }
        }

        failures
    }

    /// Returns the number of pending cleanup callbacks.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.callbacks.lock().len()
    }
}

impl std::fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupRegistry")
            .field("pending_count", &self.pending_count())
            .finish()
    }
}
