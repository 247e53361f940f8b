//! Structured task group for managing related async tasks.

use super::CleanupRegistry;
use crate::context::Context;
use crate::errors::{ConveyerError, StageError};
use crate::events::{payload, types, EventSink, NoOpEventSink};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{warn, Instrument, Span};

/// First failure recorded by a group.
#[derive(Debug)]
struct Failure {
    task: String,
    error: StageError,
}

/// A group of related tasks with structured cancellation.
///
/// Tasks share one child context of the context the group was created
/// with. The first task error is recorded and cancels that shared context;
/// later errors are logged and discarded. `wait` joins every task before
/// running cleanup, so cleanup never races a live task.
pub struct StructuredTaskGroup {
    /// Context shared by all tasks, cancelled on the first error.
    ctx: Context,
    /// The cleanup registry.
    cleanup_registry: Arc<CleanupRegistry>,
    /// Handles to spawned tasks.
    handles: RwLock<Vec<(String, JoinHandle<()>)>>,
    /// The first error encountered.
    first_error: Arc<Mutex<Option<Failure>>>,
    /// Receives `stage.error_discarded` notifications.
    event_sink: Arc<dyn EventSink>,
}

impl StructuredTaskGroup {
    /// Creates a new task group whose tasks run under a child of `parent`.
    #[must_use]
    pub fn new(parent: &Context) -> Self {
        Self {
            ctx: parent.child(),
            cleanup_registry: Arc::new(CleanupRegistry::new()),
            handles: RwLock::new(Vec::new()),
            first_error: Arc::new(Mutex::new(None)),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the sink notified about discarded errors.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the context shared by the group's tasks.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.ctx
    }

    /// Returns the cleanup registry.
    #[must_use]
    pub const fn cleanup_registry(&self) -> &Arc<CleanupRegistry> {
        &self.cleanup_registry
    }

    /// Spawns a task in the group, instrumented with `span`.
    pub fn spawn<F, Fut>(&self, name: &str, span: Span, task: F)
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), StageError>> + Send + 'static,
    {
        let ctx = self.ctx.clone();
        let first_error = self.first_error.clone();
        let sink = self.event_sink.clone();
        let task_name = name.to_string();

        let handle = tokio::spawn(
            async move {
                // Panics are recorded here, not at join time, so siblings
                // are cancelled no matter where the task sits in join order.
                let task_ctx = ctx.clone();
                let outcome = AssertUnwindSafe(async move { task(task_ctx).await })
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(StageError::Panicked(panic_message(&*panic))));
                if let Err(error) = outcome {
                    record_failure(&ctx, &first_error, sink.as_ref(), task_name, error);
                }
            }
            .instrument(span),
        );

        self.handles.write().push((name.to_string(), handle));
    }

    /// Waits for all tasks to complete, then runs cleanup.
    ///
    /// Returns the first recorded error. A panicking task counts as a failed
    /// task; a task aborted by runtime shutdown is reported the same way.
    pub async fn wait(&self) -> Result<(), ConveyerError> {
        let handles: Vec<_> = std::mem::take(&mut *self.handles.write());

        for (name, handle) in handles {
            if let Err(join_error) = handle.await {
                let error = StageError::Panicked(join_error.to_string());
                record_failure(
                    &self.ctx,
                    &self.first_error,
                    self.event_sink.as_ref(),
                    name,
                    error,
                );
            }
        }

        // Always run cleanup
        self.cleanup_registry.run_all();

        match self.first_error.lock().take() {
            Some(Failure { task, error }) => Err(ConveyerError::stage(task, error)),
            None => Ok(()),
        }
    }

    /// Returns the number of tasks not yet joined.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.handles.read().len()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

fn record_failure(
    ctx: &Context,
    slot: &Mutex<Option<Failure>>,
    sink: &dyn EventSink,
    task: String,
    error: StageError,
) {
    let mut first_error = slot.lock();
    if first_error.is_none() {
        ctx.cancel(format!("stage '{task}' failed: {error}"));
        *first_error = Some(Failure { task, error });
        return;
    }
    drop(first_error);

    warn!(stage = %task, error = %error, "Discarding error after first failure");
    sink.try_emit(
        types::STAGE_ERROR_DISCARDED,
        Some(payload(serde_json::json!({
            "stage": task,
            "error": error.to_string(),
            "error_kind": error.kind(),
        }))),
    );
}

impl std::fmt::Debug for StructuredTaskGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredTaskGroup")
            .field("task_count", &self.task_count())
            .field("cancelled", &self.ctx.is_done())
            .finish()
    }
}
