//! The pipeline instance: registration and the run scheduler.

use super::{PipelineState, StageFuture, StageSpec};
use crate::cancellation::StructuredTaskGroup;
use crate::channel::{Channel, ChannelRegistry};
use crate::context::Context;
use crate::errors::{ConveyerError, Result, StageError};
use crate::events::{payload, types, EventSink, NoOpEventSink};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Starts a resolved stage under the shared run context.
type Launcher = Box<dyn FnOnce(Context) -> StageFuture + Send>;

/// A string-stream pipeline.
///
/// Stages are registered while the pipeline is idle, then [`Pipeline::run`]
/// executes all of them concurrently. Callers feed and read channels with
/// [`Pipeline::send`] and [`Pipeline::recv`], which may be used before and
/// during the run; share the pipeline through an `Arc` to do so.
pub struct Pipeline {
    run_id: Uuid,
    registry: ChannelRegistry,
    stages: Mutex<Vec<StageSpec>>,
    state: Mutex<PipelineState>,
    event_sink: Arc<dyn EventSink>,
}

impl Pipeline {
    /// Creates an idle pipeline whose channels each buffer `buffer_size`
    /// messages.
    ///
    /// A buffer size of zero is raised to one.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        if buffer_size == 0 {
            warn!("Buffer size 0 is not supported; using 1");
        }
        Self {
            run_id: Uuid::new_v4(),
            registry: ChannelRegistry::new(buffer_size.max(1)),
            stages: Mutex::new(Vec::new()),
            state: Mutex::new(PipelineState::Idle),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the sink receiving lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the identifier attached to this pipeline's events and spans.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the capacity of every channel.
    #[must_use]
    pub const fn buffer_size(&self) -> usize {
        self.registry.capacity()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    /// Returns the number of registered stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.lock().len()
    }

    /// Returns diagnostic labels of the registered stages, in order.
    #[must_use]
    pub fn stage_labels(&self) -> Vec<String> {
        self.stages
            .lock()
            .iter()
            .enumerate()
            .map(|(i, spec)| spec.label(i))
            .collect()
    }

    /// Returns every channel name, in first-reference order.
    #[must_use]
    pub fn channel_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub(super) fn lookup(&self, name: &str) -> Result<Arc<Channel>> {
        self.registry
            .lookup(name)
            .ok_or_else(|| ConveyerError::ChannelNotFound(name.to_string()))
    }

    /// Registers a one-input, one-output stage.
    ///
    /// Both channels exist as soon as this returns.
    pub fn register_decorator<F, Fut>(&self, func: F, input: &str, output: &str) -> Result<()>
    where
        F: Fn(Context, Arc<Channel>, Arc<Channel>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), StageError>> + Send + 'static,
    {
        self.register(StageSpec::decorator(func, input, output))
    }

    /// Registers a one-input, many-output stage.
    ///
    /// # Errors
    ///
    /// Fails with [`ConveyerError::Configuration`] if `outputs` is empty.
    pub fn register_separator<F, Fut, S>(&self, func: F, input: &str, outputs: &[S]) -> Result<()>
    where
        F: Fn(Context, Arc<Channel>, Vec<Arc<Channel>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), StageError>> + Send + 'static,
        S: AsRef<str>,
    {
        self.register(StageSpec::separator(func, input, outputs))
    }

    /// Registers a many-input, one-output stage.
    pub fn register_multiplexer<F, Fut, S>(&self, func: F, inputs: &[S], output: &str) -> Result<()>
    where
        F: Fn(Context, Vec<Arc<Channel>>, Arc<Channel>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), StageError>> + Send + 'static,
        S: AsRef<str>,
    {
        self.register(StageSpec::multiplexer(func, inputs, output))
    }

    /// Registers a prepared stage specification.
    ///
    /// # Errors
    ///
    /// Fails with [`ConveyerError::AlreadyRunning`] once `run` was called,
    /// and with [`ConveyerError::Configuration`] for invalid wiring.
    pub fn register(&self, spec: StageSpec) -> Result<()> {
        let state = self.state.lock();
        if !state.is_idle() {
            return Err(ConveyerError::AlreadyRunning);
        }
        spec.validate().map_err(ConveyerError::Configuration)?;

        for name in spec.channel_names() {
            self.registry.get_or_create(name);
        }

        let mut stages = self.stages.lock();
        debug!(stage = %spec.label(stages.len()), "Registered stage");
        stages.push(spec);
        Ok(())
    }

    /// Binds `alias` to the channel already named `existing`.
    ///
    /// Both names then refer to one channel, which is closed once.
    pub fn alias_channel(&self, alias: &str, existing: &str) -> Result<()> {
        let state = self.state.lock();
        if !state.is_idle() {
            return Err(ConveyerError::AlreadyRunning);
        }
        if self.registry.alias(alias, existing) {
            return Ok(());
        }
        drop(state);

        self.lookup(existing)?;
        Err(ConveyerError::configuration(format!(
            "channel name '{alias}' is already bound to another channel"
        )))
    }

    /// Runs every registered stage until all of them return.
    ///
    /// The stages share a child of `ctx`. The first stage error cancels that
    /// child and becomes the result; cancellation of `ctx` itself stops the
    /// stages without an error. Every channel is closed before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`ConveyerError::AlreadyRunning`] if the pipeline was already
    /// started, or [`ConveyerError::Stage`] carrying the first stage error.
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        let stages = {
            let mut state = self.state.lock();
            if !state.is_idle() {
                return Err(ConveyerError::AlreadyRunning);
            }
            *state = PipelineState::Running;
            self.stages.lock().clone()
        };

        let started = Instant::now();
        let channels = self.registry.unique_channels();
        info!(
            run_id = %self.run_id,
            stages = stages.len(),
            channels = channels.len(),
            "Pipeline started"
        );
        self.event_sink.try_emit(
            types::PIPELINE_STARTED,
            Some(payload(serde_json::json!({
                "run_id": self.run_id.to_string(),
                "stages": stages.iter().enumerate().map(|(i, s)| s.label(i)).collect::<Vec<_>>(),
                "channels": self.registry.names(),
            }))),
        );

        let group = StructuredTaskGroup::new(ctx).with_event_sink(self.event_sink.clone());

        for channel in channels {
            let sink = self.event_sink.clone();
            group
                .cleanup_registry()
                .register(format!("close {}", channel.name()), move || {
                    if channel.close() {
                        debug!(channel = %channel.name(), "Closed channel");
                        sink.try_emit(
                            types::CHANNEL_CLOSED,
                            Some(payload(serde_json::json!({ "channel": channel.name() }))),
                        );
                    }
                });
        }

        for (index, spec) in stages.into_iter().enumerate() {
            let label = spec.label(index);
            let span = info_span!("stage", stage = %label, kind = %spec.kind(), run_id = %self.run_id);
            let launch = self.launcher(spec);
            let sink = self.event_sink.clone();
            let stage = label.clone();

            group.spawn(&label, span, move |ctx| async move {
                sink.try_emit(
                    types::STAGE_STARTED,
                    Some(payload(serde_json::json!({ "stage": stage }))),
                );
                let stage_started = Instant::now();
                let result = launch(ctx).await;
                let duration_ms = stage_started.elapsed().as_secs_f64() * 1000.0;

                match &result {
                    Ok(()) => {
                        debug!(duration_ms, "Stage completed");
                        sink.try_emit(
                            types::STAGE_COMPLETED,
                            Some(payload(serde_json::json!({
                                "stage": stage,
                                "duration_ms": duration_ms,
                            }))),
                        );
                    }
                    Err(error) => {
                        warn!(%error, duration_ms, "Stage failed");
                        sink.try_emit(
                            types::STAGE_FAILED,
                            Some(payload(serde_json::json!({
                                "stage": stage,
                                "duration_ms": duration_ms,
                                "error": error.to_string(),
                                "error_kind": error.kind(),
                            }))),
                        );
                    }
                }
                result
            });
        }

        let result = group.wait().await;
        *self.state.lock() = PipelineState::Terminated;

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(()) => info!(run_id = %self.run_id, duration_ms, "Pipeline completed"),
            Err(error) => warn!(run_id = %self.run_id, duration_ms, %error, "Pipeline failed"),
        }
        self.event_sink.try_emit(
            types::PIPELINE_COMPLETED,
            Some(payload(serde_json::json!({
                "run_id": self.run_id.to_string(),
                "duration_ms": duration_ms,
                "success": result.is_ok(),
                "error": result.as_ref().err().map(ToString::to_string),
            }))),
        );

        result
    }

    /// Resolves a registration's channel names, capturing everything the
    /// task needs by value.
    fn launcher(&self, spec: StageSpec) -> Launcher {
        match spec {
            StageSpec::Decorator { func, input, output } => {
                let input = self.registry.get_or_create(&input);
                let output = self.registry.get_or_create(&output);
                Box::new(move |ctx: Context| func(ctx, input, output))
            }
            StageSpec::Separator { func, input, outputs } => {
                let input = self.registry.get_or_create(&input);
                let outputs: Vec<Arc<Channel>> = outputs
                    .iter()
                    .map(|name| self.registry.get_or_create(name))
                    .collect();
                Box::new(move |ctx: Context| func(ctx, input, outputs))
            }
            StageSpec::Multiplexer { func, inputs, output } => {
                let inputs: Vec<Arc<Channel>> = inputs
                    .iter()
                    .map(|name| self.registry.get_or_create(name))
                    .collect();
                let output = self.registry.get_or_create(&output);
                Box::new(move |ctx: Context| func(ctx, inputs, output))
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(crate::config::PipelineConfig::default().buffer_size)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("run_id", &self.run_id)
            .field("state", &self.state())
            .field("buffer_size", &self.buffer_size())
            .field("stages", &self.stage_count())
            .field("channels", &self.channel_names())
            .finish()
    }
}
