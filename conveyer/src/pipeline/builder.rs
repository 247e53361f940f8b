//! Fluent pipeline builder with validation.

use super::{Pipeline, StageSpec};
use crate::channel::Channel;
use crate::config::{MarkerConfig, PipelineConfig};
use crate::context::Context;
use crate::errors::{ConveyerError, Result, StageError};
use crate::events::EventSink;
use crate::stages::{Decorator, Multiplexer, Separator};
use std::future::Future;
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// Wiring mistakes are collected and reported by [`PipelineBuilder::build`].
#[derive(Clone)]
pub struct PipelineBuilder {
    buffer_size: usize,
    markers: MarkerConfig,
    event_sink: Option<Arc<dyn EventSink>>,
    stages: Vec<StageSpec>,
    aliases: Vec<(String, String)>,
}

impl PipelineBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&PipelineConfig::default())
    }

    /// Creates a builder from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            buffer_size: config.buffer_size,
            markers: config.markers.clone(),
            event_sink: None,
            stages: Vec::new(),
            aliases: Vec::new(),
        }
    }

    /// Sets the channel buffer size.
    #[must_use]
    pub const fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Returns the markers used by the built-in stages.
    #[must_use]
    pub const fn markers(&self) -> &MarkerConfig {
        &self.markers
    }

    /// Adds a prepared stage specification.
    #[must_use]
    pub fn stage(mut self, spec: StageSpec) -> Self {
        self.stages.push(spec);
        self
    }

    /// Adds a custom decorator stage.
    #[must_use]
    pub fn decorator<F, Fut>(self, func: F, input: &str, output: &str) -> Self
    where
        F: Fn(Context, Arc<Channel>, Arc<Channel>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), StageError>> + Send + 'static,
    {
        self.stage(StageSpec::decorator(func, input, output))
    }

    /// Adds a custom separator stage.
    #[must_use]
    pub fn separator<F, Fut, S>(self, func: F, input: &str, outputs: &[S]) -> Self
    where
        F: Fn(Context, Arc<Channel>, Vec<Arc<Channel>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), StageError>> + Send + 'static,
        S: AsRef<str>,
    {
        self.stage(StageSpec::separator(func, input, outputs))
    }

    /// Adds a custom multiplexer stage.
    #[must_use]
    pub fn multiplexer<F, Fut, S>(self, func: F, inputs: &[S], output: &str) -> Self
    where
        F: Fn(Context, Vec<Arc<Channel>>, Arc<Channel>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), StageError>> + Send + 'static,
        S: AsRef<str>,
    {
        self.stage(StageSpec::multiplexer(func, inputs, output))
    }

    /// Adds the built-in decorator configured with this builder's markers.
    #[must_use]
    pub fn prefix_decorator(self, input: &str, output: &str) -> Self {
        let stage = Decorator::from_markers(&self.markers).into_stage();
        self.decorator(stage, input, output)
    }

    /// Adds the built-in round-robin separator.
    #[must_use]
    pub fn round_robin_separator<S: AsRef<str>>(self, input: &str, outputs: &[S]) -> Self {
        self.separator(Separator::new().into_stage(), input, outputs)
    }

    /// Adds the built-in multiplexer configured with this builder's markers.
    #[must_use]
    pub fn skipping_multiplexer<S: AsRef<str>>(self, inputs: &[S], output: &str) -> Self {
        let stage = Multiplexer::from_markers(&self.markers).into_stage();
        self.multiplexer(stage, inputs, output)
    }

    /// Binds `alias` to the channel named `existing` once stages are wired.
    #[must_use]
    pub fn alias(mut self, alias: &str, existing: &str) -> Self {
        self.aliases.push((alias.to_string(), existing.to_string()));
        self
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error, naming the offending stage.
    pub fn build(self) -> Result<Pipeline> {
        let mut pipeline = Pipeline::new(self.buffer_size);
        if let Some(sink) = self.event_sink {
            pipeline = pipeline.with_event_sink(sink);
        }

        for (index, spec) in self.stages.into_iter().enumerate() {
            let label = spec.label(index);
            pipeline.register(spec).map_err(|e| match e {
                ConveyerError::Configuration(msg) => {
                    ConveyerError::configuration(format!("{label}: {msg}"))
                }
                other => other,
            })?;
        }

        for (alias, existing) in &self.aliases {
            pipeline.alias_channel(alias, existing)?;
        }

        Ok(pipeline)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("buffer_size", &self.buffer_size)
            .field("markers", &self.markers)
            .field("stages", &self.stages)
            .field("aliases", &self.aliases)
            .finish_non_exhaustive()
    }
}
