//! Pipeline registration and execution.
//!
//! This module provides:
//! - Stage registrations (a closed set of decorator/separator/multiplexer)
//! - The [`Pipeline`] instance with its run scheduler
//! - The send/receive facade for callers outside the pipeline
//! - A fluent builder with validation

mod builder;
mod facade;
mod runtime;
mod spec;
mod state;

#[cfg(test)]
mod integration_tests;

pub use builder::PipelineBuilder;
pub use runtime::Pipeline;
pub use spec::{DecoratorFn, MultiplexerFn, SeparatorFn, StageFuture, StageKind, StageSpec};
pub use state::PipelineState;
